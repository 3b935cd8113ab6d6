// End-to-end pipeline tests
//
// Runs the whole ETL over in-memory and on-disk storage and checks the
// written star schema by reading it back.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, SchemaRef, TimestampMicrosecondType};
use arrow::util::display::array_value_to_string;
use opendal::{services, Operator};
use std::collections::{BTreeMap, HashSet};

use playlake::{Pipeline, PipelineError, PipelineOptions, Stage};
use playlake_config::{RuntimeConfig, StorageConfig};
use playlake_core::{
    build_catalog_tables, build_log_tables, log_event_schema, song_catalog_schema, ArrowEngine,
    KeyMatch, StarTable, TransformOptions,
};
use playlake_writer::{decode_json, read_table, SUCCESS_MARKER};

const SONG_A: &str = r#"{"num_songs": 1, "artist_id": "ARMJAGH1187FB546F3", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "The Box Tops", "song_id": "SOCIWDW12A8C13D406", "title": "Soul Deep", "duration": 148.03546, "year": 1969}"#;
const SONG_B: &str = r#"{"num_songs": 1, "artist_id": "AR8IEZO1187B99055E", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Marc Shaiman", "song_id": "SOINLJW12A8C13314C", "title": "City Slickers", "duration": 149.86404, "year": 2008}"#;
const SONG_C: &str = r#"{"num_songs": 1, "artist_id": "ARXR32B1187FB57099", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Gob", "song_id": "SOFSOCN12A8C143F5D", "title": "Face the Ashes", "duration": 209.60608, "year": 2007}"#;

const LOG_NOV_01: &str = r#"{"artist": null, "auth": "Logged In", "firstName": "Walter", "gender": "M", "itemInSession": 0, "lastName": "Frye", "length": null, "level": "free", "location": "San Francisco-Oakland-Hayward, CA", "method": "GET", "page": "Home", "registration": 1540919166796.0, "sessionId": 38, "song": null, "status": 200, "ts": 1541105830796, "userAgent": "Mozilla/5.0", "userId": "39"}
{"artist": "The Box Tops", "auth": "Logged In", "firstName": "Walter", "gender": "M", "itemInSession": 1, "lastName": "Frye", "length": 148.03546, "level": "free", "location": "San Francisco-Oakland-Hayward, CA", "method": "PUT", "page": "NextSong", "registration": 1540919166796.0, "sessionId": 38, "song": "Soul Deep", "status": 200, "ts": 1541106106796, "userAgent": "Mozilla/5.0", "userId": "39"}
{"artist": "Marc Shaiman", "auth": "Logged In", "firstName": "Kaylee", "gender": "F", "itemInSession": 0, "lastName": "Summers", "length": 149.86404, "level": "free", "location": "Phoenix-Mesa-Scottsdale, AZ", "method": "PUT", "page": "NextSong", "registration": 1540344794796.0, "sessionId": 139, "song": "City Slickers", "status": 200, "ts": 1541106352796, "userAgent": "Mozilla/5.0", "userId": "8"}
{"artist": null, "auth": "Logged Out", "firstName": null, "gender": null, "itemInSession": 0, "lastName": null, "length": null, "level": "free", "location": null, "method": "GET", "page": "Home", "registration": null, "sessionId": 52, "song": null, "status": 200, "ts": 1541207073796, "userAgent": null, "userId": ""}
"#;
const LOG_NOV_21: &str = r#"{"artist": "Gob", "auth": "Logged In", "firstName": "Walter", "gender": "M", "itemInSession": 2, "lastName": "Frye", "length": 209.60608, "level": "paid", "location": "San Francisco-Oakland-Hayward, CA", "method": "PUT", "page": "NextSong", "registration": 1540919166796.0, "sessionId": 38, "song": "face the ashes", "status": 200, "ts": 1542837407796, "userAgent": "Mozilla/5.0", "userId": "39"}
"#;

const SOURCES: [(&str, &str); 5] = [
    ("song_data/A/A/A/TRAAAAW128F429D538.json", SONG_A),
    ("song_data/A/A/B/TRAABCL128F4286650.json", SONG_B),
    ("song_data/A/B/C/TRABCEI128F424C983.json", SONG_C),
    ("log_data/2018/11/2018-11-01-events.json", LOG_NOV_01),
    ("log_data/2018/11/2018-11-21-events.json", LOG_NOV_21),
];

fn memory() -> Operator {
    Operator::new(services::Memory::default()).unwrap().finish()
}

async fn seeded_input(sources: &[(&str, &str)]) -> Operator {
    let op = memory();
    for (path, content) in sources {
        op.write(path, content.to_string()).await.unwrap();
    }
    op
}

fn options(transform: TransformOptions) -> PipelineOptions {
    PipelineOptions::from_config(&RuntimeConfig {
        transform,
        ..RuntimeConfig::default()
    })
}

/// Every object under the operator root, path to bytes
async fn snapshot(op: &Operator) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in op.list_with("/").recursive(true).await.unwrap() {
        if entry.metadata().is_file() {
            let bytes = op.read(entry.path()).await.unwrap().to_vec();
            files.insert(entry.path().to_string(), bytes);
        }
    }
    files
}

fn rendered(batch: &RecordBatch, column: &str) -> Vec<String> {
    let array = batch.column_by_name(column).unwrap();
    (0..array.len())
        .map(|i| array_value_to_string(array, i).unwrap())
        .collect()
}

async fn read_back(op: &Operator, table: StarTable) -> RecordBatch {
    read_table(op, table.location(), table.schema()).await.unwrap()
}

#[tokio::test]
async fn test_full_run_writes_star_schema() {
    let input = seeded_input(&SOURCES).await;
    let output = memory();
    let pipeline = Pipeline::new(
        options(TransformOptions::default()),
        input,
        output.clone(),
        ArrowEngine,
    );

    let report = pipeline.run().await.unwrap();

    let order: Vec<StarTable> = report.tables.iter().map(|t| t.table).collect();
    assert_eq!(order, StarTable::ALL.to_vec());
    let rows: Vec<usize> = report.tables.iter().map(|t| t.rows).collect();
    assert_eq!(rows, vec![3, 3, 2, 3, 2]);

    for table in StarTable::ALL {
        let marker = format!("{}/{}", table.location(), SUCCESS_MARKER);
        assert!(output.exists(&marker).await.unwrap(), "{} has no marker", table);
    }

    let users = read_back(&output, StarTable::Users).await;
    let levels: BTreeMap<String, String> = rendered(&users, "userId")
        .into_iter()
        .zip(rendered(&users, "level"))
        .collect();
    assert_eq!(levels.get("39").map(String::as_str), Some("paid"));
    assert_eq!(levels.get("8").map(String::as_str), Some("free"));
}

#[tokio::test]
async fn test_facts_reference_written_dimensions() {
    let input = seeded_input(&SOURCES).await;
    let output = memory();
    let transform = TransformOptions {
        title_match: KeyMatch::Normalized,
        ..TransformOptions::default()
    };
    Pipeline::new(options(transform), input, output.clone(), ArrowEngine)
        .run()
        .await
        .unwrap();

    let songplays = read_back(&output, StarTable::Songplays).await;
    assert_eq!(songplays.num_rows(), 3);
    assert_eq!(songplays.schema(), StarTable::Songplays.schema());

    let songs: HashSet<String> = rendered(&read_back(&output, StarTable::Songs).await, "song_id")
        .into_iter()
        .collect();
    let artists: HashSet<String> =
        rendered(&read_back(&output, StarTable::Artists).await, "artist_id")
            .into_iter()
            .collect();
    let users: HashSet<String> = rendered(&read_back(&output, StarTable::Users).await, "userId")
        .into_iter()
        .collect();
    let times: HashSet<String> =
        rendered(&read_back(&output, StarTable::Time).await, "start_time")
            .into_iter()
            .collect();

    for song_id in rendered(&songplays, "song_id") {
        assert!(songs.contains(&song_id), "dangling song {}", song_id);
    }
    for artist_id in rendered(&songplays, "artist_id") {
        assert!(artists.contains(&artist_id), "dangling artist {}", artist_id);
    }
    for user_id in rendered(&songplays, "userId") {
        assert!(users.contains(&user_id), "dangling user {}", user_id);
    }
    for start_time in rendered(&songplays, "start_time") {
        assert!(times.contains(&start_time), "dangling time {}", start_time);
    }

    let mut ids: Vec<i64> = songplays
        .column_by_name("songplay_id")
        .unwrap()
        .as_primitive::<arrow::datatypes::Int64Type>()
        .values()
        .to_vec();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_rerun_produces_identical_output() {
    let input = seeded_input(&SOURCES).await;
    let output = memory();
    let pipeline = Pipeline::new(
        options(TransformOptions::default()),
        input,
        output.clone(),
        ArrowEngine,
    );

    pipeline.run().await.unwrap();
    let first = snapshot(&output).await;
    pipeline.run().await.unwrap();
    let second = snapshot(&output).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_logs_fail_after_catalog_tables() {
    let input = seeded_input(&SOURCES[..3]).await;
    let output = memory();
    let pipeline = Pipeline::new(
        options(TransformOptions::default()),
        input,
        output.clone(),
        ArrowEngine,
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Source { .. }));
    assert_eq!(err.stage(), Stage::LoadLogs);
    assert_eq!(err.table(), "log_data");

    // Catalog tables written before the failure stay in place
    let songs = read_back(&output, StarTable::Songs).await;
    assert_eq!(songs.num_rows(), 3);
    assert!(!output
        .exists(&format!("{}/{}", StarTable::Users.location(), SUCCESS_MARKER))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_no_plays_still_writes_every_table() {
    let only_home = LOG_NOV_01.lines().next().unwrap();
    let sources = [
        SOURCES[0],
        ("log_data/2018/11/2018-11-01-events.json", only_home),
    ];
    let input = seeded_input(&sources).await;
    let output = memory();

    let report = Pipeline::new(
        options(TransformOptions::default()),
        input,
        output.clone(),
        ArrowEngine,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.get(StarTable::Users).unwrap().rows, 1);
    assert_eq!(report.get(StarTable::Time).unwrap().rows, 0);
    assert_eq!(report.get(StarTable::Songplays).unwrap().rows, 0);
    assert_eq!(report.get(StarTable::Songplays).unwrap().files, 0);

    let songplays = read_back(&output, StarTable::Songplays).await;
    assert_eq!(songplays.num_rows(), 0);
}

#[tokio::test]
async fn test_run_with_config_on_filesystem() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    for (path, content) in SOURCES {
        let target = input_dir.path().join(path);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, content).unwrap();
    }

    let mut config = RuntimeConfig::default();
    config.input.storage = StorageConfig::fs(input_dir.path().to_string_lossy());
    config.output.storage = StorageConfig::fs(output_dir.path().to_string_lossy());

    let report = playlake::run_with_config(config).await.unwrap();
    assert_eq!(report.get(StarTable::Songplays).unwrap().rows, 2);

    let root = output_dir.path();
    assert!(root.join("songs.parquet/_SUCCESS").exists());
    assert!(root
        .join("songs.parquet/year=1969/artist_id=ARMJAGH1187FB546F3")
        .is_dir());
    assert!(root.join("timetable.parquet/year=2018/month=11").is_dir());
    assert!(root.join("songplays.parquet/year=2018/month=11").is_dir());

    let users: Vec<_> = std::fs::read_dir(root.join("users.parquet"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".parquet"))
        .collect();
    assert_eq!(users.len(), 1);
    assert!(users[0].starts_with("part-00000-"));
}

/// Decode the fixture files under `prefix` the way the loader does.
fn decode_sources(prefix: &str, schema: SchemaRef) -> RecordBatch {
    let mut batches = Vec::new();
    for (path, content) in SOURCES.iter().filter(|(p, _)| p.starts_with(prefix)) {
        batches.extend(decode_json(path, content.as_bytes(), &schema).unwrap());
    }
    concat_batches(&schema, &batches).unwrap()
}

/// Rows as comparable strings; timestamps as raw microseconds
fn sorted_rows(batch: &RecordBatch) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = (0..batch.num_rows())
        .map(|i| {
            batch
                .columns()
                .iter()
                .map(|column| {
                    if column.is_null(i) {
                        "null".to_string()
                    } else if matches!(column.data_type(), DataType::Timestamp(_, _)) {
                        column
                            .as_primitive::<TimestampMicrosecondType>()
                            .value(i)
                            .to_string()
                    } else {
                        array_value_to_string(column, i).unwrap()
                    }
                })
                .collect()
        })
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_partitioned_tables_read_back_as_built() {
    let input = seeded_input(&SOURCES).await;
    let output = memory();
    let transform = TransformOptions {
        title_match: KeyMatch::Normalized,
        ..TransformOptions::default()
    };
    Pipeline::new(options(transform), input, output.clone(), ArrowEngine)
        .run()
        .await
        .unwrap();

    let catalog = build_catalog_tables(
        &ArrowEngine,
        &decode_sources("song_data/", song_catalog_schema()),
    )
    .unwrap();
    let expected = build_log_tables(
        &ArrowEngine,
        &decode_sources("log_data/", log_event_schema()),
        &catalog.songs,
        &transform,
    )
    .unwrap();

    let time = read_back(&output, StarTable::Time).await;
    assert_eq!(time.schema(), StarTable::Time.schema());
    assert_eq!(time.num_rows(), 3);
    assert_eq!(sorted_rows(&time), sorted_rows(&expected.time));

    let songplays = read_back(&output, StarTable::Songplays).await;
    assert_eq!(songplays.schema(), StarTable::Songplays.schema());
    assert_eq!(songplays.num_rows(), 3);
    assert_eq!(sorted_rows(&songplays), sorted_rows(&expected.songplays));

    let songs = read_back(&output, StarTable::Songs).await;
    assert_eq!(sorted_rows(&songs), sorted_rows(&catalog.songs));

    // 2018-11-21T21:56:47Z survives the write as whole seconds
    let starts: Vec<i64> = time
        .column_by_name("start_time")
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>()
        .values()
        .to_vec();
    assert!(starts.contains(&1_542_837_407_000_000));
}
