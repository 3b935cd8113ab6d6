// playlake - Song catalog and listening logs to a Parquet star schema
//
// The pipeline runs two sequential stages, each terminal on first failure:
//   LoadSongs -> WriteSongs -> WriteArtists
//   LoadLogs  -> WriteUsers -> DeriveTime -> WriteTime -> BuildFacts -> WriteFacts
// Tables written before a failure stay written; there is no rollback.

use anyhow::Context;
use arrow::array::RecordBatch;
use std::fmt;
use thiserror::Error;
use tracing::info;

use playlake_config::RuntimeConfig;
use playlake_core::dimension::{self, DimensionSpec};
use playlake_core::fact;
use playlake_core::{
    log_event_schema, song_catalog_schema, ArrowEngine, StarTable, TabularEngine,
    TransformError, TransformOptions,
};
use playlake_writer::{build_operator, Operator, PartitionedWriter, RawLoader, WriterError};

mod init;

pub use init::init_tracing;

/// Steps of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadSongs,
    WriteSongs,
    WriteArtists,
    LoadLogs,
    WriteUsers,
    DeriveTime,
    WriteTime,
    BuildFacts,
    WriteFacts,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadSongs => "load-songs",
            Stage::WriteSongs => "write-songs",
            Stage::WriteArtists => "write-artists",
            Stage::LoadLogs => "load-logs",
            Stage::WriteUsers => "write-users",
            Stage::DeriveTime => "derive-time",
            Stage::WriteTime => "write-time",
            Stage::BuildFacts => "build-facts",
            Stage::WriteFacts => "write-facts",
        };
        f.write_str(name)
    }
}

/// A fatal pipeline failure, tagged with where it happened
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stage {stage}: failed to read {table}")]
    Source {
        stage: Stage,
        table: &'static str,
        source: WriterError,
    },

    #[error("stage {stage}: failed to build {table}")]
    Transform {
        stage: Stage,
        table: &'static str,
        source: TransformError,
    },

    #[error("stage {stage}: failed to write {table}")]
    Write {
        stage: Stage,
        table: &'static str,
        source: WriterError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Source { stage, .. } | Self::Transform { stage, .. } | Self::Write { stage, .. } => {
                *stage
            }
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Source { table, .. } | Self::Transform { table, .. } | Self::Write { table, .. } => {
                table
            }
        }
    }
}

/// Names of the two raw sources, as they appear in errors
pub const SONG_SOURCE: &str = "song_data";
pub const LOG_SOURCE: &str = "log_data";

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub song_data: String,
    pub log_data: String,
    pub row_group_size: usize,
    pub transform: TransformOptions,
}

impl PipelineOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            song_data: config.input.song_data.clone(),
            log_data: config.input.log_data.clone(),
            row_group_size: config.output.row_group_size,
            transform: config.transform,
        }
    }
}

/// Rows and files written for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: StarTable,
    pub location: String,
    pub rows: usize,
    pub files: usize,
}

/// Outcome of a successful run, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn get(&self, table: StarTable) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// One configured ETL run over explicit storage and compute collaborators
pub struct Pipeline<E: TabularEngine = ArrowEngine> {
    options: PipelineOptions,
    loader: RawLoader,
    writer: PartitionedWriter,
    engine: E,
}

impl<E: TabularEngine> Pipeline<E> {
    pub fn new(options: PipelineOptions, input: Operator, output: Operator, engine: E) -> Self {
        let writer = PartitionedWriter::new(output).with_row_group_size(options.row_group_size);
        Self {
            options,
            loader: RawLoader::new(input),
            writer,
            engine,
        }
    }

    /// Run both stages to completion.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        let songs = self.run_catalog_stage(&mut report).await?;
        self.run_log_stage(&songs, &mut report).await?;

        info!(
            tables = report.tables.len(),
            facts = report.get(StarTable::Songplays).map(|t| t.rows).unwrap_or(0),
            "Pipeline finished"
        );
        Ok(report)
    }

    /// Songs and artists. Returns the songs dimension for the fact join.
    async fn run_catalog_stage(&self, report: &mut RunReport) -> Result<RecordBatch, PipelineError> {
        info!(stage = %Stage::LoadSongs, pattern = %self.options.song_data, "Loading song catalog");
        let catalog = self
            .loader
            .load(&self.options.song_data, song_catalog_schema())
            .await
            .map_err(|source| PipelineError::Source {
                stage: Stage::LoadSongs,
                table: SONG_SOURCE,
                source,
            })?;

        let songs = self.extract(Stage::WriteSongs, &catalog, &DimensionSpec::songs())?;
        self.write(Stage::WriteSongs, StarTable::Songs, &songs, report)
            .await?;

        let artists = self.extract(Stage::WriteArtists, &catalog, &DimensionSpec::artists())?;
        self.write(Stage::WriteArtists, StarTable::Artists, &artists, report)
            .await?;

        Ok(songs)
    }

    /// Users, time and song plays.
    async fn run_log_stage(
        &self,
        songs: &RecordBatch,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        info!(stage = %Stage::LoadLogs, pattern = %self.options.log_data, "Loading listening logs");
        let events = self
            .loader
            .load(&self.options.log_data, log_event_schema())
            .await
            .map_err(|source| PipelineError::Source {
                stage: Stage::LoadLogs,
                table: LOG_SOURCE,
                source,
            })?;

        let users = self.extract(
            Stage::WriteUsers,
            &events,
            &DimensionSpec::users(self.options.transform.user_level),
        )?;
        self.write(Stage::WriteUsers, StarTable::Users, &users, report)
            .await?;

        info!(stage = %Stage::DeriveTime, "Deriving play timestamps");
        let plays = fact::select_plays(&self.engine, &events).map_err(|source| {
            PipelineError::Transform {
                stage: Stage::DeriveTime,
                table: StarTable::Time.name(),
                source,
            }
        })?;
        let time = self.extract(Stage::DeriveTime, &plays, &DimensionSpec::time())?;
        self.write(Stage::WriteTime, StarTable::Time, &time, report)
            .await?;

        info!(stage = %Stage::BuildFacts, "Joining plays to the song catalog");
        let songplays = fact::build_from_plays(
            &self.engine,
            &plays,
            songs,
            self.options.transform.title_match,
        )
        .map_err(|source| PipelineError::Transform {
            stage: Stage::BuildFacts,
            table: StarTable::Songplays.name(),
            source,
        })?;
        self.write(Stage::WriteFacts, StarTable::Songplays, &songplays, report)
            .await?;

        Ok(())
    }

    fn extract(
        &self,
        stage: Stage,
        source: &RecordBatch,
        spec: &DimensionSpec<'_>,
    ) -> Result<RecordBatch, PipelineError> {
        dimension::extract(&self.engine, source, spec).map_err(|source| PipelineError::Transform {
            stage,
            table: spec.table.name(),
            source,
        })
    }

    async fn write(
        &self,
        stage: Stage,
        table: StarTable,
        batch: &RecordBatch,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let summary = self
            .writer
            .write_table(
                table.name(),
                batch,
                table.location(),
                table.partition_columns(),
            )
            .await
            .map_err(|source| PipelineError::Write {
                stage,
                table: table.name(),
                source,
            })?;

        info!(
            stage = %stage,
            table = %table,
            rows = summary.rows,
            files = summary.files.len(),
            "Table written"
        );
        report.tables.push(TableReport {
            table,
            location: summary.location,
            rows: summary.rows,
            files: summary.files.len(),
        });
        Ok(())
    }
}

/// Build operators from `config` and run the pipeline with the Arrow engine.
pub async fn run_with_config(config: RuntimeConfig) -> anyhow::Result<RunReport> {
    let input = build_operator(&config.input.storage).context("Failed to open input storage")?;
    let output = build_operator(&config.output.storage).context("Failed to open output storage")?;

    let pipeline = Pipeline::new(
        PipelineOptions::from_config(&config),
        input,
        output,
        ArrowEngine,
    );
    Ok(pipeline.run().await?)
}
