use anyhow::{Context, Result};
use clap::Parser;
use playlake::RunReport;
use playlake_config::{KeyMatch, RuntimeConfig, StorageBackend, StorageConfig, UserLevelPolicy};
use std::path::PathBuf;

/// Turn a song catalog and listening logs into a Parquet star schema
#[derive(Parser)]
#[command(name = "playlake")]
#[command(version)]
#[command(about = "Turn a song catalog and listening logs into a Parquet star schema", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Input root directory (filesystem backend only)
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,

    /// Output root directory (filesystem backend only)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Glob for song catalog files, relative to the input root
    #[arg(long, value_name = "GLOB")]
    song_data: Option<String>,

    /// Glob for listening log files, relative to the input root
    #[arg(long, value_name = "GLOB")]
    log_data: Option<String>,

    /// Title matching between events and catalog: exact, normalized
    #[arg(long, value_name = "MODE")]
    title_match: Option<KeyMatch>,

    /// Which event decides a user's level: latest, earliest
    #[arg(long, value_name = "POLICY")]
    user_level: Option<UserLevelPolicy>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let (mut config, skipped_file) = if let Some(config_path) = &cli.config {
        let config = RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        (config, None)
    } else {
        RuntimeConfig::load_or_default().context("Failed to load configuration")?
    };

    // CLI flags have the highest priority
    apply_cli_overrides(&mut config, &cli)?;

    // Validation and config loading warn through tracing, so it starts first
    playlake::init_tracing(&config.logging);
    if let Some(reason) = skipped_file {
        tracing::warn!(error = %reason, "Ignoring unreadable config file");
    }
    config.validate()?;

    prepare_output(&config)?;
    display_startup_info(&config);

    let report = playlake::run_with_config(config).await?;
    display_report(&report);
    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(input) = &cli.input {
        override_fs_path(&mut config.input.storage, input, "--input")?;
    }
    if let Some(output) = &cli.output {
        override_fs_path(&mut config.output.storage, output, "--output")?;
    }
    if let Some(song_data) = &cli.song_data {
        config.input.song_data = song_data.clone();
    }
    if let Some(log_data) = &cli.log_data {
        config.input.log_data = log_data.clone();
    }
    if let Some(title_match) = cli.title_match {
        config.transform.title_match = title_match;
    }
    if let Some(user_level) = cli.user_level {
        config.transform.user_level = user_level;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    Ok(())
}

fn override_fs_path(storage: &mut StorageConfig, path: &std::path::Path, flag: &str) -> Result<()> {
    if storage.backend != StorageBackend::Fs {
        anyhow::bail!(
            "{} flag only works with filesystem backend, but backend is '{}'.\n\
            Either remove {} flag or set backend to 'fs' in config file.",
            flag,
            storage.backend,
            flag
        );
    }

    let fs_config = storage.fs.get_or_insert_with(|| playlake_config::FsConfig {
        path: String::new(),
    });
    fs_config.path = path.to_string_lossy().to_string();
    Ok(())
}

/// Create the filesystem output root and check it is writable.
fn prepare_output(config: &RuntimeConfig) -> Result<()> {
    use std::fs;
    use tracing::info;

    let storage = &config.output.storage;
    if storage.backend != StorageBackend::Fs {
        return Ok(());
    }
    let fs_config = storage
        .fs
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("filesystem backend requires output.fs configuration"))?;

    let output_path = PathBuf::from(&fs_config.path);
    if !output_path.exists() {
        info!("Creating output directory: {}", fs_config.path);
        fs::create_dir_all(&output_path)
            .with_context(|| format!("Failed to create output directory: {}", fs_config.path))?;
    }

    let test_file = output_path.join(".playlake-write-test");
    fs::write(&test_file, b"test").with_context(|| {
        format!(
            "Output directory '{}' is not writable. Check permissions.",
            fs_config.path
        )
    })?;
    fs::remove_file(&test_file).context("Failed to remove test file")?;
    Ok(())
}

fn display_startup_info(config: &RuntimeConfig) {
    use tracing::info;

    info!("╭─────────────────────────────────────────────────");
    info!("│ playlake v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Input: {}", config.input.storage.describe());
    info!("│   - Songs: {}", config.input.song_data);
    info!("│   - Logs: {}", config.input.log_data);
    info!("│ Output: {}", config.output.storage.describe());
    info!("│ Row group size: {}", config.output.row_group_size);
    info!("│ Title match: {:?}", config.transform.title_match);
    info!("│ User level: {:?}", config.transform.user_level);
    info!("│ Log level: {}", config.logging.level);
    info!("╰─────────────────────────────────────────────────");
}

fn display_report(report: &RunReport) {
    use tracing::info;

    info!("╭─────────────────────────────────────────────────");
    for table in &report.tables {
        info!(
            "│ {:<10} {:>8} rows {:>5} files  {}",
            table.table.name(),
            table.rows,
            table.files,
            table.location
        );
    }
    info!("╰─────────────────────────────────────────────────");
}
