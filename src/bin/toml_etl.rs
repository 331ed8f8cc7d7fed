use anyhow::Context;
use clap::Parser;
use covidbr_etl::adapters::writers_for;
use covidbr_etl::config::toml_config::TomlConfig;
use covidbr_etl::core::ConfigProvider;
use covidbr_etl::utils::{logger, validation::Validate};
use covidbr_etl::{CovidPipeline, EtlEngine, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "COVID-19 consolidation driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "etl-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config file '{}'", args.config))?;

    match (config.log_format(), args.verbose) {
        (Some("json"), false) => logger::init_json_logger(config.log_level()),
        (Some("json"), true) => logger::init_json_logger(Some("debug")),
        _ => logger::init_cli_logger(args.verbose),
    }

    tracing::info!("🚀 Starting TOML-based ETL tool");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = CovidPipeline::new(LocalStorage::default(), config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            for outcome in &report.outputs {
                println!("📁 {} ({} rows)", outcome.destination, outcome.rows);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name, config.pipeline.version
    );
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }

    let source = config.source();
    println!("  Input dir: {}", source.input_dir);
    if let Some(archive) = &source.archive {
        println!("  Archive: {}", archive);
    }

    let cleaning = config.cleaning();
    println!("  Locale: {:?}", cleaning.locale);
    println!("  Population fallback: {:?}", cleaning.population_fallback);

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    let source = config.source();
    println!("📡 Data Source:");
    match &source.archive {
        Some(archive) => println!("  Unpack {} into {}", archive, source.input_dir),
        None => println!("  Read files already in {}", source.input_dir),
    }
    println!("  File pattern: {}", source.file_pattern);

    let outputs = config.outputs();
    println!();
    println!("💾 Output Configuration:");
    if outputs.is_empty() {
        println!("  ⚠️ No output configured");
    }
    let writers: Vec<&str> = writers_for(&outputs).iter().map(|w| w.name()).collect();
    if !writers.is_empty() {
        println!("  Writers: {}", writers.join(" -> "));
    }
    if let Some(csv) = &outputs.csv {
        println!("  csv: {} (chunks of {} rows)", csv, outputs.csv_chunk_size);
    }
    if let Some(parquet) = &outputs.parquet {
        println!("  parquet: {} (snappy)", parquet);
    }
    if let Some(sql) = &outputs.sql {
        println!(
            "  sql: {}#{} ({:?}, batches of {} rows)",
            sql.database, sql.table, sql.mode, sql.batch_size
        );
    }
    if let Some(report) = &outputs.report {
        println!("  report: {} (focus city: {})", report, outputs.focus_city);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
