//! memopt - Windows memory optimizer CLI

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use memopt_engine::core::memory::MemorySnapshot;
use memopt_engine::platform::detect_platform;
use memopt_engine::{
    create_platform, read_snapshot, Capabilities, MemoryArea, MemoryAreas,
    MemoryMonitor, OptimizationReason, OptimizationService, OptimizerConfig, RunState,
};

#[derive(Parser)]
#[command(name = "memopt")]
#[command(about = "Reclaim memory held by processes and kernel caches", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current memory status
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List memory areas and whether this system supports them
    Areas,

    /// Run one-time optimization
    Optimize {
        /// Area to optimize (repeatable); defaults to the configured selection
        #[arg(short, long = "area", value_parser = parse_area)]
        areas: Vec<MemoryArea>,

        #[arg(long, value_enum, default_value = "manual")]
        reason: ReasonArg,
    },

    /// Monitor memory and optimize on the configured schedule
    Daemon,

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write the default configuration
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReasonArg {
    Manual,
    Scheduled,
    Usage,
}

impl From<ReasonArg> for OptimizationReason {
    fn from(reason: ReasonArg) -> Self {
        match reason {
            ReasonArg::Manual => OptimizationReason::Manual,
            ReasonArg::Scheduled => OptimizationReason::Scheduled,
            ReasonArg::Usage => OptimizationReason::Usage,
        }
    }
}

fn parse_area(name: &str) -> Result<MemoryArea, String> {
    MemoryArea::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = MemoryArea::ALL.iter().map(|a| a.name()).collect();
        format!("unknown memory area '{}' (expected one of: {})", name, known.join(", "))
    })
}

fn pressure(snapshot: &MemorySnapshot) -> &'static str {
    if snapshot.is_critical() {
        "CRITICAL"
    } else if snapshot.is_high_pressure() {
        "HIGH"
    } else {
        "Normal"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(OptimizerConfig::default_path);

    match cli.command {
        Commands::Status { json } => {
            let api = create_platform();
            let platform = detect_platform(api.as_ref());
            let snapshot = read_snapshot(api.as_ref())?;
            let capabilities = Capabilities::probe(api.os_version(), api.is_64bit());
            let supported: Vec<&str> = capabilities
                .supported_areas()
                .iter()
                .map(|a| a.name())
                .collect();

            if json {
                let report = serde_json::json!({
                    "platform": platform,
                    "memory": snapshot,
                    "supported_areas": supported,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Memory Status:");
                println!(
                    "  OS:        {} {} ({}-bit, {})",
                    platform.os_name,
                    platform.os_version,
                    if platform.is_64bit { 64 } else { 32 },
                    if platform.is_elevated { "elevated" } else { "not elevated" }
                );
                println!("  Physical:  {}", snapshot.physical);
                println!("  Virtual:   {}", snapshot.virtual_memory);
                println!("  Pressure:  {}", pressure(&snapshot));
            }
        }

        Commands::Areas => {
            let config = OptimizerConfig::load_or_default(&config_path)?;
            let service = OptimizationService::new(create_platform(), config);
            let capabilities = service.optimizer().capabilities();
            let selected = service.config().areas();

            println!("{:<28} {:<26} {:<10} Selected", "Area", "Name", "Supported");
            for area in MemoryArea::ALL {
                println!(
                    "{:<28} {:<26} {:<10} {}",
                    area.label(),
                    area.name(),
                    if capabilities.is_area_supported(area) { "yes" } else { "no" },
                    if selected.contains(area) { "yes" } else { "no" }
                );
            }
        }

        Commands::Optimize { areas, reason } => {
            let mut config = OptimizerConfig::load_or_default(&config_path)?;
            if !areas.is_empty() {
                config.set_areas(areas.into_iter().collect::<MemoryAreas>());
            }

            let service = OptimizationService::new(create_platform(), config);
            if service.effective_areas().is_empty() {
                println!("Nothing to optimize: no selected area is supported on this system");
                return Ok(());
            }

            let outcome = service
                .optimize(reason.into(), |p| println!("[{:>3}%] {}", p.percentage(), p.label))
                .ok_or("an optimization is already running")?;

            println!();
            for result in &outcome.report.outcomes {
                println!("  {}", result.log_line());
            }
            match outcome.report.state() {
                RunState::Completed => println!("\nOptimization complete"),
                RunState::PartiallyFailed => println!("\nOptimization finished with errors"),
                RunState::Idle => println!("\nNothing was optimized"),
            }
            if let Some(message) = outcome.notification {
                println!("{}", message);
            }
        }

        Commands::Daemon => {
            let config = OptimizerConfig::load_or_default(&config_path)?;
            info!("Starting optimization daemon (poll interval: {}s)", config.update_interval_secs);

            let api = create_platform();
            let monitor = Arc::new(MemoryMonitor::new(Arc::clone(&api), config.update_interval_secs));
            let service = Arc::new(OptimizationService::new(api, config));

            memopt_engine::service::run_daemon(service, monitor).await;
        }

        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                let config = OptimizerConfig::load_or_default(&config_path)?;
                println!("Current Configuration ({}):", config_path.display());
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Path => println!("{}", config_path.display()),
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    println!("{} already exists (use --force to overwrite)", config_path.display());
                } else {
                    OptimizerConfig::default().save(&config_path)?;
                    println!("Wrote {}", config_path.display());
                }
            }
        },
    }

    Ok(())
}
