//! Point d'entrée CLI pour linhas-municipios

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use linhas_municipios::pipeline::{IntersectOptions, VoltageOptions, Workspace};
use linhas_municipios::Config;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Municípios atravessados por linhas de transmissão
#[derive(Parser)]
#[command(name = "linhas-municipios")]
#[command(author, version)]
#[command(about = "Municipalities crossed by transmission lines: consolidation, statistics, reports and maps")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Working directory holding the data and the outputs
    #[arg(long, env = "LINHAS_BASE_DIR", default_value = ".", global = true)]
    base_dir: PathBuf,

    /// Config preset name (default/wide) or path to a JSON config
    #[arg(long, env = "LINHAS_CONFIG", default_value = "default", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(&cli.config)?;
    let ws = Workspace::new(&cli.base_dir, config);
    info!(base_dir = %ws.base_dir.display(), config = %cli.config, "Workspace ready");

    let quiet = cli.quiet;
    match cli.command {
        Commands::Analyze {
            lines,
            municipalities,
        } => cli::cmd_analyze(&ws, lines, municipalities, quiet).await?,
        Commands::Intersect {
            buffered,
            export_layer,
            lines,
            municipalities,
        } => {
            let options = IntersectOptions {
                buffered,
                export_layer,
                lines,
                municipalities,
            };
            cli::cmd_intersect(&ws, options, quiet).await?;
        }
        Commands::Voltages {
            input,
            output,
            lines,
            municipalities,
        } => {
            let options = VoltageOptions {
                input,
                output,
                lines,
                municipalities,
            };
            cli::cmd_voltages(&ws, options, quiet).await?;
        }
        Commands::Consolidate => cli::cmd_consolidate(&ws, quiet).await?,
        Commands::Stats => cli::cmd_stats(&ws).await?,
        Commands::Report { kind, all } => cli::cmd_report(&ws, kind, all, quiet).await?,
        Commands::Maps => cli::cmd_maps(&ws, quiet).await?,
        Commands::Serve { addr } => cli::cmd_serve(&ws, addr).await?,
        Commands::Inspect { path } => cli::cmd_inspect(&ws, &path).await?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
