//! Définition et implémentation des commandes CLI
//!
//! - `analyze` : lignes × communes par couche, puis consolidation
//! - `intersect` / `voltages` : jeu régional (RS)
//! - `consolidate`, `stats`, `report`, `maps` : à partir de `per_layer/`
//!   et de `dados_consolidados.csv`
//! - `serve` : tableau de bord local
//! - `inspect` : description d'une source

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{info, warn};

use linhas_municipios::pipeline::{self, AnalyzeOptions, IntersectOptions, VoltageOptions, Workspace};
use linhas_municipios::render::ReportKind;
use linhas_municipios::report::{ErrorLevel, RunError, RunReport};

#[derive(Subcommand)]
pub enum Commands {
    /// Join every line layer against municipalities, write per_layer/ CSVs and consolidate
    Analyze {
        /// GeoPackage (or other source) holding the line layers
        #[arg(long)]
        lines: Option<PathBuf>,

        /// Municipality layer to use instead of per-state discovery
        #[arg(long)]
        municipalities: Option<PathBuf>,
    },

    /// Regional analysis: municipalities crossed by the regional line set
    Intersect {
        /// Use the per-voltage corridor instead of bare geometries
        #[arg(long)]
        buffered: bool,

        /// Also export the affected municipalities as GeoJSON and Shapefile
        #[arg(long)]
        export_layer: bool,

        /// Line layer (default: regional config)
        #[arg(long)]
        lines: Option<PathBuf>,

        /// Municipality layer (default: regional config)
        #[arg(long)]
        municipalities: Option<PathBuf>,
    },

    /// Expand an affected-municipality CSV with one row per crossing voltage
    Voltages {
        /// Input CSV (default: regional affected CSV)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output CSV (default: regional voltage CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Line layer (default: regional config)
        #[arg(long)]
        lines: Option<PathBuf>,

        /// Municipality layer (default: exported regional layer, then regional config)
        #[arg(long)]
        municipalities: Option<PathBuf>,
    },

    /// Consolidate per_layer/ CSVs into the chart, consolidated and multi-line CSVs
    Consolidate,

    /// Print detailed statistics from the consolidated table
    Stats,

    /// Write a static HTML report
    Report {
        /// Report flavour
        #[arg(long, value_enum, default_value = "dashboard")]
        kind: ReportKind,

        /// Write the three reports
        #[arg(long)]
        all: bool,
    },

    /// Generate one Leaflet map per (voltage, state) and the index page
    Maps,

    /// Serve the interactive dashboard
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8501")]
        addr: SocketAddr,
    },

    /// Describe a GeoPackage, Shapefile, GeoJSON or CSV source
    Inspect {
        /// Source to inspect
        path: PathBuf,
    },
}

/// Exécute une étape et gère son rapport d'exécution
///
/// Une erreur est enregistrée comme fatale ; le rapport est affiché et
/// sauvegardé dans tous les cas.
fn run_with_report<T>(
    ws: &Workspace,
    command: &str,
    quiet: bool,
    step: impl FnOnce(&mut RunReport) -> Result<T>,
) -> Result<T> {
    let started = Instant::now();
    let mut report = RunReport::new(command);

    let outcome = step(&mut report);
    if let Err(e) = &outcome {
        report.record_error(RunError::new(ErrorLevel::Fatal, None, format!("{:#}", e)));
    }

    report.set_duration(started.elapsed());
    report.finalize();
    if !quiet {
        report.display();
    }

    let path = ws.run_report();
    match report.save_to_file(&path) {
        Ok(()) => info!(path = %path.display(), summary = %report.summary(), "Run report saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save run report"),
    }
    outcome
}

/// Étape bloquante (I/O, rayon) exécutée hors du runtime async
async fn blocking<T, F>(ws: &Workspace, command: &'static str, quiet: bool, step: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Workspace, &mut RunReport) -> Result<T> + Send + 'static,
{
    let ws = ws.clone();
    tokio::task::spawn_blocking(move || run_with_report(&ws, command, quiet, |report| step(&ws, report)))
        .await
        .with_context(|| format!("{} task panicked", command))?
}

pub async fn cmd_analyze(
    ws: &Workspace,
    lines: Option<PathBuf>,
    municipalities: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    info!(
        base_dir = %ws.base_dir.display(),
        lines = ?lines,
        municipalities = ?municipalities,
        "Starting analysis"
    );
    let options = AnalyzeOptions {
        lines,
        municipalities,
    };
    let table = blocking(ws, "analyze", quiet, move |ws, report| {
        pipeline::analyze(ws, &options, report)
    })
    .await?;
    info!(rows = table.len(), "Analysis done");
    Ok(())
}

pub async fn cmd_intersect(ws: &Workspace, options: IntersectOptions, quiet: bool) -> Result<()> {
    info!(
        buffered = options.buffered,
        export_layer = options.export_layer,
        "Regional intersection"
    );
    let summary = blocking(ws, "intersect", quiet, move |ws, report| {
        pipeline::intersect(ws, &options, report)
    })
    .await?;
    info!(
        municipalities = summary.affected.len(),
        pairs = summary.pairs.len(),
        "Regional intersection done"
    );
    Ok(())
}

pub async fn cmd_voltages(ws: &Workspace, options: VoltageOptions, quiet: bool) -> Result<()> {
    let rows = blocking(ws, "voltages", quiet, move |ws, report| {
        pipeline::expand_voltages(ws, &options, report)
    })
    .await?;
    info!(rows, "Voltage expansion done");
    Ok(())
}

pub async fn cmd_consolidate(ws: &Workspace, quiet: bool) -> Result<()> {
    info!(dir = %ws.per_layer_dir().display(), "Consolidating per-layer files");
    let table = blocking(ws, "consolidate", quiet, pipeline::consolidate).await?;
    info!(rows = table.len(), "Consolidation done");
    Ok(())
}

pub async fn cmd_stats(ws: &Workspace) -> Result<()> {
    let text = pipeline::stats(ws)?;
    print!("{}", text);
    Ok(())
}

pub async fn cmd_report(ws: &Workspace, kind: ReportKind, all: bool, quiet: bool) -> Result<()> {
    let kinds = if all {
        vec![ReportKind::Dashboard, ReportKind::Technical, ReportKind::Accessible]
    } else {
        vec![kind]
    };
    info!(kinds = ?kinds, "Writing reports");
    blocking(ws, "report", quiet, move |ws, report| {
        let table = ws.load_table()?;
        let generated_at = pipeline::timestamp();
        kinds
            .into_iter()
            .map(|kind| pipeline::write_report(ws, kind, &table, &generated_at, report))
            .collect::<Result<Vec<_>>>()
    })
    .await?;
    Ok(())
}

pub async fn cmd_maps(ws: &Workspace, quiet: bool) -> Result<()> {
    let entries = blocking(ws, "maps", quiet, |ws, report| {
        let table = ws.load_table()?;
        pipeline::generate_maps(ws, &table, &pipeline::timestamp(), report)
    })
    .await?;
    info!(maps = entries.len(), "Maps generated");
    Ok(())
}

pub async fn cmd_serve(ws: &Workspace, addr: SocketAddr) -> Result<()> {
    info!(addr = %addr, "Starting dashboard server");
    linhas_municipios::serve::run(ws.clone(), addr).await
}

pub async fn cmd_inspect(ws: &Workspace, path: &Path) -> Result<()> {
    let path = ws.path(path);
    let text = pipeline::inspect(&path, &ws.config.column_aliases())?;
    print!("{}", text);
    Ok(())
}
