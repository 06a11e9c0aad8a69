//! Rapport d'exécution avec graceful degradation
//!
//! Chaque commande collecte ses couches traitées, ses fichiers écrits
//! (avec checksum blake3) et ses erreurs non fatales, puis affiche un
//! résumé et sauvegarde le rapport en JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Exécution sans erreur
    Success,
    /// Sorties produites malgré des erreurs non fatales
    PartialSuccess,
    /// Rien d'exploitable n'a été produit
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Erreur fatale: commande abandonnée
    Fatal,
    /// Erreur: couche ou combinaison ignorée
    Error,
    /// Warning: traitement dégradé
    Warning,
}

/// Erreur avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct RunError {
    pub level: ErrorLevel,
    /// Fichier ou couche concerné
    pub source: Option<String>,
    pub message: String,
    pub details: Option<String>,
}

impl RunError {
    pub fn new(level: ErrorLevel, source: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.map(str::to_string),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    pub source: String,
    pub message: String,
}

/// Statistiques par couche
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayerStats {
    /// Features lues
    pub features: usize,
    /// Couples (ligne, commune) trouvés
    pub intersections: usize,
    /// Communes touchées
    pub municipalities: usize,
    /// Lignes traitées sans faixa
    pub degraded: usize,
}

/// Fichier produit
#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub path: String,
    pub bytes: u64,
    /// Checksum blake3 (hex)
    pub checksum: String,
}

/// Rapport complet d'une commande
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Sous-commande exécutée
    pub command: String,
    /// Horodatage de début (RFC 3339)
    pub started_at: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    pub layers_processed: usize,
    pub layers_skipped: usize,
    /// Lignes de données écrites (CSV, features)
    pub records_written: usize,

    pub by_layer: BTreeMap<String, LayerStats>,
    pub outputs: Vec<OutputFile>,

    pub errors: Vec<RunError>,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    /// Crée un rapport pour une commande
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            started_at: chrono::Local::now().to_rfc3339(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            layers_processed: 0,
            layers_skipped: 0,
            records_written: 0,
            by_layer: BTreeMap::new(),
            outputs: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Enregistre une couche traitée
    pub fn record_layer(&mut self, name: &str, stats: LayerStats) {
        self.layers_processed += 1;
        self.by_layer.insert(name.to_string(), stats);
    }

    /// Enregistre une couche ou combinaison ignorée (source absente)
    pub fn record_skip(&mut self, source: &str, message: &str) {
        self.layers_skipped += 1;
        self.record_warning(RunWarning {
            source: source.to_string(),
            message: message.to_string(),
        });
    }

    pub fn record_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    pub fn record_warning(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    /// Enregistre un fichier écrit et calcule son checksum
    pub fn record_output(&mut self, path: &Path, records: usize) -> Result<()> {
        let bytes = std::fs::metadata(path)
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len();
        let checksum = compute_file_checksum(path)?;
        self.records_written += records;
        self.outputs.push(OutputFile {
            path: path.display().to_string(),
            bytes,
            checksum,
        });
        Ok(())
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final basé sur les erreurs
    pub fn finalize(&mut self) {
        let has_fatal = self.errors.iter().any(|e| e.level == ErrorLevel::Fatal);
        let has_errors = self.errors.iter().any(|e| e.level != ErrorLevel::Warning);
        let has_output = !self.outputs.is_empty();

        self.status = if has_fatal {
            RunStatus::Failed
        } else if has_errors && has_output {
            RunStatus::PartialSuccess
        } else if has_errors {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT - {}", self.command);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Started: {}", self.started_at);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Layers: {} processed, {} skipped",
            self.layers_processed, self.layers_skipped
        );
        println!(
            "Outputs: {} files, {} records",
            self.outputs.len(),
            self.records_written
        );

        if !self.by_layer.is_empty() {
            println!("\n--- BY LAYER ---");
            for (name, stats) in &self.by_layer {
                println!(
                    "  {}: {} features, {} intersections, {} municipalities, {} degraded",
                    name, stats.features, stats.intersections, stats.municipalities, stats.degraded
                );
            }
        }

        if !self.outputs.is_empty() {
            println!("\n--- OUTPUTS ---");
            for o in &self.outputs {
                println!("  {} ({} bytes, blake3 {})", o.path, o.bytes, &o.checksum[..12.min(o.checksum.len())]);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  [{}] {}", w.source, w.message);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                let location = e
                    .source
                    .as_ref()
                    .map(|s| format!("[{}]", s))
                    .unwrap_or_default();
                println!("  {:?} {} {}", e.level, location, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} layers, {} outputs, {} records, {} errors",
            self.command,
            self.layers_processed,
            self.outputs.len(),
            self.records_written,
            self.errors.len()
        )
    }
}

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
