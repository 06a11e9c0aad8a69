//! # linhas-municipios
//!
//! Municípios atravessados pelas linhas de transmissão : jointure par
//! couche, consolidation, statistiques, rapports HTML, cartes Leaflet et
//! tableau de bord local.
//!
//! ## Usage CLI
//!
//! ```bash
//! # Jointure de toutes les couches de lignes, puis consolidation
//! linhas-municipios analyze
//!
//! # Consolidation seule, à partir de per_layer/
//! linhas-municipios consolidate
//!
//! # Rapports, cartes et tableau de bord
//! linhas-municipios report --all
//! linhas-municipios maps
//! linhas-municipios serve --addr 127.0.0.1:8501
//! ```

pub mod aggregate;
pub mod config;
pub mod console;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod serve;

pub use aggregate::{Affectation, ConsolidatedTable, LayerKind, MunicipalityKey, Selection, Summary};
pub use config::Config;
pub use pipeline::Workspace;
pub use report::{RunReport, RunStatus};
