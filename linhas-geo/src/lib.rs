//! # linhas-geo
//!
//! Chargement de couches vectorielles (GeoPackage, GeoJSON, Shapefile),
//! normalisation en WGS84 et jointure spatiale entre lignes de transmission
//! et polygones de communes.
//!
//! ## Features
//!
//! - Lecture GeoPackage via `rusqlite` + `geozero`, Shapefile via `shapefile`
//! - Détection de la projection (`.prj`, `gpkg_spatial_ref_sys`, membre `crs`)
//! - Reprojection pure Rust des CRS brésiliens (UTM SIRGAS 2000, Web Mercator)
//! - Jointure directe ou indexée (`rstar`) avec faixa de servidão par tension
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linhas_geo::{source, schema, join, GeometryKind, ColumnAliases};
//! use std::path::Path;
//!
//! let aliases = ColumnAliases::default();
//! let muns = source::find_layer(Path::new("municipios.gpkg"), GeometryKind::Polygon)
//!     .required("municipalities")?;
//! let lines = source::find_layer(Path::new("linhas.gpkg"), GeometryKind::Line)
//!     .required("transmission lines")?;
//!
//! let result = join::direct_join(
//!     &schema::lines_from_layer(&lines, &aliases, None),
//!     &schema::municipalities_from_layer(&muns, &aliases, None),
//! );
//! println!("{} communes touchées", result.affected_municipalities().len());
//! ```

pub mod archive;
pub mod corridor;
pub mod discover;
pub mod error;
pub mod join;
pub mod normalize;
pub mod reproject;
pub mod schema;
pub mod source;
pub mod types;
pub mod voltage;

pub use error::GeoError;
pub use join::{BufferTable, Intersection, JoinResult, JoinStrategy, MunicipalityIndex};
pub use normalize::Normalization;
pub use schema::{ColumnAliases, Municipality, TransmissionLine};
pub use types::{Feature, GeometryKind, Layer, LayerInfo, LoadOutcome};
pub use voltage::VoltageClass;

use std::path::Path;

/// Charge une couche et la ramène en WGS84
///
/// La couche est cherchée par nom si `layer` est fourni, sinon d'après le
/// type de géométrie attendu. Une reprojection impossible laisse la couche
/// dans son système d'origine (`Normalization::Degraded`).
pub fn load_normalized(path: &Path, layer: Option<&str>, kind: GeometryKind) -> LoadOutcome {
    let outcome = match layer {
        Some(name) => source::load(path, Some(name)),
        None => source::find_layer(path, kind),
    };

    match outcome {
        LoadOutcome::Loaded(layer) => {
            let (layer, _) = normalize::normalize(&layer, reproject::EPSG_WGS84);
            LoadOutcome::Loaded(layer)
        }
        other => other,
    }
}
