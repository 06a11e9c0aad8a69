//! Types de données pour le crate linhas-geo

use geo::Geometry;
use std::collections::BTreeMap;

use crate::GeoError;

/// Une couche vectorielle chargée en mémoire
#[derive(Debug, Clone)]
pub struct Layer {
    /// Nom de la couche (table GeoPackage ou nom de fichier)
    pub name: String,

    /// Code EPSG déclaré par la source, `None` si inconnu
    pub epsg: Option<u32>,

    /// Features de la couche
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, epsg: Option<u32>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            epsg,
            features,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Colonnes attributaires, dans l'ordre de première apparition
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for feature in &self.features {
            for key in feature.properties.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Catégorie géométrique dominante (première feature reconnue)
    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        self.features
            .iter()
            .find_map(|f| GeometryKind::from_type_name(geometry_type_name(&f.geometry)))
    }

    /// Copie de la couche avec d'autres features (même nom, même EPSG)
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            name: self.name.clone(),
            epsg: self.epsg,
            features,
        }
    }
}

/// Une feature avec sa géométrie et ses attributs
#[derive(Debug, Clone)]
pub struct Feature {
    /// Identifiant de la feature (fid, index)
    pub id: String,

    /// Géométrie
    pub geometry: Geometry,

    /// Attributs (clé -> valeur texte), les NULL sont omis
    pub properties: BTreeMap<String, String>,
}

/// Description d'une couche sans la charger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,

    /// Type géométrique déclaré (ex: "MULTIPOLYGON"), si le conteneur le déclare
    pub geometry_type: Option<String>,

    pub feature_count: Option<usize>,

    pub epsg: Option<u32>,
}

/// Catégorie géométrique recherchée lors de la sélection de couche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Polygon,
    Line,
    Point,
}

impl GeometryKind {
    /// Sous-chaîne cherchée dans le nom de type, insensible à la casse
    pub fn token(self) -> &'static str {
        match self {
            Self::Polygon => "polygon",
            Self::Line => "line",
            Self::Point => "point",
        }
    }

    /// Vérifie qu'un nom de type géométrique correspond à la catégorie
    pub fn matches(self, type_name: &str) -> bool {
        type_name.to_lowercase().contains(self.token())
    }

    pub fn from_type_name(type_name: &str) -> Option<Self> {
        [Self::Polygon, Self::Line, Self::Point]
            .into_iter()
            .find(|kind| kind.matches(type_name))
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Nom de type d'une géométrie `geo`, au sens OGC
pub fn geometry_type_name(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "LineString",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Polygon",
        Geometry::Triangle(_) => "Polygon",
    }
}

/// Résultat explicite d'un chargement de couche
///
/// L'appelant choisit la politique : source de repli (`or_else`),
/// ignorer (`loaded`) ou abandonner (`required`).
#[derive(Debug)]
pub enum LoadOutcome {
    /// Couche chargée avec au moins une feature
    Loaded(Layer),
    /// Source absente ou couche vide
    Empty { source: String },
    /// Source présente mais illisible
    Failed(GeoError),
}

impl LoadOutcome {
    /// Convertit un résultat de lecture (une couche vide devient `Empty`)
    pub fn from_result(source: impl Into<String>, result: Result<Layer, GeoError>) -> Self {
        match result {
            Ok(layer) if layer.is_empty() => Self::Empty {
                source: source.into(),
            },
            Ok(layer) => Self::Loaded(layer),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Couche chargée, ou `None` (les échecs sont journalisés)
    pub fn loaded(self) -> Option<Layer> {
        match self {
            Self::Loaded(layer) => Some(layer),
            Self::Empty { source } => {
                tracing::debug!(source = %source, "Empty or missing layer");
                None
            }
            Self::Failed(e) => {
                tracing::warn!(error = %e, "Layer could not be loaded");
                None
            }
        }
    }

    /// Couche obligatoire : toute absence devient une erreur
    pub fn required(self, what: &str) -> Result<Layer, GeoError> {
        match self {
            Self::Loaded(layer) => Ok(layer),
            Self::Empty { source } => Err(GeoError::NoMatchingLayer {
                path: source,
                kind: what.to_string(),
            }),
            Self::Failed(e) => Err(e),
        }
    }

    /// Tente une autre source si celle-ci n'a rien donné
    pub fn or_else(self, fallback: impl FnOnce() -> LoadOutcome) -> LoadOutcome {
        match self {
            Self::Loaded(layer) => Self::Loaded(layer),
            Self::Empty { source } => {
                tracing::debug!(source = %source, "Trying fallback source");
                fallback()
            }
            Self::Failed(e) => {
                tracing::warn!(error = %e, "Source failed, trying fallback");
                fallback()
            }
        }
    }

    /// Description courte pour les journaux et rapports
    pub fn describe(&self) -> String {
        match self {
            Self::Loaded(layer) => format!("{} ({} features)", layer.name, layer.len()),
            Self::Empty { source } => format!("{} (empty)", source),
            Self::Failed(e) => format!("failed: {}", e),
        }
    }
}
