//! Jointure spatiale lignes × communes
//!
//! Deux stratégies :
//! - `Direct` : chaque ligne contre chaque commune, intersection stricte
//! - `Indexed` : R-tree sur les emprises des communes, chaque ligne est
//!   élargie par sa faixa de servidão avant la requête
//!
//! La jointure indexée retient une commune si la ligne OU sa faixa la
//! touche : son résultat contient toujours celui de la jointure directe.

use std::collections::{BTreeSet, HashMap};

use geo::{BoundingRect, Geometry, Intersects, Rect};
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info, warn};

use crate::corridor::corridor_wgs84;
use crate::schema::{Municipality, TransmissionLine};
use crate::voltage::VoltageClass;

/// Largeur de faixa par défaut (m) pour une tension absente de la table
pub const DEFAULT_BUFFER_M: f64 = 60.0;

/// Couple (ligne, commune) dont les géométries se touchent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Intersection {
    /// Index de la ligne dans l'entrée
    pub line: usize,
    /// Index de la commune dans l'entrée
    pub municipality: usize,
}

/// Stratégie de jointure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    Direct,
    Indexed,
}

/// Largeur de faixa (mètres) par classe de tension
#[derive(Debug, Clone, PartialEq)]
pub struct BufferTable {
    per_voltage: HashMap<VoltageClass, f64>,
    default_m: f64,
}

impl Default for BufferTable {
    /// 230 → 60 m, 500 → 80 m, 525 → 80 m, 600 → 90 m, 765 → 100 m
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_M)
            .with(VoltageClass::Kv(230), 60.0)
            .with(VoltageClass::Kv(500), 80.0)
            .with(VoltageClass::Kv(525), 80.0)
            .with(VoltageClass::Kv(600), 90.0)
            .with(VoltageClass::Kv(765), 100.0)
    }
}

impl BufferTable {
    /// Table vide : toutes les tensions reçoivent `default_m`
    pub fn new(default_m: f64) -> Self {
        Self {
            per_voltage: HashMap::new(),
            default_m,
        }
    }

    /// Largeur unique quelle que soit la tension
    pub fn flat(distance_m: f64) -> Self {
        Self::new(distance_m)
    }

    pub fn with(mut self, voltage: VoltageClass, distance_m: f64) -> Self {
        self.per_voltage.insert(voltage, distance_m);
        self
    }

    pub fn distance_for(&self, voltage: &VoltageClass) -> f64 {
        self.per_voltage
            .get(voltage)
            .copied()
            .unwrap_or(self.default_m)
    }
}

/// Résultat d'une jointure
#[derive(Debug, Clone, Default)]
pub struct JoinResult {
    /// Intersections triées par ligne puis par commune
    pub intersections: Vec<Intersection>,

    /// Lignes traitées sans faixa (reprojection impossible)
    pub degraded_lines: Vec<usize>,
}

impl JoinResult {
    /// Index des communes touchées au moins une fois
    pub fn affected_municipalities(&self) -> BTreeSet<usize> {
        self.intersections.iter().map(|i| i.municipality).collect()
    }

    /// Nombre de lignes distinctes par commune touchée
    pub fn lines_per_municipality(&self) -> HashMap<usize, usize> {
        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for i in &self.intersections {
            pairs.insert((i.municipality, i.line));
        }
        let mut counts = HashMap::new();
        for (municipality, _) in pairs {
            *counts.entry(municipality).or_insert(0) += 1;
        }
        counts
    }
}

/// Entrée du R-tree : emprise d'une commune
struct Envelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for Envelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

fn to_aabb(rect: Rect) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Index spatial des communes
pub struct MunicipalityIndex<'a> {
    municipalities: &'a [Municipality],
    tree: RTree<Envelope>,
}

impl<'a> MunicipalityIndex<'a> {
    pub fn new(municipalities: &'a [Municipality]) -> Self {
        let entries: Vec<Envelope> = municipalities
            .iter()
            .enumerate()
            .filter_map(|(index, m)| {
                m.geometry.bounding_rect().map(|rect| Envelope {
                    index,
                    aabb: to_aabb(rect),
                })
            })
            .collect();

        debug!(entries = entries.len(), "Municipality R-tree built");

        Self {
            municipalities,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Communes dont l'emprise croise `rect`, triées par index
    pub fn candidates(&self, rect: Rect) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&to_aabb(rect))
            .map(|e| e.index)
            .collect();
        found.sort_unstable();
        found
    }

    pub fn municipality(&self, index: usize) -> &Municipality {
        &self.municipalities[index]
    }

    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }
}

/// Jointure selon la stratégie choisie
pub fn spatial_join(
    lines: &[TransmissionLine],
    municipalities: &[Municipality],
    strategy: JoinStrategy,
    buffers: &BufferTable,
) -> JoinResult {
    match strategy {
        JoinStrategy::Direct => direct_join(lines, municipalities),
        JoinStrategy::Indexed => indexed_join(lines, municipalities, buffers),
    }
}

/// Intersection stricte, toutes paires (O(lignes × communes))
pub fn direct_join(lines: &[TransmissionLine], municipalities: &[Municipality]) -> JoinResult {
    let per_line: Vec<Vec<Intersection>> = lines
        .par_iter()
        .enumerate()
        .map(|(line_idx, line)| {
            municipalities
                .iter()
                .enumerate()
                .filter(|(_, m)| line.geometry.intersects(&m.geometry))
                .map(|(municipality, _)| Intersection {
                    line: line_idx,
                    municipality,
                })
                .collect()
        })
        .collect();

    let intersections: Vec<Intersection> = per_line.into_iter().flatten().collect();
    info!(
        lines = lines.len(),
        municipalities = municipalities.len(),
        intersections = intersections.len(),
        "Direct join done"
    );

    JoinResult {
        intersections,
        degraded_lines: Vec::new(),
    }
}

/// Jointure indexée avec faixa de servidão
///
/// Les géométries sont en EPSG:4326 ; la faixa est calculée en mètres.
pub fn indexed_join(
    lines: &[TransmissionLine],
    municipalities: &[Municipality],
    buffers: &BufferTable,
) -> JoinResult {
    let index = MunicipalityIndex::new(municipalities);

    let per_line: Vec<(Vec<Intersection>, bool)> = lines
        .par_iter()
        .enumerate()
        .map(|(line_idx, line)| {
            let distance = buffers.distance_for(&line.voltage);
            let (corridor, degraded) = match corridor_wgs84(&line.geometry, distance) {
                Ok(corridor) => (corridor.map(Geometry::MultiPolygon), false),
                Err(e) => {
                    warn!(line = %line.name, error = %e, "Corridor failed, using the bare line");
                    (None, true)
                }
            };

            let query = corridor
                .as_ref()
                .and_then(|c| c.bounding_rect())
                .or_else(|| line.geometry.bounding_rect());

            let Some(query) = query else {
                return (Vec::new(), degraded);
            };

            let hits = index
                .candidates(query)
                .into_iter()
                .filter(|&m| {
                    let target = &index.municipality(m).geometry;
                    line.geometry.intersects(target)
                        || corridor.as_ref().is_some_and(|c| c.intersects(target))
                })
                .map(|municipality| Intersection {
                    line: line_idx,
                    municipality,
                })
                .collect();

            (hits, degraded)
        })
        .collect();

    let mut result = JoinResult::default();
    for (line_idx, (hits, degraded)) in per_line.into_iter().enumerate() {
        result.intersections.extend(hits);
        if degraded {
            result.degraded_lines.push(line_idx);
        }
    }

    info!(
        lines = lines.len(),
        municipalities = municipalities.len(),
        intersections = result.intersections.len(),
        degraded = result.degraded_lines.len(),
        "Indexed join done"
    );

    result
}
