//! Table consolidée des communes touchées
//!
//! Une ligne (`Affectation`) associe une commune à une classe de tension
//! et à la couche d'origine. La table retire les doublons en conservant
//! l'ordre d'entrée, ce qui fixe l'ordre des classements en aval.

pub mod layers;
pub mod stats;

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use linhas_geo::schema::match_key;
use linhas_geo::VoltageClass;

pub use stats::Summary;

/// Type de couche : base (toutes tensions) ou spécifique à une tension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Base,
    Specific,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Specific => "especifica",
        }
    }

    /// Valeur de la colonne `Tipo`; à défaut, déduite de la tension
    pub fn parse(raw: &str, voltage: &VoltageClass) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "base" => Self::Base,
            "especifica" | "específica" => Self::Specific,
            _ if voltage.is_specific() => Self::Specific,
            _ => Self::Base,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identité d'une commune entre sources : (UF, nom)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MunicipalityKey {
    pub state: String,
    pub name: String,
}

impl MunicipalityKey {
    pub fn new(state: &str, name: &str) -> Self {
        Self {
            state: state.trim().to_uppercase(),
            name: name.trim().to_string(),
        }
    }
}

impl fmt::Display for MunicipalityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.state)
    }
}

/// Une commune touchée par une couche de lignes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Affectation {
    pub name: String,
    pub code: Option<String>,
    pub voltage: VoltageClass,
    pub state: String,
    pub kind: LayerKind,
}

impl Affectation {
    pub fn new(name: &str, code: Option<String>, voltage: VoltageClass, state: &str) -> Self {
        let kind = if voltage.is_specific() {
            LayerKind::Specific
        } else {
            LayerKind::Base
        };
        Self {
            name: name.trim().to_string(),
            code,
            voltage,
            state: state.trim().to_uppercase(),
            kind,
        }
    }

    pub fn key(&self) -> MunicipalityKey {
        MunicipalityKey::new(&self.state, &self.name)
    }

    /// Libellé de ligne : "500 kV" ou "BASE"
    pub fn line_label(&self) -> String {
        self.voltage.line_label()
    }

    pub fn is_specific(&self) -> bool {
        self.kind == LayerKind::Specific
    }
}

/// Filtre par États et par tensions (vide = tout)
///
/// Le filtre de tension ne s'applique qu'aux lignes spécifiques ; les
/// lignes de base passent dès que leur État est retenu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub states: BTreeSet<String>,
    pub voltages: BTreeSet<VoltageClass>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.states
            .extend(states.into_iter().map(|s| s.as_ref().trim().to_uppercase()));
        self
    }

    pub fn with_voltages<I>(mut self, voltages: I) -> Self
    where
        I: IntoIterator<Item = VoltageClass>,
    {
        self.voltages.extend(voltages);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.voltages.is_empty()
    }

    pub fn matches(&self, row: &Affectation) -> bool {
        let state_ok = self.states.is_empty() || self.states.contains(&row.state);
        let voltage_ok =
            !row.is_specific() || self.voltages.is_empty() || self.voltages.contains(&row.voltage);
        state_ok && voltage_ok
    }
}

/// Table consolidée, sans doublon, dans l'ordre d'insertion
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedTable {
    rows: Vec<Affectation>,
    seen: HashSet<Affectation>,
}

impl ConsolidatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Affectation>) -> Self {
        let mut table = Self::new();
        table.extend(rows);
        table
    }

    /// Ajoute une ligne si elle est nouvelle
    pub fn push(&mut self, row: Affectation) -> bool {
        if self.seen.contains(&row) {
            return false;
        }
        self.seen.insert(row.clone());
        self.rows.push(row);
        true
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Affectation>) {
        for row in rows {
            self.push(row);
        }
    }

    pub fn rows(&self) -> &[Affectation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn specific(&self) -> impl Iterator<Item = &Affectation> {
        self.rows.iter().filter(|r| r.is_specific())
    }

    /// UF présentes, triées
    pub fn states(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.state.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tensions spécifiques présentes, triées
    pub fn voltages(&self) -> Vec<VoltageClass> {
        self.specific()
            .map(|r| r.voltage.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sous-table des lignes retenues par le filtre
    pub fn select(&self, selection: &Selection) -> Self {
        if selection.is_empty() {
            return self.clone();
        }
        Self::from_rows(self.rows.iter().filter(|r| selection.matches(r)).cloned())
    }

    /// Combinaisons (tension, UF) existantes parmi les lignes spécifiques
    pub fn combinations(&self) -> Vec<(VoltageClass, String)> {
        self.specific()
            .map(|r| (r.voltage.clone(), r.state.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Lignes d'une commune (comparaison de nom insensible à la casse)
    pub fn rows_for_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Affectation> + 'a {
        let key = match_key(name);
        self.rows.iter().filter(move |r| match_key(&r.name) == key)
    }
}
