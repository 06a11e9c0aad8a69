//! Agrégats sur la table consolidée
//!
//! Les classements sont décroissants par effectif ; à effectif égal,
//! l'ordre de première apparition dans la table est conservé (tri stable).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

use linhas_geo::VoltageClass;

use super::{ConsolidatedTable, MunicipalityKey};

/// Regroupe des valeurs distinctes par clé, dans l'ordre d'apparition des clés
fn group_distinct<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(K, BTreeSet<V>)>
where
    K: Clone + Eq + Hash,
    V: Ord,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, BTreeSet<V>)> = Vec::new();
    for (key, value) in pairs {
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, BTreeSet::new()));
            groups.len() - 1
        });
        groups[slot].1.insert(value);
    }
    groups
}

fn counts_desc<K, V>(groups: Vec<(K, BTreeSet<V>)>) -> Vec<(K, usize)> {
    let mut counts: Vec<(K, usize)> = groups.into_iter().map(|(k, v)| (k, v.len())).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Communes distinctes par tension (lignes spécifiques)
pub fn per_voltage(table: &ConsolidatedTable) -> Vec<(VoltageClass, usize)> {
    counts_desc(group_distinct(
        table.specific().map(|r| (r.voltage.clone(), r.key())),
    ))
}

/// Communes distinctes par État (toutes les lignes)
pub fn per_state(table: &ConsolidatedTable) -> Vec<(String, usize)> {
    counts_desc(group_distinct(
        table.rows().iter().map(|r| (r.state.clone(), r.key())),
    ))
}

/// Lignes distinctes par commune, classement décroissant
pub fn lines_per_municipality(table: &ConsolidatedTable) -> Vec<(MunicipalityKey, usize)> {
    counts_desc(group_distinct(
        table.specific().map(|r| (r.key(), r.line_label())),
    ))
}

/// Tensions spécifiques de chaque commune, dans l'ordre d'apparition
pub fn voltages_per_municipality(
    table: &ConsolidatedTable,
) -> Vec<(MunicipalityKey, BTreeSet<VoltageClass>)> {
    group_distinct(table.specific().map(|r| (r.key(), r.voltage.clone())))
}

/// Commune traversée par plusieurs lignes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLineRow {
    pub municipality: String,
    pub state: String,
    pub lines: usize,
    pub voltages: Vec<VoltageClass>,
}

impl MultiLineRow {
    /// Tensions jointes par ", "
    pub fn voltages_label(&self) -> String {
        join_voltages(&self.voltages)
    }
}

pub fn join_voltages(voltages: &[VoltageClass]) -> String {
    voltages
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Communes traversées par plus d'une ligne
pub fn multi_line(table: &ConsolidatedTable) -> Vec<MultiLineRow> {
    let voltages: HashMap<MunicipalityKey, BTreeSet<VoltageClass>> =
        voltages_per_municipality(table).into_iter().collect();

    lines_per_municipality(table)
        .into_iter()
        .filter(|(_, lines)| *lines > 1)
        .map(|(key, lines)| MultiLineRow {
            voltages: voltages
                .get(&key)
                .map(|v| v.iter().cloned().collect())
                .unwrap_or_default(),
            municipality: key.name,
            state: key.state,
            lines,
        })
        .collect()
}

/// Nombre de lignes → nombre de communes, croissant
pub fn distribution(table: &ConsolidatedTable) -> Vec<(usize, usize)> {
    let mut dist: BTreeMap<usize, usize> = BTreeMap::new();
    for (_, lines) in lines_per_municipality(table) {
        *dist.entry(lines).or_insert(0) += 1;
    }
    dist.into_iter().collect()
}

/// Matrice État × tension des communes distinctes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoltageMatrix {
    pub states: Vec<String>,
    pub voltages: Vec<VoltageClass>,
    /// `counts[state][voltage]`
    pub counts: Vec<Vec<usize>>,
}

impl VoltageMatrix {
    pub fn get(&self, state: &str, voltage: &VoltageClass) -> usize {
        let s = self.states.iter().position(|x| x == state);
        let v = self.voltages.iter().position(|x| x == voltage);
        match (s, v) {
            (Some(s), Some(v)) => self.counts[s][v],
            _ => 0,
        }
    }

    pub fn max(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

pub fn matrix(table: &ConsolidatedTable) -> VoltageMatrix {
    let mut cells: BTreeMap<(String, VoltageClass), BTreeSet<MunicipalityKey>> = BTreeMap::new();
    for r in table.specific() {
        cells
            .entry((r.state.clone(), r.voltage.clone()))
            .or_default()
            .insert(r.key());
    }

    let states: Vec<String> = cells
        .keys()
        .map(|(s, _)| s.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let voltages = table.voltages();
    let counts = states
        .iter()
        .map(|s| {
            voltages
                .iter()
                .map(|v| cells.get(&(s.clone(), v.clone())).map_or(0, |m| m.len()))
                .collect()
        })
        .collect();

    VoltageMatrix {
        states,
        voltages,
        counts,
    }
}

/// Communes desservies par une seule tension, regroupées par tension
pub fn exclusive(table: &ConsolidatedTable) -> Vec<(VoltageClass, Vec<MunicipalityKey>)> {
    let mut by_voltage: BTreeMap<VoltageClass, Vec<MunicipalityKey>> = BTreeMap::new();
    for (key, voltages) in voltages_per_municipality(table) {
        if voltages.len() == 1 {
            if let Some(voltage) = voltages.into_iter().next() {
                by_voltage.entry(voltage).or_default().push(key);
            }
        }
    }
    by_voltage.into_iter().collect()
}

/// Statistiques descriptives du nombre de lignes par commune
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptive {
    pub mean: f64,
    pub median: f64,
    pub max: usize,
    /// Première commune atteignant le maximum
    pub argmax: Option<MunicipalityKey>,
    /// Effectif le plus fréquent (le plus petit en cas d'égalité)
    pub mode: usize,
}

pub fn descriptive(table: &ConsolidatedTable) -> Descriptive {
    let ranked = lines_per_municipality(table);
    if ranked.is_empty() {
        return Descriptive::default();
    }

    let mut values: Vec<usize> = ranked.iter().map(|(_, n)| *n).collect();
    let mean = values.iter().sum::<usize>() as f64 / values.len() as f64;
    values.sort_unstable();
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) as f64 / 2.0
    } else {
        values[mid] as f64
    };

    let mode = distribution(table)
        .into_iter()
        .fold((0usize, 0usize), |best, (lines, freq)| {
            if freq > best.1 {
                (lines, freq)
            } else {
                best
            }
        })
        .0;

    // Classement stable : la première clé est la première atteignant le max
    let (argmax, max) = ranked[0].clone();

    Descriptive {
        mean,
        median,
        max,
        argmax: Some(argmax),
        mode,
    }
}

/// Une commune et ses tensions (tableau complet)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunicipalityRow {
    pub municipality: String,
    pub state: String,
    /// Nombre de tensions distinctes
    pub lines: usize,
    pub voltages: Vec<VoltageClass>,
}

impl MunicipalityRow {
    pub fn voltages_label(&self) -> String {
        join_voltages(&self.voltages)
    }
}

/// Tableau complet, trié par nom puis par État
pub fn complete_table(table: &ConsolidatedTable) -> Vec<MunicipalityRow> {
    let mut rows: Vec<MunicipalityRow> = voltages_per_municipality(table)
        .into_iter()
        .map(|(key, voltages)| MunicipalityRow {
            lines: voltages.len(),
            voltages: voltages.into_iter().collect(),
            municipality: key.name,
            state: key.state,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.municipality
            .cmp(&b.municipality)
            .then_with(|| a.state.cmp(&b.state))
    });
    rows
}

/// Profil d'un État (rapport technique)
#[derive(Debug, Clone, PartialEq)]
pub struct StateProfile {
    pub state: String,
    pub municipalities: usize,
    pub voltage_classes: usize,
    /// Part des communes uniques (%)
    pub share_pct: f64,
}

pub fn state_profiles(table: &ConsolidatedTable) -> Vec<StateProfile> {
    let total = unique_municipalities(table).max(1) as f64;
    let voltages: HashMap<String, BTreeSet<VoltageClass>> = group_distinct(
        table.specific().map(|r| (r.state.clone(), r.voltage.clone())),
    )
    .into_iter()
    .collect();

    per_state(table)
        .into_iter()
        .map(|(state, municipalities)| StateProfile {
            voltage_classes: voltages.get(&state).map_or(0, |v| v.len()),
            share_pct: municipalities as f64 * 100.0 / total,
            state,
            municipalities,
        })
        .collect()
}

/// Profil d'une tension (rapport technique)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoltageProfile {
    pub voltage: VoltageClass,
    pub municipalities: usize,
    pub states: Vec<String>,
}

/// Profils triés par tension croissante
pub fn voltage_profiles(table: &ConsolidatedTable) -> Vec<VoltageProfile> {
    let states: HashMap<VoltageClass, BTreeSet<String>> = group_distinct(
        table.specific().map(|r| (r.voltage.clone(), r.state.clone())),
    )
    .into_iter()
    .collect();

    let mut profiles: Vec<VoltageProfile> = per_voltage(table)
        .into_iter()
        .map(|(voltage, municipalities)| VoltageProfile {
            states: states
                .get(&voltage)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            voltage,
            municipalities,
        })
        .collect();
    profiles.sort_by(|a, b| a.voltage.cmp(&b.voltage));
    profiles
}

/// Nombre de communes distinctes (clé UF + nom)
pub fn unique_municipalities(table: &ConsolidatedTable) -> usize {
    table
        .rows()
        .iter()
        .map(|r| r.key())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Vue d'ensemble utilisée par la console, les graphiques et les rapports
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total_records: usize,
    pub unique_municipalities: usize,
    /// Libellés de lignes spécifiques distincts ("500 kV", ...)
    pub distinct_lines: usize,
    pub states: Vec<String>,
    pub per_voltage: Vec<(VoltageClass, usize)>,
    pub per_state: Vec<(String, usize)>,
    pub lines_per_municipality: Vec<(MunicipalityKey, usize)>,
    pub multi_line: Vec<MultiLineRow>,
    pub distribution: Vec<(usize, usize)>,
    pub matrix: VoltageMatrix,
    pub exclusive: Vec<(VoltageClass, Vec<MunicipalityKey>)>,
    pub descriptive: Descriptive,
}

impl Summary {
    pub fn compute(table: &ConsolidatedTable) -> Self {
        Self {
            total_records: table.len(),
            unique_municipalities: unique_municipalities(table),
            distinct_lines: table
                .specific()
                .map(|r| r.line_label())
                .collect::<BTreeSet<_>>()
                .len(),
            states: table.states(),
            per_voltage: per_voltage(table),
            per_state: per_state(table),
            lines_per_municipality: lines_per_municipality(table),
            multi_line: multi_line(table),
            distribution: distribution(table),
            matrix: matrix(table),
            exclusive: exclusive(table),
            descriptive: descriptive(table),
        }
    }

    /// Tensions exclusives d'une commune, s'il n'y en a qu'une
    pub fn exclusive_voltage(&self, key: &MunicipalityKey) -> Option<&VoltageClass> {
        self.exclusive
            .iter()
            .find(|(_, keys)| keys.contains(key))
            .map(|(v, _)| v)
    }

    pub fn count_for_voltage(&self, voltage: &VoltageClass) -> usize {
        self.per_voltage
            .iter()
            .find(|(v, _)| v == voltage)
            .map_or(0, |(_, n)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Affectation;

    fn row(name: &str, voltage: &str, state: &str) -> Affectation {
        Affectation::new(name, None, VoltageClass::parse(voltage), state)
    }

    // Ligne 500 → A, B ; ligne 230 → B
    fn scenario() -> ConsolidatedTable {
        ConsolidatedTable::from_rows(vec![
            row("A", "500", "PR"),
            row("B", "500", "PR"),
            row("B", "230", "PR"),
        ])
    }

    fn key(name: &str) -> MunicipalityKey {
        MunicipalityKey::new("PR", name)
    }

    #[test]
    fn test_scenario_per_voltage() {
        let summary = Summary::compute(&scenario());
        assert_eq!(summary.count_for_voltage(&VoltageClass::Kv(500)), 2);
        assert_eq!(summary.count_for_voltage(&VoltageClass::Kv(230)), 1);
        assert_eq!(summary.unique_municipalities, 2);
        assert_eq!(summary.distinct_lines, 2);
    }

    #[test]
    fn test_scenario_exclusive() {
        let summary = Summary::compute(&scenario());
        assert_eq!(
            summary.exclusive_voltage(&key("A")),
            Some(&VoltageClass::Kv(500))
        );
        assert_eq!(summary.exclusive_voltage(&key("B")), None);
        assert_eq!(
            summary.exclusive,
            vec![(VoltageClass::Kv(500), vec![key("A")])]
        );
    }

    #[test]
    fn test_exclusive_never_under_other_voltage() {
        let table = ConsolidatedTable::from_rows(vec![
            row("A", "500", "PR"),
            row("B", "500", "PR"),
            row("B", "230", "PR"),
            row("C", "230", "SC"),
            row("D", "765", "PR"),
            row("D", "765", "PR"),
        ]);
        for (voltage, keys) in exclusive(&table) {
            for k in keys {
                assert!(table
                    .specific()
                    .filter(|r| r.key() == k)
                    .all(|r| r.voltage == voltage));
            }
        }
    }

    #[test]
    fn test_ranking_is_stable() {
        // Égalités : ordre d'apparition, pas ordre alphabétique
        let table = ConsolidatedTable::from_rows(vec![
            row("Zeta", "500", "PR"),
            row("Alfa", "500", "PR"),
            row("Meio", "500", "PR"),
            row("Meio", "230", "PR"),
        ]);
        let ranked: Vec<_> = lines_per_municipality(&table)
            .into_iter()
            .map(|(k, n)| (k.name, n))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("Meio".to_string(), 2),
                ("Zeta".to_string(), 1),
                ("Alfa".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_base_rows_count_per_state_only() {
        let table = ConsolidatedTable::from_rows(vec![
            row("A", "500", "PR"),
            row("X", "BASE", "PR"),
            row("Y", "BASE", "RS"),
        ]);
        let summary = Summary::compute(&table);
        assert_eq!(summary.unique_municipalities, 3);
        assert_eq!(summary.per_state, vec![("PR".to_string(), 2), ("RS".to_string(), 1)]);
        assert_eq!(summary.per_voltage, vec![(VoltageClass::Kv(500), 1)]);
        assert_eq!(summary.lines_per_municipality.len(), 1);
    }

    #[test]
    fn test_same_name_in_two_states() {
        let table = ConsolidatedTable::from_rows(vec![
            row("Bom Jesus", "525", "SC"),
            row("Bom Jesus", "525", "RS"),
        ]);
        assert_eq!(unique_municipalities(&table), 2);
        assert_eq!(per_voltage(&table), vec![(VoltageClass::Kv(525), 2)]);
    }

    #[test]
    fn test_multi_line_and_distribution() {
        let table = ConsolidatedTable::from_rows(vec![
            row("Foz do Iguaçu", "600", "PR"),
            row("Foz do Iguaçu", "500", "PR"),
            row("Foz do Iguaçu", "765", "PR"),
            row("Cascavel", "500", "PR"),
            row("Cascavel", "765", "PR"),
            row("Toledo", "500", "PR"),
        ]);
        let rows = multi_line(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].municipality, "Foz do Iguaçu");
        assert_eq!(rows[0].lines, 3);
        assert_eq!(rows[0].voltages_label(), "500, 600, 765");
        assert_eq!(rows[1].state, "PR");

        assert_eq!(distribution(&table), vec![(1, 1), (2, 1), (3, 1)]);
    }

    #[test]
    fn test_matrix() {
        let table = ConsolidatedTable::from_rows(vec![
            row("A", "500", "PR"),
            row("B", "500", "PR"),
            row("C", "525", "SC"),
            row("D", "BASE", "RS"),
        ]);
        let m = matrix(&table);
        assert_eq!(m.states, vec!["PR", "SC"]);
        assert_eq!(m.voltages, vec![VoltageClass::Kv(500), VoltageClass::Kv(525)]);
        assert_eq!(m.get("PR", &VoltageClass::Kv(500)), 2);
        assert_eq!(m.get("SC", &VoltageClass::Kv(500)), 0);
        assert_eq!(m.get("RS", &VoltageClass::Kv(500)), 0);
        assert_eq!(m.max(), 2);
    }

    #[test]
    fn test_descriptive() {
        let table = ConsolidatedTable::from_rows(vec![
            row("A", "500", "PR"),
            row("B", "500", "PR"),
            row("B", "230", "PR"),
            row("C", "500", "PR"),
            row("C", "230", "PR"),
            row("C", "765", "PR"),
            row("D", "765", "PR"),
        ]);
        let d = descriptive(&table);
        assert_eq!(d.max, 3);
        assert_eq!(d.argmax, Some(key("C")));
        assert!((d.mean - 7.0 / 4.0).abs() < 1e-9);
        assert!((d.median - 1.5).abs() < 1e-9);
        assert_eq!(d.mode, 1);

        assert_eq!(descriptive(&ConsolidatedTable::new()), Descriptive::default());
    }

    #[test]
    fn test_complete_table_and_profiles() {
        let table = ConsolidatedTable::from_rows(vec![
            row("B", "500", "PR"),
            row("A", "525", "SC"),
            row("B", "230", "PR"),
            row("E", "BASE", "RS"),
        ]);
        let rows = complete_table(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].municipality, "A");
        assert_eq!(rows[1].voltages_label(), "230, 500");
        assert_eq!(rows[1].lines, 2);

        let states = state_profiles(&table);
        assert_eq!(states[0].state, "PR");
        assert_eq!(states[0].voltage_classes, 2);
        assert!((states[0].share_pct - 100.0 / 3.0).abs() < 1e-9);

        let voltages = voltage_profiles(&table);
        assert_eq!(voltages[0].voltage, VoltageClass::Kv(230));
        assert_eq!(voltages[2].states, vec!["SC".to_string()]);
    }
}
