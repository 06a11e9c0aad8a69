//! Lecture et écriture CSV
//!
//! Écriture en UTF-8 avec BOM (ouverture directe dans un tableur), en-tête
//! en première ligne, terminaison `\n`. La lecture accepte UTF-8 avec ou
//! sans BOM et retombe sur Windows-1252 ; le séparateur `;` est détecté.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use linhas_geo::schema::normalize_code;
use linhas_geo::VoltageClass;
use thiserror::Error;

use crate::aggregate::stats::{MultiLineRow, MunicipalityRow};
use crate::aggregate::{Affectation, ConsolidatedTable, LayerKind};

/// Marque d'ordre des octets UTF-8
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Colonnes de `dados_consolidados.csv`
pub const CONSOLIDATED_HEADERS: [&str; 6] = ["NM_MUN", "CD_MUN", "Voltagem", "Estado", "Tipo", "Linha"];

pub const MULTI_LINE_HEADERS: [&str; 4] = ["Municipio", "Estado", "Num_Linhas", "Voltagens"];

/// Valeur écrite quand aucune tension n'a été détectée
pub const NOT_DETECTED: &str = "NÃO_DETECTADA";

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: String, column: String },
}

/// Table CSV lue en mémoire (valeurs texte)
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Première colonne présente parmi des alias (exact puis insensible à la casse)
    pub fn column_any(&self, aliases: &[String]) -> Option<usize> {
        linhas_geo::schema::resolve_column(aliases, &self.headers).and_then(|c| self.column(&c))
    }

    /// Colonne obligatoire
    pub fn require(&self, name: &str, path: &Path) -> Result<usize, CsvError> {
        self.column(name).ok_or_else(|| CsvError::MissingColumn {
            path: path.display().to_string(),
            column: name.to_string(),
        })
    }

    /// Valeur d'une cellule, vide si la ligne est courte
    pub fn get<'a>(&'a self, row: &'a [String], col: usize) -> &'a str {
        row.get(col).map(String::as_str).unwrap_or("")
    }
}

/// Décode des octets CSV : BOM retiré, UTF-8 sinon Windows-1252
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Séparateur probable d'après la ligne d'en-tête (`;` ou `,`)
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Lit une table CSV depuis du texte
pub fn parse_table(content: &str) -> Result<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .context("Cannot read CSV header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed CSV record")?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(CsvTable { headers, rows })
}

/// Lit un fichier CSV
pub fn read_table(path: &Path) -> Result<CsvTable> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    parse_table(&decode_text(&bytes)).with_context(|| format!("Cannot parse {}", path.display()))
}

/// Écrit un CSV (BOM + en-tête + lignes) et renvoie le nombre de lignes
pub fn write_rows<W, I>(mut out: W, headers: &[&str], rows: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    out.write_all(UTF8_BOM)?;
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(headers)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(&row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Écrit un fichier CSV, dossiers parents créés au besoin
pub fn write_csv<I>(path: &Path, headers: &[&str], rows: I) -> Result<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    write_rows(BufWriter::new(file), headers, rows)
}

/// CSV en mémoire (téléchargements du tableau de bord)
pub fn to_bytes<I>(headers: &[&str], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut buf = Vec::new();
    write_rows(&mut buf, headers, rows)?;
    Ok(buf)
}

fn consolidated_record(row: &Affectation) -> Vec<String> {
    vec![
        row.name.clone(),
        row.code.clone().unwrap_or_default(),
        row.voltage.to_string(),
        row.state.clone(),
        row.kind.to_string(),
        row.line_label(),
    ]
}

pub fn consolidated_rows(table: &ConsolidatedTable) -> impl Iterator<Item = Vec<String>> + '_ {
    table.rows().iter().map(consolidated_record)
}

pub fn write_consolidated(path: &Path, table: &ConsolidatedTable) -> Result<usize> {
    write_csv(path, &CONSOLIDATED_HEADERS, consolidated_rows(table))
}

/// Relit `dados_consolidados.csv` ; les colonnes NM_MUN, Voltagem et Estado sont obligatoires
pub fn read_consolidated(path: &Path) -> Result<ConsolidatedTable> {
    let csv = read_table(path)?;
    let name = csv.require("NM_MUN", path)?;
    let voltage = csv.require("Voltagem", path)?;
    let state = csv.require("Estado", path)?;
    let code = csv.column("CD_MUN");
    let kind = csv.column("Tipo");

    let rows = csv.rows.iter().filter_map(|r| {
        let nm = csv.get(r, name).trim();
        if nm.is_empty() {
            return None;
        }
        let v = VoltageClass::parse(csv.get(r, voltage));
        let mut row = Affectation::new(
            nm,
            code.and_then(|c| normalize_code(csv.get(r, c))),
            v.clone(),
            csv.get(r, state),
        );
        if let Some(k) = kind {
            row.kind = LayerKind::parse(csv.get(r, k), &v);
        }
        Some(row)
    });

    Ok(ConsolidatedTable::from_rows(rows))
}

pub fn multi_line_rows(rows: &[MultiLineRow]) -> impl Iterator<Item = Vec<String>> + '_ {
    rows.iter().map(|r| {
        vec![
            r.municipality.clone(),
            r.state.clone(),
            r.lines.to_string(),
            r.voltages_label(),
        ]
    })
}

pub fn write_multi_line(path: &Path, rows: &[MultiLineRow]) -> Result<usize> {
    write_csv(path, &MULTI_LINE_HEADERS, multi_line_rows(rows))
}

pub fn complete_rows(rows: &[MunicipalityRow]) -> impl Iterator<Item = Vec<String>> + '_ {
    rows.iter().map(|r| {
        vec![
            r.municipality.clone(),
            r.state.clone(),
            r.lines.to_string(),
            r.voltages_label(),
        ]
    })
}

/// `municipios_afetados_completo.csv`
pub fn write_complete_table(path: &Path, rows: &[MunicipalityRow]) -> Result<usize> {
    write_csv(path, &MULTI_LINE_HEADERS, complete_rows(rows))
}

/// `linhas_por_municipio.csv` : un couple (ligne, commune) par ligne
pub fn write_line_details(path: &Path, pairs: &[(String, String)]) -> Result<usize> {
    write_csv(
        path,
        &["Linha", "Município"],
        pairs.iter().map(|(l, m)| vec![l.clone(), m.clone()]),
    )
}

/// `resumo_por_municipio.csv`
pub fn write_municipality_summary(path: &Path, counts: &[(String, usize)]) -> Result<usize> {
    write_csv(
        path,
        &["Município", "Quantidade_Linhas"],
        counts.iter().map(|(m, n)| vec![m.clone(), n.to_string()]),
    )
}

/// Liste texte des communes touchées (titre, total, puces triées)
pub fn write_affected_list(path: &Path, title: &str, names: &[String]) -> Result<()> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(70));
    out.push_str("\n\n");
    out.push_str(&format!("Total: {} municípios\n\n", sorted.len()));
    for name in sorted {
        out.push_str(&format!("  • {}\n", name));
    }

    std::fs::write(path, out).with_context(|| format!("Cannot write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_bom_and_latin1() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFNM_MUN\n"), "NM_MUN\n");
        // "Iguaçu" en Windows-1252
        assert_eq!(decode_text(b"Igua\xE7u"), "Iguaçu");
    }

    #[test]
    fn test_parse_table_semicolon() {
        let table = parse_table("NM_MUN;UF\nCascavel;PR\nToledo\n").unwrap();
        assert_eq!(table.headers, vec!["NM_MUN", "UF"]);
        assert_eq!(table.rows.len(), 2);
        let uf = table.column("UF").unwrap();
        assert_eq!(table.get(&table.rows[1], uf), "");
    }

    #[test]
    fn test_write_rows_has_bom_and_lf() {
        let bytes = to_bytes(&["A", "B"], vec![vec!["1".to_string(), "x,y".to_string()]]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text, "A,B\n1,\"x,y\"\n");
    }

    #[test]
    fn test_consolidated_roundtrip_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados_consolidados.csv");
        let table = ConsolidatedTable::from_rows(vec![
            Affectation::new("Foz do Iguaçu", Some("4108304".into()), VoltageClass::Kv(600), "PR"),
            Affectation::new("Chapecó", None, VoltageClass::Base, "SC"),
        ]);
        assert_eq!(write_consolidated(&path, &table).unwrap(), 2);

        let back = read_consolidated(&path).unwrap();
        assert_eq!(back.rows(), table.rows());
        assert_eq!(back.rows()[1].kind, LayerKind::Base);
    }

    #[test]
    fn test_read_consolidated_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "NM_MUN,Estado\nCascavel,PR\n").unwrap();

        let err = read_consolidated(&path).unwrap_err();
        assert!(err.to_string().contains("Voltagem"));
    }

    #[test]
    fn test_affected_list_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipios_afetados.txt");
        let names = vec!["Pelotas".to_string(), "Camaquã".to_string(), "Pelotas".to_string()];
        write_affected_list(&path, "MUNICÍPIOS AFETADOS", &names).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("MUNICÍPIOS AFETADOS\n===="));
        assert!(text.contains("Total: 2 municípios"));
        assert!(text.ends_with("  • Camaquã\n  • Pelotas\n"));
    }
}
