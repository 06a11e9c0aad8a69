//! Graphique statique 2×2 de l'analyse consolidée (PNG, plotters)
//!
//! Panneaux : communes par tension, communes par État, distribution du
//! nombre de lignes par commune, matrice État × tension.
//!
//! Le texte passe par une police TrueType chargée au premier appel
//! (`font`, sinon recherche dans les dossiers système). Sans police, seules
//! les formes sont dessinées.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::aggregate::Summary;
use crate::config::Config;

const WIDTH: u32 = 1600;
const HEIGHT: u32 = 1240;

const FONT_FAMILY: &str = "sans-serif";

const BAR_VOLTAGE: RGBColor = RGBColor(0x46, 0x82, 0xb4);
const BAR_DISTRIBUTION: RGBColor = RGBColor(0xff, 0x7f, 0x50);
const TEXT: RGBColor = RGBColor(0x22, 0x22, 0x22);

/// Palette YlOrRd (9 classes)
const YLORRD: [(u8, u8, u8); 9] = [
    (0xff, 0xff, 0xcc),
    (0xff, 0xed, 0xa0),
    (0xfe, 0xd9, 0x76),
    (0xfe, 0xb2, 0x4c),
    (0xfd, 0x8d, 0x3c),
    (0xfc, 0x4e, 0x2a),
    (0xe3, 0x1a, 0x1c),
    (0xbd, 0x00, 0x26),
    (0x80, 0x00, 0x26),
];

const FONT_DIRS: [&str; 5] = [
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const FONT_FILES: [&str; 6] = [
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
    "NotoSans-Regular.ttf",
    "FreeSans.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Police explicite, sinon la première police connue des dossiers système
pub fn find_font(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }
    let candidates: Vec<PathBuf> = FONT_DIRS
        .iter()
        .map(Path::new)
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| WalkDir::new(dir).sort_by_file_name().into_iter().flatten())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| FONT_FILES.iter().any(|name| entry.file_name() == *name))
        .map(|entry| entry.into_path())
        .collect();
    FONT_FILES.iter().find_map(|name| {
        candidates
            .iter()
            .find(|p| p.file_name().is_some_and(|f| f == *name))
            .cloned()
    })
}

fn register(explicit: Option<&Path>) -> bool {
    let Some(path) = find_font(explicit) else {
        warn!("No TrueType font found, chart drawn without text");
        return false;
    };
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(font = %path.display(), error = %e, "Cannot read font");
            return false;
        }
    };
    // la police reste enregistrée pour toute la durée du processus
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            debug!(font = %path.display(), "Chart font registered");
            true
        }
        Err(_) => {
            warn!(font = %path.display(), "Invalid font file");
            false
        }
    }
}

/// Vrai si le texte peut être dessiné ; la police est choisie au premier appel
fn font_ready(explicit: Option<&Path>) -> bool {
    *FONT_READY.get_or_init(|| register(explicit))
}

/// Interpolation dans la palette YlOrRd, `t` dans [0, 1]
pub fn ylorrd(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0) * (YLORRD.len() - 1) as f64;
    let i = (t.floor() as usize).min(YLORRD.len() - 2);
    let f = t - i as f64;
    let (a, b) = (YLORRD[i], YLORRD[i + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// `#rrggbb` → couleur ; `fallback` si la valeur est invalide
pub fn hex_color(hex: &str, fallback: RGBColor) -> RGBColor {
    let digits = hex.trim().trim_start_matches('#');
    let channel = |i: usize| digits.get(i..i + 2).and_then(|c| u8::from_str_radix(c, 16).ok());
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => RGBColor(r, g, b),
        _ => fallback,
    }
}

/// Borne haute « ronde » de l'axe des valeurs
fn axis_top(max: usize) -> u32 {
    let raw = (max.max(1) as f64 / 5.0).ceil() as usize;
    let magnitude = 10usize.pow((raw as f64).log10().floor().max(0.0) as u32);
    let step = [1, 2, 5, 10]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(raw);
    (max.div_ceil(step).max(1) * step) as u32
}

/// Bornes d'une barre sur un axe segmenté de `n` catégories
fn segment(i: usize, n: usize) -> (SegmentValue<u32>, SegmentValue<u32>) {
    let right = if i + 1 < n {
        SegmentValue::Exact(i as u32 + 1)
    } else {
        SegmentValue::Last
    };
    (SegmentValue::Exact(i as u32), right)
}

/// Libellé d'une graduation ; `reversed` quand la première catégorie est en haut
fn category(labels: &[String], value: &SegmentValue<u32>, reversed: bool) -> String {
    let index = match value {
        SegmentValue::CenterOf(i) => *i as usize,
        _ => return String::new(),
    };
    let index = if reversed {
        match labels.len().checked_sub(1 + index) {
            Some(i) => i,
            None => return String::new(),
        }
    } else {
        index
    };
    labels.get(index).cloned().unwrap_or_default()
}

fn builder<'a, 'b>(area: &'a Area<'b>, title: &str, text: bool) -> ChartBuilder<'a, 'b, BitMapBackend<'b>> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if text {
        builder
            .caption(title, (FONT_FAMILY, 22).into_font().color(&TEXT))
            .x_label_area_size(50)
            .y_label_area_size(70);
    }
    builder
}

/// Barres horizontales, première catégorie en haut
fn hbar_panel(area: &Area, title: &str, labels: &[String], values: &[usize], text: bool) -> Result<()> {
    let n = labels.len();
    let top = axis_top(values.iter().copied().max().unwrap_or(0));
    let mut chart = builder(area, title, text)
        .build_cartesian_2d(0..top, (0..n.max(1) as u32 - 1).into_segmented())?;

    if text {
        let formatter = |v: &SegmentValue<u32>| category(labels, v, true);
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n + 1)
            .y_label_formatter(&formatter)
            .x_desc("Número de Municípios")
            .y_desc("Voltagem (kV)")
            .label_style((FONT_FAMILY, 14))
            .draw()?;
    }

    let row = |i: usize| n - 1 - i;
    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let (low, high) = segment(row(i), n);
        let mut bar = Rectangle::new([(0, low), (*v as u32, high)], BAR_VOLTAGE.filled());
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;
    if text {
        let style = TextStyle::from((FONT_FAMILY, 14).into_font())
            .color(&TEXT)
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart.draw_series(values.iter().enumerate().map(|(i, v)| {
            Text::new(
                format!(" {}", v),
                (*v as u32, SegmentValue::CenterOf(row(i) as u32)),
                style.clone(),
            )
        }))?;
    }
    Ok(())
}

/// Barres verticales avec une couleur par barre
fn vbar_panel(
    area: &Area,
    title: &str,
    axes: (&str, &str),
    labels: &[String],
    values: &[usize],
    colors: &[RGBColor],
    text: bool,
) -> Result<()> {
    let n = labels.len();
    let top = axis_top(values.iter().copied().max().unwrap_or(0));
    let mut chart = builder(area, title, text)
        .build_cartesian_2d((0..n.max(1) as u32 - 1).into_segmented(), 0..top)?;

    if text {
        let formatter = |v: &SegmentValue<u32>| category(labels, v, false);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n + 1)
            .x_label_formatter(&formatter)
            .x_desc(axes.0)
            .y_desc(axes.1)
            .label_style((FONT_FAMILY, 14))
            .draw()?;
    }

    chart.draw_series(values.iter().enumerate().map(|(i, v)| {
        let (low, high) = segment(i, n);
        let color = colors.get(i).copied().unwrap_or(BAR_DISTRIBUTION);
        let mut bar = Rectangle::new([(low, 0), (high, *v as u32)], color.filled());
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;
    if text {
        let style = TextStyle::from((FONT_FAMILY, 14).into_font())
            .color(&TEXT)
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        chart.draw_series(values.iter().enumerate().map(|(i, v)| {
            Text::new(v.to_string(), (SegmentValue::CenterOf(i as u32), *v as u32), style.clone())
        }))?;
    }
    Ok(())
}

fn heatmap_panel(area: &Area, summary: &Summary, text: bool) -> Result<()> {
    let m = &summary.matrix;
    let (rows, cols) = (m.states.len(), m.voltages.len());
    let voltage_labels: Vec<String> = m.voltages.iter().map(|v| v.to_string()).collect();
    let mut chart = builder(area, "Matriz: Municípios por Estado e Voltagem", text).build_cartesian_2d(
        (0..cols.max(1) as u32 - 1).into_segmented(),
        (0..rows.max(1) as u32 - 1).into_segmented(),
    )?;

    if text {
        let x_formatter = |v: &SegmentValue<u32>| category(&voltage_labels, v, false);
        let y_formatter = |v: &SegmentValue<u32>| category(&m.states, v, true);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(cols + 1)
            .y_labels(rows + 1)
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .x_desc("Voltagem (kV)")
            .y_desc("Estado")
            .label_style((FONT_FAMILY, 14))
            .draw()?;
    }

    let max = m.max().max(1) as f64;
    // premier État en haut
    let cells: Vec<(usize, usize, usize)> = m
        .counts
        .iter()
        .enumerate()
        .flat_map(|(si, row)| row.iter().enumerate().map(move |(vi, c)| (rows - 1 - si, vi, *c)))
        .collect();

    chart.draw_series(cells.iter().map(|&(row, col, count)| {
        let (x0, x1) = segment(col, cols);
        let (y0, y1) = segment(row, rows);
        Rectangle::new([(x0, y0), (x1, y1)], ylorrd(count as f64 / max).filled())
    }))?;
    chart.draw_series(cells.iter().map(|&(row, col, _)| {
        let (x0, x1) = segment(col, cols);
        let (y0, y1) = segment(row, rows);
        Rectangle::new([(x0, y0), (x1, y1)], WHITE.stroke_width(1))
    }))?;
    if text {
        chart.draw_series(cells.iter().map(|&(row, col, count)| {
            let color = if count as f64 / max > 0.6 { &WHITE } else { &TEXT };
            let style = TextStyle::from((FONT_FAMILY, 15).into_font())
                .color(color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            Text::new(
                count.to_string(),
                (SegmentValue::CenterOf(col as u32), SegmentValue::CenterOf(row as u32)),
                style,
            )
        }))?;
    }
    Ok(())
}

/// Écrit la figure complète ; le format suit l'extension de `path`
pub fn consolidated_chart(
    summary: &Summary,
    config: &Config,
    title: &str,
    path: &Path,
    font: Option<&Path>,
) -> Result<()> {
    let text = font_ready(font);
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = if text {
        root.titled(title, (FONT_FAMILY, 30).into_font().color(&TEXT))?
    } else {
        root.margin(40, 0, 0, 0)
    };
    let panels = root.split_evenly((2, 2));

    let (labels, values): (Vec<String>, Vec<usize>) =
        summary.per_voltage.iter().map(|(v, n)| (v.to_string(), *n)).unzip();
    hbar_panel(&panels[0], "Municípios Afetados por Voltagem da Linha", &labels, &values, text)?;

    let (labels, values): (Vec<String>, Vec<usize>) =
        summary.per_state.iter().map(|(s, n)| (s.clone(), *n)).unzip();
    let colors: Vec<RGBColor> = labels
        .iter()
        .map(|s| hex_color(config.state_color(s), BAR_DISTRIBUTION))
        .collect();
    vbar_panel(
        &panels[1],
        "Municípios Afetados por Estado",
        ("Estado", "Número de Municípios"),
        &labels,
        &values,
        &colors,
        text,
    )?;

    let (labels, values): (Vec<String>, Vec<usize>) =
        summary.distribution.iter().map(|(l, n)| (l.to_string(), *n)).unzip();
    vbar_panel(
        &panels[2],
        "Distribuição: Quantas Linhas Atravessam Cada Município",
        ("Número de Linhas", "Quantidade de Municípios"),
        &labels,
        &values,
        &[],
        text,
    )?;

    heatmap_panel(&panels[3], summary, text)?;

    root.present()
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Affectation, ConsolidatedTable};
    use linhas_geo::VoltageClass;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn summary() -> Summary {
        Summary::compute(&ConsolidatedTable::from_rows(vec![
            Affectation::new("Foz do Iguaçu", None, VoltageClass::Kv(500), "PR"),
            Affectation::new("Foz do Iguaçu", None, VoltageClass::Kv(600), "PR"),
            Affectation::new("Cascavel", None, VoltageClass::Kv(500), "PR"),
            Affectation::new("Chapecó", None, VoltageClass::Kv(525), "SC"),
        ]))
    }

    #[test]
    fn test_ylorrd_bounds() {
        assert_eq!(ylorrd(0.0), RGBColor(0xff, 0xff, 0xcc));
        assert_eq!(ylorrd(1.0), RGBColor(0x80, 0x00, 0x26));
        assert_eq!(ylorrd(7.0), ylorrd(1.0));
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#4682b4", WHITE), RGBColor(0x46, 0x82, 0xb4));
        assert_eq!(hex_color("rgb(1,2,3)", WHITE), WHITE);
        assert_eq!(hex_color("#fff", TEXT), TEXT);
    }

    #[test]
    fn test_axis_top() {
        assert_eq!(axis_top(0), 5);
        assert_eq!(axis_top(7), 8);
        assert_eq!(axis_top(42), 50);
        assert_eq!(axis_top(380), 400);
    }

    #[test]
    fn test_category_labels() {
        let labels = vec!["PR".to_string(), "SC".to_string(), "RS".to_string()];
        assert_eq!(category(&labels, &SegmentValue::CenterOf(0), false), "PR");
        assert_eq!(category(&labels, &SegmentValue::CenterOf(0), true), "RS");
        assert_eq!(category(&labels, &SegmentValue::CenterOf(3), true), "");
        assert_eq!(category(&labels, &SegmentValue::Last, false), "");
        assert_eq!(category(&[], &SegmentValue::CenterOf(0), true), "");
    }

    #[test]
    fn test_segment_last_bar() {
        assert_eq!(segment(0, 3), (SegmentValue::Exact(0), SegmentValue::Exact(1)));
        assert_eq!(segment(2, 3), (SegmentValue::Exact(2), SegmentValue::Last));
    }

    #[test]
    fn test_chart_is_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let config = Config::from_preset("default").unwrap();
        consolidated_chart(&summary(), &config, "Análise", &path, None).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_chart_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let config = Config::from_preset("default").unwrap();
        let empty = Summary::compute(&ConsolidatedTable::new());
        consolidated_chart(&empty, &config, "Análise", &path, None).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(PNG_MAGIC));
    }

    #[test]
    fn test_chart_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_preset("default").unwrap();
        let (a, b) = (dir.path().join("a.png"), dir.path().join("b.png"));
        consolidated_chart(&summary(), &config, "Análise", &a, None).unwrap();
        consolidated_chart(&summary(), &config, "Análise", &b, None).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
