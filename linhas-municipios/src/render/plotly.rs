//! Figures Plotly construites avec la crate `plotly`
//!
//! Le bundle JS est chargé une seule fois par page (CDN) ; chaque figure
//! est insérée en `<div>` + script inline.

use plotly::box_plot::BoxMean;
use plotly::common::{ColorScale, ColorScalePalette, Font, Marker, Orientation, TextPosition, Title};
use plotly::layout::{Axis, AxisType, BarMode, Layout, Margin};
use plotly::traces::table::{Cells, Header};
use plotly::{Bar, BoxPlot, Configuration, HeatMap, Plot, Table, Trace};

/// Version du bundle chargé depuis le CDN
pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const TRANSPARENT: &str = "rgba(0,0,0,0)";

/// Une figure : traces + layout
pub struct Figure {
    plot: Plot,
    layout: Layout,
}

impl Figure {
    pub fn new(title: &str) -> Self {
        let layout = Layout::new()
            .title(Title::with_text(title))
            .paper_background_color(TRANSPARENT)
            .plot_background_color(TRANSPARENT)
            .height(420)
            .margin(Margin::new().top(60).left(60).right(20).bottom(50));
        Self {
            plot: Plot::new(),
            layout,
        }
    }

    pub fn trace(mut self, trace: Box<dyn Trace>) -> Self {
        self.plot.add_trace(trace);
        self
    }

    /// Catégories en abscisse
    pub fn axes(mut self, x: &str, y: &str) -> Self {
        self.layout = self
            .layout
            .x_axis(Axis::new().title(Title::with_text(x)).type_(AxisType::Category))
            .y_axis(Axis::new().title(Title::with_text(y)));
        self
    }

    /// Catégories en ordonnée (barres horizontales)
    pub fn horizontal_axes(mut self, x: &str, y: &str) -> Self {
        self.layout = self
            .layout
            .x_axis(Axis::new().title(Title::with_text(x)))
            .y_axis(Axis::new().title(Title::with_text(y)).type_(AxisType::Category));
        self
    }

    pub fn y_title(mut self, y: &str) -> Self {
        self.layout = self.layout.y_axis(Axis::new().title(Title::with_text(y)));
        self
    }

    pub fn grouped(mut self) -> Self {
        self.layout = self.layout.bar_mode(BarMode::Group);
        self
    }

    pub fn font_size(mut self, size: usize) -> Self {
        self.layout = self.layout.font(Font::new().size(size));
        self
    }

    fn into_plot(self) -> Plot {
        let mut plot = self.plot;
        plot.set_layout(self.layout);
        plot.set_configuration(Configuration::new().responsive(true).display_logo(false));
        plot
    }

    pub fn to_json(self) -> String {
        self.into_plot().to_json()
    }

    /// `<div>` + script d'initialisation
    pub fn to_html(self, div_id: &str) -> String {
        let inline = self.into_plot().to_inline_html(Some(div_id));
        format!("<div class=\"plot\">\n{}\n</div>\n", guard_script(&inline))
    }
}

/// Neutralise les `</` des données à l'intérieur du `<script>`
fn guard_script(html: &str) -> String {
    let open = html.find("<script").and_then(|i| html[i..].find('>').map(|j| i + j + 1));
    match (open, html.rfind("</script>")) {
        (Some(start), Some(end)) if start <= end => format!(
            "{}{}{}",
            &html[..start],
            html[start..end].replace("</", "<\\/"),
            &html[end..]
        ),
        _ => html.to_string(),
    }
}

fn value_labels(values: &[usize]) -> Vec<String> {
    values.iter().map(usize::to_string).collect()
}

/// Barres verticales étiquetées ; une couleur unique ou une par barre
pub fn bar(labels: &[String], values: &[usize], colors: Option<Vec<String>>) -> Box<dyn Trace> {
    let trace = Bar::new(labels.to_vec(), values.to_vec())
        .text_array(value_labels(values))
        .text_position(TextPosition::Auto);
    match colors {
        Some(colors) => trace.marker(Marker::new().color_array(colors)),
        None => trace,
    }
}

/// Barres horizontales (catégories sur l'axe y)
pub fn hbar(labels: &[String], values: &[usize]) -> Box<dyn Trace> {
    Bar::new(values.to_vec(), labels.to_vec())
        .orientation(Orientation::Horizontal)
        .text_array(value_labels(values))
        .text_position(TextPosition::Auto)
}

/// Série nommée (barres groupées)
pub fn named_bar(name: &str, labels: &[String], values: &[usize], color: &str) -> Box<dyn Trace> {
    Bar::new(labels.to_vec(), values.to_vec())
        .name(name)
        .marker(Marker::new().color(color.to_string()))
}

/// Carte de chaleur
pub fn heatmap(
    x: &[String],
    y: &[String],
    z: &[Vec<usize>],
    palette: ColorScalePalette,
) -> Box<dyn Trace> {
    HeatMap::new(x.to_vec(), y.to_vec(), z.to_vec()).color_scale(ColorScale::Palette(palette))
}

/// Boîte à moustaches (moyenne et écart type)
pub fn box_plot(name: &str, values: &[usize], color: &str) -> Box<dyn Trace> {
    BoxPlot::new(values.to_vec())
        .name(name)
        .box_mean(BoxMean::StandardDeviation)
        .marker(Marker::new().color(color.to_string()))
}

/// Tableau Plotly, une colonne par vecteur
pub fn table(headers: &[&str], columns: Vec<Vec<String>>) -> Box<dyn Trace> {
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    Table::new(Header::new(headers), Cells::new(columns))
}
