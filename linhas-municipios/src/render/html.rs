//! Rapports HTML autonomes (Plotly via CDN)
//!
//! Trois variantes lisent la même table consolidée :
//! - `dashboard` : cinq figures et tableau complet filtrable
//! - `technical` : statistiques descriptives, tableaux par État et par tension
//! - `accessible` : gros caractères, peu de chiffres, tableau simplifié
//!
//! L'horodatage est fourni par l'appelant ; à entrées égales, la page est
//! identique.

use std::collections::BTreeSet;

use ::plotly::common::ColorScalePalette;

use super::plotly::{self, Figure, PLOTLY_CDN};
use super::{escape_html, maps_link};
use crate::aggregate::stats::{self, MunicipalityRow, MultiLineRow};
use crate::aggregate::{ConsolidatedTable, Summary};
use crate::config::Config;

/// Variante de rapport
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Dashboard,
    Technical,
    Accessible,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard.html",
            Self::Technical => "relatorio_tecnico.html",
            Self::Accessible => "relatorio_acessivel.html",
        }
    }
}

/// Nom du CSV complet publié à côté du dashboard
pub const COMPLETE_CSV: &str = "municipios_afetados_completo.csv";

const BASE_CSS: &str = r##"
:root { --bg:#fafafa; --fg:#222222; --card-bg:#ffffff; --border:#eeeeee; --primary:#0f4c81; --muted:#666666; }
:root[data-theme='dark'] { --bg:#0f172a; --fg:#e5e7eb; --card-bg:#111827; --border:#1f2937; --primary:#60a5fa; --muted:#9ca3af; }
body { font-family: -apple-system, Segoe UI, Roboto, Helvetica, Arial, sans-serif; margin:0; padding:0; background:var(--bg); color:var(--fg); transition: background .2s ease, color .2s ease; }
header { background:var(--primary); color:#fff; padding:24px; }
header h1 { margin:0; font-size:22px; }
header p { margin:6px 0 0; opacity:.95; }
.header-actions { display:flex; gap:8px; align-items:center; margin-top:8px; }
.btn { cursor:pointer; border:1px solid rgba(255,255,255,.5); background:transparent; color:#fff; padding:6px 10px; border-radius:8px; font-size:13px; }
.btn:hover { background:rgba(255,255,255,.1); }
main { max-width:1120px; margin:24px auto; padding:0 16px; }
section { background:var(--card-bg); border:1px solid var(--border); border-radius:10px; padding:16px; margin-bottom:16px; box-shadow:0 1px 2px rgba(0,0,0,.04); }
h2 { font-size:18px; margin:4px 0 12px; color:var(--primary); }
h3 { font-size:16px; margin:20px 0 8px; color:var(--primary); }
ul { line-height:1.8; }
table { border-collapse:collapse; width:100%; }
th, td { padding:8px; border-bottom:1px solid var(--border); text-align:left; }
td.num, th.num { text-align:center; }
a { color:var(--primary); text-decoration:none; }
footer { max-width:1120px; margin:24px auto; padding:0 16px 24px; color:var(--muted); font-size:13px; }
.kpi { display:grid; grid-template-columns:repeat(4, 1fr); gap:12px; margin-bottom:16px; }
.card { background:var(--card-bg); border:1px solid var(--border); border-radius:10px; padding:12px; text-align:center; }
.card .big { font-size:24px; font-weight:700; }
.card .label { color:var(--muted); font-size:13px; }
.filters { display:grid; grid-template-columns:repeat(auto-fit, minmax(200px,1fr)); gap:12px; margin:12px 0; }
.filters label { display:block; margin-bottom:4px; font-weight:600; font-size:13px; }
.filters select, .filters input { width:100%; padding:8px; border:1px solid var(--border); border-radius:8px; background:var(--card-bg); color:var(--fg); box-sizing:border-box; }
.download { display:inline-block; padding:6px 12px; margin:4px 8px 4px 0; background:var(--primary); color:#fff; border-radius:6px; font-size:13px; }
.notice { padding:10px 12px; border-radius:8px; border:1px solid #e53e3e; background:rgba(229,62,62,.08); }
.highlight { border-left:4px solid var(--primary); padding:8px 16px; background:rgba(15,76,129,.05); }
@media (max-width: 800px) { .kpi { grid-template-columns:repeat(2, 1fr); } }
"##;

const ACCESSIBLE_CSS: &str = r##"
@import url('https://fonts.googleapis.com/css2?family=Comic+Neue:wght@400;700&display=swap');
body { font-family:'Comic Neue', 'Comic Sans MS', Verdana, sans-serif; font-size:20px; line-height:1.9; letter-spacing:.02em; }
header h1 { font-size:32px; }
h2 { font-size:26px; }
main { max-width:900px; }
.destaque { padding:20px; margin:16px 0; border-radius:12px; background:rgba(66,153,225,.08); border-left:6px solid var(--primary); }
.numero-grande { display:block; font-size:48px; font-weight:700; color:var(--primary); }
.badge { display:inline-block; padding:2px 10px; margin:2px; border-radius:12px; color:#fff; font-size:16px; font-weight:700; }
td, th { padding:14px 10px; }
@media (max-width: 800px) { header h1 { font-size:24px; } h2 { font-size:22px; } .numero-grande { font-size:36px; } }
"##;

/// Bascule clair/sombre mémorisée, appliquée aussi aux figures
const THEME_SCRIPT: &str = r##"<script>
(function() {
  const root = document.documentElement;
  const saved = localStorage.getItem('theme');
  const prefersDark = window.matchMedia && window.matchMedia('(prefers-color-scheme: dark)').matches;
  function applyTheme(theme) {
    root.setAttribute('data-theme', theme);
    try {
      const isDark = theme === 'dark';
      document.querySelectorAll('.js-plotly-plot').forEach(function(p) {
        Plotly.relayout(p, {
          template: isDark ? 'plotly_dark' : 'plotly_white',
          paper_bgcolor: 'rgba(0,0,0,0)',
          plot_bgcolor: 'rgba(0,0,0,0)',
          font: { color: getComputedStyle(root).getPropertyValue('--fg').trim() }
        });
      });
    } catch (e) {}
  }
  const initial = saved || (prefersDark ? 'dark' : 'light');
  applyTheme(initial);
  localStorage.setItem('theme', initial);
  const btn = document.getElementById('themeToggle');
  if (btn) {
    btn.addEventListener('click', function() {
      const next = (root.getAttribute('data-theme') || 'light') === 'light' ? 'dark' : 'light';
      localStorage.setItem('theme', next);
      applyTheme(next);
    });
  }
})();
</script>
"##;

/// Filtres du tableau complet (tension, État, recherche)
const TABLE_FILTER_SCRIPT: &str = r##"<script>
(function() {
  const filterVoltagem = document.getElementById('filterVoltagem');
  const filterEstado = document.getElementById('filterEstado');
  const filterMunicipio = document.getElementById('filterMunicipio');
  const table = document.getElementById('fullTable');
  if (!table) return;
  function applyFilters() {
    const voltagemSel = (filterVoltagem.value || '').trim();
    const estadoSel = (filterEstado.value || '').trim();
    const municipioQ = (filterMunicipio.value || '').toLowerCase();
    table.querySelectorAll('tbody tr').forEach(function(tr) {
      const voltagens = (tr.getAttribute('data-voltagens') || '').split(',').map(function(v) { return v.trim(); });
      const estado = tr.getAttribute('data-estado') || '';
      let show = true;
      if (voltagemSel && voltagens.indexOf(voltagemSel) < 0) show = false;
      if (estadoSel && estado !== estadoSel) show = false;
      if (municipioQ && tr.innerText.toLowerCase().indexOf(municipioQ) < 0) show = false;
      tr.style.display = show ? '' : 'none';
    });
  }
  filterVoltagem && filterVoltagem.addEventListener('change', applyFilters);
  filterEstado && filterEstado.addEventListener('change', applyFilters);
  filterMunicipio && filterMunicipio.addEventListener('keyup', applyFilters);
})();
</script>
"##;

/// Descriptions simplifiées des tensions (rapport accessible)
const PLAIN_VOLTAGES: [(u32, &str, &str); 5] = [
    (230, "Voltagem Baixa", "Linhas menores, para distâncias curtas"),
    (500, "Voltagem Média", "Linhas para distâncias médias"),
    (525, "Voltagem Média-Alta", "Linhas para longas distâncias"),
    (600, "Voltagem Alta", "Linhas grandes, para longas distâncias"),
    (765, "Voltagem Muito Alta", "As maiores linhas, para distâncias muito longas"),
];

/// Compléments du dashboard servi en direct
#[derive(Debug, Clone, Default)]
pub struct DashboardExtras {
    /// Bloc HTML inséré avant les indicateurs (filtres, actualisation)
    pub controls: Option<String>,
    /// Message d'erreur affiché en tête de page
    pub notice: Option<String>,
    /// Liens de téléchargement (href, libellé)
    pub downloads: Vec<(String, String)>,
}

impl DashboardExtras {
    /// Téléchargement du tableau complet, publié à côté du fichier HTML
    pub fn static_report() -> Self {
        Self {
            downloads: vec![(COMPLETE_CSV.to_string(), format!("📥 {}", COMPLETE_CSV))],
            ..Self::default()
        }
    }
}

fn page_start(out: &mut String, title: &str, extra_css: &str) {
    out.push_str(&format!(
        r##"<!DOCTYPE html>
<html lang="pt-br">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{}</title>
  <script src="{}"></script>
  <style>{}{}</style>
</head>
<body>
"##,
        escape_html(title),
        PLOTLY_CDN,
        BASE_CSS,
        extra_css
    ));
}

fn header(out: &mut String, title: &str, subtitles: &[String]) {
    out.push_str(&format!("<header>\n  <h1>{}</h1>\n", escape_html(title)));
    for line in subtitles {
        out.push_str(&format!("  <p>{}</p>\n", escape_html(line)));
    }
    out.push_str("  <div class=\"header-actions\"><button id=\"themeToggle\" class=\"btn\">Alternar tema (Claro/Escuro)</button></div>\n</header>\n");
}

fn page_end(out: &mut String, footer: &str) {
    out.push_str(&format!("<footer><p>{}</p></footer>\n", escape_html(footer)));
    out.push_str(THEME_SCRIPT);
    out.push_str("</body>\n</html>\n");
}

fn section(out: &mut String, title: &str, body: &str) {
    out.push_str(&format!("<section>\n<h2>{}</h2>\n{}</section>\n", escape_html(title), body));
}

fn kpi_grid(out: &mut String, cards: &[(&str, String)]) {
    out.push_str("<div class=\"kpi\">\n");
    for (label, value) in cards {
        out.push_str(&format!(
            "  <div class=\"card\"><div class=\"big\">{}</div><div class=\"label\">{}</div></div>\n",
            escape_html(value),
            escape_html(label)
        ));
    }
    out.push_str("</div>\n");
}

fn voltage_labels(voltages: &[linhas_geo::VoltageClass]) -> String {
    voltages
        .iter()
        .map(|v| format!("{} kV", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table restreinte aux lignes spécifiques
fn specific_table(table: &ConsolidatedTable) -> ConsolidatedTable {
    ConsolidatedTable::from_rows(table.specific().cloned())
}

/// Figures du dashboard : tension, État, distribution, matrice, top N
pub fn dashboard_figures(table: &ConsolidatedTable, summary: &Summary, config: &Config) -> Vec<(String, Figure)> {
    let profiles = stats::voltage_profiles(table);
    let labels: Vec<String> = profiles.iter().map(|p| p.voltage.to_string()).collect();
    let values: Vec<usize> = profiles.iter().map(|p| p.municipalities).collect();
    let by_voltage = Figure::new("Municípios afetados por voltagem (kV)")
        .trace(plotly::hbar(&labels, &values))
        .horizontal_axes("Número de Municípios", "Voltagem (kV)");

    let (labels, values): (Vec<String>, Vec<usize>) = summary.per_state.iter().cloned().unzip();
    let colors: Vec<String> = labels.iter().map(|s| config.state_color(s).to_string()).collect();
    let by_state = Figure::new("Municípios afetados por estado")
        .trace(plotly::bar(&labels, &values, Some(colors)))
        .axes("Estado", "Número de Municípios");

    let (labels, values): (Vec<String>, Vec<usize>) =
        summary.distribution.iter().map(|(l, n)| (l.to_string(), *n)).unzip();
    let distribution = Figure::new("Distribuição: quantas linhas atravessam cada município")
        .trace(plotly::bar(&labels, &values, None))
        .axes("Nº de Linhas", "Qtd de Municípios");

    let m = &summary.matrix;
    let matrix = Figure::new("Matriz: municípios por estado e voltagem")
        .trace(plotly::heatmap(
            &m.voltages.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            &m.states,
            &m.counts,
            ColorScalePalette::YlOrRd,
        ))
        .axes("Voltagem (kV)", "Estado");

    let top: Vec<&MultiLineRow> = summary.multi_line.iter().take(config.top_n).collect();
    let top_table = Figure::new(&format!("Top municípios com mais linhas (Top {})", config.top_n))
        .trace(plotly::table(
            &["Municipio", "Estado", "Num_Linhas", "Voltagens"],
            vec![
                top.iter().map(|r| r.municipality.clone()).collect(),
                top.iter().map(|r| r.state.clone()).collect(),
                top.iter().map(|r| r.lines.to_string()).collect(),
                top.iter().map(|r| r.voltages_label()).collect(),
            ],
        ));

    vec![
        ("Municípios por voltagem".to_string(), by_voltage),
        ("Municípios por estado".to_string(), by_state),
        ("Distribuição por município".to_string(), distribution),
        ("Matriz estado x voltagem".to_string(), matrix),
        ("Top municípios".to_string(), top_table),
    ]
}

/// Section « Todos os municípios afetados » : filtres, téléchargements, liens Maps
pub fn full_table_section(rows: &[MunicipalityRow], downloads: &[(String, String)]) -> String {
    let voltages: BTreeSet<_> = rows.iter().flat_map(|r| r.voltages.iter().cloned()).collect();
    let states: BTreeSet<&str> = rows.iter().map(|r| r.state.as_str()).collect();

    let mut out = String::new();
    out.push_str("<section>\n<h2>Todos os municípios afetados</h2>\n");
    out.push_str("<p>Lista completa de municípios afetados por linhas de transmissão. Clique em um município para abrir sua localização no Google Maps.</p>\n");

    out.push_str("<div class=\"filters\">\n");
    out.push_str("  <div><label for=\"filterVoltagem\">Layer (Voltagem)</label><select id=\"filterVoltagem\"><option value=\"\">Todas as voltagens</option>");
    for v in &voltages {
        let v = escape_html(&v.to_string());
        out.push_str(&format!("<option value=\"{v}\">{v} kV</option>"));
    }
    out.push_str("</select></div>\n");
    out.push_str("  <div><label for=\"filterEstado\">Estado (UF)</label><select id=\"filterEstado\"><option value=\"\">Todos</option>");
    for s in &states {
        let s = escape_html(s);
        out.push_str(&format!("<option value=\"{s}\">{s}</option>"));
    }
    out.push_str("</select></div>\n");
    out.push_str("  <div><label for=\"filterMunicipio\">Buscar município</label><input id=\"filterMunicipio\" type=\"text\" placeholder=\"Digite nome do município\" /></div>\n</div>\n");

    if !downloads.is_empty() {
        out.push_str("<div><strong>Downloads</strong><br/>");
        for (href, label) in downloads {
            out.push_str(&format!(
                "<a class=\"download\" href=\"{}\" download>{}</a>",
                escape_html(href),
                escape_html(label)
            ));
        }
        out.push_str("</div>\n");
    }

    out.push_str("<div style=\"overflow:auto;\"><table id=\"fullTable\">\n<thead><tr><th>Município</th><th>Estado</th><th class=\"num\">Nº Linhas</th><th>Voltagens (kV)</th></tr></thead>\n<tbody>\n");
    for r in rows {
        let voltages = escape_html(&r.voltages_label());
        out.push_str(&format!(
            "<tr data-voltagens=\"{v}\" data-estado=\"{s}\"><td><a href=\"{link}\" target=\"_blank\" rel=\"noopener\">{m}</a></td><td>{s}</td><td class=\"num\">{n}</td><td>{v}</td></tr>\n",
            v = voltages,
            s = escape_html(&r.state),
            link = escape_html(&maps_link(&r.municipality, &r.state)),
            m = escape_html(&r.municipality),
            n = r.lines
        ));
    }
    out.push_str("</tbody>\n</table></div>\n</section>\n");
    out.push_str(TABLE_FILTER_SCRIPT);
    out
}

/// Dashboard complet
pub fn render_dashboard(table: &ConsolidatedTable, config: &Config, generated_at: &str, extras: &DashboardExtras) -> String {
    let summary = Summary::compute(table);
    let rows = stats::complete_table(table);
    let title = format!("Dashboard – Linhas de Transmissão ({})", config.origin_municipality);

    let mut out = String::new();
    page_start(&mut out, &title, "");
    header(
        &mut out,
        &title,
        &[format!("Municípios afetados por linha de transmissão | Atualizado em {}", generated_at)],
    );
    out.push_str("<main>\n");

    if let Some(notice) = &extras.notice {
        out.push_str(&format!("<section class=\"notice\">{}</section>\n", escape_html(notice)));
    }
    if let Some(controls) = &extras.controls {
        out.push_str(controls);
    }

    kpi_grid(
        &mut out,
        &[
            ("Municípios únicos", summary.unique_municipalities.to_string()),
            ("Linhas distintas", summary.distinct_lines.to_string()),
            ("Estados", summary.states.len().to_string()),
            ("Municípios com múltiplas linhas", summary.multi_line.len().to_string()),
        ],
    );

    let voltages = table.voltages();
    let intro = format!(
        "<p>Municípios atravessados pelas linhas de transmissão que partem de <strong>{}</strong>. \
         Voltagens presentes: <strong>{}</strong>, totalizando <strong>{} municípios únicos</strong>.</p>\n\
         <ul><li>Passe o mouse sobre os gráficos para ver detalhes.</li>\
         <li>Use os filtros da tabela completa por voltagem, estado ou nome.</li>\
         <li>Clique no nome de um município para abri-lo no Google Maps.</li></ul>\n",
        escape_html(&config.origin_municipality),
        escape_html(&voltage_labels(&voltages)),
        summary.unique_municipalities
    );
    section(&mut out, "📊 Sobre este Dashboard", &intro);

    if table.is_empty() {
        section(&mut out, "Sem dados", "<p>Nenhum registro para os filtros atuais.</p>\n");
    } else {
        for (i, (title, fig)) in dashboard_figures(table, &summary, config).into_iter().enumerate() {
            section(&mut out, &title, &fig.to_html(&format!("fig{}", i + 1)));
        }
    }

    out.push_str(&full_table_section(&rows, &extras.downloads));
    out.push_str("</main>\n");
    page_end(&mut out, &format!("Gerado por linhas-municipios em {}", generated_at));
    out
}

/// Rapport technique (lignes spécifiques uniquement)
pub fn render_technical(table: &ConsolidatedTable, config: &Config, generated_at: &str) -> String {
    let only_specific = specific_table(table);
    let summary = Summary::compute(&only_specific);
    let voltages = only_specific.voltages();
    let d = &summary.descriptive;
    let total = summary.unique_municipalities.max(1) as f64;

    let mut out = String::new();
    page_start(&mut out, "Relatório Técnico – Linhas de Transmissão", "");
    header(
        &mut out,
        "📊 Relatório Técnico",
        &[
            "Análise Geoespacial de Linhas de Transmissão".to_string(),
            format!("Usina Hidrelétrica de {} → Região Sul do Brasil", config.origin_municipality),
            format!("Gerado em: {}", generated_at),
        ],
    );
    out.push_str("<main>\n");

    // 1. Resumo executivo
    let mut body = String::new();
    kpi_grid(
        &mut body,
        &[
            ("Total de Municípios", summary.unique_municipalities.to_string()),
            ("Registros Únicos", summary.total_records.to_string()),
            ("Classes de Voltagem", voltages.len().to_string()),
            ("Estados Cobertos", summary.states.len().to_string()),
        ],
    );
    let single = summary.distribution.iter().find(|(l, _)| *l == 1).map_or(0, |(_, n)| *n);
    let heavy: usize = summary.distribution.iter().filter(|(l, _)| *l >= 3).map(|(_, n)| n).sum();
    body.push_str("<div class=\"highlight\"><strong>Principais Achados:</strong><ul>");
    body.push_str(&format!(
        "<li><strong>{}</strong> municípios únicos afetados por linhas de transmissão</li>",
        summary.unique_municipalities
    ));
    if let (Some(min), Some(max)) = (voltages.first(), voltages.last()) {
        body.push_str(&format!("<li>A voltagem varia de <strong>{} kV a {} kV</strong></li>", min, max));
    }
    body.push_str(&format!(
        "<li>Em média, cada município é atravessado por <strong>{:.2} linhas</strong></li>",
        d.mean
    ));
    if let Some(argmax) = &d.argmax {
        body.push_str(&format!(
            "<li><strong>{}</strong> concentra o maior número de linhas ({})</li>",
            escape_html(&argmax.to_string()),
            d.max
        ));
    }
    body.push_str(&format!("<li>{} municípios possuem apenas 1 linha de transmissão</li></ul></div>\n", single));
    section(&mut out, "1. Resumo Executivo", &body);

    // 2. Metodologia
    let mut body = String::from(
        "<p>Linhas e limites municipais são lidos de GeoPackage, GeoJSON ou Shapefile, \
         reprojetados em WGS84 e cruzados com um índice espacial. Cada linha é expandida \
         em uma faixa de servidão conforme a voltagem:</p>\n<table><thead><tr><th>Voltagem</th><th class=\"num\">Faixa (m)</th></tr></thead><tbody>",
    );
    for (voltage, meters) in &config.buffer_meters {
        body.push_str(&format!("<tr><td>{} kV</td><td class=\"num\">{}</td></tr>", escape_html(voltage), meters));
    }
    body.push_str(&format!(
        "</tbody></table>\n<ol><li><strong>Normalização:</strong> nomes sem espaços nas bordas, UF em maiúsculas</li>\
         <li><strong>Deduplicação:</strong> por município, estado e voltagem</li>\
         <li><strong>Classificação:</strong> camadas base e específicas por voltagem</li>\
         <li><strong>Agregação:</strong> contagens por município, estado e voltagem</li></ol>\n<p>Voltagens sem largura definida usam {} m.</p>\n",
        config.default_buffer_meters
    ));
    section(&mut out, "2. Metodologia", &body);

    // 3. Estatística descritiva
    let mut body = String::from(
        "<h3>3.1 Distribuição por Estado</h3>\n<table><thead><tr><th>Estado</th><th class=\"num\">Municípios</th><th class=\"num\">Tipos de Voltagem</th><th class=\"num\">% do Total</th></tr></thead><tbody>",
    );
    for p in stats::state_profiles(&only_specific) {
        body.push_str(&format!(
            "<tr><td><strong>{}</strong></td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{:.1}%</td></tr>",
            escape_html(&p.state),
            p.municipalities,
            p.voltage_classes,
            p.share_pct
        ));
    }
    body.push_str("</tbody></table>\n<h3>3.2 Distribuição por Voltagem</h3>\n<table><thead><tr><th>Voltagem (kV)</th><th class=\"num\">Municípios Afetados</th><th class=\"num\">Estados</th><th>Alcance</th></tr></thead><tbody>");
    let profiles = stats::voltage_profiles(&only_specific);
    for p in &profiles {
        body.push_str(&format!(
            "<tr><td><strong>{} kV</strong></td><td class=\"num\">{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
            p.voltage,
            p.municipalities,
            p.states.len(),
            escape_html(config.voltage_reach(&p.voltage))
        ));
    }
    body.push_str("</tbody></table>\n");

    let labels: Vec<String> = profiles.iter().map(|p| format!("{} kV", p.voltage)).collect();
    let values: Vec<usize> = profiles.iter().map(|p| p.municipalities).collect();
    let colors: Vec<String> = profiles.iter().map(|p| config.voltage_color(&p.voltage).to_string()).collect();
    body.push_str(
        &Figure::new("Distribuição de Municípios por Classe de Voltagem")
            .trace(plotly::bar(&labels, &values, Some(colors)))
            .axes("Voltagem (kV)", "Número de Municípios")
            .to_html("tech1"),
    );

    body.push_str("<h3>3.3 Concentração de Linhas por Município</h3>\n");
    kpi_grid(
        &mut body,
        &[
            ("Média de Linhas", format!("{:.2}", d.mean)),
            ("Mediana", format!("{}", d.median)),
            ("Máximo", d.max.to_string()),
            ("Moda", d.mode.to_string()),
        ],
    );
    let (labels, values): (Vec<String>, Vec<usize>) =
        summary.distribution.iter().map(|(l, n)| (l.to_string(), *n)).unzip();
    body.push_str(
        &Figure::new("Distribuição de Concentração de Linhas por Município")
            .trace(plotly::bar(&labels, &values, Some(vec!["#4299e1".to_string(); values.len()])))
            .axes("Número de Linhas de Transmissão", "Quantidade de Municípios")
            .to_html("tech2"),
    );
    body.push_str(&format!(
        "<div class=\"highlight\"><strong>Interpretação Estatística:</strong><ul>\
         <li>Média <strong>{:.2}</strong>, mediana <strong>{}</strong></li>\
         <li><strong>{} municípios ({:.1}%)</strong> possuem apenas 1 linha</li>\
         <li><strong>{} municípios ({:.1}%)</strong> possuem 3 ou mais linhas</li></ul></div>\n",
        d.mean,
        d.median,
        single,
        single as f64 * 100.0 / total,
        heavy,
        heavy as f64 * 100.0 / total
    ));
    section(&mut out, "3. Análise Estatística Descritiva", &body);

    // 4. Análise geoespacial
    let m = &summary.matrix;
    let voltage_names: Vec<String> = m.voltages.iter().map(|v| v.to_string()).collect();
    let mut body = Figure::new("Matriz de Cobertura: Municípios por Estado e Voltagem")
        .trace(plotly::heatmap(&voltage_names, &m.states, &m.counts, ColorScalePalette::Blues))
        .axes("Voltagem (kV)", "Estado")
        .to_html("tech3");
    let kv_labels: Vec<String> = voltage_names.iter().map(|v| format!("{} kV", v)).collect();
    let mut grouped = Figure::new("Municípios por Voltagem em Cada Estado")
        .axes("Voltagem (kV)", "Número de Municípios")
        .grouped();
    for state in ordered_states(config, &m.states) {
        let values: Vec<usize> = m.voltages.iter().map(|v| m.get(&state, v)).collect();
        grouped = grouped.trace(plotly::named_bar(&state, &kv_labels, &values, config.state_color(&state)));
    }
    body.push_str(&grouped.to_html("tech4"));
    section(&mut out, "4. Análise Geoespacial", &body);

    // 5. Municípios críticos
    let mut boxes = Figure::new("Distribuição de Linhas por Município (por Estado)").y_title("Número de Linhas");
    for state in ordered_states(config, &summary.states) {
        let values: Vec<usize> = summary
            .lines_per_municipality
            .iter()
            .filter(|(k, _)| k.state == state)
            .map(|(_, n)| *n)
            .collect();
        boxes = boxes.trace(plotly::box_plot(&state, &values, config.state_color(&state)));
    }
    let mut body = boxes.to_html("tech5");
    body.push_str("<table><thead><tr><th>#</th><th>Município</th><th>Estado</th><th class=\"num\">Linhas</th><th>Voltagens (kV)</th></tr></thead><tbody>");
    for (i, r) in summary.multi_line.iter().take(config.top_n).enumerate() {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
            i + 1,
            escape_html(&r.municipality),
            escape_html(&r.state),
            r.lines,
            escape_html(&r.voltages_label())
        ));
    }
    body.push_str("</tbody></table>\n");
    section(&mut out, "5. Municípios Críticos", &body);

    out.push_str("</main>\n");
    page_end(&mut out, &format!("Relatório técnico gerado por linhas-municipios em {}", generated_at));
    out
}

/// États dans l'ordre de la configuration, puis les autres
fn ordered_states(config: &Config, present: &[String]) -> Vec<String> {
    let mut states = present.to_vec();
    states.sort_by_key(|s| (config.state_rank(s), s.clone()));
    states
}

/// Rapport accessible (grands caractères, peu de chiffres)
pub fn render_accessible(table: &ConsolidatedTable, config: &Config, generated_at: &str) -> String {
    let only_specific = specific_table(table);
    let summary = Summary::compute(&only_specific);
    let voltages = only_specific.voltages();

    let mut out = String::new();
    page_start(&mut out, "Linhas de Transmissão - Relatório Simplificado", ACCESSIBLE_CSS);
    header(
        &mut out,
        "⚡ Linhas de Transmissão",
        &[format!("Usina de {} → Região Sul", config.origin_municipality)],
    );
    out.push_str("<main>\n");

    let mut body = String::from(
        "<p><strong>Este relatório mostra:</strong></p>\n<p class=\"destaque\">🏙️ Quais cidades são atravessadas pelas linhas de transmissão.</p>\n<p><strong>Região analisada:</strong></p><ul>",
    );
    for s in &config.states {
        body.push_str(&format!("<li>{} ({})</li>", escape_html(&s.name), escape_html(&s.uf)));
    }
    body.push_str("</ul>\n");
    section(&mut out, "📋 O que é este relatório?", &body);

    let body = format!(
        "<div class=\"destaque\"><p><strong>Total de Municípios Afetados:</strong></p><span class=\"numero-grande\">{}</span><p>cidades atravessadas por essas linhas</p></div>\n\
         <div class=\"destaque\"><p><strong>Estados:</strong></p><span class=\"numero-grande\">{}</span></div>\n\
         <div class=\"destaque\"><p><strong>Tipos de Voltagem:</strong></p><span class=\"numero-grande\">{}</span><p>{}</p></div>\n",
        summary.unique_municipalities,
        summary.states.len(),
        voltages.len(),
        escape_html(&voltage_labels(&voltages))
    );
    section(&mut out, "📊 Números Principais", &body);

    let states = ordered_states(config, &summary.states);
    let values: Vec<usize> = states
        .iter()
        .map(|s| {
            summary
                .per_state
                .iter()
                .find(|(st, _)| st == s)
                .map_or(0, |(_, n)| *n)
        })
        .collect();
    let colors: Vec<String> = states.iter().map(|s| config.state_color(s).to_string()).collect();
    let mut body = Figure::new("")
        .trace(plotly::bar(&states, &values, Some(colors)))
        .axes("Estado", "Quantidade")
        .font_size(16)
        .to_html("acc1");
    body.push_str("<h3>Resumo:</h3><p>");
    for (state, count) in states.iter().zip(&values) {
        let name = config.state(state).map_or(state.as_str(), |s| s.name.as_str());
        body.push_str(&format!(
            "<strong>{} ({}):</strong> {} municípios<br/>",
            escape_html(name),
            escape_html(state),
            count
        ));
    }
    body.push_str("</p>\n");
    section(&mut out, "🗺️ Municípios por Estado", &body);

    let top: Vec<&MultiLineRow> = summary.multi_line.iter().take(10).collect();
    let mut body = String::from(
        "<p><strong>Estas cidades têm várias linhas de transmissão:</strong></p>\n<table><thead><tr><th>#</th><th>Município</th><th>Estado</th><th>Linhas</th><th>Voltagens</th></tr></thead><tbody>",
    );
    for (i, r) in top.iter().enumerate() {
        let badges: String = r
            .voltages
            .iter()
            .map(|v| {
                format!(
                    "<span class=\"badge\" style=\"background:{}\">{} kV</span>",
                    config.voltage_color(v),
                    v
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        body.push_str(&format!(
            "<tr><td><strong>{}º</strong></td><td><strong>{}</strong></td><td>{}</td><td><strong>{}</strong></td><td>{}</td></tr>",
            i + 1,
            escape_html(&r.municipality),
            escape_html(&r.state),
            r.lines,
            badges
        ));
    }
    body.push_str("</tbody></table>\n");
    if let Some(first) = top.first() {
        body.push_str(&format!(
            "<div class=\"destaque\"><p><strong>🎯 Destaque:</strong> {} ({}) é o município com mais linhas de transmissão: <strong>{} linhas diferentes!</strong></p></div>\n",
            escape_html(&first.municipality),
            escape_html(&first.state),
            first.lines
        ));
    }
    section(&mut out, "🏆 Top 10 - Municípios com Mais Linhas", &body);

    let mut body = String::from("<p><strong>As linhas de transmissão têm diferentes \"forças\":</strong></p>\n");
    for (kv, label, text) in PLAIN_VOLTAGES {
        let voltage = linhas_geo::VoltageClass::Kv(kv);
        if !voltages.contains(&voltage) {
            continue;
        }
        body.push_str(&format!(
            "<div class=\"destaque\"><span class=\"badge\" style=\"background:{}\">{} kV</span><p><strong>{}</strong> - {}</p></div>\n",
            config.voltage_color(&voltage),
            kv,
            label,
            text
        ));
    }
    body.push_str("<p class=\"destaque\"><strong>💡 Resumindo:</strong> quanto maior a voltagem (kV), mais longe a energia pode ir!</p>\n");
    section(&mut out, "⚡ O que são as Voltagens?", &body);

    out.push_str("</main>\n");
    page_end(&mut out, &format!("Gerado em {} | Relatório formatado para melhor acessibilidade", generated_at));
    out
}

/// Rend la variante demandée
pub fn render(kind: ReportKind, table: &ConsolidatedTable, config: &Config, generated_at: &str) -> String {
    match kind {
        ReportKind::Dashboard => render_dashboard(table, config, generated_at, &DashboardExtras::static_report()),
        ReportKind::Technical => render_technical(table, config, generated_at),
        ReportKind::Accessible => render_accessible(table, config, generated_at),
    }
}
