//! Tableau de bord local (axum)
//!
//! La table consolidée est gardée en mémoire et relue quand le fichier
//! change sur disque. `POST /refresh` relance la consolidation de
//! `per_layer/` ; en cas d'échec la table précédente reste servie.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path as AxumPath, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Router,
};
use linhas_geo::VoltageClass;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::aggregate::{stats, ConsolidatedTable, Selection};
use crate::export::csv::{self as csv_export, CONSOLIDATED_HEADERS, MULTI_LINE_HEADERS};
use crate::pipeline::{self, Workspace};
use crate::render::html::{self, DashboardExtras};
use crate::render::{encode_query, escape_html};
use crate::report::RunReport;

const CONSOLIDATED_DOWNLOAD: &str = "dados_consolidados.csv";
const MULTI_LINE_DOWNLOAD: &str = "municipios_multiplas_linhas.csv";

/// Table servie et son origine
#[derive(Debug, Default)]
struct Loaded {
    table: ConsolidatedTable,
    modified: Option<SystemTime>,
    loaded_at: String,
    error: Option<String>,
}

struct AppState {
    ws: Workspace,
    data: RwLock<Loaded>,
}

fn modified(ws: &Workspace) -> Option<SystemTime> {
    std::fs::metadata(ws.consolidated_csv())
        .and_then(|m| m.modified())
        .ok()
}

fn load(ws: &Workspace) -> Loaded {
    let modified = modified(ws);
    match ws.load_table() {
        Ok(table) => Loaded {
            table,
            modified,
            loaded_at: pipeline::timestamp(),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Consolidated table unavailable");
            Loaded {
                modified,
                loaded_at: pipeline::timestamp(),
                error: Some(format!("Não foi possível carregar os dados: {:#}", e)),
                ..Default::default()
            }
        }
    }
}

/// Relit la table si le fichier a changé depuis le dernier chargement
async fn reload_if_changed(state: &Arc<AppState>) {
    let current = modified(&state.ws);
    if state.data.read().await.modified == current {
        return;
    }
    let ws = state.ws.clone();
    match tokio::task::spawn_blocking(move || load(&ws)).await {
        Ok(loaded) => {
            info!(rows = loaded.table.len(), "Consolidated table reloaded");
            *state.data.write().await = loaded;
        }
        Err(e) => warn!(error = %e, "Reload task failed"),
    }
}

/// Filtres lus dans la query string (`estado=PR&voltagem=500`)
pub fn selection_from_query(params: &[(String, String)]) -> Selection {
    let states = params
        .iter()
        .filter(|(k, v)| k == "estado" && !v.trim().is_empty())
        .map(|(_, v)| v.clone());
    let voltages = params
        .iter()
        .filter(|(k, v)| k == "voltagem" && !v.trim().is_empty())
        .map(|(_, v)| VoltageClass::parse(v));
    Selection::all().with_states(states).with_voltages(voltages)
}

/// Query string équivalente à une sélection
pub fn selection_query(selection: &Selection) -> String {
    let mut parts: Vec<String> = selection
        .states
        .iter()
        .map(|s| format!("estado={}", encode_query(s)))
        .collect();
    parts.extend(
        selection
            .voltages
            .iter()
            .map(|v| format!("voltagem={}", encode_query(&v.to_string()))),
    );
    parts.join("&")
}

/// Formulaire des filtres et bouton d'actualisation
fn controls(table: &ConsolidatedTable, selection: &Selection, loaded_at: &str) -> String {
    let mut out = String::new();
    out.push_str("<section class=\"controls\">\n<h2>🔍 Filtros</h2>\n<form method=\"get\" action=\"/\">\n");

    out.push_str("<fieldset><legend>Estados</legend>\n");
    for uf in table.states() {
        let checked = if selection.states.contains(&uf) { " checked" } else { "" };
        let uf = escape_html(&uf);
        out.push_str(&format!(
            "  <label><input type=\"checkbox\" name=\"estado\" value=\"{uf}\"{checked} /> {uf}</label>\n"
        ));
    }
    out.push_str("</fieldset>\n<fieldset><legend>Voltagens (kV)</legend>\n");
    let voltages: BTreeSet<VoltageClass> = table.specific().map(|r| r.voltage.clone()).collect();
    for v in &voltages {
        let checked = if selection.voltages.contains(v) { " checked" } else { "" };
        let v = escape_html(&v.to_string());
        out.push_str(&format!(
            "  <label><input type=\"checkbox\" name=\"voltagem\" value=\"{v}\"{checked} /> {v} kV</label>\n"
        ));
    }
    out.push_str("</fieldset>\n<button class=\"btn\" type=\"submit\">Aplicar filtros</button> <a class=\"btn\" href=\"/\">Limpar</a>\n</form>\n");

    out.push_str(&format!(
        "<form method=\"post\" action=\"/refresh\"><button class=\"btn\" type=\"submit\">🔄 Atualizar dados</button> <small>Dados carregados em {}</small></form>\n",
        escape_html(loaded_at)
    ));
    out.push_str("</section>\n");
    out
}

async fn dashboard(
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Html<String> {
    reload_if_changed(&state).await;
    let data = state.data.read().await;

    let selection = selection_from_query(&params);
    let filtered = data.table.select(&selection);
    let query = selection_query(&selection);
    let suffix = if query.is_empty() {
        String::new()
    } else {
        format!("?{}", query)
    };

    let extras = DashboardExtras {
        controls: Some(controls(&data.table, &selection, &data.loaded_at)),
        notice: data.error.clone(),
        downloads: vec![
            (
                format!("/download/{}{}", CONSOLIDATED_DOWNLOAD, suffix),
                format!("📥 {}", CONSOLIDATED_DOWNLOAD),
            ),
            (
                format!("/download/{}{}", MULTI_LINE_DOWNLOAD, suffix),
                format!("📥 {}", MULTI_LINE_DOWNLOAD),
            ),
        ],
    };
    Html(html::render_dashboard(
        &filtered,
        &state.ws.config,
        &data.loaded_at,
        &extras,
    ))
}

fn csv_response(name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn download(
    AxumPath(name): AxumPath<String>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    reload_if_changed(&state).await;
    let data = state.data.read().await;
    let filtered = data.table.select(&selection_from_query(&params));

    let bytes = match name.as_str() {
        CONSOLIDATED_DOWNLOAD => {
            csv_export::to_bytes(&CONSOLIDATED_HEADERS, csv_export::consolidated_rows(&filtered))
        }
        MULTI_LINE_DOWNLOAD => {
            let rows = stats::multi_line(&filtered);
            csv_export::to_bytes(&MULTI_LINE_HEADERS, csv_export::multi_line_rows(&rows))
        }
        _ => return (StatusCode::NOT_FOUND, "arquivo desconhecido").into_response(),
    };

    match bytes {
        Ok(bytes) => csv_response(&name, bytes),
        Err(e) => {
            warn!(file = %name, error = %e, "CSV download failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "falha ao gerar o CSV").into_response()
        }
    }
}

/// Relance la consolidation ; l'erreur éventuelle est affichée en tête de page
async fn refresh(Extension(state): Extension<Arc<AppState>>) -> Redirect {
    let ws = state.ws.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut report = RunReport::new("refresh");
        pipeline::consolidate(&ws, &mut report)
    })
    .await;

    let mut data = state.data.write().await;
    match outcome {
        Ok(Ok(table)) => {
            info!(rows = table.len(), "Dashboard data refreshed");
            *data = Loaded {
                table,
                modified: modified(&state.ws),
                loaded_at: pipeline::timestamp(),
                error: None,
            };
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Refresh failed, keeping previous data");
            data.error = Some(format!("Falha ao atualizar os dados: {:#}", e));
        }
        Err(e) => {
            warn!(error = %e, "Refresh task failed");
            data.error = Some(format!("Falha ao atualizar os dados: {}", e));
        }
    }
    Redirect::to("/")
}

/// Routeur du tableau de bord
fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/download/:name", get(download))
        .route("/refresh", post(refresh))
        .layer(Extension(state))
}

/// Sert le tableau de bord jusqu'à l'arrêt du processus
pub async fn run(ws: Workspace, addr: SocketAddr) -> Result<()> {
    let initial = {
        let ws = ws.clone();
        tokio::task::spawn_blocking(move || load(&ws))
            .await
            .context("Initial load task failed")?
    };
    info!(rows = initial.table.len(), "Dashboard data loaded");

    let state = Arc::new(AppState {
        ws,
        data: RwLock::new(initial),
    });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    println!("Dashboard disponível em http://{}", addr);
    serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_selection_from_query() {
        let sel = selection_from_query(&params(&[
            ("estado", "pr"),
            ("voltagem", "500"),
            ("voltagem", ""),
            ("other", "x"),
        ]));
        assert!(sel.states.contains("PR"));
        assert_eq!(sel.voltages.len(), 1);
        assert!(sel.voltages.contains(&VoltageClass::Kv(500)));
    }

    #[test]
    fn test_selection_query_round_trip() {
        let sel = Selection::all()
            .with_states(["SC", "PR"])
            .with_voltages([VoltageClass::Kv(600)]);
        let query = selection_query(&sel);
        assert_eq!(query, "estado=PR&estado=SC&voltagem=600");
        assert!(selection_query(&Selection::all()).is_empty());
    }

    #[test]
    fn test_controls_marks_selection() {
        use crate::aggregate::Affectation;
        let table = ConsolidatedTable::from_rows(vec![
            Affectation::new("Cascavel", None, VoltageClass::Kv(500), "PR"),
            Affectation::new("Chapecó", None, VoltageClass::Kv(525), "SC"),
        ]);
        let sel = Selection::all().with_states(["SC"]);
        let html = controls(&table, &sel, "2026-01-01 10:00");
        assert!(html.contains("value=\"SC\" checked"));
        assert!(!html.contains("value=\"PR\" checked"));
        assert!(html.contains("value=\"525\""));
        assert!(html.contains("action=\"/refresh\""));
    }

    #[test]
    fn test_controls_escape_voltage_values() {
        use crate::aggregate::Affectation;
        let table = ConsolidatedTable::from_rows(vec![Affectation::new(
            "Cascavel",
            None,
            VoltageClass::Other("\"><script>x</script>".to_string()),
            "PR",
        )]);
        let html = controls(&table, &Selection::all(), "2026-01-01 10:00");
        assert!(!html.contains("<script>"));
        assert!(html.contains("value=\"&quot;&gt;&lt;script&gt;"));
    }
}
