//! Rendus : graphique PNG (plotters), pages HTML (Plotly), cartes Leaflet

pub mod chart;
pub mod html;
pub mod maps;
pub mod plotly;

pub use html::ReportKind;

/// Échappe le texte inséré dans du HTML ou du XML
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Encode un composant d'URL (recherche Google Maps)
pub fn encode_query(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            b => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Lien de recherche Google Maps pour une commune
pub fn maps_link(municipality: &str, state: &str) -> String {
    format!(
        "https://www.google.com/maps/search/?api=1&query={}+{}+Brasil",
        encode_query(municipality),
        encode_query(state)
    )
}
