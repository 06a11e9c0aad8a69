//! Sorties console : résumé de consolidation et statistiques détaillées
//!
//! Le texte est construit en mémoire puis affiché par l'appelant.

use std::fmt::{self, Write};

use crate::aggregate::stats::{self, MultiLineRow};
use crate::aggregate::{ConsolidatedTable, Summary};
use crate::config::Config;

fn banner(out: &mut impl Write, title: &str) -> fmt::Result {
    writeln!(out, "{}", "=".repeat(80))?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(80))
}

fn top_rows(out: &mut impl Write, rows: &[MultiLineRow], n: usize) -> fmt::Result {
    for r in rows.iter().take(n) {
        writeln!(
            out,
            "  {}x - {} ({}): {} kV",
            r.lines,
            r.municipality,
            r.state,
            r.voltages_label()
        )?;
    }
    Ok(())
}

/// Résumé affiché après `consolidate` et `analyze`
pub fn consolidation_summary(out: &mut impl Write, summary: &Summary, config: &Config) -> fmt::Result {
    writeln!(out)?;
    banner(
        out,
        &format!("ANÁLISE CONSOLIDADA - LINHAS DE TRANSMISSÃO {}", config.origin_municipality.to_uppercase()),
    )?;

    writeln!(out, "\nRESUMO GERAL")?;
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "📊 Total de registros: {}", summary.total_records)?;
    writeln!(out, "🏘️  Municípios únicos afetados: {}", summary.unique_municipalities)?;
    writeln!(out, "⚡ Linhas de transmissão diferentes: {}", summary.distinct_lines)?;
    writeln!(out, "🗺️  Estados cobertos: {}", summary.states.join(", "))?;

    writeln!(out, "\nMUNICÍPIOS POR VOLTAGEM")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for (voltage, count) in &summary.per_voltage {
        writeln!(out, "  {} kV: {} municípios", voltage, count)?;
    }

    writeln!(out, "\nMUNICÍPIOS POR ESTADO")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for (state, count) in &summary.per_state {
        writeln!(out, "  {}: {} municípios", state, count)?;
    }

    writeln!(out, "\nMUNICÍPIOS ATRAVESSADOS POR MÚLTIPLAS LINHAS")?;
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "  Total: {} municípios", summary.multi_line.len())?;
    if !summary.multi_line.is_empty() {
        writeln!(out, "\n  Top 10:")?;
        top_rows(out, &summary.multi_line, 10)?;
    }
    Ok(())
}

/// Statistiques détaillées (`stats`), lignes spécifiques uniquement
pub fn detailed_stats(out: &mut impl Write, table: &ConsolidatedTable, config: &Config) -> fmt::Result {
    let specific = ConsolidatedTable::from_rows(table.specific().cloned());
    let summary = Summary::compute(&specific);

    banner(out, "EXPLICAÇÃO: DISTRIBUIÇÃO DE LINHAS POR MUNICÍPIO")?;
    out.write_str(
        "\nEste gráfico mostra QUANTOS municípios têm 1 linha, 2 linhas, 3 linhas, etc.\n\n\
         Exemplo de interpretação:\n  \
         - Se há uma barra em '1' com valor 50, significa que 50 municípios\n    \
         são atravessados por apenas 1 linha de transmissão\n  \
         - Se há uma barra em '3' com valor 10, significa que 10 municípios\n    \
         são atravessados por 3 linhas diferentes\n\n",
    )?;
    writeln!(out, "{}", "-".repeat(80))?;
    writeln!(out, "DISTRIBUIÇÃO COMPLETA:")?;
    writeln!(out, "{}", "-".repeat(80))?;
    for (lines, count) in &summary.distribution {
        writeln!(out, "  {} municípios têm {} linha(s) de transmissão", count, lines)?;
    }
    writeln!(out)?;

    banner(out, "ESTATÍSTICAS DETALHADAS POR ESTADO")?;
    for state in &summary.states {
        let sub = ConsolidatedTable::from_rows(specific.rows().iter().filter(|r| &r.state == state).cloned());
        writeln!(out, "\n{}", "=".repeat(80))?;
        writeln!(out, "ESTADO: {}", state)?;
        writeln!(out, "{}", "=".repeat(80))?;
        writeln!(out, "\n📍 Total de municípios afetados: {}", stats::unique_municipalities(&sub))?;

        writeln!(out, "\n⚡ Municípios por voltagem:")?;
        let mut per_voltage = stats::per_voltage(&sub);
        per_voltage.sort_by(|a, b| b.1.cmp(&a.1));
        for (voltage, count) in per_voltage {
            writeln!(out, "   • {} kV: {} municípios", voltage, count)?;
        }

        let multi: Vec<&MultiLineRow> = summary.multi_line.iter().filter(|r| &r.state == state).collect();
        if !multi.is_empty() {
            writeln!(out, "\n🔄 Municípios com múltiplas linhas: {}", multi.len())?;
            writeln!(out, "\n   Top 5 municípios com mais linhas em {}:", state)?;
            for r in multi.iter().take(5) {
                writeln!(out, "   {}x - {}: {} kV", r.lines, r.municipality, r.voltages_label())?;
            }
        }

        let single = stats::lines_per_municipality(&sub)
            .iter()
            .filter(|(_, n)| *n == 1)
            .count();
        writeln!(out, "\n   Municípios com apenas 1 linha: {}", single)?;
    }
    writeln!(out)?;

    banner(out, "ESTATÍSTICAS DETALHADAS POR VOLTAGEM")?;
    for profile in stats::voltage_profiles(&specific) {
        let v = &profile.voltage;
        writeln!(out, "\n{}", "=".repeat(80))?;
        writeln!(out, "VOLTAGEM: {} kV", v)?;
        writeln!(out, "{}", "=".repeat(80))?;
        writeln!(out, "\n⚡ Total de municípios afetados: {}", profile.municipalities)?;

        writeln!(out, "\n🗺️  Distribuição por estado:")?;
        let mut per_state: Vec<(String, usize)> = profile
            .states
            .iter()
            .map(|s| (s.clone(), summary.matrix.get(s, v)))
            .collect();
        per_state.sort_by(|a, b| b.1.cmp(&a.1));
        for (state, count) in per_state {
            writeln!(out, "   • {}: {} municípios", state, count)?;
        }

        let exclusive: Vec<String> = summary
            .exclusive
            .iter()
            .find(|(ev, _)| ev == v)
            .map(|(_, keys)| keys.iter().map(|k| k.name.clone()).collect())
            .unwrap_or_default();
        writeln!(out, "\n   Municípios afetados APENAS por {} kV: {}", v, exclusive.len())?;
        if !exclusive.is_empty() {
            let examples: Vec<&str> = exclusive.iter().take(5).map(String::as_str).collect();
            writeln!(out, "   Exemplos: {}", examples.join(", "))?;
        }
    }
    writeln!(out)?;

    banner(out, "RESUMO GERAL - CRUZAMENTO DE INFORMAÇÕES")?;
    writeln!(out, "\n📊 MUNICÍPIOS MAIS IMPACTADOS (Top 10):")?;
    writeln!(out, "   (Municípios atravessados por mais linhas diferentes)\n")?;
    for r in summary.multi_line.iter().take(10) {
        writeln!(out, "   {}x - {} ({})", r.lines, r.municipality, r.state)?;
        writeln!(out, "        Voltagens: {} kV", r.voltages_label())?;
    }
    writeln!(out, "\n{}", "=".repeat(80))?;

    let origin = &config.origin_municipality;
    writeln!(out, "\n🔍 DESTAQUE: {}", origin.to_uppercase())?;
    writeln!(out, "{}", "-".repeat(80))?;
    let origin_rows: Vec<String> = specific.rows_for_name(origin).map(|r| r.line_label()).collect();
    if origin_rows.is_empty() {
        writeln!(out, "{} não aparece nos dados consolidados.", origin)?;
    } else {
        writeln!(out, "{} é atravessada por {} linhas diferentes:", origin, origin_rows.len())?;
        for label in &origin_rows {
            writeln!(out, "  • {}", label)?;
        }
        writeln!(out, "\nIsso faz sentido, pois {} é o ponto de origem!", origin)?;
    }

    writeln!(out, "\n{}", "=".repeat(80))?;
    writeln!(out, "✅ ANÁLISE COMPLETA!")?;
    writeln!(out, "{}", "=".repeat(80))
}
