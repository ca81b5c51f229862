//! Output formatters for audit results

use crate::results::{Impact, RuleResult, RunResult};
use std::io::{self, Write};

fn impact_colored(impact: Impact) -> String {
    let color = match impact {
        Impact::Critical => "\x1b[1;31m",
        Impact::Serious => "\x1b[31m",
        Impact::Moderate => "\x1b[1;33m",
        Impact::Minor => "\x1b[1;36m",
    };
    format!("{color}{}\x1b[0m", impact.as_str())
}

/// Serialize a run result as pretty JSON (the wire shape the dashboard
/// consumes)
pub fn format_json(result: &RunResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Print a run result in human-readable text format
pub fn print_text(result: &RunResult, verbose: bool) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write_text(&mut handle, result, verbose);
}

fn write_text(out: &mut impl Write, result: &RunResult, verbose: bool) -> io::Result<()> {
    if let Some(ref url) = result.url {
        writeln!(out, "Análise de {url} ({} modo)", mode_label(result))?;
        writeln!(out)?;
    }

    write_section(out, "Violações", &result.violations, true)?;
    write_section(out, "Incompletos", &result.incomplete, true)?;
    if verbose {
        write_section(out, "Passaram", &result.passes, false)?;
        write_section(out, "Inaplicáveis", &result.inapplicable, false)?;
    } else {
        writeln!(
            out,
            "Passaram: {} regra(s), Inaplicáveis: {} regra(s)",
            result.passes.len(),
            result.inapplicable.len()
        )?;
    }
    Ok(())
}

fn mode_label(result: &RunResult) -> &'static str {
    match result.mode {
        crate::rules::Mode::Emag => "emag",
        crate::rules::Mode::Wcag => "wcag",
        crate::rules::Mode::Both => "both",
    }
}

fn write_section(
    out: &mut impl Write,
    title: &str,
    rules: &[RuleResult],
    detailed: bool,
) -> io::Result<()> {
    if rules.is_empty() {
        return Ok(());
    }
    writeln!(out, "{title} ({}):", rules.len())?;
    for rule in rules {
        writeln!(
            out,
            "  {}[{}]: {}",
            impact_colored(rule.impact),
            rule.id,
            rule.help
        )?;
        if detailed {
            for node in &rule.nodes {
                writeln!(out, "    \x1b[1;34m-->\x1b[0m {}", node.target)?;
                if let Some(ref summary) = node.failure_summary {
                    for line in summary.lines() {
                        writeln!(out, "        {line}")?;
                    }
                }
            }
            writeln!(out, "    \x1b[1;34m=\x1b[0m ajuda: {}", rule.help_url)?;
        }
        if let Some(ref diagnostic) = rule.diagnostic {
            writeln!(out, "    diagnóstico: {diagnostic}")?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Print the end-of-run summary counts
pub fn print_statistics(result: &RunResult) {
    let stats = result.statistics();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let _ = writeln!(out, "Resumo:");
    let _ = writeln!(
        out,
        "  {} violação(ões) em {} nó(s), {} incompleta(s), {} passou(aram), {} inaplicável(eis)",
        stats.violations,
        stats.violation_nodes,
        stats.incomplete,
        stats.passes,
        stats.inapplicable
    );
    let mut impacts: Vec<_> = stats.per_impact.iter().collect();
    impacts.sort_by(|a, b| b.0.cmp(a.0));
    for (impact, count) in impacts {
        let _ = writeln!(out, "  {}: {count}", impact_colored(*impact));
    }
}
