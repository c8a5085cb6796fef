use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use crate::simulation::SimulationReport;

pub fn generate_console_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    let plan = &report.plan;
    let sessions = &report.sessions;
    let stats = &report.stats;

    writeln!(out)?;
    writeln!(out, "{}", "📊 Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    writeln!(out, "Banner: {} ({})", report.banner_name.bold(), plan.banner)?;
    writeln!(
        out,
        "Players: {}  Sessions: {}  Draws/session: {}  Seed: {}",
        plan.players, plan.sessions, plan.draws, plan.seed
    )?;
    writeln!(out, "Elapsed: {} ms", report.elapsed_ms)?;
    writeln!(out)?;

    writeln!(out, "Succeeded: {}", sessions.succeeded.to_string().green())?;
    writeln!(out, "Refunded: {}", sessions.refunded.to_string().yellow())?;
    writeln!(out, "Failed: {}", sessions.failed.to_string().red())?;
    if sessions.refund_failed > 0 {
        writeln!(
            out,
            "Refund failed: {}",
            sessions.refund_failed.to_string().red().bold()
        )?;
    }
    if sessions.conflicts > 0 {
        writeln!(out, "Lock conflicts: {}", sessions.conflicts)?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "🎲 Rarity Distribution".bright_yellow().bold())?;
    writeln!(out, "{}", "======================".yellow())?;
    writeln!(
        out,
        "{:<10} {:>8} {:>10} {:>10}",
        "Rarity", "Count", "Observed", "Configured"
    )?;
    for row in &report.rarities {
        writeln!(
            out,
            "{:<10} {:>8} {:>9.2}% {:>9.2}%",
            row.rarity.to_string(),
            row.count,
            row.observed * 100.0,
            row.expected * 100.0
        )?;
    }
    writeln!(out, "Total draws: {}", stats.draws)?;
    writeln!(
        out,
        "Longest legendary drought: {} (pity {})",
        stats.longest_legendary_drought, report.pity.legendary
    )?;
    writeln!(
        out,
        "Longest epic drought: {} (pity {})",
        stats.longest_epic_drought, report.pity.epic
    )?;
    writeln!(out, "Wishlist hits: {}", stats.wishlist_hits)?;
    writeln!(
        out,
        "New heroes: {}  Fragments: {}",
        stats.new_items, stats.fragments
    )?;
    if stats.bonus_drops > 0 {
        let totals: Vec<String> = stats
            .bonus_totals
            .iter()
            .map(|(kind, amount)| format!("{amount} {kind}"))
            .collect();
        writeln!(
            out,
            "Bonus drops: {} ({})",
            stats.bonus_drops,
            totals.join(", ")
        )?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "🏦 Ledger".bright_cyan().bold())?;
    writeln!(out, "{}", "=========".cyan())?;
    let ledger = &report.ledger;
    let status = if ledger.is_consistent() {
        "✅ consistent".green()
    } else {
        "❌ inconsistent".red()
    };
    writeln!(
        out,
        "{status} ({} players, {} open holds)",
        ledger.players_checked, ledger.open_holds
    )?;
    writeln!(out)?;

    if report.passed() {
        writeln!(out, "{}", "✅ All invariants hold".green().bold())?;
    } else {
        writeln!(out, "{}", "❌ Invariant violations".red().bold())?;
        for violation in &report.violations {
            writeln!(out, "   • {}", violation.red())?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_csv_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out, "banner,rarity,count,observed,configured")?;
    for row in &report.rarities {
        writeln!(
            out,
            "{},{},{},{:.6},{:.6}",
            report.plan.banner, row.rarity, row.count, row.observed, row.expected
        )?;
    }
    Ok(())
}
