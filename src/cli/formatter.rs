/// Terminal output helpers for command results
use colored::*;

use crate::pipeline::{RunSummary, StageReport};

pub fn info_box(title: &str, items: &[String]) {
    println!("\n{} {}", "ℹ".cyan(), title.bold());
    for item in items {
        println!("  {} {}", "•".dimmed(), item);
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!(
        "\n{} {}",
        "⚠".yellow(),
        format!("Warning: {}", message).yellow()
    );
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green().bold(), message);
}

pub fn print_tip(message: &str) {
    println!("\n{} {}", "→".cyan(), format!("Tip: {}", message).dimmed());
}

/// One line per stage: name, computed and skipped units
pub fn format_stage(report: &StageReport) -> String {
    let status = if report.computed == 0 && report.skipped > 0 {
        "─".dimmed()
    } else {
        "✓".green()
    };
    format!(
        "{} {:<8} {} computed, {} skipped",
        status, report.stage, report.computed, report.skipped
    )
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("\n{} {}", "▶".cyan().bold(), "Stages".bold());
    for report in &summary.stages {
        println!("  {}", format_stage(report));
    }

    let subsampled = summary.samples.iter().filter(|s| s.is_subsampled()).count();
    info_box(
        "Run",
        &[
            format!("Engine: {} (k={})", summary.engine, summary.kmer_length),
            format!("Samples: {} ({} subsampled)", summary.samples.len(), subsampled),
            format!("Elapsed: {:.1}s", summary.elapsed_secs),
        ],
    );
    print_success(&format!("Matrix written to {}", summary.matrix_path.display()));
}
