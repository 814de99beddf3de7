//! Console summaries of mirror and validation runs

use crate::mirror::MirrorResult;
use crate::state::{AssetStatus, PageStatus};
use crate::validate::{Severity, ValidationReport};
use std::fmt::Write;

/// Formats a mirror run for the console
pub fn format_mirror_summary(result: &MirrorResult) -> String {
    let mut out = String::new();
    let total = result.pages.len();

    let _ = writeln!(out, "=== Mirror Summary ===\n");
    let _ = writeln!(out, "Pages ({}):", total);
    for (status, count) in result.status_counts() {
        let share = if total > 0 {
            count as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, share);
    }

    let failed: Vec<_> = result
        .pages
        .iter()
        .filter(|p| p.status.is_error())
        .collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nFailed Pages ({}):", failed.len());
        for page in failed {
            let _ = writeln!(
                out,
                "  - {} [{}]: {}",
                page.name,
                page.status,
                page.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let count = |status| result.assets.iter().filter(|a| a.status == status).count();
    let _ = writeln!(out, "\nAssets ({}):", result.assets.len());
    let _ = writeln!(out, "  Stored: {}", count(AssetStatus::Stored));
    let _ = writeln!(out, "  Reused: {}", count(AssetStatus::Reused));
    let _ = writeln!(out, "  Missing: {}", count(AssetStatus::Missing));
    let _ = writeln!(out, "  Downloads: {}", result.downloads);

    let persisted = result.count(PageStatus::Persisted);
    let _ = writeln!(
        out,
        "\nSuccess Rate: {:.1}% ({} / {} pages persisted)",
        if total > 0 {
            persisted as f64 * 100.0 / total as f64
        } else {
            0.0
        },
        persisted,
        total
    );
    if result.cancelled {
        let _ = writeln!(out, "Run was cancelled before every page was dispatched");
    }

    out
}

/// Formats a validation report for the console
pub fn format_validation_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    let stats = &report.statistics;

    let _ = writeln!(out, "=== Validation Report ===\n");
    let _ = writeln!(out, "Origin: {}", report.origin_base);
    let _ = writeln!(out, "Mirror: {}\n", report.mirror_root);

    let _ = writeln!(out, "Scores:");
    let _ = writeln!(out, "  Accessibility:      {:>5.1}", report.scores.accessibility);
    let _ = writeln!(out, "  Link integrity:     {:>5.1}", report.scores.link_integrity);
    let _ = writeln!(out, "  Asset completeness: {:>5.1}", report.scores.asset_completeness);
    let _ = writeln!(out, "  Content fidelity:   {:>5.1}", report.scores.content_fidelity);
    let _ = writeln!(
        out,
        "  Overall:            {:>5.1} ({})\n",
        report.overall_score, report.readiness
    );

    let _ = writeln!(out, "Statistics:");
    let _ = writeln!(
        out,
        "  Pages: {} ({} sampled, {} scored, {} excluded)",
        stats.pages, stats.sampled, stats.scored, stats.excluded
    );
    let _ = writeln!(out, "  Links: {} ({} broken)", stats.links, stats.broken_links);
    let _ = writeln!(out, "  Images: {} ({} missing)", stats.images, stats.missing_images);
    let _ = writeln!(
        out,
        "  Asset files: {} ({} duplicates, {} unreferenced)",
        stats.asset_files, stats.duplicate_files, stats.unreferenced_files
    );
    let _ = writeln!(
        out,
        "  Image maps: {} pages, {} areas ({} malformed, {} dangling usemaps)",
        stats.pages_with_maps, stats.map_areas, stats.malformed_areas, stats.dangling_usemaps
    );

    for severity in [Severity::High, Severity::Medium, Severity::Info] {
        let findings: Vec<_> = report.findings_with(severity).collect();
        if findings.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{} Findings ({}):", severity, findings.len());
        for finding in findings {
            match &finding.subject_page {
                Some(page) => {
                    let _ = writeln!(out, "  - [{}] {}: {}", finding.category, page, finding.message);
                }
                None => {
                    let _ = writeln!(out, "  - [{}] {}", finding.category, finding.message);
                }
            }
        }
    }

    out
}

/// Prints a mirror run summary to stdout
pub fn print_mirror_summary(result: &MirrorResult) {
    print!("{}", format_mirror_summary(result));
}

/// Prints a validation report to stdout
pub fn print_validation_report(report: &ValidationReport) {
    print!("{}", format_validation_report(report));
}
