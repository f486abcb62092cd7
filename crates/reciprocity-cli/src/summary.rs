//! Human-readable run summaries.

use colored::Colorize;
use reciprocity_reconcile::ReconcileReport;

/// Detail lines beyond this many are folded into a count.
pub const MAX_LISTED_INSERTIONS: usize = 200;

/// `(targetModel, fieldName, identity)` lines, capped.
pub fn detail_lines(report: &ReconcileReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .details
        .iter()
        .take(MAX_LISTED_INSERTIONS)
        .map(|d| {
            format!(
                "({}, {}, {})",
                d.target_model, d.field_name, d.relation_identity
            )
        })
        .collect();
    let hidden = report.details.len().saturating_sub(MAX_LISTED_INSERTIONS);
    if hidden > 0 {
        lines.push(format!("... and {hidden} more"));
    }
    lines
}

pub fn print_report(report: &ReconcileReport) {
    for line in detail_lines(report) {
        println!("  {} {}", "→".cyan(), line);
    }
    for rewrite in &report.identity_rewrites {
        println!(
            "  {} {}.{} now carries @relation(\"{}\")",
            "~".yellow(),
            rewrite.model,
            rewrite.field,
            rewrite.relation_identity
        );
    }
    for skip in &report.skipped {
        println!(
            "  {} {}.{} ({}): {}",
            "skipped".yellow().bold(),
            skip.target_model,
            skip.field_name,
            skip.relation_identity,
            skip.reason
        );
    }
    for diagnostic in &report.diagnostics {
        eprintln!("{} {}", "warning:".yellow().bold(), diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reciprocity_reconcile::InsertionDetail;

    fn report_with(n: usize) -> ReconcileReport {
        ReconcileReport {
            insertions_applied: n,
            details: (0..n)
                .map(|i| InsertionDetail {
                    target_model: "User".to_string(),
                    field_name: format!("posts{i}"),
                    relation_identity: format!("PostUserRelation{i}"),
                })
                .collect(),
            ..ReconcileReport::default()
        }
    }

    #[test]
    fn detail_lines_are_tuples() {
        let lines = detail_lines(&report_with(1));
        assert_eq!(lines, vec!["(User, posts0, PostUserRelation0)".to_string()]);
    }

    #[test]
    fn detail_lines_are_capped() {
        let lines = detail_lines(&report_with(MAX_LISTED_INSERTIONS + 5));
        assert_eq!(lines.len(), MAX_LISTED_INSERTIONS + 1);
        assert_eq!(lines.last().map(String::as_str), Some("... and 5 more"));
    }
}
