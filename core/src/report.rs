//! Rendering of probe outcomes into diagnostic text

use schema::{ProbeReport, ProbeResult};
use tracing::warn;

/// Render a single result as one line
pub fn render_result(result: &ProbeResult) -> String {
    result.message().to_string()
}

/// Render a report as text
///
/// A titled report starts with `"<title> : "` followed by one line per
/// result in report order. An untitled report (e.g. a resolution failure)
/// is just its result lines.
pub fn render(report: &ProbeReport) -> String {
    let lines: Vec<String> = report.results().iter().map(render_result).collect();
    match report.title() {
        Some(title) => format!("{} : \n{}", title, lines.join("\n")),
        None => lines.join("\n"),
    }
}

/// Render a report as pretty JSON, falling back to the text form
pub fn render_json(report: &ProbeReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| {
        warn!("failed to serialize report: {}", e);
        render(report)
    })
}
