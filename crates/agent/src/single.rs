//! Output of a single monitoring check

use agent_lib::report::{render_text, ReportFormat, ReportWriter};
use agent_lib::summary::Summary;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::error;

/// Print the text report to `out` and save it through `writer`
///
/// JSON is always saved; `save_text` also saves the text report. A report
/// that cannot be saved is logged and skipped. Returns the written paths.
pub fn emit_reports(
    out: &mut impl Write,
    summary: &Summary,
    writer: &ReportWriter,
    save_text: bool,
) -> io::Result<Vec<PathBuf>> {
    writeln!(out, "{}", render_text(summary))?;

    let formats: &[ReportFormat] = if save_text {
        &[ReportFormat::Text, ReportFormat::Json]
    } else {
        &[ReportFormat::Json]
    };

    let mut saved = Vec::with_capacity(formats.len());
    for &format in formats {
        match writer.save(summary, None, format) {
            Ok(path) => {
                writeln!(out, "Report saved to: {}", path.display())?;
                saved.push(path);
            }
            Err(e) => error!(error = %e, format = format.extension(), "Failed to save report"),
        }
    }

    Ok(saved)
}
