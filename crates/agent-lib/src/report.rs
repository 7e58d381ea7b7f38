//! Report rendering and persistence

use crate::error::ReportError;
use crate::summary::Summary;
use chrono::{Local, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

const RULE_WIDTH: usize = 50;
const REPORT_TITLE: &str = "SRE Automation Agent - System Report";

/// Output format for saved reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "text",
        }
    }
}

/// Render a summary as the fixed-layout text report
pub fn render_text(summary: &Summary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{REPORT_TITLE}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Timestamp: {}",
        summary.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(
        out,
        "Overall Status: {}",
        summary.overall_status.to_string().to_uppercase()
    );
    let _ = writeln!(out);

    let metrics = &summary.metrics_summary;

    for (label, entry) in [("CPU", &metrics.cpu), ("Memory", &metrics.memory)] {
        if let Some(entry) = entry {
            let _ = writeln!(out, "{label}:");
            let _ = writeln!(out, "  Usage: {:.2}%", entry.usage);
            let _ = writeln!(out, "  Status: {}", entry.status);
            let _ = writeln!(out, "  Threshold: {}%", entry.threshold);
            let _ = writeln!(out);
        }
    }

    if let Some(disks) = &metrics.disk {
        let _ = writeln!(out, "Disk:");
        for disk in disks {
            let _ = writeln!(out, "  {}:", disk.mountpoint);
            let _ = writeln!(out, "    Usage: {:.2}%", disk.usage);
            let _ = writeln!(out, "    Status: {}", disk.status);
            let _ = writeln!(out, "    Threshold: {}%", disk.threshold);
        }
        let _ = writeln!(out);
    }

    if let Some(services) = &metrics.services {
        let _ = writeln!(out, "Services:");
        for service in services {
            let _ = writeln!(
                out,
                "  {}: {} ({} process{})",
                service.name,
                service.state,
                service.process_count,
                if service.process_count == 1 { "" } else { "es" }
            );
        }
        let _ = writeln!(out);
    }

    if let Some(alerts) = &summary.alerts {
        let _ = writeln!(out, "Alerts:");
        let _ = writeln!(out, "  Total: {}", alerts.count);
        let _ = writeln!(out, "  High Severity: {}", alerts.high_severity);
        let _ = writeln!(out, "  Medium Severity: {}", alerts.medium_severity);
        let _ = writeln!(out);
    }

    out.push_str(&rule);
    out
}

/// Render a summary as pretty-printed JSON
pub fn render_json(summary: &Summary) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Default report file name, stamped with the local wall-clock time
pub fn default_filename(format: ReportFormat) -> String {
    timestamped_filename(format, Local::now().naive_local())
}

/// Report file name for the wall-clock time `at`
pub fn timestamped_filename(format: ReportFormat, at: NaiveDateTime) -> String {
    format!(
        "sre_report_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Writes rendered reports into an output directory
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render and write `summary`, returning the written path
    ///
    /// `filename` is resolved against the output directory; a timestamped
    /// name is used when it is `None`.
    pub fn save(
        &self,
        summary: &Summary,
        filename: Option<&str>,
        format: ReportFormat,
    ) -> Result<PathBuf, ReportError> {
        let contents = match format {
            ReportFormat::Json => render_json(summary)?,
            ReportFormat::Text => render_text(summary),
        };

        let name = filename
            .map(str::to_string)
            .unwrap_or_else(|| default_filename(format));
        let path = self.output_dir.join(name);

        let write_err = |source: std::io::Error| ReportError::Write {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.output_dir).map_err(write_err)?;
        std::fs::write(&path, contents).map_err(write_err)?;

        info!(path = %path.display(), format = format.extension(), "Report saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertManager;
    use crate::classify::Thresholds;
    use crate::models::{MetricKind, Reading, SystemSnapshot};
    use crate::summary::SummaryBuilder;
    use tempfile::TempDir;

    fn summary() -> Summary {
        let thresholds = Thresholds::default();
        let snapshot = SystemSnapshot {
            cpu: thresholds.sample(Reading::new(MetricKind::Cpu, "cpu", 95.0)),
            memory: thresholds.sample(Reading::new(MetricKind::Memory, "memory", 42.126)),
            disk: vec![thresholds
                .sample(Reading::new(MetricKind::Disk, "/", 75.5))
                .unwrap()],
            ..SystemSnapshot::empty()
        };
        let alerts = AlertManager::default().process_snapshot(&snapshot).raised;
        SummaryBuilder::new().build(&snapshot, &alerts)
    }

    #[test]
    fn test_text_report_layout() {
        let text = render_text(&summary());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "=".repeat(50));
        assert_eq!(lines[1], "SRE Automation Agent - System Report");
        assert_eq!(lines[2], "=".repeat(50));
        assert!(lines[3].starts_with("Timestamp: "));
        assert_eq!(lines[4], "Overall Status: CRITICAL");
        assert_eq!(*lines.last().unwrap(), "=".repeat(50));

        assert!(text.contains("CPU:\n  Usage: 95.00%\n  Status: critical\n  Threshold: 80%"));
        assert!(text.contains("Memory:\n  Usage: 42.13%"));
        assert!(text.contains(
            "Disk:\n  /:\n    Usage: 75.50%\n    Status: warning\n    Threshold: 90%"
        ));
        assert!(text.contains("Alerts:\n  Total: 2\n  High Severity: 1\n  Medium Severity: 1"));
    }

    #[test]
    fn test_text_report_omits_empty_sections() {
        let summary = SummaryBuilder::new().build(&SystemSnapshot::empty(), &[]);
        let text = render_text(&summary);

        assert!(text.contains("Overall Status: HEALTHY"));
        assert!(!text.contains("CPU:"));
        assert!(!text.contains("Disk:"));
        assert!(!text.contains("Alerts:"));
    }

    #[test]
    fn test_save_json_report() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path());
        let summary = summary();

        let path = writer
            .save(&summary, Some("report.json"), ReportFormat::Json)
            .unwrap();

        assert_eq!(path, dir.path().join("report.json"));
        let parsed: Summary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.overall_status, summary.overall_status);
        assert_eq!(parsed.alerts.unwrap().count, 2);
    }

    #[test]
    fn test_save_uses_timestamped_name() {
        let dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"));

        let path = writer.save(&summary(), None, ReportFormat::Text).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with("sre_report_"));
        assert!(name.ends_with(".text"));
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("SRE Automation Agent - System Report"));
    }

    #[test]
    fn test_filename_uses_wall_clock_time() {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap();

        assert_eq!(
            timestamped_filename(ReportFormat::Json, at),
            "sre_report_20240305_140709.json"
        );
        assert_eq!(
            timestamped_filename(ReportFormat::Text, at),
            "sre_report_20240305_140709.text"
        );
    }
}
