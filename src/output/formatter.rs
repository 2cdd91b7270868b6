//! Output formatters for scenario reports
//!
//! Provides table, JSON, CSV and summary output formats.

use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::models::ScenarioReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format the reports of one run
    pub fn format_reports(&self, reports: &[ScenarioReport]) -> Result<String> {
        let output = match self.format {
            OutputFormat::Table => self.format_table(reports),
            OutputFormat::Json => serde_json::to_string(reports)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(reports)?,
            OutputFormat::Csv => self.format_csv(reports)?,
            OutputFormat::Summary => self.format_brief(reports),
        };
        Ok(output)
    }

    fn status(&self, report: &ScenarioReport) -> &'static str {
        match (report.is_all_passed(), self.colorize) {
            (true, true) => "\x1b[32m✓ PASS\x1b[0m",
            (false, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (true, false) => "✓ PASS",
            (false, false) => "✗ FAIL",
        }
    }

    fn format_table(&self, reports: &[ScenarioReport]) -> String {
        let mut output = String::new();

        output.push_str(
            "\n┌─────────────────────────┬─────────────────┬────────┬───────┬───────┬─────────┬────────────┐\n",
        );
        output.push_str(
            "│ Scenario                │ Group           │ Status │ Pass  │ Fail  │ Retried │ Duration   │\n",
        );
        output.push_str(
            "├─────────────────────────┼─────────────────┼────────┼───────┼───────┼─────────┼────────────┤\n",
        );

        for report in reports {
            output.push_str(&format!(
                "│ {:23} │ {:15} │ {} │ {:5} │ {:5} │ {:7} │ {:>8}ms │\n",
                truncate(&report.scenario, 23),
                truncate(&report.group, 15),
                self.status(report),
                report.passed,
                report.failed,
                report.retried,
                report.total_duration_ms
            ));
        }

        output.push_str(
            "└─────────────────────────┴─────────────────┴────────┴───────┴───────┴─────────┴────────────┘\n",
        );

        let failures: Vec<_> = reports
            .iter()
            .flat_map(|r| r.failures.iter().map(move |f| (r, f)))
            .collect();
        if !failures.is_empty() {
            output.push_str("\n Failures:\n");
            for (report, failure) in failures {
                output.push_str(&format!(
                    "   - {} #{} {} [{}]: {}\n",
                    report.scenario,
                    failure.test_number,
                    failure.description,
                    failure.correlation_id,
                    failure.error.as_deref().unwrap_or("")
                ));
            }
        }

        output.push_str(&format!("\n {}\n", self.format_brief(reports)));
        output
    }

    fn format_csv(&self, reports: &[ScenarioReport]) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        writer.write_record([
            "scenario",
            "group",
            "test_number",
            "description",
            "correlation_id",
            "retries",
            "duration_ms",
            "error",
        ])?;

        for report in reports {
            for failure in &report.failures {
                writer.write_record([
                    report.scenario.clone(),
                    report.group.clone(),
                    failure.test_number.to_string(),
                    failure.description.clone(),
                    failure.correlation_id.clone(),
                    failure.retries.to_string(),
                    failure.duration_ms.to_string(),
                    failure.error.clone().unwrap_or_default(),
                ])?;
            }
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    fn format_brief(&self, reports: &[ScenarioReport]) -> String {
        let total: usize = reports.iter().map(|r| r.total).sum();
        let passed: usize = reports.iter().map(|r| r.passed).sum();
        let duration: u64 = reports.iter().map(|r| r.total_duration_ms).sum();
        let rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64 * 100.0
        };
        format!(
            "{} scenarios: {}/{} executions passed ({:.1}%) in {}ms",
            reports.len(),
            passed,
            total,
            rate,
            duration
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}…")
    }
}

/// Write reports to a file
pub fn write_reports_to_file(
    path: impl AsRef<Path>,
    reports: &[ScenarioReport],
    format: OutputFormat,
) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_reports(reports)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
