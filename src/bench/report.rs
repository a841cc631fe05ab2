//! Report generation for benchmark results.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::ScenarioResult;
use crate::error::{BenchError, Result};
use crate::logging::LoggingThreshold;

/// Pass/fail flag of one report entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(reason) => Some(reason),
        }
    }
}

/// One scenario's line in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub label: String,
    pub threshold: LoggingThreshold,
    pub baseline: bool,
    /// Missing when the scenario did not complete
    pub result: Option<ScenarioResult>,
    pub verdict: Verdict,
}

impl ReportEntry {
    pub fn ratio(&self) -> Option<f64> {
        self.result.as_ref().and_then(|r| r.ratio_to_baseline)
    }
}

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub cv_threshold: f64,
    /// Entries in execution order
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new(cv_threshold: f64, entries: Vec<ReportEntry>) -> Self {
        Self {
            generated_at: Utc::now(),
            cv_threshold,
            entries,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.verdict.is_pass())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.verdict.is_pass())
    }

    /// Entries fastest first; scenarios without statistics go last
    pub fn ordered(&self) -> Vec<&ReportEntry> {
        let mut entries: Vec<&ReportEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| match (&a.result, &b.result) {
            (Some(a), Some(b)) => a.mean.cmp(&b.mean),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        entries
    }

    /// Export the report as JSON, entries fastest first
    pub fn to_json(&self) -> Result<String> {
        let ordered = Report {
            generated_at: self.generated_at,
            cv_threshold: self.cv_threshold,
            entries: self.ordered().into_iter().cloned().collect(),
        };
        serde_json::to_string_pretty(&ordered)
            .map_err(|e| BenchError::Internal(anyhow::anyhow!("Failed to serialize report: {}", e)))
    }
}

/// Renders a [`Report`] as an ASCII table
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSink {
    /// Add the ops/s and allocation columns
    pub detailed: bool,
}

impl ReportSink {
    pub fn new(detailed: bool) -> Self {
        Self { detailed }
    }

    /// Format the report; pure, the caller decides where it goes
    pub fn render(&self, report: &Report) -> String {
        let mut out = String::new();
        let mut header = vec![
            "Scenario", "Mean(us)", "StdDev(us)", "Min(us)", "Max(us)", "N", "Ratio", "Result",
        ];
        if self.detailed {
            header.extend(["Ops/s", "Alloc(B)"]);
        }

        let rows: Vec<Vec<String>> = report
            .ordered()
            .into_iter()
            .map(|entry| self.row(entry))
            .collect();

        let widths: Vec<usize> = header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                rows.iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let _ = writeln!(out);
        let _ = writeln!(out, "GATEWAY LOGGING THRESHOLD BENCHMARK");
        let _ = writeln!(out, "{}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", border(&widths, '┌', '┬', '┐'));
        let _ = writeln!(out, "{}", line(&widths, header.iter().map(|h| h.to_string())));
        let _ = writeln!(out, "{}", border(&widths, '├', '┼', '┤'));
        for row in rows {
            let _ = writeln!(out, "{}", line(&widths, row.into_iter()));
        }
        let _ = writeln!(out, "{}", border(&widths, '└', '┴', '┘'));

        let failures: Vec<&ReportEntry> = report.failures().collect();
        if !failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            for entry in failures {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    entry.label,
                    entry.verdict.reason().unwrap_or_default()
                );
            }
        }
        out
    }

    /// Render and write to a file
    pub fn write_to(&self, report: &Report, path: &Path, json: bool) -> Result<()> {
        let content = if json {
            report.to_json()?
        } else {
            self.render(report)
        };
        std::fs::write(path, content).map_err(|source| BenchError::Sink {
            path: path.to_path_buf(),
            source,
        })
    }

    fn row(&self, entry: &ReportEntry) -> Vec<String> {
        let label = if entry.baseline {
            format!("{} (baseline)", entry.label)
        } else {
            entry.label.clone()
        };
        let verdict = if entry.verdict.is_pass() { "PASS" } else { "FAIL" };

        let mut row = vec![label];
        match &entry.result {
            Some(r) => {
                row.extend([
                    format!("{:.1}", micros(r.mean)),
                    format!("{:.1}", micros(r.std_dev)),
                    format!("{:.1}", micros(r.min)),
                    format!("{:.1}", micros(r.max)),
                    r.sample_count.to_string(),
                    entry
                        .ratio()
                        .map(|ratio| format!("{:.2}", ratio))
                        .unwrap_or_else(|| "-".to_string()),
                    verdict.to_string(),
                ]);
                if self.detailed {
                    row.push(format!("{:.0}", r.ops_per_sec()));
                    row.push(
                        r.mean_allocated_bytes
                            .map(|b| format!("{:.0}", b))
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
            None => {
                row.extend(std::iter::repeat("-".to_string()).take(6));
                row.push(verdict.to_string());
                if self.detailed {
                    row.extend(["-".to_string(), "-".to_string()]);
                }
            }
        }
        row
    }
}

fn micros(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1_000_000.0
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}", left, cells.join(&mid.to_string()), right)
}

fn line(widths: &[usize], cells: impl Iterator<Item = String>) -> String {
    let cells: Vec<String> = cells
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, &width))| {
            if i == 0 {
                format!(" {:<width$} ", cell, width = width)
            } else {
                format!(" {:>width$} ", cell, width = width)
            }
        })
        .collect();
    format!("│{}│", cells.join("│"))
}
