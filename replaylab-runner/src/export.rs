//! Run output persistence: equity table CSV, report JSON, summary text.
//!
//! Artifacts are written wholesale once the replay has finished:
//! - `equity.csv`: one row per holdings snapshot
//! - `report.json`: the `RunReport` (metadata plus performance report)
//! - `summary.txt`: `Key: value` lines, one per statistic

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use replaylab_core::engine::EquityTable;

use crate::runner::{ReplayResult, RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunReport` to pretty JSON.
pub fn export_report_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_report_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the equity table as CSV.
///
/// Columns: datetime, one per instrument (market value), cash,
/// trade_fee_cumulative, total, returns, equity_curve, drawdown
pub fn export_equity_csv(table: &EquityTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["datetime".to_string()];
    header.extend(table.symbols.iter().cloned());
    header.extend(
        [
            "cash",
            "trade_fee_cumulative",
            "total",
            "returns",
            "equity_curve",
            "drawdown",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.push(row.cash.to_string());
        record.push(row.trade_fee_cumulative.to_string());
        record.push(row.total.to_string());
        record.push(row.returns.to_string());
        record.push(row.equity_curve.to_string());
        record.push(row.drawdown.to_string());
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Summary text ───────────────────────────────────────────────────

/// `Key: value` summary, one statistic per line.
pub fn export_summary(report: &RunReport) -> String {
    let mut out = String::with_capacity(512);
    for (key, value) in report.performance.summary_lines() {
        out.push_str(&format!("{key}: {value}\n"));
    }
    out.push_str(&format!("Signals: {}\n", report.stats.signals));
    out.push_str(&format!("Orders: {}\n", report.stats.orders));
    out.push_str(&format!("Fills: {}\n", report.stats.fills));
    if report.has_synthetic {
        out.push_str("Data: SYNTHETIC\n");
    }
    out
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one replay.
///
/// Creates `{run_id[..12]}/` under `output_dir` containing `equity.csv`,
/// `report.json` and `summary.txt`. Returns the created directory.
pub fn save_artifacts(result: &ReplayResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(short_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let equity_csv = export_equity_csv(&result.equity)?;
    let equity_path = run_dir.join("equity.csv");
    std::fs::write(&equity_path, equity_csv)
        .with_context(|| format!("failed to write {}", equity_path.display()))?;

    let json = export_report_json(&result.report)?;
    let report_path = run_dir.join("report.json");
    std::fs::write(&report_path, json)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    let summary_path = run_dir.join("summary.txt");
    std::fs::write(&summary_path, export_summary(&result.report))
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    Ok(run_dir)
}

/// Load a `RunReport` from an artifact directory.
pub fn load_report(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_report_json(&json)
}
