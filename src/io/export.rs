//! CSV export for the committed trajectory and JSON export for the cost report.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::accounting::CostComparison;
use crate::sim::trajectory::TrajectoryRow;

/// Column header for trajectory CSV export.
const HEADER: &str = "step,timestamp,demand_kw,converted_demand_kw,pv_available_kw,\
                       pv_used_kw,pv_surplus_kw,buy_kw,sell_kw,charge_kw,charge_stored_kw,\
                       discharge_kw,discharge_delivered_kw,soc_kwh,price,spot_price,\
                       horizon,contract_kw,status";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exports trajectory rows to a CSV file at the given path.
///
/// Writes a header row followed by one data row per committed step. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `rows` - Committed trajectory rows
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(rows: &[TrajectoryRow], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(rows, buf)
}

/// Writes trajectory rows as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(rows: &[TrajectoryRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in rows {
        wtr.write_record(&[
            r.step.to_string(),
            r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", r.demand_kw),
            format!("{:.4}", r.converted_demand_kw),
            format!("{:.4}", r.pv_available_kw),
            format!("{:.4}", r.pv_used_kw),
            format!("{:.4}", r.pv_surplus_kw),
            format!("{:.4}", r.buy_kw),
            format!("{:.4}", r.sell_kw),
            format!("{:.4}", r.charge_kw),
            format!("{:.4}", r.charge_stored_kw),
            format!("{:.4}", r.discharge_kw),
            format!("{:.4}", r.discharge_delivered_kw),
            format!("{:.4}", r.soc_kwh),
            format!("{:.4}", r.price),
            format!("{:.4}", r.spot_price),
            r.horizon.to_string(),
            format!("{:.4}", r.contract_kw),
            r.status.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the cost comparison as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if file creation, serialization or writing fails.
pub fn export_cost_json(report: &CostComparison, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_cost_json(report, io::BufWriter::new(file))
}

/// Writes the cost comparison as pretty-printed JSON to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_cost_json(report: &CostComparison, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}
