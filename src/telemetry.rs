//! CSV export of per-tick aggregation results.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::aggregate::aggregator::AggregateSnapshot;
use crate::aggregate::trend::TrendDirection;

/// Schema v1 column header for CSV telemetry export.
pub const TELEMETRY_SCHEMA_V1_HEADER: &str = "tick,timestamp,usage_kw,usage_trend,\
                                              todays_cost,cost_trend,monthly_kwh,monthly_trend,\
                                              co2_saved_kg,co2_trend,active_devices";

/// One exported row, capturing a snapshot plus registry context.
#[derive(Clone, Debug)]
pub struct TelemetryRow {
    pub tick: usize,
    pub timestamp: DateTime<Utc>,
    pub usage_kw: f32,
    pub usage_trend: TrendDirection,
    pub todays_cost: f32,
    pub cost_trend: TrendDirection,
    pub monthly_kwh: f32,
    pub monthly_trend: TrendDirection,
    pub co2_saved_kg: f32,
    pub co2_trend: TrendDirection,
    pub active_devices: usize,
}

impl TelemetryRow {
    /// Builds a row from one tick's snapshot.
    pub fn from_snapshot(tick: usize, snapshot: &AggregateSnapshot, active_devices: usize) -> Self {
        Self {
            tick,
            timestamp: snapshot.timestamp,
            usage_kw: snapshot.current_usage.value,
            usage_trend: snapshot.current_usage.trend,
            todays_cost: snapshot.todays_cost.value,
            cost_trend: snapshot.todays_cost.trend,
            monthly_kwh: snapshot.monthly_usage.value,
            monthly_trend: snapshot.monthly_usage.trend,
            co2_saved_kg: snapshot.co2_saved.value,
            co2_trend: snapshot.co2_saved.trend,
            active_devices,
        }
    }
}

/// Writes telemetry rows as CSV to any writer.
///
/// Writes a header row followed by one data row per tick using the schema
/// v1 column layout. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(rows: &[TelemetryRow], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    // Header
    wtr.write_record(TELEMETRY_SCHEMA_V1_HEADER.split(',').map(str::trim))?;

    // Data rows
    for r in rows {
        wtr.write_record(&[
            r.tick.to_string(),
            r.timestamp.to_rfc3339(),
            format!("{:.4}", r.usage_kw),
            r.usage_trend.label().to_string(),
            format!("{:.4}", r.todays_cost),
            r.cost_trend.label().to_string(),
            format!("{:.4}", r.monthly_kwh),
            r.monthly_trend.label().to_string(),
            format!("{:.4}", r.co2_saved_kg),
            r.co2_trend.label().to_string(),
            r.active_devices.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports telemetry rows to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(rows: &[TelemetryRow], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = BufWriter::new(file);
    write_csv(rows, buf)
}
