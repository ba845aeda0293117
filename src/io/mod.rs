/// Trajectory CSV and cost-report JSON writers.
pub mod export;
/// Aligned input series reader.
pub mod series;

pub use export::{export_cost_json, export_csv, write_cost_json, write_csv};
pub use series::{parse_series, read_series};
