//! Where completed sessions go: a Monday.com board, or the log when no
//! board is configured.

pub mod columns;
pub mod log_sink;
pub mod monday;

use std::sync::Arc;

use anyhow::Result;
use docintake_core::WorkbookSink;
use docintake_config::WorkbookConfig;
use tracing::info;

pub use columns::{column_values, expand_make_model, item_name, normalize_date};
pub use log_sink::LogOnlySink;
pub use monday::MondaySink;

/// The sink named by config.
pub fn sink_from_config(config: Option<&WorkbookConfig>) -> Result<Arc<dyn WorkbookSink>> {
    match config {
        Some(workbook) => {
            let sink = MondaySink::from_config(workbook)?;
            info!(url = workbook.api_url(), "Submitting completed sessions to Monday.com");
            Ok(Arc::new(sink))
        }
        None => {
            info!("No workbook configured; completed sessions will only be logged");
            Ok(Arc::new(LogOnlySink))
        }
    }
}
