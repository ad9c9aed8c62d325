use thiserror::Error;

use crate::data::sort_spec::ColumnSort;

/// Errors raised by the column pipeline and the sort coordinator.
///
/// Geometry and gesture problems never show up here: the virtualization
/// engine and the gesture controllers absorb them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("table '{0}' not found in schema")]
    TableNotFound(String),

    /// Reported alongside a reconciliation, never returned as `Err`
    #[error("column configuration for '{table}' does not match schema: {detail}")]
    SchemaMismatch { table: String, detail: String },

    #[error("sort rejected by data source: {reason}")]
    SortValidation {
        proposed: Vec<ColumnSort>,
        reason: String,
    },

    #[error("column '{column}' has {choices} visible sub-columns, pick one to sort by")]
    SortNeedsSubColumn { column: String, choices: usize },

    #[error("failed to persist column configuration: {0}")]
    Persistence(String),
}

pub type GridResult<T> = std::result::Result<T, GridError>;
