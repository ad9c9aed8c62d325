//! Data layer for the column pipeline
//!
//! Schema snapshots, persisted column configuration and the collaborators
//! (row source, config store) the grid talks to.

pub mod column_config;
pub mod column_reconciler;
pub mod column_resolver;
pub mod config_store;
pub mod row_source;
pub mod schema;
pub mod sort_spec;
