//! Merges a persisted column configuration with the live schema.
//!
//! Stale plain columns are dropped, schema columns the configuration does not
//! know yet are appended, and nested configurations are reconciled against
//! their own target tables. The `changed` flag tells callers whether the
//! result has to be written back.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::data::column_config::{ColumnConfig, ColumnRole};
use crate::data::schema::{SchemaView, TableSchema};
use crate::error::{GridError, GridResult};

/// Result of a reconciliation run
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub columns: Vec<ColumnConfig>,
    /// True iff membership differs from the input at any nesting level
    pub changed: bool,
    /// Computed and nested entries dropped because what they reference is
    /// gone, as `GridError::SchemaMismatch`. Never fatal.
    pub mismatches: Vec<GridError>,
}

pub struct ColumnConfigReconciler<'a> {
    schema: &'a SchemaView,
}

impl<'a> ColumnConfigReconciler<'a> {
    pub fn new(schema: &'a SchemaView) -> Self {
        Self { schema }
    }

    /// Reconcile `existing` against table `table_name`.
    ///
    /// `None` means the view has never been configured; one default entry
    /// per schema column is produced.
    pub fn reconcile(
        &self,
        table_name: &str,
        existing: Option<&[ColumnConfig]>,
    ) -> GridResult<Reconciliation> {
        let table = self
            .schema
            .table(table_name)
            .ok_or_else(|| GridError::TableNotFound(table_name.to_string()))?;

        let result = self.reconcile_table(table, existing);
        debug!(target: "column_reconciler",
            "Reconciled '{}': {} columns, changed={}",
            table_name, result.columns.len(), result.changed
        );
        Ok(result)
    }

    fn reconcile_table(
        &self,
        table: &TableSchema,
        existing: Option<&[ColumnConfig]>,
    ) -> Reconciliation {
        let Some(existing) = existing else {
            return Reconciliation {
                columns: table
                    .column_names()
                    .map(ColumnConfig::default_for)
                    .collect(),
                changed: true,
                mismatches: Vec::new(),
            };
        };

        let mut changed = false;
        let mut mismatches = Vec::new();
        let mut seen: HashSet<&str> = HashSet::with_capacity(existing.len());
        let mut columns = Vec::with_capacity(existing.len().max(table.columns.len()));

        for entry in existing {
            if !seen.insert(entry.name.as_str()) {
                warn!(target: "column_reconciler",
                    "Dropping duplicate column entry '{}' in '{}'",
                    entry.name, table.name
                );
                changed = true;
                continue;
            }

            match self.reconcile_entry(table, entry, &mut mismatches) {
                Some((kept, nested_changed)) => {
                    changed |= nested_changed;
                    columns.push(kept);
                }
                None => changed = true,
            }
        }

        for info in &table.columns {
            if !columns.iter().any(|c| c.covers_stored_column(&info.name)) {
                debug!(target: "column_reconciler",
                    "Appending new schema column '{}' to '{}'",
                    info.name, table.name
                );
                columns.push(ColumnConfig::default_for(info.name.clone()));
                changed = true;
            }
        }

        Reconciliation {
            columns,
            changed,
            mismatches,
        }
    }

    /// Returns the surviving entry and whether its nested list changed
    fn reconcile_entry(
        &self,
        table: &TableSchema,
        entry: &ColumnConfig,
        mismatches: &mut Vec<GridError>,
    ) -> Option<(ColumnConfig, bool)> {
        match entry.role() {
            ColumnRole::Plain => {
                if table.has_column(&entry.name) {
                    Some((entry.clone(), false))
                } else {
                    debug!(target: "column_reconciler",
                        "Column '{}' no longer exists in '{}', dropping",
                        entry.name, table.name
                    );
                    None
                }
            }
            ColumnRole::Computed | ColumnRole::WrappedColumn => {
                let computed = entry.computed_config.as_ref()?;
                if computed.source_exists_in(table) {
                    Some((entry.clone(), false))
                } else {
                    let detail = format!(
                        "computed column '{}' references missing column {:?}",
                        entry.name, computed.column
                    );
                    mismatches.push(mismatch(table, detail));
                    None
                }
            }
            ColumnRole::Nested => {
                let nested = entry.nested.as_ref()?;
                let Some(target) = nested.target_table().and_then(|t| self.schema.table(t)) else {
                    let detail = format!(
                        "nested column '{}' targets unknown table {:?}",
                        entry.name,
                        nested.target_table()
                    );
                    mismatches.push(mismatch(table, detail));
                    return None;
                };

                let inner = self.reconcile_table(target, Some(&nested.columns));
                mismatches.extend(inner.mismatches);
                let mut kept = entry.clone();
                if let Some(kept_nested) = kept.nested.as_mut() {
                    kept_nested.columns = inner.columns;
                }
                Some((kept, inner.changed))
            }
        }
    }
}

fn mismatch(table: &TableSchema, detail: String) -> GridError {
    let error = GridError::SchemaMismatch {
        table: table.name.clone(),
        detail,
    };
    warn!(target: "column_reconciler", "{}, dropping", error);
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column_config::{ComputedConfig, FuncDef, JoinStep, NestedColumnConfig};
    use crate::data::schema::ColumnInfo;

    fn schema() -> SchemaView {
        SchemaView::new(vec![
            TableSchema::new(
                "users",
                vec![
                    ColumnInfo::new("id", "int4").primary_key(),
                    ColumnInfo::new("name", "text"),
                    ColumnInfo::new("email", "text"),
                ],
            ),
            TableSchema::new(
                "orders",
                vec![
                    ColumnInfo::new("id", "int4").primary_key(),
                    ColumnInfo::new("user_id", "int4").references("users", "id"),
                    ColumnInfo::new("total", "numeric"),
                ],
            ),
        ])
    }

    fn names(columns: &[ColumnConfig]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_defaults_when_unconfigured() {
        let schema = schema();
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", None)
            .unwrap();
        assert!(result.changed);
        assert_eq!(names(&result.columns), vec!["id", "name", "email"]);
        assert!(result.columns.iter().all(|c| c.show == Some(true)));
    }

    #[test]
    fn test_drops_stale_and_appends_new() {
        let schema = schema();
        let existing = vec![ColumnConfig::new("id"), ColumnConfig::new("old_col")];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();

        assert!(result.changed);
        assert_eq!(
            result.columns,
            vec![
                ColumnConfig::new("id"),
                ColumnConfig::default_for("name"),
                ColumnConfig::default_for("email"),
            ]
        );
    }

    #[test]
    fn test_unchanged_config_round_trips() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("email").with_width(220),
            ColumnConfig::new("id").hidden(),
            ColumnConfig::new("name"),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(!result.changed);
        assert_eq!(result.columns, existing);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let schema = schema();
        let reconciler = ColumnConfigReconciler::new(&schema);
        let existing = vec![ColumnConfig::new("old"), ColumnConfig::new("email")];
        let first = reconciler.reconcile("users", Some(&existing)).unwrap();
        let second = reconciler
            .reconcile("users", Some(&first.columns))
            .unwrap();
        assert!(!second.changed);
        assert_eq!(second.columns, first.columns);
    }

    #[test]
    fn test_computed_columns_survive_unless_source_missing() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::new("name"),
            ColumnConfig::new("email"),
            ColumnConfig::computed(
                "$countAll",
                ComputedConfig::new(FuncDef::new("$countAll", "Count", "int8").aggregate(), None),
            ),
            ColumnConfig::computed(
                "upper_name",
                ComputedConfig::new(FuncDef::new("$upper", "Upper", "text"), Some("name")),
            ),
            ColumnConfig::computed(
                "len_bio",
                ComputedConfig::new(FuncDef::new("$length", "Length", "int4"), Some("bio")),
            ),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(result.changed);
        assert_eq!(
            names(&result.columns),
            vec!["id", "name", "email", "$countAll", "upper_name"]
        );
        assert_eq!(result.mismatches.len(), 1);
        assert!(matches!(
            &result.mismatches[0],
            GridError::SchemaMismatch { table, detail } if table == "users" && detail.contains("len_bio")
        ));
    }

    #[test]
    fn test_wrapped_column_counts_as_present() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::computed(
                "name",
                ComputedConfig::new(FuncDef::new("$left", "Left", "text"), Some("name"))
                    .wrapping_column(),
            ),
            ColumnConfig::new("email"),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(!result.changed);
        assert_eq!(names(&result.columns), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_nested_recurses_into_target_table() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::new("name"),
            ColumnConfig::new("email"),
            ColumnConfig::nested(
                "orders",
                NestedColumnConfig::new(
                    vec![JoinStep::to("orders")],
                    vec![ColumnConfig::new("total"), ColumnConfig::new("discount")],
                ),
            ),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(result.changed);

        let nested = result.columns[3].nested.as_ref().unwrap();
        assert_eq!(names(&nested.columns), vec!["total", "id", "user_id"]);
    }

    #[test]
    fn test_nested_with_unknown_target_is_dropped() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::new("name"),
            ColumnConfig::new("email"),
            ColumnConfig::nested(
                "invoices",
                NestedColumnConfig::new(vec![JoinStep::to("invoices")], vec![]),
            ),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(result.changed);
        assert_eq!(names(&result.columns), vec!["id", "name", "email"]);
        assert!(matches!(
            result.mismatches.as_slice(),
            [GridError::SchemaMismatch { detail, .. }] if detail.contains("invoices")
        ));
    }

    #[test]
    fn test_mismatches_inside_nested_lists_are_reported() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::new("name"),
            ColumnConfig::new("email"),
            ColumnConfig::nested(
                "orders",
                NestedColumnConfig::new(
                    vec![JoinStep::to("orders")],
                    vec![
                        ColumnConfig::new("id"),
                        ColumnConfig::new("user_id"),
                        ColumnConfig::new("total"),
                        ColumnConfig::computed(
                            "tax",
                            ComputedConfig::new(FuncDef::new("$round", "Round", "numeric"), Some("tax_rate")),
                        ),
                    ],
                ),
            ),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(result.changed);
        assert!(matches!(
            result.mismatches.as_slice(),
            [GridError::SchemaMismatch { table, .. }] if table == "orders"
        ));

        // Stale plain columns are routine and not reported
        let stale = vec![ColumnConfig::new("old_col")];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&stale))
            .unwrap();
        assert!(result.mismatches.is_empty());
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let schema = schema();
        let existing = vec![
            ColumnConfig::new("id"),
            ColumnConfig::new("id").hidden(),
            ColumnConfig::new("name"),
            ColumnConfig::new("email"),
        ];
        let result = ColumnConfigReconciler::new(&schema)
            .reconcile("users", Some(&existing))
            .unwrap();
        assert!(result.changed);
        assert_eq!(names(&result.columns), vec!["id", "name", "email"]);
        assert!(result.columns[0].is_visible());
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let schema = schema();
        let err = ColumnConfigReconciler::new(&schema)
            .reconcile("nope", None)
            .unwrap_err();
        assert!(matches!(err, GridError::TableNotFound(name) if name == "nope"));
    }
}
