//! Expands reconciled configuration into render-ready columns.
//!
//! Column order is taken from the configuration as-is: the reconciler appends
//! new schema columns at the end and user reordering is persisted in the list
//! order, so no re-sorting happens here.

use tracing::{debug, warn};

use crate::data::column_config::{ColumnConfig, ColumnFormat, ColumnRole, MediaSource};
use crate::data::schema::{ColumnInfo, ColumnKind, DataType, SchemaView, TableSchema};
use crate::error::{GridError, GridResult};

/// Column of a file-storage table that holds the file URL
pub const FILE_URL_COLUMN: &str = "url";
/// Column of a file-storage table holding the uploaded file name
pub const FILE_NAME_COLUMN: &str = "original_name";

/// Whether the configuration came from the store or was just defaulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Defaulted,
    Persisted,
}

/// A configuration entry joined with its live schema descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    pub config: ColumnConfig,
    /// `None` for computed columns and nested columns without a backing column
    pub info: Option<ColumnInfo>,
    pub output_type: Option<DataType>,
    /// Table the nested join ends at
    pub nested_table: Option<String>,
    pub nested_columns: Vec<ResolvedColumn>,
}

impl ResolvedColumn {
    pub fn key(&self) -> &str {
        &self.config.name
    }

    pub fn width(&self) -> Option<u32> {
        self.config.width
    }

    pub fn is_visible(&self) -> bool {
        self.config.is_visible()
    }

    pub fn is_nested(&self) -> bool {
        self.config.nested.is_some()
    }

    pub fn kind(&self) -> ColumnKind {
        if self.is_nested() {
            return ColumnKind::Other;
        }
        self.output_type
            .as_ref()
            .map_or(ColumnKind::Other, DataType::kind)
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == ColumnKind::Numeric
    }

    pub fn visible_nested_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.nested_columns.iter().filter(|c| c.is_visible())
    }
}

pub struct ColumnResolver<'a> {
    schema: &'a SchemaView,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(schema: &'a SchemaView) -> Self {
        Self { schema }
    }

    pub fn resolve(
        &self,
        table_name: &str,
        columns: &[ColumnConfig],
        origin: ConfigOrigin,
    ) -> GridResult<Vec<ResolvedColumn>> {
        let table = self
            .schema
            .table(table_name)
            .ok_or_else(|| GridError::TableNotFound(table_name.to_string()))?;

        let resolved = if table.is_file_table && origin == ConfigOrigin::Defaulted {
            let columns = apply_file_table_defaults(columns);
            self.resolve_list(table, &columns)
        } else {
            self.resolve_list(table, columns)
        };

        debug!(target: "column_resolver",
            "Resolved {} of {} columns for '{}'",
            resolved.len(), columns.len(), table_name
        );
        Ok(resolved)
    }

    fn resolve_list(&self, table: &TableSchema, columns: &[ColumnConfig]) -> Vec<ResolvedColumn> {
        columns
            .iter()
            .filter_map(|entry| self.resolve_entry(table, entry))
            .collect()
    }

    fn resolve_entry(&self, table: &TableSchema, entry: &ColumnConfig) -> Option<ResolvedColumn> {
        let role = entry.role();

        let info = match role {
            // Pure computed columns never bind to a stored column, even on a name clash
            ColumnRole::Computed => None,
            ColumnRole::WrappedColumn => table.column(&entry.name).cloned().or_else(|| {
                entry
                    .computed_config
                    .as_ref()
                    .and_then(|c| c.column.as_deref())
                    .and_then(|source| table.column(source))
                    .cloned()
            }),
            ColumnRole::Plain | ColumnRole::Nested => table.column(&entry.name).cloned(),
        };

        if info.is_none() && entry.computed_config.is_none() && entry.nested.is_none() {
            debug!(target: "column_resolver",
                "Dropping '{}': not in '{}' and not a synthetic column",
                entry.name, table.name
            );
            return None;
        }

        if let Some(computed) = &entry.computed_config {
            let source_type = computed
                .column
                .as_deref()
                .and_then(|source| table.column(source))
                .map(|c| &c.data_type);
            if let Some(source_type) = source_type {
                if !computed.func_def.accepts(source_type) {
                    warn!(target: "column_resolver",
                        "Function '{}' on '{}' does not accept type {}, dropping",
                        computed.func_def.key, entry.name, source_type
                    );
                    return None;
                }
            }
        }

        let mut config = entry.clone();
        let mut nested_table = None;
        let mut nested_columns = Vec::new();

        if let Some(nested) = &entry.nested {
            let Some(target) = nested.target_table().and_then(|t| self.schema.table(t)) else {
                warn!(target: "column_resolver",
                    "Nested column '{}' targets unknown table {:?}, dropping",
                    entry.name, nested.target_table()
                );
                return None;
            };
            nested_table = Some(target.name.clone());
            nested_columns = self.resolve_list(target, &nested.columns);

            if config.style.is_some() || config.format.is_some() {
                debug!(target: "column_resolver",
                    "Nested column '{}' carries style/format, ignoring it",
                    entry.name
                );
                config.style = None;
                config.format = None;
            }
        }

        let output_type = info.as_ref().map(|i| i.data_type.clone()).or_else(|| {
            entry
                .computed_config
                .as_ref()
                .map(|c| c.func_def.out_type.clone())
        });

        Some(ResolvedColumn {
            config,
            info,
            output_type,
            nested_table,
            nested_columns,
        })
    }
}

/// First-view layout of a file-storage table: the URL renders as media and the
/// original file name leads.
fn apply_file_table_defaults(columns: &[ColumnConfig]) -> Vec<ColumnConfig> {
    let mut columns = columns.to_vec();

    if let Some(url) = columns.iter_mut().find(|c| c.name == FILE_URL_COLUMN) {
        if url.format.is_none() {
            url.format = Some(ColumnFormat::Media {
                source: MediaSource::FromUrl,
            });
        }
    }

    if let Some(pos) = columns.iter().position(|c| c.name == FILE_NAME_COLUMN) {
        let name_column = columns.remove(pos);
        columns.insert(0, name_column);
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column_config::{
        ColumnStyle, ComputedConfig, FuncDef, JoinStep, NestedColumnConfig,
    };

    fn schema() -> SchemaView {
        SchemaView::new(vec![
            TableSchema::new(
                "products",
                vec![
                    ColumnInfo::new("id", "uuid").primary_key(),
                    ColumnInfo::new("title", "text"),
                    ColumnInfo::new("price", "numeric"),
                ],
            ),
            TableSchema::new(
                "reviews",
                vec![
                    ColumnInfo::new("product_id", "uuid").references("products", "id"),
                    ColumnInfo::new("stars", "int2"),
                    ColumnInfo::new("body", "text"),
                ],
            ),
            TableSchema::new(
                "files",
                vec![
                    ColumnInfo::new("id", "uuid").primary_key(),
                    ColumnInfo::new("url", "text"),
                    ColumnInfo::new("original_name", "text"),
                ],
            )
            .file_table(),
        ])
    }

    #[test]
    fn test_plain_columns_get_schema_info() {
        let schema = schema();
        let columns = vec![ColumnConfig::new("title"), ColumnConfig::new("price")];
        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &columns, ConfigOrigin::Persisted)
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].info.as_ref().unwrap().name, "price");
        assert_eq!(resolved[1].output_type, Some(DataType::new("numeric")));
        assert!(resolved[1].is_numeric());
    }

    #[test]
    fn test_computed_column_uses_function_output_type() {
        let schema = schema();
        let columns = vec![ColumnConfig::computed(
            "price",
            ComputedConfig::new(
                FuncDef::new("$countAll", "Count", "int8").aggregate(),
                None,
            ),
        )];
        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &columns, ConfigOrigin::Persisted)
            .unwrap();

        // Name clashes with a stored column but the entry stays unbound
        assert!(resolved[0].info.is_none());
        assert_eq!(resolved[0].output_type, Some(DataType::new("int8")));
    }

    #[test]
    fn test_wrapped_column_keeps_schema_type() {
        let schema = schema();
        let columns = vec![ColumnConfig::computed(
            "title",
            ComputedConfig::new(FuncDef::new("$upper", "Upper", "text"), Some("title"))
                .wrapping_column(),
        )];
        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &columns, ConfigOrigin::Persisted)
            .unwrap();
        assert_eq!(resolved[0].info.as_ref().unwrap().name, "title");
        assert_eq!(resolved[0].output_type, Some(DataType::new("text")));
    }

    #[test]
    fn test_function_rejecting_source_type_is_dropped() {
        let schema = schema();
        let columns = vec![
            ColumnConfig::new("title"),
            ColumnConfig::computed(
                "sum_title",
                ComputedConfig::new(
                    FuncDef::new("$sum", "Sum", "numeric").accepting(&["numeric", "int4"]),
                    Some("title"),
                ),
            ),
        ];
        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &columns, ConfigOrigin::Persisted)
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].key(), "title");
    }

    #[test]
    fn test_unbacked_plain_entries_are_dropped() {
        let schema = schema();
        let columns = vec![ColumnConfig::new("title"), ColumnConfig::new("ghost")];
        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &columns, ConfigOrigin::Persisted)
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_nested_columns_resolve_against_target() {
        let schema = schema();
        let mut nested = ColumnConfig::nested(
            "reviews",
            NestedColumnConfig::new(
                vec![JoinStep::to("reviews")],
                vec![ColumnConfig::new("stars"), ColumnConfig::new("body").hidden()],
            ),
        );
        nested.style = Some(ColumnStyle::Bar {
            color: "red".to_string(),
        });
        nested.format = Some(ColumnFormat::Email);

        let resolved = ColumnResolver::new(&schema)
            .resolve("products", &[nested], ConfigOrigin::Persisted)
            .unwrap();

        let column = &resolved[0];
        assert!(column.info.is_none());
        assert_eq!(column.nested_table.as_deref(), Some("reviews"));
        assert_eq!(column.nested_columns.len(), 2);
        assert_eq!(column.visible_nested_columns().count(), 1);
        assert!(column.nested_columns[0].is_numeric());
        assert!(column.config.style.is_none());
        assert!(column.config.format.is_none());
    }

    #[test]
    fn test_file_table_defaults_only_when_defaulted() {
        let schema = schema();
        let columns = vec![
            ColumnConfig::default_for("id"),
            ColumnConfig::default_for("url"),
            ColumnConfig::default_for("original_name"),
        ];
        let resolver = ColumnResolver::new(&schema);

        let defaulted = resolver
            .resolve("files", &columns, ConfigOrigin::Defaulted)
            .unwrap();
        let keys: Vec<&str> = defaulted.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["original_name", "id", "url"]);
        assert_eq!(
            defaulted[2].config.format,
            Some(ColumnFormat::Media {
                source: MediaSource::FromUrl
            })
        );

        let persisted = resolver
            .resolve("files", &columns, ConfigOrigin::Persisted)
            .unwrap();
        let keys: Vec<&str> = persisted.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["id", "url", "original_name"]);
        assert!(persisted[1].config.format.is_none());
    }
}
