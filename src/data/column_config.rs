//! Persisted column configuration.
//!
//! One [`ColumnConfig`] per column of a grid view, stored as camelCase JSON by
//! the configuration collaborator. An entry is either a plain column, a nested
//! (joined) sub-table, or a computed column; `computed_config.is_column` marks
//! a function wrapping a real stored column.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::schema::{DataType, TableSchema};
use crate::data::sort_spec::ColumnSort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    pub name: String,

    /// Absent means shown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,

    /// Explicit pixel width, always wins over estimation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedColumnConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_config: Option<ComputedConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ColumnStyle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ColumnFormat>,
}

/// What an entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Plain,
    Nested,
    /// Function over zero or more columns, not backed by a stored column
    Computed,
    /// Function wrapping a real stored column
    WrappedColumn,
}

impl ColumnConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            show: None,
            width: None,
            nested: None,
            computed_config: None,
            style: None,
            format: None,
        }
    }

    /// Entry appended for a schema column the configuration does not know yet
    pub fn default_for(name: impl Into<String>) -> Self {
        Self {
            show: Some(true),
            ..Self::new(name)
        }
    }

    pub fn nested(name: impl Into<String>, nested: NestedColumnConfig) -> Self {
        Self {
            nested: Some(nested),
            ..Self::new(name)
        }
    }

    pub fn computed(name: impl Into<String>, computed: ComputedConfig) -> Self {
        Self {
            computed_config: Some(computed),
            ..Self::new(name)
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.show = Some(false);
        self
    }

    pub fn is_visible(&self) -> bool {
        self.show.unwrap_or(true)
    }

    pub fn role(&self) -> ColumnRole {
        if self.nested.is_some() {
            return ColumnRole::Nested;
        }
        match &self.computed_config {
            Some(computed) if computed.is_column => ColumnRole::WrappedColumn,
            Some(_) => ColumnRole::Computed,
            None => ColumnRole::Plain,
        }
    }

    /// Entries whose existence does not depend on a same-named schema column
    pub fn is_synthetic(&self) -> bool {
        matches!(self.role(), ColumnRole::Nested | ColumnRole::Computed)
    }

    /// Whether this entry accounts for the stored column `column` in a view
    pub fn covers_stored_column(&self, column: &str) -> bool {
        match self.role() {
            ColumnRole::Plain => self.name == column,
            ColumnRole::WrappedColumn => {
                self.name == column
                    || self
                        .computed_config
                        .as_ref()
                        .and_then(|c| c.column.as_deref())
                        == Some(column)
            }
            ColumnRole::Nested | ColumnRole::Computed => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Row,
    Column,
    NoHeaders,
}

/// One hop of a join path: the table joined into and the column pairs used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStep {
    pub table: String,
    /// `(local column, foreign column)` pairs
    #[serde(default)]
    pub on: Vec<(String, String)>,
}

impl JoinStep {
    pub fn to(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            on: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedColumnConfig {
    pub path: Vec<JoinStep>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<ColumnSort>,
    /// Opaque filter tree, interpreted by the query collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
}

impl NestedColumnConfig {
    pub fn new(path: Vec<JoinStep>, columns: Vec<ColumnConfig>) -> Self {
        Self {
            path,
            columns,
            join_type: JoinType::default(),
            display_mode: DisplayMode::default(),
            limit: None,
            sort: None,
            filter: None,
            chart: None,
        }
    }

    /// Table the join path ends at
    pub fn target_table(&self) -> Option<&str> {
        self.path.last().map(|step| step.table.as_str())
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnConfig> {
        self.columns.iter().filter(|c| c.is_visible())
    }
}

/// Describes a function usable in computed columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuncDef {
    pub key: String,
    pub label: String,
    /// Accepted input type names; empty accepts any column
    #[serde(default)]
    pub input_types: Vec<String>,
    pub out_type: DataType,
    #[serde(default)]
    pub is_aggregate: bool,
}

impl FuncDef {
    pub fn new(key: &str, label: &str, out_type: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            input_types: Vec::new(),
            out_type: DataType::new(out_type),
            is_aggregate: false,
        }
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    pub fn accepting(mut self, types: &[&str]) -> Self {
        self.input_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn accepts(&self, data_type: &DataType) -> bool {
        if self.input_types.is_empty() {
            return true;
        }
        let base = data_type.base_name();
        self.input_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&base) || t.eq_ignore_ascii_case(data_type.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedConfig {
    pub func_def: FuncDef,
    /// Source column; `None` for column-less aggregates such as a row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub is_column: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

impl ComputedConfig {
    pub fn new(func_def: FuncDef, column: Option<&str>) -> Self {
        Self {
            func_def,
            column: column.map(str::to_string),
            is_column: false,
            args: None,
        }
    }

    pub fn wrapping_column(mut self) -> Self {
        self.is_column = true;
        self
    }

    /// Whether the referenced source column (if any) still exists
    pub fn source_exists_in(&self, table: &TableSchema) -> bool {
        self.column
            .as_deref()
            .map_or(true, |column| table.has_column(column))
    }
}

/// Rendering directive for cell colours; interpreted by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ColumnStyle {
    Fixed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background: Option<String>,
    },
    Conditional {
        conditions: Vec<Value>,
    },
    Scale {
        min_color: String,
        max_color: String,
    },
    Bar {
        color: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaSource {
    #[default]
    FromUrl,
    FromContentType,
}

/// Cell formatting directive; interpreted by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase", rename_all_fields = "camelCase")]
pub enum ColumnFormat {
    Text,
    Email,
    Tel,
    Url,
    QrCode,
    Age,
    Currency {
        currency_code: String,
    },
    Media {
        #[serde(default)]
        source: MediaSource,
    },
}
