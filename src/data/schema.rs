//! Live table metadata consumed by the column pipeline.
//!
//! The schema is owned by the data-sync collaborator and refreshed on schema
//! change notifications; this crate only reads it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Database type name as reported by the backend (`int4`, `timestamptz`,
/// `character varying(255)`, `_text`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(String);

/// Coarse classification used for width estimation and sorting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Identifier,
    Geographic,
    Timestamp,
    Boolean,
    Numeric,
    Json,
    Array,
    Text,
    Other,
}

fn type_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Strips modifiers like "(255)" or "(10,2)" and trailing array brackets
        Regex::new(r"\s*(\([^)]*\))?\s*(\[\])*$").unwrap()
    })
}

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased type name without modifiers or array markers
    pub fn base_name(&self) -> String {
        let lowered = self.0.trim().to_lowercase();
        let stripped = type_suffix_pattern().replace(&lowered, "");
        stripped.trim_start_matches('_').to_string()
    }

    pub fn is_array(&self) -> bool {
        let name = self.0.trim();
        name.starts_with('_') || name.ends_with("[]")
    }

    pub fn kind(&self) -> ColumnKind {
        if self.is_array() {
            return ColumnKind::Array;
        }

        match self.base_name().as_str() {
            "uuid" => ColumnKind::Identifier,
            "geography" | "geometry" | "point" | "polygon" | "line" | "lseg" | "box" | "path"
            | "circle" => ColumnKind::Geographic,
            "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp without time zone" | "date" | "time" | "timetz"
            | "time with time zone" | "time without time zone" => ColumnKind::Timestamp,
            "bool" | "boolean" => ColumnKind::Boolean,
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "float4" | "float8"
            | "real" | "double precision" | "numeric" | "decimal" | "money" | "serial"
            | "smallserial" | "bigserial" | "oid" => ColumnKind::Numeric,
            "json" | "jsonb" => ColumnKind::Json,
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
            | "citext" | "name" => ColumnKind::Text,
            _ => ColumnKind::Other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == ColumnKind::Numeric
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Foreign key link from this table to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnReference {
    pub table: String,
    pub local_cols: Vec<String>,
    pub foreign_cols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub references: Vec<ColumnReference>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<DataType>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            references: Vec::new(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn references(mut self, table: &str, foreign_col: &str) -> Self {
        self.references.push(ColumnReference {
            table: table.to_string(),
            local_cols: vec![self.name.clone()],
            foreign_cols: vec![foreign_col.to_string()],
        });
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        !self.references.is_empty()
    }

    pub fn kind(&self) -> ColumnKind {
        self.data_type.kind()
    }
}

impl From<&str> for ColumnInfo {
    fn from(name: &str) -> Self {
        Self::new(name, "text")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Tables backing file storage get a media-oriented default layout
    #[serde(default)]
    pub is_file_table: bool,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_file_table: false,
        }
    }

    pub fn file_table(mut self) -> Self {
        self.is_file_table = true;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Snapshot of every table visible to the grid, addressable by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaView {
    pub tables: Vec<TableSchema>,
}

impl SchemaView {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
