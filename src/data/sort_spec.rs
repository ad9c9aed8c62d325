use serde::{Deserialize, Serialize};

use crate::data::column_config::ColumnConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsPosition {
    First,
    #[default]
    Last,
}

/// One entry of a multi-column ORDER BY.
///
/// `key` is a column name, or `parent.sub` for a sub-column of a nested
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSort {
    pub key: String,
    pub asc: bool,
    #[serde(default)]
    pub nulls: NullsPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_empty: Option<bool>,
}

impl ColumnSort {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            asc: true,
            nulls: NullsPosition::Last,
            null_empty: None,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            asc: false,
            ..Self::ascending(key)
        }
    }

    /// The sub-column this entry sorts by if it belongs to nested `parent`
    pub fn sub_column_of(&self, parent: &str) -> Option<&str> {
        sub_column_of(&self.key, parent)
    }
}

pub fn nested_sort_key(parent: &str, sub_column: &str) -> String {
    format!("{}.{}", parent, sub_column)
}

/// Strips `parent.` off `key`. Column names may contain dots themselves, so
/// a key can only be split against a known parent.
pub fn sub_column_of<'k>(key: &'k str, parent: &str) -> Option<&'k str> {
    key.strip_prefix(parent)?
        .strip_prefix('.')
        .filter(|sub| !sub.is_empty())
}

/// Drops entries whose key no longer names a visible column (or a visible
/// sub-column of a visible nested column).
pub fn retain_visible(sort: &[ColumnSort], columns: &[ColumnConfig]) -> Vec<ColumnSort> {
    sort.iter()
        .filter(|entry| sort_key_is_visible(&entry.key, columns))
        .cloned()
        .collect()
}

pub fn sort_key_is_visible(key: &str, columns: &[ColumnConfig]) -> bool {
    // A plain column may itself contain a dot, so try the full key first
    if columns.iter().any(|c| c.name == key && c.is_visible()) {
        return true;
    }

    columns.iter().filter(|c| c.is_visible()).any(|c| {
        let (Some(nested), Some(sub)) = (&c.nested, sub_column_of(key, &c.name)) else {
            return false;
        };
        nested.visible_columns().any(|n| n.name == sub)
    })
}
