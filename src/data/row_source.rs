use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;

use crate::data::sort_spec::{ColumnSort, NullsPosition};

/// One fetched row, keyed by column name
pub type Row = Map<String, Value>;

/// Paginated, sorted row request handed to the data collaborator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    /// Opaque filter tree understood by the collaborator
    pub filter: Option<Value>,
    pub sort: Vec<ColumnSort>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl FetchRequest {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
            ..Self::default()
        }
    }

    /// Zero-row fetch used to check that an ORDER BY is accepted
    pub fn sort_probe(sort: &[ColumnSort]) -> Self {
        Self {
            sort: sort.to_vec(),
            limit: Some(0),
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: Vec<ColumnSort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Row supplier for a grid view
pub trait RowSource: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Checks a sort against the backend by fetching zero rows with it
    fn validate(&self, sort: &[ColumnSort]) -> impl Future<Output = Result<()>> + Send {
        let request = FetchRequest::sort_probe(sort);
        async move { self.fetch(&request).await.map(|_| ()) }
    }
}

/// Rows held in memory, sorted and paged on request.
///
/// Only columns listed as sortable may appear in a sort; anything else is
/// rejected like a backend would reject an unsortable expression.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    rows: Vec<Row>,
    sortable: HashSet<String>,
}

impl MemoryRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        let sortable = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        Self { rows, sortable }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<Row> = serde_json::from_str(json)?;
        Ok(Self::new(rows))
    }

    pub fn with_sortable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn matches_filter(row: &Row, filter: &Option<Value>) -> bool {
        // Only flat equality objects are understood here
        match filter {
            Some(Value::Object(conditions)) => conditions
                .iter()
                .all(|(column, expected)| row.get(column) == Some(expected)),
            _ => true,
        }
    }

    fn query(&self, request: &FetchRequest) -> Result<Vec<Row>> {
        for entry in &request.sort {
            if !self.sortable.contains(&entry.key) {
                return Err(anyhow!("column \"{}\" is not sortable", entry.key));
            }
        }

        let mut rows: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| Self::matches_filter(row, &request.filter))
            .collect();

        rows.sort_by(|a, b| {
            request
                .sort
                .iter()
                .map(|entry| compare_for_sort(a.get(&entry.key), b.get(&entry.key), entry))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let limit = request.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(request.offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl RowSource for MemoryRowSource {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<Vec<Row>>> + Send {
        let result = self.query(request);
        async move { result }
    }
}

fn is_null(value: Option<&Value>, null_empty: bool) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => null_empty && s.is_empty(),
        _ => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>, entry: &ColumnSort) -> Ordering {
    let null_empty = entry.null_empty.unwrap_or(false);
    let nulls_first = entry.nulls == NullsPosition::First;

    match (is_null(a, null_empty), is_null(b, null_empty)) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if nulls_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let (Some(a), Some(b)) = (a, b) else {
                return Ordering::Equal;
            };
            let cmp = compare_values(a, b);
            if entry.asc {
                cmp
            } else {
                cmp.reverse()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MemoryRowSource {
        MemoryRowSource::from_json(
            r#"[
                {"id": 1, "name": "carol", "score": null},
                {"id": 2, "name": "alice", "score": 10},
                {"id": 3, "name": "bob", "score": 5}
            ]"#,
        )
        .unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_fetch_sorts_and_pages() {
        let source = source();
        let rows = source
            .fetch(&FetchRequest::page(2, 0).with_sort(vec![ColumnSort::ascending("name")]))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![2, 3]);

        let rows = source
            .fetch(&FetchRequest::page(10, 1).with_sort(vec![ColumnSort::ascending("name")]))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_nulls_position() {
        let source = source();
        let rows = source
            .fetch(&FetchRequest::default().with_sort(vec![ColumnSort::descending("score")]))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![2, 3, 1]);

        let mut nulls_first = ColumnSort::ascending("score");
        nulls_first.nulls = NullsPosition::First;
        let rows = source
            .fetch(&FetchRequest::default().with_sort(vec![nulls_first]))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_filter_equality() {
        let rows = source()
            .fetch(&FetchRequest::default().with_filter(json!({"name": "bob"})))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![3]);
    }

    #[tokio::test]
    async fn test_validate_rejects_unsortable() {
        let source = source().with_sortable(["id", "name"]);
        assert!(source.validate(&[ColumnSort::ascending("id")]).await.is_ok());
        let err = source
            .validate(&[ColumnSort::ascending("score")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("score"));
    }
}
