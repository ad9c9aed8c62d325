use crate::ui::paint_handle::{Display, NodeRef, Rect};

/// Identity of the row set currently rendered; a new id invalidates all geometry
pub type RowSetId = u64;

/// Geometry and original style captured on first measurement
#[derive(Debug, Clone, PartialEq)]
pub struct CachedNode {
    pub rect: Rect,
    pub original_display: Display,
    pub hidden: bool,
}

impl CachedNode {
    pub fn new(rect: Rect, original_display: Display) -> Self {
        Self {
            rect,
            original_display,
            hidden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRow {
    pub node: CachedNode,
    pub cells: Vec<CachedNode>,
}

/// Per-row geometry side-table, indexed by row position in the current row set.
///
/// Validity is explicit: entries belong to `row_set` and are dropped in one
/// go when the renderer reports a different one.
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    row_set: Option<RowSetId>,
    rows: Vec<Option<CachedRow>>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_set(&self) -> Option<RowSetId> {
        self.row_set
    }

    /// Switches to `row_set`, clearing everything if it differs. Returns true
    /// when the cache was cleared.
    pub fn ensure_row_set(&mut self, row_set: RowSetId) -> bool {
        if self.row_set == Some(row_set) {
            return false;
        }
        self.clear();
        self.row_set = Some(row_set);
        true
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.row_set = None;
    }

    /// Drops every entry but keeps the row set. Returns the nodes that were
    /// hidden, with the display they had before.
    pub fn take_hidden(&mut self) -> Vec<(NodeRef, Display)> {
        let mut hidden = Vec::new();
        for (row, entry) in self.rows.drain(..).enumerate() {
            let Some(entry) = entry else {
                continue;
            };
            if entry.node.hidden {
                hidden.push((NodeRef::Row(row), entry.node.original_display));
            }
            hidden.extend(
                entry
                    .cells
                    .into_iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.hidden)
                    .map(|(column, cell)| (NodeRef::Cell { row, column }, cell.original_display)),
            );
        }
        hidden
    }

    pub fn row(&self, row: usize) -> Option<&CachedRow> {
        self.rows.get(row).and_then(Option::as_ref)
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut CachedRow> {
        self.rows.get_mut(row).and_then(Option::as_mut)
    }

    pub fn contains(&self, row: usize) -> bool {
        self.row(row).is_some()
    }

    pub fn insert(&mut self, row: usize, entry: CachedRow) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, None);
        }
        self.rows[row] = Some(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &CachedRow)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| entry.as_ref().map(|e| (idx, e)))
    }

    pub fn len(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
