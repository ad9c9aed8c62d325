use tracing::{debug, trace};

use crate::data::column_config::ColumnConfig;
use crate::ui::paint_handle::NodeRef;

/// State of the header being dragged; exists only between start and drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraggedColumn {
    pub source_index: usize,
    pub target_index: Option<usize>,
    pub node: NodeRef,
}

/// A completed drop, in header positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMove {
    pub source_index: usize,
    pub target_index: usize,
}

impl ColumnMove {
    /// Applies the move to a configuration list whose visible entries are the
    /// rendered headers, in order. Hidden entries keep their place relative to
    /// their neighbours.
    pub fn apply(&self, columns: &[ColumnConfig]) -> Option<Vec<ColumnConfig>> {
        let visible: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_visible())
            .map(|(idx, _)| idx)
            .collect();

        let source = *visible.get(self.source_index)?;
        let target = *visible.get(self.target_index)?;
        reorder_columns(columns, source, target)
    }
}

/// Moves `columns[source]` next to `columns[target]`: after it when the
/// source was before the target, before it otherwise.
pub fn reorder_columns(
    columns: &[ColumnConfig],
    source: usize,
    target: usize,
) -> Option<Vec<ColumnConfig>> {
    if source == target || source >= columns.len() || target >= columns.len() {
        return None;
    }

    let mut reordered = columns.to_vec();
    let moved = reordered.remove(source);

    // Target position after the removal
    let target_now = if source < target { target - 1 } else { target };
    let insert_at = if source < target {
        target_now + 1
    } else {
        target_now
    };
    reordered.insert(insert_at, moved);

    debug!(target: "drag_reorder",
        "Moved '{}' from {} to {}",
        reordered[insert_at].name, source, insert_at
    );
    Some(reordered)
}

/// Pointer-drag state machine over column headers. Only one drag can be
/// active at a time.
#[derive(Debug, Default)]
pub struct DragReorderController {
    active: Option<DraggedColumn>,
}

impl DragReorderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged(&self) -> Option<&DraggedColumn> {
        self.active.as_ref()
    }

    /// Starts dragging header `index`. Ignored while another drag is active.
    pub fn drag_start(&mut self, index: usize) -> bool {
        if self.active.is_some() {
            trace!(target: "drag_reorder", "Drag already active, ignoring start on {}", index);
            return false;
        }
        self.active = Some(DraggedColumn {
            source_index: index,
            target_index: None,
            node: NodeRef::Header(index),
        });
        true
    }

    /// Records the header under the pointer. Returns whether the target changed.
    pub fn drag_over(&mut self, index: usize) -> bool {
        let Some(drag) = self.active.as_mut() else {
            return false;
        };
        if index == drag.source_index || drag.target_index == Some(index) {
            return false;
        }
        trace!(target: "drag_reorder", "Drag target {:?} -> {}", drag.target_index, index);
        drag.target_index = Some(index);
        true
    }

    /// Ends the drag. Yields a move only if a distinct target was set.
    pub fn drop(&mut self) -> Option<ColumnMove> {
        let drag = self.active.take()?;
        let target_index = drag.target_index?;
        if target_index == drag.source_index {
            return None;
        }
        Some(ColumnMove {
            source_index: drag.source_index,
            target_index,
        })
    }

    pub fn cancel(&mut self) {
        if let Some(drag) = self.active.take() {
            debug!(target: "drag_reorder", "Drag of header {} cancelled", drag.source_index);
        }
    }
}
