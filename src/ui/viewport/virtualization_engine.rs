//! Scroll-driven windowing over rendered rows and cells.
//!
//! Runs after the renderer has painted a row set. Every row is measured once
//! (together with its cells) while still displayed, pinned at that geometry,
//! and from then on shown or hidden from the cached box alone:
//!
//! ```text
//! vertical:   hide row  if bottom < scroll_top - T  or top  > scroll_top + height + T
//! horizontal: hide cell if right  < scroll_left - T or left > scroll_left + width + T
//! ```
//!
//! Cells are only evaluated for rows that stay visible. A pass that cached new
//! geometry is followed by one more pass, since pinning can move nodes that
//! were not measured yet.
//!
//! Geometry belongs to one row set and one column layout. When either changes
//! the cache is dropped, and every node the engine hid gets its display back
//! at the start of the next pass. A hidden node cannot be measured, so this
//! has to happen before anything is re-measured.

use tracing::{debug, trace};

use crate::config::config::VirtualizationConfig;
use crate::ui::paint_handle::{Display, GridSurface, NodeRef};
use crate::ui::viewport::geometry_cache::{CachedNode, CachedRow, GeometryCache, RowSetId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollState {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub viewport_height: f64,
    pub viewport_width: f64,
}

impl ScrollState {
    pub fn new(scroll_top: f64, scroll_left: f64, viewport_height: f64, viewport_width: f64) -> Self {
        Self {
            scroll_top,
            scroll_left,
            viewport_height,
            viewport_width,
        }
    }
}

/// Size of the data behind the rendered rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DatasetShape {
    pub row_count: usize,
    /// Key count of the widest row
    pub max_row_keys: usize,
}

/// A rendered column as the engine sees it: stable key plus the width it
/// was painted with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSlot {
    pub key: String,
    pub width: Option<u32>,
}

impl ColumnSlot {
    pub fn new(key: impl Into<String>, width: Option<u32>) -> Self {
        Self {
            key: key.into(),
            width,
        }
    }
}

/// What an `on_scroll` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassReport {
    /// Engine inactive for this grid
    pub skipped: bool,
    /// Nodes hidden under stale geometry that got their display back
    pub restored: usize,
    /// A node could not be measured; visibility was left as it was
    pub aborted: bool,
    pub passes: u8,
    pub newly_cached: usize,
    pub rows_hidden: usize,
    pub rows_shown: usize,
    pub cells_hidden: usize,
    pub cells_shown: usize,
}

impl PassReport {
    pub fn changed_anything(&self) -> bool {
        self.restored + self.rows_hidden + self.rows_shown + self.cells_hidden + self.cells_shown
            > 0
    }
}

struct MeasurementFailed(NodeRef);

pub struct VirtualizationEngine {
    config: VirtualizationConfig,
    cache: GeometryCache,
    shape: DatasetShape,
    columns: Vec<ColumnSlot>,
    /// Hidden nodes whose geometry was dropped, shown again on the next pass
    pending_restore: Vec<(NodeRef, Display)>,
}

impl VirtualizationEngine {
    pub fn new(config: VirtualizationConfig) -> Self {
        Self {
            config,
            cache: GeometryCache::new(),
            shape: DatasetShape::default(),
            columns: Vec::new(),
            pending_restore: Vec::new(),
        }
    }

    /// Tells the engine which row set is rendered. Geometry of a previous row
    /// set is discarded.
    pub fn set_row_set(&mut self, row_set: RowSetId, shape: DatasetShape) {
        if self.cache.row_set() != Some(row_set) {
            self.release_geometry();
            self.cache.ensure_row_set(row_set);
            debug!(target: "virtualization",
                "New row set {}: {} rows, widest row {} keys",
                row_set, shape.row_count, shape.max_row_keys
            );
        }
        self.shape = shape;
    }

    /// Tells the engine which columns are rendered, in order. Cached cell
    /// geometry is positional, so any change in keys, order or widths
    /// discards it.
    pub fn set_columns(&mut self, columns: Vec<ColumnSlot>) {
        if self.columns == columns {
            return;
        }
        debug!(target: "virtualization",
            "Column layout changed ({} -> {} columns), dropping geometry",
            self.columns.len(), columns.len()
        );
        self.columns = columns;
        self.release_geometry();
    }

    pub fn columns(&self) -> &[ColumnSlot] {
        &self.columns
    }

    /// Nodes waiting to be shown again on the next pass
    pub fn pending_restores(&self) -> usize {
        self.pending_restore.len()
    }

    pub fn is_active(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let small = self.shape.row_count < self.config.min_rows
            && self.shape.max_row_keys < self.config.min_row_keys;
        !small
    }

    pub fn is_row_hidden(&self, row: usize) -> bool {
        self.cache.row(row).map_or(false, |r| r.node.hidden)
    }

    pub fn is_cell_hidden(&self, row: usize, column: usize) -> bool {
        self.cache
            .row(row)
            .and_then(|r| r.cells.get(column))
            .map_or(false, |c| c.hidden)
    }

    /// Rows the engine currently leaves displayed (measured rows only)
    pub fn visible_rows(&self) -> Vec<usize> {
        self.cache
            .iter()
            .filter(|(_, r)| !r.node.hidden)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn cached_rows(&self) -> usize {
        self.cache.len()
    }

    pub fn on_scroll(&mut self, surface: &mut impl GridSurface, scroll: ScrollState) -> PassReport {
        let mut report = PassReport {
            restored: self.restore_pending(surface),
            ..PassReport::default()
        };

        if !self.is_active() {
            report.skipped = true;
            return report;
        }

        for _ in 0..2 {
            report.passes += 1;
            match self.run_pass(surface, scroll, &mut report) {
                Ok(0) => break,
                Ok(newly_cached) => {
                    report.newly_cached += newly_cached;
                    trace!(target: "virtualization",
                        "Cached {} new nodes, running settle pass", newly_cached
                    );
                }
                Err(MeasurementFailed(node)) => {
                    debug!(target: "virtualization",
                        "Could not measure {:?}, leaving visibility unchanged", node
                    );
                    report.aborted = true;
                    break;
                }
            }
        }

        trace!(target: "virtualization",
            "Pass done: rows -{} +{}, cells -{} +{}",
            report.rows_hidden, report.rows_shown, report.cells_hidden, report.cells_shown
        );
        report
    }

    /// Shows every node the engine hid and forgets all geometry
    pub fn restore_all(&mut self, surface: &mut impl GridSurface) {
        self.release_geometry();
        self.restore_pending(surface);
    }

    fn release_geometry(&mut self) {
        let hidden = self.cache.take_hidden();
        if !hidden.is_empty() {
            trace!(target: "virtualization", "{} hidden nodes queued for restore", hidden.len());
        }
        self.pending_restore.extend(hidden);
    }

    /// Gives queued nodes their display back. Nodes the renderer has since
    /// removed, or already shows again, are left alone.
    fn restore_pending(&mut self, surface: &mut impl GridSurface) -> usize {
        let mut restored = 0;
        for (node, display) in self.pending_restore.drain(..) {
            let exists = match node {
                NodeRef::Row(row) => row < surface.row_count(),
                NodeRef::Cell { row, column } => column < surface.cell_count(row),
                NodeRef::Header(column) => column < surface.column_count(),
            };
            let still_hidden = surface.display(node).map_or(false, |d| d.is_hidden());
            if exists && still_hidden {
                surface.set_display(node, display);
                restored += 1;
            }
        }
        restored
    }

    fn run_pass(
        &mut self,
        surface: &mut impl GridSurface,
        scroll: ScrollState,
        report: &mut PassReport,
    ) -> Result<usize, MeasurementFailed> {
        let newly_cached = self.cache_new_rows(surface)?;
        self.apply_visibility(surface, scroll, report);
        Ok(newly_cached)
    }

    /// Measures and pins rows seen for the first time. Bottom-up, so pinning a
    /// row cannot shift rows that are still to be measured.
    fn cache_new_rows(&mut self, surface: &mut impl GridSurface) -> Result<usize, MeasurementFailed> {
        let mut newly_cached = 0;

        for row in (0..surface.row_count()).rev() {
            if self.cache.contains(row) {
                continue;
            }

            let row_node = NodeRef::Row(row);
            let rect = surface.measure(row_node).ok_or(MeasurementFailed(row_node))?;
            let display = surface.display(row_node).unwrap_or_default();

            let mut cells = Vec::with_capacity(surface.cell_count(row));
            for column in 0..surface.cell_count(row) {
                let cell_node = NodeRef::Cell { row, column };
                let cell_rect = surface
                    .measure(cell_node)
                    .ok_or(MeasurementFailed(cell_node))?;
                let cell_display = surface.display(cell_node).unwrap_or_default();
                cells.push(CachedNode::new(cell_rect, cell_display));
            }

            for (column, cell) in cells.iter().enumerate() {
                surface.pin_geometry(NodeRef::Cell { row, column }, cell.rect);
            }
            surface.pin_geometry(row_node, rect);

            newly_cached += 1 + cells.len();
            self.cache.insert(
                row,
                CachedRow {
                    node: CachedNode::new(rect, display),
                    cells,
                },
            );
        }

        Ok(newly_cached)
    }

    fn apply_visibility(
        &mut self,
        surface: &mut impl GridSurface,
        scroll: ScrollState,
        report: &mut PassReport,
    ) {
        let threshold = self.config.threshold_px;
        let min_y = scroll.scroll_top - threshold;
        let max_y = scroll.scroll_top + scroll.viewport_height + threshold;
        let min_x = scroll.scroll_left - threshold;
        let max_x = scroll.scroll_left + scroll.viewport_width + threshold;

        for row in 0..surface.row_count() {
            let Some(entry) = self.cache.row_mut(row) else {
                continue;
            };

            let hide_row = outside(entry.node.rect.bottom(), entry.node.rect.top(), min_y, max_y);
            if set_hidden(surface, NodeRef::Row(row), &mut entry.node, hide_row) {
                if hide_row {
                    report.rows_hidden += 1;
                } else {
                    report.rows_shown += 1;
                }
            }
            if hide_row {
                continue;
            }

            for (column, cell) in entry.cells.iter_mut().enumerate() {
                let hide_cell = outside(cell.rect.right(), cell.rect.left(), min_x, max_x);
                if set_hidden(surface, NodeRef::Cell { row, column }, cell, hide_cell) {
                    if hide_cell {
                        report.cells_hidden += 1;
                    } else {
                        report.cells_shown += 1;
                    }
                }
            }
        }
    }
}

/// True when a span ending at `end` and starting at `start` lies entirely
/// before `min` or after `max`
fn outside(end: f64, start: f64, min: f64, max: f64) -> bool {
    end < min || start > max
}

/// Applies a visibility change if needed; returns whether anything changed
fn set_hidden(
    surface: &mut impl GridSurface,
    node: NodeRef,
    cached: &mut CachedNode,
    hidden: bool,
) -> bool {
    if cached.hidden == hidden {
        return false;
    }
    let display = if hidden {
        Display::None
    } else {
        cached.original_display.clone()
    };
    surface.set_display(node, display);
    cached.hidden = hidden;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::paint_handle::MemorySurface;

    const ROW_HEIGHT: f64 = 20.0;
    const COL_WIDTH: f64 = 100.0;

    fn engine_for(rows: usize, columns: usize) -> VirtualizationEngine {
        let mut engine = VirtualizationEngine::new(VirtualizationConfig::default());
        engine.set_row_set(
            1,
            DatasetShape {
                row_count: rows,
                max_row_keys: columns,
            },
        );
        engine
    }

    fn viewport(scroll_top: f64, scroll_left: f64) -> ScrollState {
        ScrollState::new(scroll_top, scroll_left, 200.0, 300.0)
    }

    fn slots(columns: std::ops::Range<usize>) -> Vec<ColumnSlot> {
        columns
            .map(|c| ColumnSlot::new(format!("c{}", c), Some(COL_WIDTH as u32)))
            .collect()
    }

    #[test]
    fn test_small_grids_are_skipped() {
        let mut surface = MemorySurface::uniform(10, 5, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(10, 5);
        assert!(!engine.is_active());

        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(report.skipped);
        assert_eq!(surface.display_writes(), 0);
    }

    #[test]
    fn test_wide_but_short_grid_is_active() {
        let engine = engine_for(5, 40);
        assert!(engine.is_active());
    }

    #[test]
    fn test_disabled_by_config() {
        let mut engine = VirtualizationEngine::new(VirtualizationConfig {
            enabled: false,
            ..VirtualizationConfig::default()
        });
        engine.set_row_set(1, DatasetShape { row_count: 1000, max_row_keys: 5 });
        assert!(!engine.is_active());
    }

    #[test]
    fn test_rows_outside_window_are_hidden() {
        // Rows sit at y = 20 * (i + 1); window is [-100, 300]
        let mut surface = MemorySurface::uniform(50, 2, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(50, 2);

        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(!report.aborted);
        assert_eq!(report.passes, 2);
        assert_eq!(report.newly_cached, 50 * 3);

        // Row 14 spans [300, 320] and touches the edge, row 15 starts at 320
        assert!(!surface.is_hidden(NodeRef::Row(14)));
        assert!(surface.is_hidden(NodeRef::Row(15)));
        assert_eq!(surface.hidden_rows(), (15..50).collect::<Vec<_>>());
        assert_eq!(engine.visible_rows(), (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_scrolling_restores_original_display() {
        let mut surface = MemorySurface::uniform(50, 2, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(50, 2);
        engine.on_scroll(&mut surface, viewport(0.0, 0.0));

        let report = engine.on_scroll(&mut surface, viewport(600.0, 0.0));
        assert_eq!(report.passes, 1);
        assert_eq!(report.newly_cached, 0);

        // Window is [500, 900]: rows 23..=44 overlap it
        assert!(surface.is_hidden(NodeRef::Row(0)));
        assert!(surface.is_hidden(NodeRef::Row(22)));
        assert!(!surface.is_hidden(NodeRef::Row(23)));
        assert!(!surface.is_hidden(NodeRef::Row(44)));
        assert!(surface.is_hidden(NodeRef::Row(45)));
        assert_eq!(
            surface.display(NodeRef::Row(30)),
            Some(Display::TableRow)
        );
    }

    #[test]
    fn test_cells_hidden_horizontally_in_visible_rows_only() {
        let mut surface = MemorySurface::uniform(30, 10, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(30, 10);

        // Horizontal window is [400, 900]
        engine.on_scroll(&mut surface, viewport(0.0, 500.0));

        let cell = |column| NodeRef::Cell { row: 0, column };
        assert!(surface.is_hidden(cell(2)));
        assert!(!surface.is_hidden(cell(3)));
        assert!(!surface.is_hidden(cell(9)));
        assert!(engine.is_cell_hidden(0, 2));

        // Row 20 is hidden vertically; its cells are left alone
        assert!(surface.is_hidden(NodeRef::Row(20)));
        assert!(!surface.is_hidden(NodeRef::Cell { row: 20, column: 0 }));
    }

    #[test]
    fn test_repeated_passes_are_deterministic() {
        let mut surface = MemorySurface::uniform(100, 3, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(100, 3);

        engine.on_scroll(&mut surface, viewport(400.0, 0.0));
        let hidden = surface.hidden_rows();
        let writes = surface.display_writes();

        for _ in 0..3 {
            let report = engine.on_scroll(&mut surface, viewport(400.0, 0.0));
            assert!(!report.changed_anything());
        }
        assert_eq!(surface.hidden_rows(), hidden);
        assert_eq!(surface.display_writes(), writes);
    }

    #[test]
    fn test_measurement_failure_leaves_visibility_untouched() {
        let mut surface = MemorySurface::uniform(40, 2, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(40, 2);
        surface.detach(NodeRef::Row(10));

        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(report.aborted);
        assert_eq!(surface.display_writes(), 0);
        assert!(surface.hidden_rows().is_empty());

        surface.attach(NodeRef::Row(10));
        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(!report.aborted);
        assert!(report.rows_hidden > 0);
    }

    #[test]
    fn test_bottom_up_caching_survives_reflow() {
        let mut surface = MemorySurface::uniform(40, 1, ROW_HEIGHT, COL_WIDTH).with_reflow_on_pin();
        let mut engine = engine_for(40, 1);

        engine.on_scroll(&mut surface, viewport(0.0, 0.0));

        // Every row was measured before anything above it left the flow
        for row in 0..40 {
            let rect = surface.measure(NodeRef::Row(row));
            if let Some(rect) = rect {
                assert_eq!(rect.y, ROW_HEIGHT * (row as f64 + 1.0));
            }
        }
        assert_eq!(surface.hidden_rows(), (15..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_new_row_set_discards_geometry() {
        let mut surface = MemorySurface::uniform(30, 2, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(30, 2);
        engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert_eq!(engine.cached_rows(), 30);

        engine.set_row_set(2, DatasetShape { row_count: 30, max_row_keys: 2 });
        assert_eq!(engine.cached_rows(), 0);
    }

    #[test]
    fn test_restore_all_shows_everything() {
        let mut surface = MemorySurface::uniform(30, 10, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(30, 10);
        engine.on_scroll(&mut surface, viewport(0.0, 500.0));
        assert!(!surface.hidden_rows().is_empty());

        engine.restore_all(&mut surface);
        assert!(surface.hidden_rows().is_empty());
        assert!(!surface.is_hidden(NodeRef::Cell { row: 0, column: 0 }));
        assert_eq!(engine.cached_rows(), 0);
    }

    #[test]
    fn test_row_set_change_on_same_surface_restores_hidden_rows() {
        let mut surface = MemorySurface::uniform(50, 2, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(50, 2);
        engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert_eq!(surface.hidden_rows().len(), 35);

        // The renderer reuses its row elements for the next row set
        engine.set_row_set(2, DatasetShape { row_count: 50, max_row_keys: 2 });
        assert_eq!(engine.pending_restores(), 35);

        let report = engine.on_scroll(&mut surface, viewport(600.0, 0.0));
        assert!(!report.aborted);
        assert_eq!(report.restored, 35);
        assert_eq!(report.newly_cached, 50 * 3);
        assert!(surface.is_hidden(NodeRef::Row(22)));
        assert!(!surface.is_hidden(NodeRef::Row(30)));
        assert!(surface.is_hidden(NodeRef::Row(45)));

        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(!report.aborted);
        assert!(surface.is_hidden(NodeRef::Row(30)));
        assert!(!surface.is_hidden(NodeRef::Row(0)));
    }

    #[test]
    fn test_column_layout_change_remeasures_cells() {
        let mut surface = MemorySurface::uniform(30, 10, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(30, 10);
        engine.set_columns(slots(0..10));
        engine.on_scroll(&mut surface, viewport(0.0, 500.0));
        assert!(engine.is_cell_hidden(0, 2));

        // Same layout again keeps the geometry
        engine.set_columns(slots(0..10));
        assert_eq!(engine.cached_rows(), 30);

        surface.remove_column(0);
        engine.set_columns(slots(1..10));
        assert_eq!(engine.cached_rows(), 0);
        assert_eq!(engine.pending_restores(), 15 + 15 * 3);

        // Old cells 1 and 2 sit at 0 and 1 and are still hidden; old cell 3
        // now at 2 was never hidden
        let report = engine.on_scroll(&mut surface, viewport(0.0, 500.0));
        assert!(!report.aborted);
        assert_eq!(report.restored, 15 + 15 * 2);

        // Horizontal window [400, 900] against the new positions
        let cell = |column| NodeRef::Cell { row: 0, column };
        assert!(surface.is_hidden(cell(2)));
        assert!(!surface.is_hidden(cell(3)));
        assert!(!surface.is_hidden(cell(8)));
        assert!(engine.is_cell_hidden(0, 2));
        assert!(!engine.is_cell_hidden(0, 9));
        assert!(surface.is_hidden(NodeRef::Row(20)));
    }

    #[test]
    fn test_restore_skips_cells_the_renderer_removed() {
        let mut surface = MemorySurface::uniform(30, 10, ROW_HEIGHT, COL_WIDTH);
        let mut engine = engine_for(30, 10);
        engine.set_columns(slots(0..10));

        // Horizontal window [-100, 400]: cells 5..=9 hidden in visible rows
        engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(surface.is_hidden(NodeRef::Cell { row: 0, column: 9 }));

        surface.remove_column(9);
        engine.set_columns(slots(0..9));

        let report = engine.on_scroll(&mut surface, viewport(0.0, 0.0));
        assert!(!report.aborted);
        assert_eq!(report.restored, 15 + 15 * 4);
        assert_eq!(report.cells_hidden, 15 * 4);
        assert!(surface.is_hidden(NodeRef::Cell { row: 0, column: 8 }));
    }
}
