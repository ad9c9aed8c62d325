//! Composition root of a grid view.
//!
//! `GridView` owns the column configuration of one (table, view) pair and
//! runs the forward pipeline:
//!
//! ```text
//! store + schema -> reconcile -> resolve -> estimate widths -> render columns
//! ```
//!
//! User gestures (header click, drag, resize, show/hide) come back through the
//! controllers, are committed to the store, and re-run the pipeline. Every run
//! hands the rendered column layout to the virtualization engine, which drops
//! geometry measured under a different layout. A repaint with new data is
//! reported through [`GridView::on_rows_rendered`].

use anyhow::Result;
use tracing::{debug, info};

use crate::config::config::Config;
use crate::data::column_config::{ColumnConfig, ColumnRole};
use crate::data::column_reconciler::ColumnConfigReconciler;
use crate::data::column_resolver::{ColumnResolver, ConfigOrigin, ResolvedColumn};
use crate::data::config_store::{ConfigStore, PersistedView, ViewKey};
use crate::data::row_source::{FetchRequest, Row, RowSource};
use crate::data::schema::SchemaView;
use crate::data::sort_spec::{nested_sort_key, retain_visible, ColumnSort};
use crate::error::{GridError, GridResult};
use crate::ui::drag_reorder::DragReorderController;
use crate::ui::paint_handle::GridSurface;
use crate::ui::resize_controller::{ResizeController, WidthCommit};
use crate::ui::sort_coordinator::{toggle_sort_key, SortCoordinator, SortToggle};
use crate::ui::viewport::column_width_calculator::{ColumnWidthDebugInfo, ColumnWidthEstimator};
use crate::ui::viewport::geometry_cache::RowSetId;
use crate::ui::viewport::virtualization_engine::{
    ColumnSlot, DatasetShape, PassReport, ScrollState, VirtualizationEngine,
};

/// Rows fetched to estimate column widths
const SAMPLE_ROWS: usize = 50;

pub struct GridView<S: ConfigStore> {
    schema: SchemaView,
    key: ViewKey,
    store: S,
    columns: Vec<ColumnConfig>,
    render_columns: Vec<ResolvedColumn>,
    schema_mismatches: Vec<GridError>,
    sample_rows: Vec<Row>,
    available_width: u32,
    sort: SortCoordinator,
    estimator: ColumnWidthEstimator,
    drag: DragReorderController,
    resize: ResizeController,
    virtualization: VirtualizationEngine,
}

impl<S: ConfigStore> GridView<S> {
    /// Loads the stored view, reconciles it with `schema` and writes it back
    /// if reconciliation changed anything.
    pub fn mount(
        schema: SchemaView,
        key: ViewKey,
        store: S,
        config: &Config,
        available_width: u32,
    ) -> GridResult<Self> {
        let stored = store
            .load(&key)
            .map_err(|e| GridError::Persistence(e.to_string()))?
            .unwrap_or_default();

        let origin = if stored.columns.is_some() {
            ConfigOrigin::Persisted
        } else {
            ConfigOrigin::Defaulted
        };
        info!(target: "grid_view",
            "Mounting {}/{} ({:?} configuration)",
            key.table, key.view, origin
        );

        let mut view = Self {
            schema,
            key,
            store,
            columns: Vec::new(),
            render_columns: Vec::new(),
            schema_mismatches: Vec::new(),
            sample_rows: Vec::new(),
            available_width,
            sort: SortCoordinator::new(stored.sort),
            estimator: ColumnWidthEstimator::new(config.widths.clone()),
            drag: DragReorderController::new(),
            resize: ResizeController::new(config.interaction.clone()),
            virtualization: VirtualizationEngine::new(config.virtualization.clone()),
        };

        view.refresh(stored.columns.as_deref(), origin, false)?;
        Ok(view)
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    /// The configuration as persisted
    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    /// Render-ready columns, widths included
    pub fn resolved_columns(&self) -> &[ResolvedColumn] {
        &self.render_columns
    }

    /// Columns that get a header, in header order
    pub fn visible_columns(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.render_columns.iter().filter(|c| c.is_visible())
    }

    pub fn header(&self, header_index: usize) -> Option<&ResolvedColumn> {
        self.visible_columns().nth(header_index)
    }

    pub fn sort(&self) -> Vec<ColumnSort> {
        self.sort.current()
    }

    pub fn sort_coordinator(&self) -> &SortCoordinator {
        &self.sort
    }

    pub fn last_sort_error(&self) -> Option<String> {
        self.sort.last_error()
    }

    /// Entries the last pipeline run dropped because their schema
    /// references are gone
    pub fn schema_mismatches(&self) -> &[GridError] {
        &self.schema_mismatches
    }

    pub fn width_debug_info(&self) -> &[ColumnWidthDebugInfo] {
        self.estimator.get_debug_info()
    }

    /// Re-runs the pipeline against a new schema snapshot
    pub fn on_schema_change(&mut self, schema: SchemaView) -> GridResult<()> {
        debug!(target: "grid_view", "Schema changed for {}", self.key.table);
        self.schema = schema;
        let columns = self.columns.clone();
        self.refresh(Some(&columns), ConfigOrigin::Persisted, false)
    }

    pub fn set_available_width(&mut self, width: u32) {
        if self.available_width != width {
            self.available_width = width;
            self.estimate();
        }
    }

    pub fn set_sample_rows(&mut self, rows: Vec<Row>) {
        self.sample_rows = rows;
        self.estimate();
    }

    /// Fetches the first page under the current sort and uses it as the
    /// width sample
    pub async fn load_sample_rows<R: RowSource>(&mut self, source: &R) -> Result<usize> {
        let request = FetchRequest::page(SAMPLE_ROWS, 0).with_sort(self.sort.current());
        let rows = source.fetch(&request).await?;
        let count = rows.len();
        self.set_sample_rows(rows);
        Ok(count)
    }

    // Sorting

    /// Proposed sort for a click on a header; nothing is committed yet
    pub fn header_click(&self, header_index: usize, shift: bool) -> Option<SortToggle> {
        let column = self.header(header_index)?;
        Some(self.sort.toggle(&column.config, shift))
    }

    /// Proposed sort after the user picked a sub-column of a nested header
    pub fn sub_column_click(&self, parent: &str, sub_column: &str, shift: bool) -> Vec<ColumnSort> {
        let key = nested_sort_key(parent, sub_column);
        toggle_sort_key(&key, &self.sort.current(), shift)
    }

    /// Validates `proposed` against the row source, commits and persists it.
    /// On rejection the previous sort stays active.
    pub async fn commit_sort<R: RowSource>(
        &self,
        source: &R,
        proposed: Vec<ColumnSort>,
    ) -> GridResult<Vec<ColumnSort>> {
        let proposed = retain_visible(&proposed, &self.columns);
        let committed = self.sort.commit(source, proposed).await?;
        self.persist()?;
        Ok(committed)
    }

    /// Header click followed by validation and commit
    pub async fn sort_by_header<R: RowSource>(
        &self,
        source: &R,
        header_index: usize,
        shift: bool,
    ) -> GridResult<Vec<ColumnSort>> {
        let Some(toggle) = self.header_click(header_index, shift) else {
            return Ok(self.sort.current());
        };
        let proposed = toggle.into_result()?;
        self.commit_sort(source, proposed).await
    }

    // Drag reorder

    pub fn drag_start(&mut self, header_index: usize) -> bool {
        header_index < self.visible_columns().count() && self.drag.drag_start(header_index)
    }

    pub fn drag_over(&mut self, header_index: usize) -> bool {
        self.drag.drag_over(header_index)
    }

    pub fn drag_cancel(&mut self) {
        self.drag.cancel();
    }

    /// Ends the drag; returns whether the column order changed
    pub fn drop_column(&mut self) -> GridResult<bool> {
        let Some(column_move) = self.drag.drop() else {
            return Ok(false);
        };
        let Some(columns) = column_move.apply(&self.columns) else {
            return Ok(false);
        };
        self.commit_columns(columns)?;
        Ok(true)
    }

    // Resize

    pub fn resize_start(&mut self, surface: &impl GridSurface, header_index: usize) -> bool {
        self.resize.pan_start(surface, header_index)
    }

    pub fn resize_move(&mut self, surface: &mut impl GridSurface, delta_x: f64) -> Option<f64> {
        self.resize.pan_move(surface, delta_x)
    }

    pub fn resize_cancel(&mut self, surface: &mut impl GridSurface) {
        self.resize.cancel(surface);
    }

    /// Ends the pan and stores the width; returns whether anything was stored
    pub fn resize_end(&mut self) -> GridResult<bool> {
        match self.resize.pan_end() {
            Some(commit) => self.commit_width(commit),
            None => Ok(false),
        }
    }

    pub fn auto_fit(&mut self, surface: &mut impl GridSurface, header_index: usize) -> GridResult<bool> {
        match self.resize.auto_fit(surface, header_index) {
            Some(commit) => self.commit_width(commit),
            None => Ok(false),
        }
    }

    /// A stored width switches estimation off for the whole view, so the
    /// widths currently on screen are stored along with it.
    fn commit_width(&mut self, commit: WidthCommit) -> GridResult<bool> {
        let mut columns = self.columns.clone();
        for column in columns.iter_mut().filter(|c| c.is_visible() && c.width.is_none()) {
            column.width = self
                .render_columns
                .iter()
                .find(|r| r.key() == column.name)
                .and_then(|r| r.width());
        }

        let Some(columns) = commit.apply(&columns) else {
            return Ok(false);
        };
        self.commit_columns(columns)?;
        Ok(true)
    }

    // Visibility

    pub fn set_column_shown(&mut self, name: &str, shown: bool) -> GridResult<bool> {
        let Some(position) = self.columns.iter().position(|c| c.name == name) else {
            return Ok(false);
        };
        if self.columns[position].is_visible() == shown {
            return Ok(false);
        }
        let mut columns = self.columns.clone();
        columns[position].show = Some(shown);
        self.commit_columns(columns)?;
        Ok(true)
    }

    /// Removes a column from the view.
    ///
    /// A function wrapping a stored column is unwrapped back to the plain
    /// column, synthetic columns are deleted, and plain columns are hidden
    /// since the reconciler would re-add them.
    pub fn remove_column(&mut self, name: &str) -> GridResult<bool> {
        let Some(position) = self.columns.iter().position(|c| c.name == name) else {
            return Ok(false);
        };

        let mut columns = self.columns.clone();
        match columns[position].role() {
            ColumnRole::WrappedColumn => {
                let entry = &mut columns[position];
                if let Some(source) = entry.computed_config.take().and_then(|c| c.column) {
                    entry.name = source;
                }
                debug!(target: "grid_view", "Unwrapped function column '{}'", name);
            }
            ColumnRole::Computed | ColumnRole::Nested => {
                columns.remove(position);
                debug!(target: "grid_view", "Deleted column '{}'", name);
            }
            ColumnRole::Plain => {
                if !columns[position].is_visible() {
                    return Ok(false);
                }
                columns[position].show = Some(false);
            }
        }

        self.commit_columns(columns)?;
        Ok(true)
    }

    // Virtualization

    /// Reports the row set just painted
    pub fn on_rows_rendered(&mut self, row_set: RowSetId, rows: &[Row]) {
        let shape = DatasetShape {
            row_count: rows.len(),
            max_row_keys: rows.iter().map(|r| r.len()).max().unwrap_or(0),
        };
        self.virtualization.set_row_set(row_set, shape);
    }

    pub fn on_scroll(&mut self, surface: &mut impl GridSurface, scroll: ScrollState) -> PassReport {
        self.virtualization.on_scroll(surface, scroll)
    }

    pub fn virtualization(&self) -> &VirtualizationEngine {
        &self.virtualization
    }

    // Pipeline

    fn commit_columns(&mut self, columns: Vec<ColumnConfig>) -> GridResult<()> {
        self.refresh(Some(&columns), ConfigOrigin::Persisted, true)
    }

    fn refresh(
        &mut self,
        existing: Option<&[ColumnConfig]>,
        origin: ConfigOrigin,
        force_persist: bool,
    ) -> GridResult<()> {
        let reconciliation =
            ColumnConfigReconciler::new(&self.schema).reconcile(&self.key.table, existing)?;
        let resolved = ColumnResolver::new(&self.schema).resolve(
            &self.key.table,
            &reconciliation.columns,
            origin,
        )?;

        // Keep what resolution settled on (defaults applied, invalid entries gone)
        let columns: Vec<ColumnConfig> = resolved.iter().map(|r| r.config.clone()).collect();
        let mut dirty = force_persist || reconciliation.changed || columns != reconciliation.columns;
        self.columns = columns;
        self.schema_mismatches = reconciliation.mismatches;

        let sort = self.sort.current();
        let kept = retain_visible(&sort, &self.columns);
        if kept.len() != sort.len() {
            debug!(target: "grid_view",
                "Dropping {} sort entries for hidden or removed columns",
                sort.len() - kept.len()
            );
            self.sort.replace(kept);
            dirty = true;
        }

        self.render_columns = resolved;
        self.estimate();

        if dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn estimate(&mut self) {
        let columns: Vec<ResolvedColumn> = self
            .render_columns
            .drain(..)
            .map(|mut column| {
                // Estimated widths are never kept; only stored ones survive
                column.config.width = self
                    .columns
                    .iter()
                    .find(|c| c.name == column.config.name)
                    .and_then(|c| c.width);
                column
            })
            .collect();
        self.render_columns =
            self.estimator
                .estimate_widths(columns, &self.sample_rows, self.available_width);

        let layout: Vec<ColumnSlot> = self
            .visible_columns()
            .map(|c| ColumnSlot::new(c.key(), c.width()))
            .collect();
        self.virtualization.set_columns(layout);
    }

    fn persist(&self) -> GridResult<()> {
        let document = PersistedView {
            columns: Some(self.columns.clone()),
            sort: self.sort.current(),
        };
        self.store
            .save(&self.key, &document)
            .map_err(|e| GridError::Persistence(e.to_string()))?;
        debug!(target: "grid_view",
            "Persisted {}/{}: {} columns, {} sort entries",
            self.key.table,
            self.key.view,
            self.columns.len(),
            document.sort.len()
        );
        Ok(())
    }
}
