use serde_json::Value;
use tracing::debug;

use crate::config::config::WidthConfig;
use crate::data::column_resolver::ResolvedColumn;
use crate::data::row_source::Row;
use crate::data::schema::ColumnKind;

/// Debug information for column width calculations
/// (column_name, max_content_chars, final_width, sample_count)
pub type ColumnWidthDebugInfo = (String, usize, u32, u32);

/// Assigns pixel widths to resolved columns that have none.
///
/// Explicit widths win globally: if any column already has one, nothing is
/// estimated, so a view never mixes user-chosen and estimated widths.
pub struct ColumnWidthEstimator {
    config: WidthConfig,
    /// Debug info for the last estimation run
    column_width_debug: Vec<ColumnWidthDebugInfo>,
}

impl ColumnWidthEstimator {
    pub fn new(config: WidthConfig) -> Self {
        Self {
            config,
            column_width_debug: Vec::new(),
        }
    }

    /// Get debug information about the last estimation
    pub fn get_debug_info(&self) -> &[ColumnWidthDebugInfo] {
        &self.column_width_debug
    }

    pub fn estimate_widths(
        &mut self,
        mut columns: Vec<ResolvedColumn>,
        sample_rows: &[Row],
        available_width: u32,
    ) -> Vec<ResolvedColumn> {
        self.column_width_debug.clear();

        if columns.iter().any(|c| c.width().is_some()) {
            debug!(target: "column_width", "Explicit widths present, skipping estimation");
            return columns;
        }

        let visible: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_visible())
            .map(|(idx, _)| idx)
            .collect();

        let Some(&last_idx) = visible.last() else {
            return columns;
        };

        if visible.len() == 1 && !columns[last_idx].is_numeric() {
            let width = available_width.saturating_sub(self.config.sole_column_margin);
            debug!(target: "column_width",
                "Single column '{}' fills the grid: {}px",
                columns[last_idx].key(), width
            );
            columns[last_idx].config.width = Some(width);
            return columns;
        }

        for &idx in &visible {
            let width = self.width_for(&columns[idx], sample_rows);
            columns[idx].config.width = Some(width);
        }

        if !columns[last_idx].is_numeric() {
            let prior: u32 = visible
                .iter()
                .filter(|&&idx| idx != last_idx)
                .filter_map(|&idx| columns[idx].width())
                .sum();
            let current = columns[last_idx].width().unwrap_or(self.config.min_width);
            let stretched = current.max(available_width.saturating_sub(prior));
            if stretched != current {
                debug!(target: "column_width",
                    "Stretching last column '{}' from {}px to {}px",
                    columns[last_idx].key(), current, stretched
                );
            }
            columns[last_idx].config.width = Some(stretched);
        }

        columns
    }

    fn fixed_width(&self, kind: ColumnKind) -> Option<u32> {
        match kind {
            ColumnKind::Identifier => Some(self.config.identifier_width),
            ColumnKind::Geographic => Some(self.config.geo_width),
            ColumnKind::Timestamp => Some(self.config.timestamp_width),
            ColumnKind::Boolean => Some(self.config.boolean_width),
            ColumnKind::Numeric => Some(self.config.numeric_width),
            _ => None,
        }
    }

    fn width_for(&mut self, column: &ResolvedColumn, sample_rows: &[Row]) -> u32 {
        if let Some(width) = self.fixed_width(column.kind()) {
            self.column_width_debug
                .push((column.key().to_string(), 0, width, 0));
            return width;
        }

        let mut width = self.config.min_width;
        let mut max_chars = 0usize;
        let mut samples = 0u32;

        for row in sample_rows {
            let chars = serialized_len(row.get(column.key()));
            let cell_width = (chars as u32)
                .saturating_mul(self.config.char_width)
                .clamp(self.config.min_width, self.config.max_width);

            max_chars = max_chars.max(chars);
            width = width.max(cell_width);
            samples += 1;
        }

        self.column_width_debug
            .push((column.key().to_string(), max_chars, width, samples));
        width
    }
}

/// Length of a cell as it would be printed
fn serialized_len(value: Option<&Value>) -> usize {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::String(s)) => s.chars().count(),
        Some(other) => other.to_string().chars().count(),
    }
}
