use tracing::{debug, trace};

use crate::config::config::InteractionConfig;
use crate::data::column_config::ColumnConfig;
use crate::ui::paint_handle::{GridSurface, NodeRef};

/// A width to store for the column behind header `header_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthCommit {
    pub header_index: usize,
    pub width: u32,
}

impl WidthCommit {
    /// Writes the width into the visible entry at this header position
    pub fn apply(&self, columns: &[ColumnConfig]) -> Option<Vec<ColumnConfig>> {
        let position = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_visible())
            .map(|(idx, _)| idx)
            .nth(self.header_index)?;

        let mut updated = columns.to_vec();
        updated[position].width = Some(self.width);
        Some(updated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveResize {
    header_index: usize,
    captured_width: f64,
    current_width: f64,
}

/// Pan gesture on a header's trailing edge.
///
/// While panning, the new width goes straight to the rendered header and
/// its cells; the configuration only changes on `pan_end`.
#[derive(Debug)]
pub struct ResizeController {
    config: InteractionConfig,
    active: Option<ActiveResize>,
}

impl ResizeController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn is_resizing(&self) -> bool {
        self.active.is_some()
    }

    pub fn pan_start(&mut self, surface: &impl GridSurface, header_index: usize) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(rect) = surface.measure(NodeRef::Header(header_index)) else {
            debug!(target: "resize", "Header {} not measurable, ignoring pan", header_index);
            return false;
        };
        self.active = Some(ActiveResize {
            header_index,
            captured_width: rect.width,
            current_width: rect.width,
        });
        true
    }

    /// Applies `captured + delta_x`, floored at the minimum column width.
    /// Returns the width now on screen.
    pub fn pan_move(&mut self, surface: &mut impl GridSurface, delta_x: f64) -> Option<f64> {
        let min_width = f64::from(self.config.min_column_width);
        let active = self.active.as_mut()?;
        let width = (active.captured_width + delta_x).max(min_width);
        active.current_width = width;

        let column = active.header_index;
        apply_column_width(surface, column, width);
        trace!(target: "resize", "Header {} live width {:.1}", column, width);
        Some(width)
    }

    pub fn pan_end(&mut self) -> Option<WidthCommit> {
        let active = self.active.take()?;
        let commit = WidthCommit {
            header_index: active.header_index,
            width: active.current_width.round() as u32,
        };
        debug!(target: "resize",
            "Header {} resized {:.0} -> {}",
            commit.header_index, active.captured_width, commit.width
        );
        Some(commit)
    }

    /// Drops an in-progress pan, restoring the captured width on screen
    pub fn cancel(&mut self, surface: &mut impl GridSurface) {
        if let Some(active) = self.active.take() {
            apply_column_width(surface, active.header_index, active.captured_width);
        }
    }

    /// Double-click on the edge: fit the widest cell text plus a margin, at
    /// most a fraction of the document width. The cap wins over the minimum
    /// column width on very narrow documents.
    pub fn auto_fit(&self, surface: &mut impl GridSurface, header_index: usize) -> Option<WidthCommit> {
        let widest = (0..surface.row_count())
            .filter_map(|row| {
                surface.measure_text(NodeRef::Cell {
                    row,
                    column: header_index,
                })
            })
            .fold(None, |max: Option<f64>, w| Some(max.map_or(w, |m| m.max(w))))?;

        let limit = surface.document_width() * self.config.autofit_max_fraction;
        let width = (widest + f64::from(self.config.autofit_margin))
            .max(f64::from(self.config.min_column_width))
            .min(limit);

        apply_column_width(surface, header_index, width);
        debug!(target: "resize",
            "Auto-fit header {}: widest text {:.1}, width {:.0}",
            header_index, widest, width
        );
        Some(WidthCommit {
            header_index,
            width: width.round() as u32,
        })
    }
}

fn apply_column_width(surface: &mut impl GridSurface, column: usize, width: f64) {
    surface.set_width(NodeRef::Header(column), width);
    for row in 0..surface.row_count() {
        if column < surface.cell_count(row) {
            surface.set_width(NodeRef::Cell { row, column }, width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::paint_handle::MemorySurface;

    fn controller() -> ResizeController {
        ResizeController::new(InteractionConfig::default())
    }

    #[test]
    fn test_pan_updates_header_and_cells_live() {
        let mut surface = MemorySurface::uniform(5, 3, 20.0, 100.0);
        let mut resize = controller();

        assert!(resize.pan_start(&surface, 1));
        assert_eq!(resize.pan_move(&mut surface, 40.0), Some(140.0));
        assert_eq!(surface.width_of(NodeRef::Header(1)), Some(140.0));
        assert_eq!(surface.width_of(NodeRef::Cell { row: 4, column: 1 }), Some(140.0));
        assert_eq!(surface.width_of(NodeRef::Cell { row: 4, column: 0 }), Some(100.0));

        // Deltas are relative to the captured width, not cumulative
        assert_eq!(resize.pan_move(&mut surface, -10.0), Some(90.0));

        let commit = resize.pan_end().unwrap();
        assert_eq!(commit, WidthCommit { header_index: 1, width: 90 });
        assert!(!resize.is_resizing());
    }

    #[test]
    fn test_width_never_below_minimum() {
        let mut surface = MemorySurface::uniform(2, 1, 20.0, 100.0);
        let mut resize = controller();
        resize.pan_start(&surface, 0);
        assert_eq!(resize.pan_move(&mut surface, -500.0), Some(30.0));
        assert_eq!(resize.pan_end().unwrap().width, 30);
    }

    #[test]
    fn test_gestures_without_start_are_ignored() {
        let mut surface = MemorySurface::uniform(2, 1, 20.0, 100.0);
        let mut resize = controller();
        assert!(resize.pan_move(&mut surface, 10.0).is_none());
        assert!(resize.pan_end().is_none());

        surface.detach(NodeRef::Header(0));
        assert!(!resize.pan_start(&surface, 0));
    }

    #[test]
    fn test_cancel_restores_width() {
        let mut surface = MemorySurface::uniform(2, 1, 20.0, 100.0);
        let mut resize = controller();
        resize.pan_start(&surface, 0);
        resize.pan_move(&mut surface, 60.0);
        resize.cancel(&mut surface);
        assert_eq!(surface.width_of(NodeRef::Cell { row: 1, column: 0 }), Some(100.0));
        assert!(resize.pan_end().is_none());
    }

    #[test]
    fn test_auto_fit_uses_widest_text() {
        let mut surface = MemorySurface::uniform(3, 2, 20.0, 100.0).with_document_width(1000.0);
        surface.set_text_width(NodeRef::Cell { row: 1, column: 0 }, 180.0);

        let commit = controller().auto_fit(&mut surface, 0).unwrap();
        assert_eq!(commit.width, 200);
        assert_eq!(surface.width_of(NodeRef::Header(0)), Some(200.0));
    }

    #[test]
    fn test_auto_fit_capped_at_half_document() {
        let mut surface = MemorySurface::uniform(3, 2, 20.0, 100.0).with_document_width(400.0);
        surface.set_text_width(NodeRef::Cell { row: 0, column: 1 }, 900.0);

        let commit = controller().auto_fit(&mut surface, 1).unwrap();
        assert_eq!(commit.width, 200);
    }

    #[test]
    fn test_auto_fit_cap_beats_minimum_width() {
        let mut surface = MemorySurface::uniform(2, 1, 20.0, 100.0).with_document_width(40.0);
        surface.set_text_width(NodeRef::Cell { row: 0, column: 0 }, 5.0);

        let commit = controller().auto_fit(&mut surface, 0).unwrap();
        assert_eq!(commit.width, 20);

        // Short text on a wide document still gets the minimum
        let mut surface = MemorySurface::uniform(2, 1, 20.0, 100.0).with_document_width(1000.0);
        surface.set_text_width(NodeRef::Cell { row: 0, column: 0 }, 2.0);
        surface.set_text_width(NodeRef::Cell { row: 1, column: 0 }, 2.0);
        assert_eq!(controller().auto_fit(&mut surface, 0).unwrap().width, 30);
    }

    #[test]
    fn test_commit_targets_visible_entry() {
        let columns = vec![
            ColumnConfig::new("a").hidden(),
            ColumnConfig::new("b"),
            ColumnConfig::new("c"),
        ];
        let updated = WidthCommit { header_index: 1, width: 77 }.apply(&columns).unwrap();
        assert_eq!(updated[2].width, Some(77));
        assert_eq!(updated[1].width, None);
        assert!(WidthCommit { header_index: 2, width: 1 }.apply(&columns).is_none());
    }
}
