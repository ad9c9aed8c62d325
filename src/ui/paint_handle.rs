//! Imperative handle onto rendered grid geometry.
//!
//! The renderer owns the visual elements; gesture controllers and the
//! virtualization engine only reach them through [`GridSurface`], addressing
//! nodes by row/column position rather than by element identity. This keeps
//! the fast path (pinning sizes, toggling display, live resize) out of the
//! column configuration, which only changes on commit.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Address of a rendered node within the current row set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Header(usize),
    Row(usize),
    Cell { row: usize, column: usize },
}

/// Display style of a node; `None` hides it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Display {
    None,
    #[default]
    Block,
    Flex,
    Grid,
    TableRow,
    TableCell,
    Other(String),
}

impl Display {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Display::None)
    }
}

pub trait GridSurface {
    fn row_count(&self) -> usize;

    fn cell_count(&self, row: usize) -> usize;

    /// Rendered header count
    fn column_count(&self) -> usize;

    /// Bounding box in content coordinates, `None` if the node is missing or
    /// currently not laid out
    fn measure(&self, node: NodeRef) -> Option<Rect>;

    fn display(&self, node: NodeRef) -> Option<Display>;

    fn set_display(&mut self, node: NodeRef, display: Display);

    /// Fixes the node at its measured size and position so later layout
    /// changes (including hiding siblings) do not move it
    fn pin_geometry(&mut self, node: NodeRef, rect: Rect);

    fn set_width(&mut self, node: NodeRef, width: f64);

    /// Width of the node's text content in the column font
    fn measure_text(&self, node: NodeRef) -> Option<f64>;

    fn document_width(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryNode {
    rect: Rect,
    display: Display,
    pinned: bool,
    text_width: f64,
}

impl MemoryNode {
    fn new(rect: Rect, display: Display, text_width: f64) -> Self {
        Self {
            rect,
            display,
            pinned: false,
            text_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryRow {
    node: MemoryNode,
    cells: Vec<MemoryNode>,
}

/// Headless surface keeping geometry in memory.
///
/// Rows flow top to bottom; with reflow enabled, pinning a row takes it out
/// of the flow and every later unpinned row moves up by its height, like an
/// element switched to absolute positioning.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySurface {
    headers: Vec<MemoryNode>,
    rows: Vec<MemoryRow>,
    document_width: f64,
    reflow_on_pin: bool,
    detached: HashSet<NodeRef>,
    display_writes: usize,
}

impl MemorySurface {
    /// A grid of `rows` x `columns` equally sized cells below a header row
    pub fn uniform(
        rows: usize,
        columns: usize,
        row_height: f64,
        column_width: f64,
    ) -> Self {
        let headers = (0..columns)
            .map(|c| {
                MemoryNode::new(
                    Rect::new(c as f64 * column_width, 0.0, column_width, row_height),
                    Display::TableCell,
                    column_width / 2.0,
                )
            })
            .collect();

        let rows = (0..rows)
            .map(|r| {
                let y = row_height * (r as f64 + 1.0);
                MemoryRow {
                    node: MemoryNode::new(
                        Rect::new(0.0, y, column_width * columns as f64, row_height),
                        Display::TableRow,
                        0.0,
                    ),
                    cells: (0..columns)
                        .map(|c| {
                            MemoryNode::new(
                                Rect::new(c as f64 * column_width, y, column_width, row_height),
                                Display::TableCell,
                                column_width / 2.0,
                            )
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            headers,
            rows,
            document_width: column_width * columns as f64,
            reflow_on_pin: false,
            detached: HashSet::new(),
            display_writes: 0,
        }
    }

    pub fn with_reflow_on_pin(mut self) -> Self {
        self.reflow_on_pin = true;
        self
    }

    pub fn with_document_width(mut self, width: f64) -> Self {
        self.document_width = width;
        self
    }

    pub fn set_text_width(&mut self, node: NodeRef, width: f64) {
        if let Some(n) = self.node_mut(node) {
            n.text_width = width;
        }
    }

    /// Repaints without column `column`: its header and cells go away and
    /// everything to the right moves left by its width. Row elements are
    /// reused as they are, display included.
    pub fn remove_column(&mut self, column: usize) {
        if column >= self.headers.len() {
            return;
        }
        let width = self.headers.remove(column).rect.width;
        for header in self.headers.iter_mut().skip(column) {
            header.rect.x -= width;
        }
        for row in self.rows.iter_mut() {
            if column >= row.cells.len() {
                continue;
            }
            let removed = row.cells.remove(column);
            for cell in row.cells.iter_mut().skip(column) {
                cell.rect.x -= removed.rect.width;
            }
            row.node.rect.width -= removed.rect.width;
        }
        self.document_width -= width;
    }

    /// Makes a node unmeasurable, as if it had been removed from the document
    pub fn detach(&mut self, node: NodeRef) {
        self.detached.insert(node);
    }

    pub fn attach(&mut self, node: NodeRef) {
        self.detached.remove(&node);
    }

    pub fn is_hidden(&self, node: NodeRef) -> bool {
        self.node(node).map_or(false, |n| n.display.is_hidden())
    }

    pub fn is_pinned(&self, node: NodeRef) -> bool {
        self.node(node).map_or(false, |n| n.pinned)
    }

    pub fn width_of(&self, node: NodeRef) -> Option<f64> {
        self.node(node).map(|n| n.rect.width)
    }

    /// Number of display changes applied so far
    pub fn display_writes(&self) -> usize {
        self.display_writes
    }

    pub fn hidden_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&r| self.is_hidden(NodeRef::Row(r)))
            .collect()
    }

    fn node(&self, node: NodeRef) -> Option<&MemoryNode> {
        match node {
            NodeRef::Header(c) => self.headers.get(c),
            NodeRef::Row(r) => self.rows.get(r).map(|row| &row.node),
            NodeRef::Cell { row, column } => self.rows.get(row)?.cells.get(column),
        }
    }

    fn node_mut(&mut self, node: NodeRef) -> Option<&mut MemoryNode> {
        match node {
            NodeRef::Header(c) => self.headers.get_mut(c),
            NodeRef::Row(r) => self.rows.get_mut(r).map(|row| &mut row.node),
            NodeRef::Cell { row, column } => self.rows.get_mut(row)?.cells.get_mut(column),
        }
    }

    fn reflow_after(&mut self, pinned_row: usize, height: f64) {
        for row in self.rows.iter_mut().skip(pinned_row + 1) {
            if row.node.pinned {
                continue;
            }
            row.node.rect.y -= height;
            for cell in row.cells.iter_mut().filter(|c| !c.pinned) {
                cell.rect.y -= height;
            }
        }
    }
}

impl GridSurface for MemorySurface {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell_count(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, |r| r.cells.len())
    }

    fn column_count(&self) -> usize {
        self.headers.len()
    }

    fn measure(&self, node: NodeRef) -> Option<Rect> {
        if self.detached.contains(&node) {
            return None;
        }
        let n = self.node(node)?;
        if n.display.is_hidden() {
            return None;
        }
        Some(n.rect)
    }

    fn display(&self, node: NodeRef) -> Option<Display> {
        self.node(node).map(|n| n.display.clone())
    }

    fn set_display(&mut self, node: NodeRef, display: Display) {
        if let Some(n) = self.node_mut(node) {
            n.display = display;
            self.display_writes += 1;
        }
    }

    fn pin_geometry(&mut self, node: NodeRef, rect: Rect) {
        let was_pinned = match self.node_mut(node) {
            Some(n) => {
                let was_pinned = n.pinned;
                n.rect = rect;
                n.pinned = true;
                was_pinned
            }
            None => return,
        };

        if let NodeRef::Row(row) = node {
            if self.reflow_on_pin && !was_pinned {
                self.reflow_after(row, rect.height);
            }
        }
    }

    fn set_width(&mut self, node: NodeRef, width: f64) {
        if let Some(n) = self.node_mut(node) {
            n.rect.width = width;
        }
    }

    fn measure_text(&self, node: NodeRef) -> Option<f64> {
        if self.detached.contains(&node) {
            return None;
        }
        self.node(node).map(|n| n.text_width)
    }

    fn document_width(&self) -> f64 {
        self.document_width
    }
}
