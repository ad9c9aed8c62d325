//! Interaction layer
//!
//! Gesture controllers, sort negotiation, the paint handle and the grid view
//! wiring them together.

pub mod drag_reorder;
pub mod grid_view;
pub mod paint_handle;
pub mod resize_controller;
pub mod sort_coordinator;
pub mod viewport;
