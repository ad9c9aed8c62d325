pub mod column_width_calculator;
pub mod geometry_cache;
pub mod virtualization_engine;
