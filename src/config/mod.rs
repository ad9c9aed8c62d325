//! Configuration module
//!
//! Width, virtualization and interaction settings loaded from the TOML
//! config file.

pub mod config;
