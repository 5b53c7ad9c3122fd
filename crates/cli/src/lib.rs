//! Command line interface for the nestloader discovery engine.

pub mod args;
pub mod config;
pub mod output;
pub mod scan;
pub mod ui;
