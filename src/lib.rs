pub mod build_pipeline;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod keyboard;
pub mod project;
