//! Template rendering for templer
//!
//! This module contains the rendering components:
//! - `interface`: The [`TemplateRenderer`] trait the rest of the crate renders through
//! - `minijinja`: The MiniJinja-backed implementation
//! - `filters`: The fixed registry of custom filters installed into the engine
//! - `omit`: The `omit` placeholder and its removal from rendered YAML

pub mod filters;
pub mod interface;
pub mod minijinja;
pub mod omit;

pub use interface::TemplateRenderer;
pub use minijinja::MiniJinjaRenderer;
