//! Auto-render mode.
//!
//! This module contains:
//! - `source`: The [`ChangeSource`] trait the renderer receives file changes through
//! - `notify_watcher`: The `notify`-backed implementation
//! - `auto_render`: The loop that renders a definition again when its files change

pub mod auto_render;
pub mod notify_watcher;
pub mod source;

pub use auto_render::AutoRenderer;
pub use notify_watcher::NotifyWatcher;
pub use source::{ChangeEvent, ChangeSource, Subscription};
