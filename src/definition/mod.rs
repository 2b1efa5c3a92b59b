//! Definition documents and their expansion into render targets.
//!
//! A definition lists templates to render and the variables they see, and may
//! include other definitions. [`DefinitionTree::parse`] loads a definition and
//! everything it includes; [`DefinitionTree::resolve_contexts`] walks the tree
//! and yields one [`RenderTarget`] per template entry.

pub mod document;
pub mod target;
pub mod tree;

pub use document::{Document, TemplateSource};
pub use target::RenderTarget;
pub use tree::DefinitionTree;
