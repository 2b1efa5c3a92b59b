/// Handles argument parsing and dispatch.
pub mod cli;

/// Constants used throughout templer.
pub mod constants;

/// Variable contexts and their merge rules.
pub mod context;

/// Definition documents and their expansion into render targets.
pub mod definition;

/// Defines custom error types.
pub mod error;

/// Extension traits for standard library types.
pub mod ext;

/// A set of helpers for working with the file system.
pub mod ioutils;

/// Renders definitions and writes their targets.
pub mod orchestrator;

/// Template parsing and rendering functionality.
pub mod renderer;

/// Auto-render mode: file watching and re-rendering.
pub mod watch;
