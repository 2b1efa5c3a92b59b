use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::Error;

/// Outcome of rendering one target.
#[derive(Debug)]
pub enum RenderResult {
    /// The destination was written
    Success { target: String, destination: PathBuf },
    /// The destination exists and overwriting it is not allowed
    Skipped { target: String, destination: PathBuf },
    /// Rendering or writing the target failed
    Failed { target: String, error: Error },
}

impl RenderResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, RenderResult::Failed { .. })
    }

    /// Gets a message describing the result.
    pub fn get_message(&self) -> String {
        match self {
            RenderResult::Success { destination, .. } => {
                format!("Created file '{}'", destination.display())
            }
            RenderResult::Skipped { destination, .. } => {
                format!(
                    "Skipping '{}' (file exists, use --force to overwrite)",
                    destination.display()
                )
            }
            RenderResult::Failed { target, error } => format!("{target}: {error}"),
        }
    }
}

#[derive(Debug)]
pub enum DefinitionOutcome {
    /// The definition loaded; one result per target, in document order
    Rendered(Vec<RenderResult>),
    /// The definition could not be loaded, nothing was rendered
    LoadFailed(Error),
}

/// Everything that happened while processing one definition file.
#[derive(Debug)]
pub struct DefinitionReport {
    pub path: PathBuf,
    pub outcome: DefinitionOutcome,
    /// Files whose change should trigger processing the definition again
    pub sources: BTreeSet<PathBuf>,
}

impl DefinitionReport {
    /// True iff the definition loaded and no target failed.
    pub fn succeeded(&self) -> bool {
        match &self.outcome {
            DefinitionOutcome::Rendered(results) => !results.iter().any(RenderResult::is_failure),
            DefinitionOutcome::LoadFailed(_) => false,
        }
    }

    pub fn results(&self) -> &[RenderResult] {
        match &self.outcome {
            DefinitionOutcome::Rendered(results) => results,
            DefinitionOutcome::LoadFailed(_) => &[],
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RenderResult> {
        self.results().iter().filter(|r| r.is_failure())
    }
}
