use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::source::{ChangeEvent, ChangeSource, Subscription};
use crate::error::Result;
use crate::ioutils::file_digest;
use crate::orchestrator::{DefinitionOutcome, DefinitionReport, Orchestrator};

struct WatchedDefinition {
    definition: PathBuf,
    /// Content digest of every source file when it was last rendered
    digests: HashMap<PathBuf, Option<String>>,
}

/// Renders definitions, then renders them again whenever their files change.
pub struct AutoRenderer<'a, S: ChangeSource> {
    orchestrator: Orchestrator<'a>,
    source: S,
    watched: BTreeMap<Subscription, WatchedDefinition>,
}

impl<'a, S: ChangeSource> AutoRenderer<'a, S> {
    pub fn new(orchestrator: Orchestrator<'a>, source: S) -> Self {
        Self { orchestrator, source, watched: BTreeMap::new() }
    }

    /// Processes every definition once, then re-processes a definition each
    /// time one of its source files changes.
    ///
    /// Returns when the change source is closed. Render failures are logged
    /// and never stop the loop.
    ///
    /// # Arguments
    /// * `definitions` - Definition files to render and watch
    ///
    /// # Returns
    /// * `Result<bool>` - Whether the initial pass succeeded; an error if the
    ///   initial subscriptions could not be made
    pub fn run(&mut self, definitions: &[PathBuf]) -> Result<bool> {
        log::info!("Starting auto renderer...");
        let mut all_ok = true;
        for definition in definitions {
            let report = self.orchestrator.run_definition(definition);
            all_ok &= report.succeeded();
            self.watch(report)?;
        }

        log::debug!("Listening for file changes...");
        while let Some(event) = self.source.next_event() {
            self.handle_change(event);
        }
        log::info!("Auto renderer stopped");
        Ok(all_ok)
    }

    fn watch(&mut self, report: DefinitionReport) -> Result<()> {
        let subscription = self.source.subscribe(&report.sources)?;
        let digests =
            report.sources.iter().map(|path| (path.clone(), file_digest(path).ok())).collect();
        log::debug!(
            "Watching {} file(s) of '{}'",
            report.sources.len(),
            report.path.display()
        );
        self.watched.insert(subscription, WatchedDefinition { definition: report.path, digests });
        Ok(())
    }

    fn handle_change(&mut self, event: ChangeEvent) {
        let Some(watched) = self.watched.get(&event.subscription) else {
            log::trace!("Ignoring change of '{}' from a closed subscription", event.path.display());
            return;
        };
        let digest = file_digest(&event.path).ok();
        if watched.digests.get(&event.path) == Some(&digest) {
            log::debug!("'{}' content unchanged, skipping render", event.path.display());
            return;
        }

        let definition = watched.definition.clone();
        let previous_sources: Vec<PathBuf> = watched.digests.keys().cloned().collect();
        log::info!("'{}' changed, rendering '{}'", event.path.display(), definition.display());
        let mut report = self.orchestrator.run_definition(&definition);
        match report.outcome {
            DefinitionOutcome::LoadFailed(_) => {
                // keep watching the files of the last good load so a fix is noticed
                report.sources.extend(previous_sources);
                log::error!("Rendering '{}' failed", definition.display());
            }
            _ if report.succeeded() => log::info!("Rendered '{}'", definition.display()),
            _ => log::error!("Rendering '{}' failed", definition.display()),
        }

        self.watched.remove(&event.subscription);
        if let Err(e) = self.source.unsubscribe(event.subscription) {
            log::warn!("{e}");
        }
        if let Err(e) = self.watch(report) {
            log::error!("Cannot watch files of '{}': {e}", definition.display());
        }
    }
}
