use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::Result;

/// Handle for a set of watched files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription(pub u64);

/// A watched file was created or modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub subscription: Subscription,
    pub path: PathBuf,
}

/// Trait for sources of file change notifications.
pub trait ChangeSource {
    /// Starts watching `paths` as one subscription.
    ///
    /// # Arguments
    /// * `paths` - Canonical paths of the files to watch; they need not exist yet
    ///
    /// # Returns
    /// * `Result<Subscription>` - Handle carried by the events of these files
    fn subscribe(&mut self, paths: &BTreeSet<PathBuf>) -> Result<Subscription>;

    /// Stops watching the files of `subscription`.
    fn unsubscribe(&mut self, subscription: Subscription) -> Result<()>;

    /// Blocks until a subscribed file changes.
    ///
    /// # Returns
    /// * `Option<ChangeEvent>` - The change, or `None` once the source is closed
    fn next_event(&mut self) -> Option<ChangeEvent>;
}
