use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::source::{ChangeEvent, ChangeSource, Subscription};
use crate::error::Result;
use crate::ioutils::source_key;

/// [`ChangeSource`] backed by the platform's file notification API.
///
/// Watches the parent directory of every subscribed file, so files that do
/// not exist yet or are replaced by rename are still noticed.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    subscriptions: BTreeMap<Subscription, BTreeSet<PathBuf>>,
    /// Number of subscribed files per watched directory
    watched_dirs: HashMap<PathBuf, usize>,
    pending: VecDeque<ChangeEvent>,
    next_id: u64,
}

impl NotifyWatcher {
    pub fn new() -> Result<Self> {
        let (event_tx, events) = channel();
        let watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;
        Ok(Self {
            watcher,
            events,
            subscriptions: BTreeMap::new(),
            watched_dirs: HashMap::new(),
            pending: VecDeque::new(),
            next_id: 0,
        })
    }

    fn queue_event(&mut self, event: Event) {
        if !is_relevant_event_kind(&event.kind) {
            return;
        }
        for path in event.paths {
            let path = source_key(&path);
            for (subscription, files) in &self.subscriptions {
                if files.contains(&path) {
                    log::trace!("Change of '{}' for {subscription:?}", path.display());
                    self.pending.push_back(ChangeEvent { subscription: *subscription, path: path.clone() });
                }
            }
        }
    }
}

impl ChangeSource for NotifyWatcher {
    fn subscribe(&mut self, paths: &BTreeSet<PathBuf>) -> Result<Subscription> {
        for dir in paths.iter().filter_map(|path| directory_to_watch(path)) {
            let count = self.watched_dirs.entry(dir.clone()).or_insert(0);
            if *count == 0 {
                if dir.is_dir() {
                    self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
                    log::debug!("Watching directory '{}'", dir.display());
                } else {
                    log::warn!("Cannot watch '{}': directory does not exist", dir.display());
                }
            }
            *count += 1;
        }

        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(subscription, paths.clone());
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: Subscription) -> Result<()> {
        let Some(paths) = self.subscriptions.remove(&subscription) else {
            return Ok(());
        };
        for dir in paths.iter().filter_map(|path| directory_to_watch(path)) {
            let Some(count) = self.watched_dirs.get_mut(&dir) else { continue };
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.watched_dirs.remove(&dir);
                if let Err(e) = self.watcher.unwatch(&dir) {
                    log::debug!("Unwatching '{}': {e}", dir.display());
                }
            }
        }
        self.pending.retain(|event| event.subscription != subscription);
        Ok(())
    }

    fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.events.recv() {
                Ok(Ok(event)) => self.queue_event(event),
                Ok(Err(e)) => log::warn!("File watcher error: {e}"),
                Err(_) => return None,
            }
        }
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn directory_to_watch(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn only_create_and_modify_are_relevant() {
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_relevant_event_kind(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_relevant_event_kind(&EventKind::Access(notify::event::AccessKind::Any)));
    }

    #[test]
    fn events_are_routed_to_subscriptions() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = source_key(dir.path().join("a.yml"));
        let b = source_key(dir.path().join("b.yml"));

        let mut watcher = NotifyWatcher::new().unwrap();
        let first = watcher.subscribe(&BTreeSet::from([a.clone()])).unwrap();
        let second = watcher.subscribe(&BTreeSet::from([a.clone(), b.clone()])).unwrap();
        assert_ne!(first, second);

        watcher.queue_event(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(b.clone()));
        watcher.queue_event(Event::new(EventKind::Remove(RemoveKind::File)).add_path(a.clone()));
        assert_eq!(watcher.pending.len(), 1);

        watcher.queue_event(Event::new(EventKind::Create(CreateKind::File)).add_path(a.clone()));
        assert_eq!(watcher.pending.len(), 3);

        watcher.unsubscribe(second).unwrap();
        assert_eq!(
            watcher.next_event(),
            Some(ChangeEvent { subscription: first, path: a })
        );
        assert!(watcher.watched_dirs.values().all(|count| *count == 1));
    }
}
