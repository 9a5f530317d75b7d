//! ChangeFeed: fans [`ChangeEvent`]s out to `on_change` listeners.
//!
//! A listener is either global or scoped to one table. Scoped listeners see
//! only that table's events plus the events that carry no table
//! ([`ChangeEvent::Confirmed`], [`ChangeEvent::Complete`]).
//!
//! The listener list is copied before each emit, so a listener may add or
//! remove listeners (including itself) while running; the change takes
//! effect on the next event. A panicking listener is logged and skipped.

use std::sync::Arc;

use parking_lot::Mutex;

use super::event::ChangeEvent;

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Entry {
    id: ListenerId,
    table: Option<String>,
    callback: Listener,
}

impl Entry {
    fn wants(&self, event: &ChangeEvent) -> bool {
        match (&self.table, event.table()) {
            (Some(scope), Some(table)) => scope == table,
            _ => true,
        }
    }
}

#[derive(Default)]
pub struct ChangeFeed {
    entries: Mutex<Vec<Entry>>,
    next_id: Mutex<ListenerId>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to every event.
    pub fn listen(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        self.add(None, Arc::new(callback))
    }

    /// Listen to the events of one table.
    pub fn listen_table(
        &self,
        table: &str,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.add(Some(table.to_string()), Arc::new(callback))
    }

    /// Unknown ids are ignored.
    pub fn remove(&self, id: ListenerId) {
        self.entries.lock().retain(|e| e.id != id);
    }

    pub fn emit(&self, event: &ChangeEvent) {
        let targets: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.wants(event))
            .map(|e| Arc::clone(&e.callback))
            .collect();

        for callback in targets {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event)));
            if outcome.is_err() {
                tracing::warn!(table = event.table(), "change listener panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn add(&self, table: Option<String>, callback: Listener) -> ListenerId {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        self.entries.lock().push(Entry { id, table, callback });
        id
    }
}
