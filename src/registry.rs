//! Table-id keyed consumer registry and section dispatch

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::warn;

use crate::psi::Section;

/// Anything that wants complete sections of a given table id.
///
/// Called synchronously on the demux thread: implementations must not block.
pub trait SectionConsumer: Send + Sync {
    fn on_section(&self, table_id: u8, section: &[u8]);
}

impl<F> SectionConsumer for F
where
    F: Fn(u8, &[u8]) + Send + Sync,
{
    fn on_section(&self, table_id: u8, section: &[u8]) {
        self(table_id, section)
    }
}

pub type ConsumerHandle = Arc<dyn SectionConsumer>;

/// Maps table ids to the consumers subscribed to them.
///
/// Only weak references are held: dropping the last handle ends the
/// subscription as surely as `unregister` does.
#[derive(Default)]
pub struct ConsumerRegistry {
    tables: RwLock<HashMap<u8, Vec<Weak<dyn SectionConsumer>>>>,
}

fn is_same(entry: &Weak<dyn SectionConsumer>, consumer: &ConsumerHandle) -> bool {
    std::ptr::addr_eq(entry.as_ptr(), Arc::as_ptr(consumer))
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `consumer` was already registered for `table_id`.
    pub fn register(&self, table_id: u8, consumer: &ConsumerHandle) -> bool {
        let mut tables = self.tables.write();
        let entries = tables.entry(table_id).or_default();
        entries.retain(|e| e.strong_count() > 0);
        if entries.iter().any(|e| is_same(e, consumer)) {
            return false;
        }
        entries.push(Arc::downgrade(consumer));
        true
    }

    /// Returns false if `consumer` was not registered for `table_id`.
    pub fn unregister(&self, table_id: u8, consumer: &ConsumerHandle) -> bool {
        let mut tables = self.tables.write();
        let Some(entries) = tables.get_mut(&table_id) else {
            return false;
        };
        let removed = entries.iter().any(|e| is_same(e, consumer));
        entries.retain(|e| !is_same(e, consumer) && e.strong_count() > 0);
        if entries.is_empty() {
            tables.remove(&table_id);
        }
        removed
    }

    /// Live consumers for `table_id`, in registration order.
    pub fn consumers_for(&self, table_id: u8) -> Vec<ConsumerHandle> {
        self.tables
            .read()
            .get(&table_id)
            .map(|entries| entries.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Number of live (table id, consumer) pairs.
    pub fn total_consumers(&self) -> usize {
        self.tables
            .read()
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|e| e.strong_count() > 0)
            .count()
    }

    #[cfg(test)]
    pub fn table_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Hands `section` to each consumer. A panicking consumer is logged and
/// skipped so the others, and the demux thread, carry on.
pub fn dispatch(section: &Section, consumers: &[ConsumerHandle]) {
    for consumer in consumers {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
            consumer.on_section(section.table_id, &section.data)
        }));
        if delivered.is_err() {
            warn!(
                table_id = section.table_id,
                pid = section.pid,
                "section consumer panicked"
            );
        }
    }
}
