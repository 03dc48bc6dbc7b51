// src/sync/memory.rs
//! In-process calendar for dry runs and tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::store::{CalendarStore, EventPayload, RemoteItem, TimeWindow};
use super::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub authenticate: usize,
    pub list: usize,
    pub insert: usize,
    pub update: usize,
    pub delete: usize,
}

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, StoredItem>,
    next_id: u64,
    calls: CallCounts,
}

#[derive(Debug, Clone)]
struct StoredItem {
    payload: EventPayload,
    keyed: bool,
}

/// Items live in a `BTreeMap` keyed by generated id (`mem-1`, `mem-2`, ...).
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_titles: HashSet<String>,
    fail_list: bool,
    fail_auth: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts and updates whose summary equals `title` fail.
    pub fn failing_on(mut self, title: impl Into<String>) -> Self {
        self.fail_titles.insert(title.into());
        self
    }

    /// Every `list` call fails.
    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// `authenticate` fails as if the credentials were rejected.
    pub fn failing_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an item that carries no reconciliation key (created by someone else).
    pub fn insert_foreign(&self, payload: EventPayload) -> String {
        self.store(payload, false)
    }

    fn store(&self, payload: EventPayload, keyed: bool) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("mem-{}", inner.next_id);
        inner.items.insert(id.clone(), StoredItem { payload, keyed });
        id
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<EventPayload> {
        self.lock().items.get(id).map(|i| i.payload.clone())
    }

    /// Snapshot of `(id, payload)` in id order.
    pub fn items(&self) -> Vec<(String, EventPayload)> {
        self.lock()
            .items
            .iter()
            .map(|(id, i)| (id.clone(), i.payload.clone()))
            .collect()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    fn check_title(&self, payload: &EventPayload) -> Result<(), SyncError> {
        if self.fail_titles.contains(&payload.summary) {
            return Err(SyncError::Api {
                status: 500,
                body: format!("injected failure for {:?}", payload.summary),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarStore for MemoryStore {
    async fn authenticate(&self) -> Result<(), SyncError> {
        self.lock().calls.authenticate += 1;
        if self.fail_auth {
            return Err(SyncError::Auth("injected: credentials rejected".to_string()));
        }
        Ok(())
    }

    async fn list(&self, window: TimeWindow) -> Result<Vec<RemoteItem>, SyncError> {
        let mut inner = self.lock();
        inner.calls.list += 1;
        if self.fail_list {
            return Err(SyncError::Api {
                status: 503,
                body: "injected list failure".to_string(),
            });
        }
        Ok(inner
            .items
            .iter()
            .filter(|(_, item)| {
                match (item.payload.start.instant(), item.payload.end.instant()) {
                    (Some(s), Some(e)) => window.intersects(s, e),
                    _ => false,
                }
            })
            .map(|(id, item)| {
                let key = &item.payload.extended_properties.private;
                RemoteItem {
                    id: id.clone(),
                    source: item.keyed.then(|| key.source.clone()),
                    source_id: item.keyed.then(|| key.source_id.clone()),
                }
            })
            .collect())
    }

    async fn insert(&self, payload: &EventPayload) -> Result<String, SyncError> {
        self.lock().calls.insert += 1;
        self.check_title(payload)?;
        Ok(self.store(payload.clone(), true))
    }

    async fn update(&self, id: &str, payload: &EventPayload) -> Result<(), SyncError> {
        let mut inner = self.lock();
        inner.calls.update += 1;
        self.check_title(payload)?;
        match inner.items.get_mut(id) {
            Some(item) => {
                item.payload = payload.clone();
                item.keyed = true;
                Ok(())
            }
            None => Err(SyncError::Api {
                status: 404,
                body: format!("no item {id}"),
            }),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let mut inner = self.lock();
        inner.calls.delete += 1;
        // Already gone counts as deleted.
        inner.items.remove(id);
        Ok(())
    }
}
