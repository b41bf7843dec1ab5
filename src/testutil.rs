//! In-memory queue and store fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::BanRecord;
use crate::queue::{BounceQueue, QueueError, QueueMessage, MAX_MESSAGES_PER_RECEIVE};
use crate::store::{BanStore, BounceStore, StoreError};

pub struct MemoryQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    pub deleted: Mutex<Vec<String>>,
    fail_receives: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryQueue {
    pub fn new(messages: Vec<QueueMessage>) -> Self {
        MemoryQueue {
            messages: Mutex::new(messages.into()),
            deleted: Mutex::new(Vec::new()),
            fail_receives: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent receive fail, simulating a queue outage.
    pub fn fail_receives(&self) {
        self.fail_receives.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent delete fail; receives keep working.
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn deleted_handles(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BounceQueue for MemoryQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        if self.fail_receives.load(Ordering::SeqCst) {
            return Err(QueueError::Receive("injected outage".to_string()));
        }
        let mut queue = self.messages.lock().unwrap();
        let batch = (0..MAX_MESSAGES_PER_RECEIVE)
            .filter_map(|_| queue.pop_front())
            .collect();
        Ok(batch)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(QueueError::Delete("injected outage".to_string()));
        }
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBanStore {
    pub bans: Mutex<HashMap<String, BanRecord>>,
    fail_upserts: AtomicBool,
}

impl MemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent upsert fail, simulating a store outage.
    pub fn fail_upserts(&self) {
        self.fail_upserts.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, email: &str) -> Option<BanRecord> {
        self.bans.lock().unwrap().get(email).cloned()
    }

    pub fn len(&self) -> usize {
        self.bans.lock().unwrap().len()
    }
}

#[async_trait]
impl BanStore for MemoryBanStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, ban: &BanRecord) -> Result<(), StoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        self.bans
            .lock()
            .unwrap()
            .insert(ban.email.clone(), ban.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<BanRecord>, StoreError> {
        Ok(self.bans.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryBounceStore {
    pub payloads: Mutex<Vec<Value>>,
}

impl MemoryBounceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl BounceStore for MemoryBounceStore {
    async fn append(&self, payload: &Value) -> Result<(), StoreError> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
