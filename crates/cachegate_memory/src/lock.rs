// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use cachegate_client::{CacheLock, Error, LockOptions, Result};
use parking_lot::Mutex;
use tick::Clock;

/// Lock holders of one memory client, keyed by lock name.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    held: HashMap<String, Holder>,
    next_token: u64,
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: u64,
    expires_at: Option<SystemTime>,
}

impl Holder {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// A named lock living in a memory client.
///
/// Each handle acquires with its own token; only the handle that took the lock can release it.
/// A lock with a timeout becomes free once the timeout elapses, even if never released. Lock
/// expiry follows the client's clock, while blocking acquisition sleeps and measures its
/// blocking timeout on the real timeline.
#[derive(Debug)]
pub(crate) struct MemoryLock {
    name: String,
    table: Arc<Mutex<LockTable>>,
    clock: Clock,
    options: LockOptions,
    token: Mutex<Option<u64>>,
}

impl MemoryLock {
    pub(crate) fn new(name: String, table: Arc<Mutex<LockTable>>, clock: Clock, options: LockOptions) -> Self {
        Self {
            name,
            table,
            clock,
            options,
            token: Mutex::new(None),
        }
    }

    fn try_acquire(&self) -> bool {
        let now = self.clock.system_time();
        let mut table = self.table.lock();
        if table.held.get(&self.name).is_some_and(|holder| holder.is_live(now)) {
            return false;
        }

        table.next_token += 1;
        let token = table.next_token;
        let expires_at = self.options.get_timeout().and_then(|timeout| now.checked_add(timeout));
        table.held.insert(self.name.clone(), Holder { token, expires_at });
        *self.token.lock() = Some(token);
        true
    }
}

impl CacheLock for MemoryLock {
    fn acquire(&self, blocking: bool) -> Result<bool> {
        let started = Instant::now();
        loop {
            if self.try_acquire() {
                return Ok(true);
            }
            if !blocking {
                return Ok(false);
            }
            if let Some(limit) = self.options.get_blocking_timeout() {
                if started.elapsed() >= limit {
                    return Ok(false);
                }
            }
            std::thread::sleep(self.options.get_sleep());
        }
    }

    fn release(&self) -> Result<()> {
        let token = self
            .token
            .lock()
            .take()
            .ok_or_else(|| Error::invalid_usage(format!("cannot release lock '{}': not acquired", self.name)))?;

        let mut table = self.table.lock();
        match table.held.get(&self.name) {
            Some(holder) if holder.token == token => {
                table.held.remove(&self.name);
                Ok(())
            }
            _ => Err(Error::invalid_usage(format!(
                "cannot release lock '{}': it expired and is no longer owned",
                self.name
            ))),
        }
    }

    fn locked(&self) -> Result<bool> {
        let now = self.clock.system_time();
        Ok(self.table.lock().held.get(&self.name).is_some_and(|holder| holder.is_live(now)))
    }
}
