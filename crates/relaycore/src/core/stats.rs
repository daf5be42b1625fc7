//! In-memory counters for the owner's `/stats` command. Reset on restart.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use serde::Serialize;

use crate::core::types::Identity;
use crate::download::platform::Platform;

#[derive(Default)]
pub struct RelayStats {
    total: AtomicU64,
    instagram: AtomicU64,
    x: AtomicU64,
    errors: AtomicU64,
    users: DashSet<Identity>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub instagram: u64,
    pub x: u64,
    pub errors: u64,
    pub users: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a delivered video.
    pub fn record_success(&self, identity: Identity, platform: Platform) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match platform {
            Platform::Instagram => self.instagram.fetch_add(1, Ordering::Relaxed),
            Platform::X => self.x.fetch_add(1, Ordering::Relaxed),
        };
        self.users.insert(identity);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            instagram: self.instagram.load(Ordering::Relaxed),
            x: self.x.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            users: self.users.len() as u64,
        }
    }
}
