pub mod fetch;

use std::collections::HashSet;
use std::time::{Duration, Instant};
use serde::Serialize;

use crate::persistence::{KeyValueStore, VerificationRecord};

pub use fetch::fetch;

/// Served when the endpoint cannot be reached or returns garbage.
pub const FALLBACK_WHITELIST: [&str; 4] = [
    "+923001234567",
    "+4915123456789",
    "+12025550123",
    "+447911123456",
];

/// Strips every whitespace character, so `" +1 202 555 0123 "` and
/// `"+12025550123"` compare equal.
pub fn normalize_number(number: &str) -> String {
    number.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Whitelist {
    numbers: HashSet<String>,
    source: WhitelistSource,
    fetched_at: Instant,
}

impl Whitelist {
    pub fn new<I, S>(numbers: I, source: WhitelistSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            numbers: numbers
                .into_iter()
                .map(|n| normalize_number(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
            source,
            fetched_at: Instant::now(),
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_WHITELIST, WhitelistSource::Fallback)
    }

    pub fn contains(&self, number: &str) -> bool {
        self.numbers.contains(&normalize_number(number))
    }

    pub fn source(&self) -> WhitelistSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationStatus {
    pub verified: bool,
    pub number: Option<String>,
    pub whitelist_loaded: bool,
    pub whitelist_source: Option<WhitelistSource>,
    pub whitelist_size: usize,
}

/// Decides whether the WhatsApp reader may be used, and keeps the
/// persisted verification record in step with that decision.
#[derive(Debug, Default)]
pub struct WhitelistGate {
    whitelist: Option<Whitelist>,
    verified: bool,
    current_number: Option<String>,
}

impl WhitelistGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, whitelist: Whitelist) {
        tracing::info!(
            "Whitelist loaded: {} numbers ({:?})",
            whitelist.len(),
            whitelist.source()
        );
        self.whitelist = Some(whitelist);
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn needs_refresh(&self, ttl: Duration) -> bool {
        self.whitelist.as_ref().map_or(true, |w| w.is_stale(ttl))
    }

    pub fn status(&self) -> VerificationStatus {
        VerificationStatus {
            verified: self.verified,
            number: self.current_number.clone(),
            whitelist_loaded: self.whitelist.is_some(),
            whitelist_source: self.whitelist.as_ref().map(|w| w.source()),
            whitelist_size: self.whitelist.as_ref().map_or(0, |w| w.len()),
        }
    }

    /// Tests `number` against the loaded whitelist. A listed number is
    /// persisted, an unlisted one clears any earlier record. Returns false
    /// without touching the store while no whitelist is loaded.
    pub fn check(&mut self, number: &str, store: &dyn KeyValueStore) -> bool {
        let Some(ref whitelist) = self.whitelist else {
            tracing::info!("Whitelist not loaded yet");
            return false;
        };

        let normalized = normalize_number(number);
        let listed = !normalized.is_empty() && whitelist.contains(&normalized);
        tracing::info!("Whitelist check for {}: {}", normalized, listed);

        let result = if listed {
            VerificationRecord::new(normalized.clone()).save(store)
        } else {
            VerificationRecord::clear(store)
        };
        if let Err(e) = result {
            tracing::error!("Failed to persist verification record: {}", e);
        }

        self.current_number = Some(normalized);
        self.verified = listed;
        listed
    }

    /// Re-applies a persisted verification against the loaded whitelist.
    /// A record for a number that is no longer listed is removed.
    pub fn restore(&mut self, store: &dyn KeyValueStore) -> bool {
        let Some(ref whitelist) = self.whitelist else {
            return false;
        };
        let Some(record) = VerificationRecord::load(store) else {
            return false;
        };

        if whitelist.contains(record.number()) {
            tracing::info!("Restored verification for {}", record.number());
            self.current_number = Some(record.number().to_string());
            self.verified = true;
            true
        } else {
            tracing::warn!("Saved number {} is no longer whitelisted. Clearing.", record.number());
            if let Err(e) = VerificationRecord::clear(store) {
                tracing::error!("Failed to clear verification record: {}", e);
            }
            self.current_number = None;
            self.verified = false;
            false
        }
    }

    /// Forgets the in-memory verification; the persisted record stays.
    pub fn reset_session(&mut self) {
        self.verified = false;
        self.current_number = None;
    }

    pub fn clear(&mut self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        self.reset_session();
        VerificationRecord::clear(store)
    }
}
