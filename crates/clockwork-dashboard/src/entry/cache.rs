//! In-memory caches owned by the repository

use clockwork_core::models::{EntryRange, Project, TimeEntry};
use std::time::Duration;
use tokio::time::Instant;

struct CachedRange {
    user_id: String,
    range: EntryRange,
    entries: Vec<TimeEntry>,
    fetched_at: Instant,
}

/// Holds the most recently fetched range, fresh for a fixed window.
///
/// Fetches take a generation from [`RangeCache::begin_fetch`] and may only
/// store while that generation is still the newest. Invalidation advances
/// the generation too, so a fetch that started before it is discarded.
pub struct RangeCache {
    slot: Option<CachedRange>,
    freshness: Duration,
    generation: u64,
}

impl RangeCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            slot: None,
            freshness,
            generation: 0,
        }
    }

    pub fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Entries for exactly this user and range, if fetched within the window
    pub fn get(&self, user_id: &str, range: EntryRange, now: Instant) -> Option<Vec<TimeEntry>> {
        let cached = self.slot.as_ref()?;
        if cached.user_id != user_id || cached.range != range {
            return None;
        }
        if now.saturating_duration_since(cached.fetched_at) >= self.freshness {
            return None;
        }
        Some(cached.entries.clone())
    }

    /// Store the result of fetch `generation`. Returns false, leaving the
    /// cache untouched, when a newer fetch or an invalidation came since.
    pub fn store(
        &mut self,
        generation: u64,
        user_id: &str,
        range: EntryRange,
        entries: Vec<TimeEntry>,
        now: Instant,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        self.slot = Some(CachedRange {
            user_id: user_id.to_string(),
            range,
            entries,
            fetched_at: now,
        });
        true
    }

    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.slot = None;
    }

    pub fn cached_range(&self) -> Option<EntryRange> {
        self.slot.as_ref().map(|c| c.range)
    }
}

/// Project list per user; never expires, cleared explicitly.
#[derive(Default)]
pub struct ProjectCache {
    slot: Option<(String, Vec<Project>)>,
}

impl ProjectCache {
    pub fn get(&self, user_id: &str) -> Option<Vec<Project>> {
        match self.slot {
            Some((ref owner, ref projects)) if owner == user_id => Some(projects.clone()),
            _ => None,
        }
    }

    pub fn store(&mut self, user_id: &str, projects: Vec<Project>) {
        self.slot = Some((user_id.to_string(), projects));
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
