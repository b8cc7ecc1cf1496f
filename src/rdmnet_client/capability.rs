//! Endpoint capability cache (spec §4.7 "Endpoint capability cache").
//!
//! Tracks what each RPT endpoint has most recently advertised or negotiated,
//! and fires `endpointCapabilitiesUpdated` only when the observable shape of
//! an entry actually changes.

use std::collections::HashMap;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::events::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    LocalAdvertisement,
    RemoteAdvertisement,
    BrokerNegotiation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityEntry {
    pub endpoint_id: u16,
    pub role: Option<u8>,
    pub profiles: Vec<u16>,
    pub provenance: Provenance,
    pub updated_at: SystemTime,
}

#[derive(Debug, Clone)]
pub struct CapabilityUpdated(pub CapabilityEntry);

pub struct CapabilityCache {
    entries: RwLock<HashMap<u16, CapabilityEntry>>,
    pub events: EventBus<CapabilityUpdated>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Records capabilities for `endpoint_id`. `profiles` is normalized
    /// (sorted, deduped) before comparison. Returns `true` iff this changed
    /// the cached entry (role, provenance, or profile list), in which case
    /// `endpointCapabilitiesUpdated` has already fired.
    pub fn update(
        &self,
        endpoint_id: u16,
        role: Option<u8>,
        mut profiles: Vec<u16>,
        provenance: Provenance,
        now: SystemTime,
    ) -> bool {
        profiles.sort_unstable();
        profiles.dedup();

        let changed = {
            let entries = self.entries.read();
            match entries.get(&endpoint_id) {
                None => true,
                Some(existing) => {
                    existing.role != role
                        || existing.provenance != provenance
                        || existing.profiles != profiles
                }
            }
        };

        let entry = CapabilityEntry {
            endpoint_id,
            role,
            profiles,
            provenance,
            updated_at: now,
        };
        self.entries.write().insert(endpoint_id, entry.clone());

        if changed {
            self.events.emit(&CapabilityUpdated(entry));
        }
        changed
    }

    pub fn get(&self, endpoint_id: u16) -> Option<CapabilityEntry> {
        self.entries.read().get(&endpoint_id).cloned()
    }

    pub fn all(&self) -> Vec<CapabilityEntry> {
        self.entries.read().values().cloned().collect()
    }

    /// Drops every cached entry. Does not fire `endpointCapabilitiesUpdated`;
    /// callers that care about the session ending should listen for
    /// `BrokerState` instead.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_always_changes() {
        let cache = CapabilityCache::new();
        let changed = cache.update(1, Some(1), vec![3, 1, 2], Provenance::LocalAdvertisement, SystemTime::now());
        assert!(changed);
        let entry = cache.get(1).unwrap();
        assert_eq!(entry.profiles, vec![1, 2, 3]);
    }

    #[test]
    fn identical_resubmission_does_not_change() {
        let cache = CapabilityCache::new();
        cache.update(1, Some(1), vec![1, 2], Provenance::LocalAdvertisement, SystemTime::now());
        let changed = cache.update(1, Some(1), vec![2, 1], Provenance::LocalAdvertisement, SystemTime::now());
        assert!(!changed);
    }

    #[test]
    fn provenance_change_is_a_change() {
        let cache = CapabilityCache::new();
        cache.update(1, Some(1), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        let changed = cache.update(1, Some(1), vec![1], Provenance::BrokerNegotiation, SystemTime::now());
        assert!(changed);
    }

    #[test]
    fn event_fires_only_on_change() {
        let cache = CapabilityCache::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        cache.events.on(move |_| {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        cache.update(1, Some(1), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        cache.update(1, Some(1), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        cache.update(1, Some(2), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_drops_all_entries() {
        let cache = CapabilityCache::new();
        cache.update(1, Some(1), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        cache.update(2, Some(1), vec![1], Provenance::LocalAdvertisement, SystemTime::now());
        cache.clear();
        assert!(cache.all().is_empty());
        assert!(cache.get(1).is_none());
    }
}
