//! Room registry
//!
//! Maps room ids to rooms. Rooms are created on first join (or explicitly
//! configured beforehand) and removed on teardown or after sitting empty.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::RoomId;
use crate::room::Room;
use crate::sim::Variant;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Room {0} already exists")]
    RoomExists(RoomId),
}

struct RoomEntry {
    room: Room,
    /// Set while no seat is taken
    idle_since: Option<Instant>,
}

/// Owns every live room, iterated in id order
pub struct RoomRegistry {
    rooms: BTreeMap<RoomId, RoomEntry>,
    default_variant: Variant,
    base_seed: u64,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(Variant::default(), 0)
    }
}

impl RoomRegistry {
    pub fn new(default_variant: Variant, base_seed: u64) -> Self {
        Self {
            rooms: BTreeMap::new(),
            default_variant,
            base_seed,
        }
    }

    pub fn default_variant(&self) -> &Variant {
        &self.default_variant
    }

    /// Tint seed for a room, stable for a given id and base seed
    pub fn seed_for(&self, room_id: &str) -> u64 {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in room_id.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^ self.base_seed
    }

    /// Room with the given id, created with the default rules if missing.
    /// A new room starts its empty-room clock at `now`.
    pub fn get_or_create(&mut self, room_id: &str, now: Instant) -> &mut Room {
        let seed = self.seed_for(room_id);
        let variant = &self.default_variant;
        let entry = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            log::info!("Created room {} ({})", room_id, variant.preset.as_str());
            RoomEntry {
                room: Room::new(room_id, variant.clone(), seed),
                idle_since: Some(now),
            }
        });
        &mut entry.room
    }

    /// Create a room with explicit rules. Fails if the id is taken.
    pub fn create_with(
        &mut self,
        room_id: &str,
        variant: Variant,
        now: Instant,
    ) -> Result<&mut Room, RegistryError> {
        if self.rooms.contains_key(room_id) {
            return Err(RegistryError::RoomExists(room_id.to_string()));
        }
        log::info!("Created room {} ({})", room_id, variant.preset.as_str());
        let room = Room::new(room_id, variant, self.seed_for(room_id));
        let entry = self
            .rooms
            .entry(room_id.to_string())
            .or_insert(RoomEntry {
                room,
                idle_since: Some(now),
            });
        Ok(&mut entry.room)
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id).map(|e| &e.room)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id).map(|e| &mut e.room)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Remove a room. Removing an unknown id is a no-op.
    pub fn remove(&mut self, room_id: &str) -> Option<Room> {
        let entry = self.rooms.remove(room_id)?;
        log::info!("Removed room {}", room_id);
        Some(entry.room)
    }

    /// Rooms in stable id order
    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut().map(|e| &mut e.room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Start the empty-room clock (kept if already running)
    pub fn mark_idle(&mut self, room_id: &str, now: Instant) {
        if let Some(entry) = self.rooms.get_mut(room_id) {
            entry.idle_since.get_or_insert(now);
        }
    }

    pub fn mark_active(&mut self, room_id: &str) {
        if let Some(entry) = self.rooms.get_mut(room_id) {
            entry.idle_since = None;
        }
    }

    /// Ids of rooms that have been empty for at least `timeout`
    pub fn expired_idle(&self, now: Instant, timeout: Duration) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, entry)| {
                entry
                    .idle_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= timeout)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::VariantPreset;

    #[test]
    fn test_get_or_create_reuses_room() {
        let mut registry = RoomRegistry::default();
        let now = Instant::now();
        registry.get_or_create("abc", now).join("alice").unwrap();
        assert_eq!(registry.get_or_create("abc", now).seat_of("alice"), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_with_rejects_existing() {
        let mut registry = RoomRegistry::default();
        let now = Instant::now();
        let room = registry
            .create_with("duel", VariantPreset::Duel.variant(), now)
            .unwrap();
        assert_eq!(room.variant().preset, VariantPreset::Duel);
        assert_eq!(
            registry
                .create_with("duel", VariantPreset::Solo.variant(), now)
                .err(),
            Some(RegistryError::RoomExists("duel".into()))
        );
        // get_or_create keeps the configured rules
        assert_eq!(
            registry.get_or_create("duel", now).variant().preset,
            VariantPreset::Duel
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = RoomRegistry::default();
        let now = Instant::now();
        registry.get_or_create("a", now);
        assert!(registry.remove("b").is_none());
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rooms_iterate_in_id_order() {
        let mut registry = RoomRegistry::default();
        let now = Instant::now();
        for id in ["c", "a", "b"] {
            registry.get_or_create(id, now);
        }
        let ids: Vec<String> = registry.rooms_mut().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_seed_is_stable_per_room() {
        let registry = RoomRegistry::new(Variant::default(), 9);
        assert_eq!(registry.seed_for("room"), registry.seed_for("room"));
        assert_ne!(registry.seed_for("room"), registry.seed_for("other"));
        assert_ne!(
            registry.seed_for("room"),
            RoomRegistry::new(Variant::default(), 10).seed_for("room")
        );
    }

    #[test]
    fn test_idle_expiry() {
        let mut registry = RoomRegistry::default();
        let start = Instant::now();
        registry.get_or_create("empty", start);
        registry.get_or_create("busy", start);
        registry.mark_active("busy");
        registry.mark_active("empty");
        registry.mark_idle("empty", start);
        // A second mark keeps the original start
        registry.mark_idle("empty", start + Duration::from_secs(30));

        let timeout = Duration::from_secs(60);
        assert!(registry.expired_idle(start + Duration::from_secs(59), timeout).is_empty());
        assert_eq!(
            registry.expired_idle(start + Duration::from_secs(60), timeout),
            vec!["empty".to_string()]
        );
    }

    #[test]
    fn test_new_room_idles_from_creation_time() {
        let mut registry = RoomRegistry::default();
        let created = Instant::now() + Duration::from_secs(600);
        registry.get_or_create("joined", created);
        registry
            .create_with("configured", VariantPreset::Duel.variant(), created)
            .unwrap();

        // Expiry is measured from the supplied time, not the wall clock
        let timeout = Duration::from_secs(60);
        assert!(registry.expired_idle(created + Duration::from_secs(59), timeout).is_empty());
        assert_eq!(
            registry.expired_idle(created + timeout, timeout),
            vec!["configured".to_string(), "joined".to_string()]
        );

        // An existing room keeps its original clock
        registry.get_or_create("joined", created + Duration::from_secs(30));
        assert_eq!(registry.expired_idle(created + timeout, timeout).len(), 2);
    }
}
