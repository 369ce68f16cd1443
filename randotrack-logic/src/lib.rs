pub mod keys;

use anyhow::{ensure, Result};
use hashbrown::HashSet;
use randotrack_game::{Capacity, DungeonId, ItemId, LocationId, TrackerData};
use serde::{Deserialize, Serialize};

/// Hypothesis of in-dungeon progress for one dungeon: how many small keys
/// have been collected and whether the big key is in hand. Immutable per
/// solver call; a fresh snapshot is supplied for every evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonState {
    pub keys_collected: Capacity,
    pub big_key_collected: bool,
}

impl DungeonState {
    pub fn new(keys_collected: Capacity, big_key_collected: bool) -> Self {
        DungeonState {
            keys_collected,
            big_key_collected,
        }
    }

    /// The maximally favorable hypothesis: every small key in hand, and the
    /// big key collected if the dungeon has one.
    pub fn most_favorable(small_key_capacity: Capacity, has_big_key: bool) -> Self {
        DungeonState {
            keys_collected: small_key_capacity,
            big_key_collected: has_big_key,
        }
    }
}

impl Default for DungeonState {
    fn default() -> Self {
        DungeonState::new(0, false)
    }
}

/// Disjoint accessible/inaccessible classification of the locations relevant
/// to one key-layout tree, produced by the location-graph collaborator and
/// recomputed on every item/state change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocationPartition {
    accessible: HashSet<LocationId>,
    inaccessible: HashSet<LocationId>,
}

impl LocationPartition {
    pub fn new(
        accessible: HashSet<LocationId>,
        inaccessible: HashSet<LocationId>,
    ) -> Result<LocationPartition> {
        for loc in &accessible {
            ensure!(
                !inaccessible.contains(loc),
                "location {loc} is classified both accessible and inaccessible"
            );
        }
        Ok(LocationPartition {
            accessible,
            inaccessible,
        })
    }

    /// Builds a partition over `all`, taking everything outside `accessible`
    /// as inaccessible.
    pub fn from_accessible(
        accessible: HashSet<LocationId>,
        all: &HashSet<LocationId>,
    ) -> LocationPartition {
        let inaccessible = all.difference(&accessible).copied().collect();
        LocationPartition {
            accessible,
            inaccessible,
        }
    }

    pub fn is_accessible(&self, loc: LocationId) -> bool {
        self.accessible.contains(&loc)
    }

    pub fn is_inaccessible(&self, loc: LocationId) -> bool {
        self.inaccessible.contains(&loc)
    }

    pub fn accessible_count_in(&self, locs: &[LocationId]) -> usize {
        locs.iter().filter(|loc| self.accessible.contains(*loc)).count()
    }

    pub fn inaccessible_count_in(&self, locs: &[LocationId]) -> usize {
        locs.iter()
            .filter(|loc| self.inaccessible.contains(*loc))
            .count()
    }
}

/// The player's declared progress: item counts, checked locations, and
/// per-dungeon key state. Mutators saturate at the authored bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerState {
    pub items: Vec<Capacity>,
    item_max: Vec<Capacity>,
    pub checked: HashSet<LocationId>,
    dungeon_keys: Vec<DungeonState>,
    key_capacity: Vec<Capacity>,
}

impl TrackerState {
    pub fn new(data: &TrackerData) -> Self {
        TrackerState {
            items: vec![0; data.items.len()],
            item_max: data.items.iter().map(|item| item.max).collect(),
            checked: HashSet::new(),
            dungeon_keys: vec![DungeonState::default(); data.dungeons.len()],
            key_capacity: data
                .dungeons
                .iter()
                .map(|d| d.small_key_capacity)
                .collect(),
        }
    }

    pub fn item_count(&self, item: ItemId) -> Capacity {
        self.items[item]
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.items[item] > 0
    }

    pub fn collect_item(&mut self, item: ItemId) {
        self.items[item] = Capacity::min(self.items[item] + 1, self.item_max[item]);
    }

    pub fn uncollect_item(&mut self, item: ItemId) {
        self.items[item] = Capacity::max(self.items[item] - 1, 0);
    }

    pub fn set_item_count(&mut self, item: ItemId, count: Capacity) {
        self.items[item] = count.clamp(0, self.item_max[item]);
    }

    pub fn is_checked(&self, loc: LocationId) -> bool {
        self.checked.contains(&loc)
    }

    pub fn check_location(&mut self, loc: LocationId) {
        self.checked.insert(loc);
    }

    pub fn uncheck_location(&mut self, loc: LocationId) {
        self.checked.remove(&loc);
    }

    pub fn collect_small_key(&mut self, dungeon: DungeonId) {
        let state = &mut self.dungeon_keys[dungeon];
        state.keys_collected = Capacity::min(state.keys_collected + 1, self.key_capacity[dungeon]);
    }

    pub fn set_small_keys(&mut self, dungeon: DungeonId, count: Capacity) {
        self.dungeon_keys[dungeon].keys_collected = count.clamp(0, self.key_capacity[dungeon]);
    }

    pub fn set_big_key(&mut self, dungeon: DungeonId, collected: bool) {
        self.dungeon_keys[dungeon].big_key_collected = collected;
    }

    /// The least favorable solver snapshot for this dungeon: exactly what
    /// the player has declared collected.
    pub fn dungeon_state(&self, dungeon: DungeonId) -> DungeonState {
        self.dungeon_keys[dungeon]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use randotrack_game::{DungeonData, ItemData, KeyLayout, LocationData};

    fn sample_data() -> TrackerData {
        let mut data = TrackerData {
            items: vec![
                ItemData {
                    name: "Lantern".to_string(),
                    max: 1,
                },
                ItemData {
                    name: "Bomb Bag".to_string(),
                    max: 3,
                },
            ],
            gates: vec![],
            dungeons: vec![DungeonData {
                name: "Ruined Keep".to_string(),
                small_key_capacity: 2,
                has_big_key: true,
                locations: vec![
                    LocationData {
                        id: 1,
                        name: "Entrance Chest".to_string(),
                        can_inspect: false,
                    },
                    LocationData {
                        id: 2,
                        name: "Cellar Chest".to_string(),
                        can_inspect: false,
                    },
                ],
                key_layout: KeyLayout::make_end(None),
            }],
            ..Default::default()
        };
        data.finalize().unwrap();
        data
    }

    #[test]
    fn test_item_counts_saturate() {
        let data = sample_data();
        let mut state = TrackerState::new(&data);
        state.collect_item(0);
        state.collect_item(0);
        assert_eq!(state.item_count(0), 1);
        state.uncollect_item(0);
        state.uncollect_item(0);
        assert_eq!(state.item_count(0), 0);
        state.set_item_count(1, 99);
        assert_eq!(state.item_count(1), 3);
    }

    #[test]
    fn test_small_keys_saturate_at_capacity() {
        let data = sample_data();
        let mut state = TrackerState::new(&data);
        for _ in 0..5 {
            state.collect_small_key(0);
        }
        assert_eq!(state.dungeon_state(0).keys_collected, 2);
        state.set_small_keys(0, -1);
        assert_eq!(state.dungeon_state(0).keys_collected, 0);
    }

    #[test]
    fn test_partition_rejects_overlap() {
        let accessible: HashSet<LocationId> = [1, 2].into_iter().collect();
        let inaccessible: HashSet<LocationId> = [2, 3].into_iter().collect();
        assert!(LocationPartition::new(accessible, inaccessible).is_err());
    }

    #[test]
    fn test_partition_from_accessible() {
        let all: HashSet<LocationId> = [1, 2, 3].into_iter().collect();
        let accessible: HashSet<LocationId> = [2].into_iter().collect();
        let partition = LocationPartition::from_accessible(accessible, &all);
        assert!(partition.is_accessible(2));
        assert!(partition.is_inaccessible(1));
        assert!(partition.is_inaccessible(3));
        assert!(!partition.is_accessible(4));
        assert!(!partition.is_inaccessible(4));
    }
}
