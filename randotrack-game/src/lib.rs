use anyhow::{bail, ensure, Context, Result};
use hashbrown::{HashMap, HashSet};
use log::info;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::path::Path;
use strum_macros::{Display, EnumString, VariantNames};

pub type ItemId = usize; // Index into TrackerData.items: distinct trackable item kinds
pub type LocationId = usize; // Location ID from the authored data (unique across the whole config)
pub type DungeonId = usize; // Index into TrackerData.dungeons
pub type GateId = usize; // Index into TrackerData.gates: named requirement gates on key-layout nodes
pub type Capacity = i16; // Data type used to represent quantities of keys, items, etc.

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq + Clone> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if let Some(&i) = self.index_by_key.get(&name.to_owned()) {
            return i;
        }
        let i = self.keys.len();
        self.keys.push(name.to_owned());
        self.index_by_key.insert(name.to_owned(), i);
        i
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The tracker's confidence verdict for a location, ascending. `min` over a
/// set of levels behaves like AND (any `None` input forces `None`), `max`
/// behaves like OR (the strongest satisfied path wins).
///
/// `Partial` is produced only by section item counting, never by the
/// combinators: it marks a section where some but not all remaining items
/// are obtainable.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
pub enum AccessibilityLevel {
    None,
    Inspect,
    Partial,
    SequenceBreak,
    Normal,
}

impl AccessibilityLevel {
    pub fn met(self) -> bool {
        self != AccessibilityLevel::None
    }
}

/// A named requirement gate referenced by key-layout nodes. The reactive
/// layer resolves `flag` against the active settings; `sequence_break_only`
/// marks gates that are only satisfied out of logic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateData {
    pub name: String,
    pub flag: String,
    #[serde(default)]
    pub sequence_break_only: bool,
}

/// One authored key-placement hypothesis node. Trees are finite, acyclic,
/// built once per dungeon from static configuration and never mutated at
/// runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KeyLayout {
    End {
        gate: Option<GateId>,
    },
    BigKey {
        candidates: Vec<LocationId>,
        gate: Option<GateId>,
        children: Vec<KeyLayout>,
    },
    SmallKey {
        required: Capacity,
        candidates: Vec<LocationId>,
        shared_with_big_key: bool,
        gate: Option<GateId>,
        children: Vec<KeyLayout>,
    },
}

impl KeyLayout {
    pub fn make_end(gate: Option<GateId>) -> KeyLayout {
        KeyLayout::End { gate }
    }

    pub fn make_big_key(
        candidates: Vec<LocationId>,
        gate: Option<GateId>,
        children: Vec<KeyLayout>,
    ) -> Result<KeyLayout> {
        ensure!(
            !candidates.is_empty(),
            "big key layout node has no candidate locations"
        );
        ensure!(!children.is_empty(), "big key layout node has no children");
        Ok(KeyLayout::BigKey {
            candidates,
            gate,
            children,
        })
    }

    pub fn make_small_key(
        required: Capacity,
        candidates: Vec<LocationId>,
        shared_with_big_key: bool,
        gate: Option<GateId>,
        children: Vec<KeyLayout>,
    ) -> Result<KeyLayout> {
        ensure!(required > 0, "small key layout node requires no keys");
        ensure!(
            !candidates.is_empty(),
            "small key layout node has no candidate locations"
        );
        ensure!(
            required as usize <= candidates.len(),
            "small key layout node requires {} keys but has only {} candidates",
            required,
            candidates.len()
        );
        ensure!(
            !children.is_empty(),
            "small key layout node has no children"
        );
        Ok(KeyLayout::SmallKey {
            required,
            candidates,
            shared_with_big_key,
            gate,
            children,
        })
    }

    /// Checks an authored tree against a dungeon's key capacity and location
    /// list. Catches configuration defects (the solver assumes these hold).
    pub fn validate(
        &self,
        small_key_capacity: Capacity,
        locations: &HashSet<LocationId>,
        num_gates: usize,
    ) -> Result<()> {
        let check_gate = |gate: Option<GateId>| -> Result<()> {
            if let Some(g) = gate {
                ensure!(g < num_gates, "key layout references unknown gate {g}");
            }
            Ok(())
        };
        let check_candidates = |candidates: &[LocationId]| -> Result<()> {
            for loc in candidates {
                ensure!(
                    locations.contains(loc),
                    "key layout references location {loc} outside its dungeon"
                );
            }
            Ok(())
        };
        match self {
            KeyLayout::End { gate } => check_gate(*gate),
            KeyLayout::BigKey {
                candidates,
                gate,
                children,
            } => {
                ensure!(
                    !candidates.is_empty(),
                    "big key layout node has no candidate locations"
                );
                ensure!(!children.is_empty(), "big key layout node has no children");
                check_gate(*gate)?;
                check_candidates(candidates)?;
                for child in children {
                    child.validate(small_key_capacity, locations, num_gates)?;
                }
                Ok(())
            }
            KeyLayout::SmallKey {
                required,
                candidates,
                gate,
                children,
                ..
            } => {
                ensure!(*required > 0, "small key layout node requires no keys");
                ensure!(
                    !candidates.is_empty(),
                    "small key layout node has no candidate locations"
                );
                ensure!(
                    *required as usize <= candidates.len(),
                    "small key layout node requires {} keys but has only {} candidates",
                    required,
                    candidates.len()
                );
                ensure!(
                    *required <= small_key_capacity,
                    "small key layout node requires {required} keys but the dungeon holds {small_key_capacity}"
                );
                ensure!(!children.is_empty(), "small key layout node has no children");
                check_gate(*gate)?;
                check_candidates(candidates)?;
                for child in children {
                    child.validate(small_key_capacity, locations, num_gates)?;
                }
                Ok(())
            }
        }
    }

    /// Depth of the authored tree; the solver's recursion is bounded by this.
    pub fn depth(&self) -> usize {
        match self {
            KeyLayout::End { .. } => 1,
            KeyLayout::BigKey { children, .. } | KeyLayout::SmallKey { children, .. } => {
                1 + children.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemData {
    pub name: String,
    pub max: Capacity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocationData {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub can_inspect: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DungeonData {
    pub name: String,
    pub small_key_capacity: Capacity,
    pub has_big_key: bool,
    pub locations: Vec<LocationData>,
    pub key_layout: KeyLayout,
}

impl DungeonData {
    pub fn location_ids(&self) -> HashSet<LocationId> {
        self.locations.iter().map(|loc| loc.id).collect()
    }
}

/// Static authored configuration: trackable items, requirement gates, and
/// per-dungeon data including the key-layout tree. Loaded once at startup;
/// the derived indices are rebuilt after deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackerData {
    pub items: Vec<ItemData>,
    pub gates: Vec<GateData>,
    pub dungeons: Vec<DungeonData>,
    #[serde(skip)]
    pub item_isv: IndexedVec<String>,
    #[serde(skip)]
    pub gate_isv: IndexedVec<String>,
    #[serde(skip)]
    pub location_index: HashMap<LocationId, (DungeonId, usize)>,
}

impl TrackerData {
    pub fn load(path: &Path) -> Result<TrackerData> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        let mut data: TrackerData = serde_json::from_str(&config_str)
            .with_context(|| format!("unable to parse {}", path.display()))?;
        data.finalize()
            .with_context(|| format!("invalid tracker config {}", path.display()))?;
        Ok(data)
    }

    /// Rebuilds derived indices and validates the authored data.
    pub fn finalize(&mut self) -> Result<()> {
        ensure!(!self.items.is_empty(), "config defines no items");
        self.item_isv = IndexedVec::default();
        for item in &self.items {
            ensure!(item.max > 0, "item {} has non-positive max", item.name);
            let idx = self.item_isv.add(&item.name);
            ensure!(
                idx == self.item_isv.len() - 1,
                "duplicate item name: {}",
                item.name
            );
        }
        self.gate_isv = IndexedVec::default();
        for gate in &self.gates {
            let idx = self.gate_isv.add(&gate.name);
            ensure!(
                idx == self.gate_isv.len() - 1,
                "duplicate gate name: {}",
                gate.name
            );
        }
        self.location_index = HashMap::new();
        for (dungeon_id, dungeon) in self.dungeons.iter().enumerate() {
            ensure!(
                dungeon.small_key_capacity >= 0,
                "dungeon {} has negative key capacity",
                dungeon.name
            );
            for (i, loc) in dungeon.locations.iter().enumerate() {
                if self
                    .location_index
                    .insert(loc.id, (dungeon_id, i))
                    .is_some()
                {
                    bail!("duplicate location id {} in {}", loc.id, dungeon.name);
                }
            }
            let ids = dungeon.location_ids();
            dungeon
                .key_layout
                .validate(dungeon.small_key_capacity, &ids, self.gates.len())
                .with_context(|| format!("invalid key layout for {}", dungeon.name))?;
            info!(
                "{}: {} locations, {} small keys, key layout depth {}",
                dungeon.name,
                dungeon.locations.len(),
                dungeon.small_key_capacity,
                dungeon.key_layout.depth()
            );
        }
        Ok(())
    }
}
