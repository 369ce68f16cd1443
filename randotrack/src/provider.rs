//! The dungeon accessibility provider.
//!
//! Bridges the pure key-layout solver into the reactive graph: each dungeon
//! is evaluated under a normal-logic and a trick-logic partition, under the
//! actual and the maximally favorable key snapshot. The pair of consistency
//! verdicts is reduced to one accessibility level per location, which is
//! then written into that location's requirement-graph leaf so downstream
//! combinators observe it through the ordinary node contract.

use std::time::Instant;

use anyhow::Result;
use hashbrown::HashMap;
use log::debug;
use randotrack_game::{AccessibilityLevel, DungeonId, GateId, LocationId, TrackerData};
use randotrack_logic::keys::can_be_true;
use randotrack_logic::{DungeonState, LocationPartition, TrackerState};

use crate::requirement::{ReqIdx, RequirementGraph};
use crate::settings::TrackerSettings;

/// The two partitions each dungeon is evaluated under: what the
/// location-graph collaborator reaches in logic, and what it reaches with
/// tricks allowed. The trick partition is a superset of the normal one.
#[derive(Clone, Debug, Default)]
pub struct DungeonPartitions {
    pub normal: LocationPartition,
    pub trick: LocationPartition,
}

/// Requirement-graph leaves for the authored gates, leveled from the active
/// settings. Gates marked `sequence_break_only` count as unmet during the
/// normal-logic pass.
pub struct GateNodes {
    nodes: Vec<ReqIdx>,
    sequence_break_only: Vec<bool>,
}

impl GateNodes {
    pub fn install(
        data: &TrackerData,
        settings: &TrackerSettings,
        graph: &mut RequirementGraph,
    ) -> Result<GateNodes> {
        let mut nodes = vec![];
        let mut sequence_break_only = vec![];
        for gate in &data.gates {
            let level = settings.flag_level(&gate.flag)?;
            nodes.push(graph.leaf(level));
            sequence_break_only.push(gate.sequence_break_only);
        }
        Ok(GateNodes {
            nodes,
            sequence_break_only,
        })
    }

    /// Re-levels every gate leaf after a settings change.
    pub fn apply_settings(
        &self,
        data: &TrackerData,
        settings: &TrackerSettings,
        graph: &mut RequirementGraph,
        now: Instant,
    ) -> Result<()> {
        for (gate, &node) in data.gates.iter().zip(&self.nodes) {
            graph.set_leaf(node, settings.flag_level(&gate.flag)?, now);
        }
        Ok(())
    }

    pub fn node(&self, gate: GateId) -> ReqIdx {
        self.nodes[gate]
    }

    fn met_in_logic(&self, graph: &RequirementGraph, gate: GateId) -> bool {
        !self.sequence_break_only[gate] && graph.met(self.nodes[gate])
    }

    fn met_with_tricks(&self, graph: &RequirementGraph, gate: GateId) -> bool {
        graph.met(self.nodes[gate])
    }
}

/// Owns one requirement-graph leaf per authored location and keeps those
/// leaves current with the solver's verdicts.
pub struct AccessibilityProvider {
    location_nodes: HashMap<LocationId, ReqIdx>,
}

impl AccessibilityProvider {
    /// Creates one leaf per authored location, initially `None`.
    pub fn install(data: &TrackerData, graph: &mut RequirementGraph) -> AccessibilityProvider {
        let mut location_nodes = HashMap::new();
        for dungeon in &data.dungeons {
            for loc in &dungeon.locations {
                location_nodes.insert(loc.id, graph.leaf(AccessibilityLevel::None));
            }
        }
        AccessibilityProvider { location_nodes }
    }

    pub fn node(&self, loc: LocationId) -> ReqIdx {
        self.location_nodes[&loc]
    }

    /// Runs the solver for one dungeon and reduces to a verdict per
    /// location:
    ///
    /// - key placement consistent in logic under the actual snapshot, and
    ///   the location reachable in logic, gives `Normal`;
    /// - else consistent with tricks under the most favorable snapshot, and
    ///   the location reachable with tricks, gives `SequenceBreak`;
    /// - else `Inspect` for locations that can be peeked, `None` otherwise.
    ///
    /// Checked locations always report `None`.
    pub fn evaluate_dungeon(
        &self,
        dungeon_id: DungeonId,
        data: &TrackerData,
        partitions: &DungeonPartitions,
        state: &TrackerState,
        gates: &GateNodes,
        graph: &RequirementGraph,
    ) -> Vec<(LocationId, AccessibilityLevel)> {
        let dungeon = &data.dungeons[dungeon_id];
        let capacity = dungeon.small_key_capacity;
        let actual = state.dungeon_state(dungeon_id);
        let favorable = DungeonState::most_favorable(capacity, dungeon.has_big_key);
        let in_logic = |g: GateId| gates.met_in_logic(graph, g);
        let with_tricks = |g: GateId| gates.met_with_tricks(graph, g);
        let consistent_normal = can_be_true(
            &dungeon.key_layout,
            &partitions.normal,
            &actual,
            capacity,
            &in_logic,
        );
        let consistent_trick = can_be_true(
            &dungeon.key_layout,
            &partitions.trick,
            &favorable,
            capacity,
            &with_tricks,
        );
        debug!(
            "{}: consistent in logic: {}, with tricks: {}",
            dungeon.name, consistent_normal, consistent_trick
        );
        dungeon
            .locations
            .iter()
            .map(|loc| {
                let level = if state.is_checked(loc.id) {
                    AccessibilityLevel::None
                } else if consistent_normal && partitions.normal.is_accessible(loc.id) {
                    AccessibilityLevel::Normal
                } else if consistent_trick && partitions.trick.is_accessible(loc.id) {
                    AccessibilityLevel::SequenceBreak
                } else if loc.can_inspect {
                    AccessibilityLevel::Inspect
                } else {
                    AccessibilityLevel::None
                };
                (loc.id, level)
            })
            .collect()
    }

    /// Evaluates one dungeon and pushes the verdicts into the graph.
    pub fn refresh_dungeon(
        &self,
        dungeon_id: DungeonId,
        data: &TrackerData,
        partitions: &DungeonPartitions,
        state: &TrackerState,
        gates: &GateNodes,
        graph: &mut RequirementGraph,
        now: Instant,
    ) {
        let results = self.evaluate_dungeon(dungeon_id, data, partitions, state, gates, graph);
        for (loc, level) in results {
            graph.set_leaf(self.location_nodes[&loc], level, now);
        }
    }
}
