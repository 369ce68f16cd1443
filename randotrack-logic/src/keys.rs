//! Feasibility solver for authored key-layout trees.
//!
//! A key-layout tree enumerates the authored hypotheses for where a
//! dungeon's big key and small keys may sit. `can_be_true` answers whether
//! a given accessibility partition is consistent with some hypothesis under
//! a given key-collection snapshot. The subtlety is self-reference: the
//! keys needed to traverse a dungeon may themselves be located inside it,
//! so feasibility is decided by counting how many key candidates the
//! partition leaves out of reach.

use randotrack_game::{Capacity, GateId, KeyLayout};

use crate::{DungeonState, LocationPartition};

/// Resolves gate ids to met/unmet answers. In the full system gates are
/// requirement nodes; the solver only ever needs the derived boolean, so it
/// takes this seam instead of a reference to the reactive graph.
pub trait GateOracle {
    fn met(&self, gate: GateId) -> bool;
}

impl<F: Fn(GateId) -> bool> GateOracle for F {
    fn met(&self, gate: GateId) -> bool {
        self(gate)
    }
}

/// Answers whether `partition` is consistent with some key placement
/// hypothesis in `layout`, assuming the player holds `state`. Pure: no
/// side effects, deterministic, recursion bounded by the authored tree
/// depth.
pub fn can_be_true(
    layout: &KeyLayout,
    partition: &LocationPartition,
    state: &DungeonState,
    small_key_capacity: Capacity,
    gates: &impl GateOracle,
) -> bool {
    match layout {
        KeyLayout::End { gate } => gate.map_or(true, |g| gates.met(g)),
        KeyLayout::BigKey {
            candidates,
            gate,
            children,
        } => {
            if let Some(g) = *gate {
                if !gates.met(g) {
                    return false;
                }
            }
            if state.big_key_collected && partition.accessible_count_in(candidates) == 0 {
                // The big key cannot have come from an unreachable location.
                return false;
            }
            if !state.big_key_collected && partition.inaccessible_count_in(candidates) == 0 {
                // Every candidate is reachable, so the big key would already
                // be in hand.
                return false;
            }
            children
                .iter()
                .any(|child| can_be_true(child, partition, state, small_key_capacity, gates))
        }
        KeyLayout::SmallKey {
            required,
            candidates,
            shared_with_big_key,
            gate,
            children,
        } => {
            if let Some(g) = *gate {
                if !gates.met(g) {
                    return false;
                }
            }
            let mut inaccessible = partition.inaccessible_count_in(candidates) as Capacity;
            if *shared_with_big_key && !state.big_key_collected {
                // One out-of-reach candidate holds the big key, not a small key.
                inaccessible -= 1;
            }
            let candidate_count = candidates.len() as Capacity;
            let lower = Capacity::max(0, *required - inaccessible);
            let upper = small_key_capacity
                - Capacity::max(0, inaccessible - (candidate_count - *required));
            if state.keys_collected < lower || state.keys_collected > upper {
                return false;
            }
            children
                .iter()
                .any(|child| can_be_true(child, partition, state, small_key_capacity, gates))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;
    use randotrack_game::LocationId;

    const LOC_A: LocationId = 1;
    const LOC_B: LocationId = 2;
    const LOC_C: LocationId = 3;

    fn no_gates(_gate: GateId) -> bool {
        unreachable!("layout has no gates")
    }

    fn partition(accessible: &[LocationId], inaccessible: &[LocationId]) -> LocationPartition {
        LocationPartition::new(
            accessible.iter().copied().collect::<HashSet<_>>(),
            inaccessible.iter().copied().collect::<HashSet<_>>(),
        )
        .unwrap()
    }

    fn big_key_layout() -> KeyLayout {
        KeyLayout::make_big_key(vec![LOC_A, LOC_B], None, vec![KeyLayout::make_end(None)])
            .unwrap()
    }

    #[test]
    fn test_big_key_cannot_come_from_unreachable_location() {
        let layout = big_key_layout();
        let state = DungeonState::new(0, true);
        let p = partition(&[], &[LOC_A, LOC_B]);
        assert!(!can_be_true(&layout, &p, &state, 0, &no_gates));
    }

    #[test]
    fn test_big_key_would_already_be_collected() {
        let layout = big_key_layout();
        let state = DungeonState::new(0, false);
        let p = partition(&[LOC_A, LOC_B], &[]);
        assert!(!can_be_true(&layout, &p, &state, 0, &no_gates));
    }

    #[test]
    fn test_big_key_consistent_placements() {
        let layout = big_key_layout();
        // Collected, and at least one candidate is reachable.
        let state = DungeonState::new(0, true);
        let p = partition(&[LOC_A], &[LOC_B]);
        assert!(can_be_true(&layout, &p, &state, 0, &no_gates));
        // Not collected, and at least one candidate is out of reach.
        let state = DungeonState::new(0, false);
        assert!(can_be_true(&layout, &p, &state, 0, &no_gates));
    }

    #[test]
    fn test_small_key_lower_bound() {
        // capacity 3, required 2, three candidates, one inaccessible,
        // not shared with the big key: lower bound = max(0, 2 - 1) = 1.
        let layout = KeyLayout::make_small_key(
            2,
            vec![LOC_A, LOC_B, LOC_C],
            false,
            None,
            vec![KeyLayout::make_end(None)],
        )
        .unwrap();
        let p = partition(&[LOC_A, LOC_B], &[LOC_C]);
        assert!(!can_be_true(
            &layout,
            &p,
            &DungeonState::new(0, false),
            3,
            &no_gates
        ));
        assert!(can_be_true(
            &layout,
            &p,
            &DungeonState::new(1, false),
            3,
            &no_gates
        ));
    }

    #[test]
    fn test_small_key_upper_bound() {
        // Same shape: upper bound = 3 - max(0, 1 - (3 - 2)) = 3, so all key
        // counts up to capacity pass; a count above capacity is rejected
        // here even though upstream state clamping makes it unreachable.
        let layout = KeyLayout::make_small_key(
            2,
            vec![LOC_A, LOC_B, LOC_C],
            false,
            None,
            vec![KeyLayout::make_end(None)],
        )
        .unwrap();
        let p = partition(&[LOC_A, LOC_B], &[LOC_C]);
        assert!(can_be_true(
            &layout,
            &p,
            &DungeonState::new(3, false),
            3,
            &no_gates
        ));
        assert!(!can_be_true(
            &layout,
            &p,
            &DungeonState::new(4, false),
            3,
            &no_gates
        ));
    }

    #[test]
    fn test_small_key_upper_bound_tightens_with_unreachable_candidates() {
        // required 1 of two candidates, both inaccessible, capacity 2:
        // upper bound = 2 - max(0, 2 - (2 - 1)) = 1.
        let layout = KeyLayout::make_small_key(
            1,
            vec![LOC_A, LOC_B],
            false,
            None,
            vec![KeyLayout::make_end(None)],
        )
        .unwrap();
        let p = partition(&[], &[LOC_A, LOC_B]);
        assert!(can_be_true(
            &layout,
            &p,
            &DungeonState::new(1, false),
            2,
            &no_gates
        ));
        assert!(!can_be_true(
            &layout,
            &p,
            &DungeonState::new(2, false),
            2,
            &no_gates
        ));
    }

    #[test]
    fn test_small_key_shared_with_big_key() {
        // One inaccessible candidate holds the uncollected big key, so it
        // cannot hold a small key: the lower bound rises from 1 to 2.
        let layout = KeyLayout::make_small_key(
            2,
            vec![LOC_A, LOC_B, LOC_C],
            true,
            None,
            vec![KeyLayout::make_end(None)],
        )
        .unwrap();
        let p = partition(&[LOC_A, LOC_B], &[LOC_C]);
        assert!(!can_be_true(
            &layout,
            &p,
            &DungeonState::new(1, false),
            3,
            &no_gates
        ));
        assert!(can_be_true(
            &layout,
            &p,
            &DungeonState::new(2, false),
            3,
            &no_gates
        ));
        // With the big key in hand the decrement does not apply.
        assert!(can_be_true(
            &layout,
            &p,
            &DungeonState::new(1, true),
            3,
            &no_gates
        ));
    }

    #[test]
    fn test_gated_nodes() {
        let layout = KeyLayout::make_big_key(
            vec![LOC_A, LOC_B],
            Some(0),
            vec![KeyLayout::make_end(Some(1))],
        )
        .unwrap();
        let state = DungeonState::new(0, true);
        let p = partition(&[LOC_A], &[LOC_B]);
        assert!(!can_be_true(&layout, &p, &state, 0, &|g: GateId| g != 0));
        assert!(!can_be_true(&layout, &p, &state, 0, &|g: GateId| g != 1));
        assert!(can_be_true(&layout, &p, &state, 0, &|_: GateId| true));
    }

    #[test]
    fn test_nested_layout_requires_satisfiable_leaf() {
        // BigKey -> SmallKey -> End: the verdict is the OR over children at
        // each level, so one failing branch does not doom the tree.
        let end = KeyLayout::make_end(None);
        let feasible =
            KeyLayout::make_small_key(1, vec![LOC_B, LOC_C], false, None, vec![end.clone()])
                .unwrap();
        let infeasible =
            KeyLayout::make_small_key(2, vec![LOC_B, LOC_C], false, None, vec![end]).unwrap();
        let layout =
            KeyLayout::make_big_key(vec![LOC_A], None, vec![infeasible, feasible]).unwrap();
        let p = partition(&[LOC_B, LOC_C], &[LOC_A]);
        let state = DungeonState::new(1, false);
        assert!(can_be_true(&layout, &p, &state, 2, &no_gates));
    }

    #[test]
    fn test_determinism() {
        let layout = big_key_layout();
        let state = DungeonState::new(0, true);
        let p = partition(&[LOC_A], &[LOC_B]);
        let first = can_be_true(&layout, &p, &state, 0, &no_gates);
        for _ in 0..10 {
            assert_eq!(can_be_true(&layout, &p, &state, 0, &no_gates), first);
        }
    }
}
