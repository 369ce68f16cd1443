//! Per-location item sections and the `Partial` verdict.
//!
//! A location groups one or more item sections, each behind its own
//! requirement node. Section counting is the only producer of the
//! `Partial` level: it marks a section where the current item pool can
//! still supply some, but not all, of the remaining items.

use randotrack_game::{AccessibilityLevel, Capacity};
use serde::{Deserialize, Serialize};

use crate::requirement::{ReqIdx, RequirementGraph};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemSection {
    pub total: Capacity,
    pub collected: Capacity,
    pub gate: ReqIdx,
}

impl ItemSection {
    pub fn new(total: Capacity, gate: ReqIdx) -> Self {
        ItemSection {
            total,
            collected: 0,
            gate,
        }
    }

    pub fn remaining(&self) -> Capacity {
        self.total - self.collected
    }

    pub fn collect(&mut self) {
        self.collected = Capacity::min(self.collected + 1, self.total);
    }

    pub fn uncollect(&mut self) {
        self.collected = Capacity::max(self.collected - 1, 0);
    }
}

/// Verdict for one section, given how many of its remaining items the
/// current pool can still supply.
pub fn section_level(
    graph: &RequirementGraph,
    section: &ItemSection,
    obtainable: Capacity,
) -> AccessibilityLevel {
    if section.remaining() == 0 {
        return AccessibilityLevel::None;
    }
    let gate = graph.level(section.gate);
    if !gate.met() {
        return AccessibilityLevel::None;
    }
    if obtainable >= section.remaining() {
        gate
    } else if obtainable > 0 {
        AccessibilityLevel::Partial
    } else {
        AccessibilityLevel::None
    }
}

/// Location verdict: the maximum over its unfinished sections. `obtainable`
/// pairs with `sections` by index.
pub fn location_level(
    graph: &RequirementGraph,
    sections: &[ItemSection],
    obtainable: &[Capacity],
) -> AccessibilityLevel {
    sections
        .iter()
        .zip(obtainable)
        .filter(|(section, _)| section.remaining() > 0)
        .map(|(section, &count)| section_level(graph, section, count))
        .max()
        .unwrap_or(AccessibilityLevel::None)
}
