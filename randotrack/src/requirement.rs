//! The reactive requirement graph.
//!
//! Nodes live in a single arena and are referred to by index. Leaves wrap
//! external state (settings flags, solver verdicts); Aggregate and
//! Alternative combinators fold a set of inputs into one node via the
//! lattice `min`/`max`. Combinators are created strictly after their
//! inputs, so node index order is a topological order of the dependency
//! graph: a leaf write drains its dirty set in ascending index order and
//! every affected node recomputes exactly once per update.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use anyhow::{ensure, Result};
use hashbrown::{HashMap, HashSet};
use randotrack_game::AccessibilityLevel;

pub type ReqIdx = usize; // Index into RequirementGraph.nodes
pub type WatchId = usize; // Handle returned by RequirementGraph::watch

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum CombinatorKind {
    Aggregate,
    Alternative,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Leaf,
    Aggregate { inputs: Vec<ReqIdx> },
    Alternative { inputs: Vec<ReqIdx> },
}

struct Node {
    kind: NodeKind,
    level: AccessibilityLevel,
    dependents: Vec<ReqIdx>,
}

/// Coalesces per-update change notifications into one downstream batch.
/// Purely a latency device: node levels are always synchronously current,
/// only this signal lags. The host pumps it with explicit instants, so no
/// timer thread is involved.
pub struct PropagatedQueue {
    pending: HashSet<ReqIdx>,
    last_change: Option<Instant>,
    settle: Duration,
}

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

impl PropagatedQueue {
    fn new(settle: Duration) -> Self {
        PropagatedQueue {
            pending: HashSet::new(),
            last_change: None,
            settle,
        }
    }

    fn extend(&mut self, changed: &[ReqIdx], now: Instant) {
        if changed.is_empty() {
            return;
        }
        self.pending.extend(changed.iter().copied());
        self.last_change = Some(now);
    }

    /// Returns the coalesced batch once no change has landed for the settle
    /// window, in node creation order. `None` while still settling or empty.
    pub fn take_settled(&mut self, now: Instant) -> Option<Vec<ReqIdx>> {
        let last = self.last_change?;
        if now.duration_since(last) < self.settle {
            return None;
        }
        Some(self.drain())
    }

    /// Unconditionally drains the pending batch (e.g. at the end of a bulk
    /// state import).
    pub fn flush(&mut self) -> Vec<ReqIdx> {
        self.drain()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn drain(&mut self) -> Vec<ReqIdx> {
        let mut batch: Vec<ReqIdx> = self.pending.drain().collect();
        batch.sort();
        self.last_change = None;
        batch
    }
}

pub struct RequirementGraph {
    nodes: Vec<Node>,
    memo: HashMap<(CombinatorKind, Vec<ReqIdx>), ReqIdx>,
    watchers: HashMap<ReqIdx, Vec<(WatchId, Box<dyn FnMut(AccessibilityLevel)>)>>,
    watch_index: HashMap<WatchId, ReqIdx>,
    next_watch_id: WatchId,
    pub propagated: PropagatedQueue,
}

impl RequirementGraph {
    pub fn new() -> Self {
        Self::with_settle(DEFAULT_SETTLE)
    }

    pub fn with_settle(settle: Duration) -> Self {
        RequirementGraph {
            nodes: vec![],
            memo: HashMap::new(),
            watchers: HashMap::new(),
            watch_index: HashMap::new(),
            next_watch_id: 0,
            propagated: PropagatedQueue::new(settle),
        }
    }

    /// Creates a leaf wrapping an externally-driven level.
    pub fn leaf(&mut self, level: AccessibilityLevel) -> ReqIdx {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Leaf,
            level,
            dependents: vec![],
        });
        idx
    }

    /// AND composition: output is the minimum of the inputs' levels.
    pub fn aggregate(&mut self, inputs: &[ReqIdx]) -> Result<ReqIdx> {
        self.combinator(CombinatorKind::Aggregate, inputs)
    }

    /// OR composition: output is the maximum of the inputs' levels.
    pub fn alternative(&mut self, inputs: &[ReqIdx]) -> Result<ReqIdx> {
        self.combinator(CombinatorKind::Alternative, inputs)
    }

    fn combinator(&mut self, kind: CombinatorKind, inputs: &[ReqIdx]) -> Result<ReqIdx> {
        ensure!(!inputs.is_empty(), "combinator requires a non-empty input set");
        let mut inputs: Vec<ReqIdx> = inputs.to_vec();
        inputs.sort();
        inputs.dedup();
        for &input in &inputs {
            assert!(input < self.nodes.len(), "unknown requirement node {input}");
        }
        // A singleton set folds to the input itself, for either combinator.
        if inputs.len() == 1 {
            return Ok(inputs[0]);
        }
        // The same distinct input set yields the same shared combinator,
        // regardless of construction order.
        if let Some(&idx) = self.memo.get(&(kind, inputs.clone())) {
            return Ok(idx);
        }
        let level = {
            let levels = inputs.iter().map(|&i| self.nodes[i].level);
            match kind {
                CombinatorKind::Aggregate => levels.min().unwrap(),
                CombinatorKind::Alternative => levels.max().unwrap(),
            }
        };
        let idx = self.nodes.len();
        self.nodes.push(Node {
            kind: match kind {
                CombinatorKind::Aggregate => NodeKind::Aggregate {
                    inputs: inputs.clone(),
                },
                CombinatorKind::Alternative => NodeKind::Alternative {
                    inputs: inputs.clone(),
                },
            },
            level,
            dependents: vec![],
        });
        for &input in &inputs {
            self.nodes[input].dependents.push(idx);
        }
        self.memo.insert((kind, inputs), idx);
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn level(&self, idx: ReqIdx) -> AccessibilityLevel {
        self.nodes[idx].level
    }

    pub fn met(&self, idx: ReqIdx) -> bool {
        self.nodes[idx].level.met()
    }

    /// Registers a change watcher on one node. Watchers fire synchronously,
    /// after the whole update has settled, in node creation order.
    pub fn watch(
        &mut self,
        idx: ReqIdx,
        callback: impl FnMut(AccessibilityLevel) + 'static,
    ) -> WatchId {
        assert!(idx < self.nodes.len(), "unknown requirement node {idx}");
        let watch_id = self.next_watch_id;
        self.next_watch_id += 1;
        self.watchers
            .entry(idx)
            .or_default()
            .push((watch_id, Box::new(callback)));
        self.watch_index.insert(watch_id, idx);
        watch_id
    }

    pub fn unwatch(&mut self, watch_id: WatchId) {
        if let Some(idx) = self.watch_index.remove(&watch_id) {
            if let Some(subs) = self.watchers.get_mut(&idx) {
                subs.retain(|(id, _)| *id != watch_id);
            }
        }
    }

    /// Writes a new level into a leaf and synchronously recomputes every
    /// downstream combinator, then notifies watchers and feeds the
    /// propagated queue. Writing the current level is a no-op.
    pub fn set_leaf(&mut self, idx: ReqIdx, level: AccessibilityLevel, now: Instant) {
        match self.nodes[idx].kind {
            NodeKind::Leaf => {}
            _ => panic!("node {idx} is not a leaf"),
        }
        if self.nodes[idx].level == level {
            return;
        }
        self.nodes[idx].level = level;
        self.propagate(idx, now);
    }

    fn compute(&self, idx: ReqIdx) -> AccessibilityLevel {
        match &self.nodes[idx].kind {
            NodeKind::Leaf => self.nodes[idx].level,
            NodeKind::Aggregate { inputs } => {
                inputs.iter().map(|&i| self.nodes[i].level).min().unwrap()
            }
            NodeKind::Alternative { inputs } => {
                inputs.iter().map(|&i| self.nodes[i].level).max().unwrap()
            }
        }
    }

    fn propagate(&mut self, origin: ReqIdx, now: Instant) {
        let mut changed: Vec<ReqIdx> = vec![origin];
        let mut heap: BinaryHeap<Reverse<ReqIdx>> = BinaryHeap::new();
        let mut queued: HashSet<ReqIdx> = HashSet::new();
        for &dep in &self.nodes[origin].dependents {
            if queued.insert(dep) {
                heap.push(Reverse(dep));
            }
        }
        // Ascending index order: every input of a node precedes it, so each
        // dirty node recomputes once, after all of its inputs settled.
        while let Some(Reverse(idx)) = heap.pop() {
            let level = self.compute(idx);
            if level == self.nodes[idx].level {
                continue;
            }
            self.nodes[idx].level = level;
            changed.push(idx);
            for i in 0..self.nodes[idx].dependents.len() {
                let dep = self.nodes[idx].dependents[i];
                if queued.insert(dep) {
                    heap.push(Reverse(dep));
                }
            }
        }
        for &idx in &changed {
            let level = self.nodes[idx].level;
            if let Some(mut subs) = self.watchers.remove(&idx) {
                for (_, callback) in subs.iter_mut() {
                    callback(level);
                }
                self.watchers.insert(idx, subs);
            }
        }
        self.propagated.extend(&changed, now);
    }
}

impl Default for RequirementGraph {
    fn default() -> Self {
        Self::new()
    }
}
