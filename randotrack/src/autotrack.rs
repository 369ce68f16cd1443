//! Auto-tracking interface.
//!
//! `MemorySource` is the seam to the remote memory-reading client; the
//! concrete network client lives outside this crate. `AutoTracker` polls a
//! source through an authored watch table and applies decoded deltas to the
//! `TrackerState`, reporting what changed so the host can re-run the
//! accessibility provider for the affected dungeons.

use anyhow::{ensure, Context, Result};
use log::debug;
use randotrack_game::{Capacity, DungeonId, ItemId, LocationId};
use randotrack_logic::TrackerState;

pub trait MemorySource {
    fn read(&mut self, addr: u32, len: usize) -> Result<Vec<u8>>;
}

/// What a watched memory range tracks.
#[derive(Clone, Debug)]
pub enum WatchKind {
    /// First byte holds the item's collected count.
    ItemCount(ItemId),
    /// First byte holds the dungeon's collected small-key count.
    SmallKeys(DungeonId),
    /// Big key collected iff any `mask` bit is set in the first byte.
    BigKey { dungeon: DungeonId, mask: u8 },
    /// Location checked iff any `mask` bit is set in the first byte.
    Checked { location: LocationId, mask: u8 },
}

#[derive(Clone, Debug)]
pub struct MemoryWatch {
    pub addr: u32,
    pub len: usize,
    pub kind: WatchKind,
}

/// Changes applied by one poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollChanges {
    pub items: Vec<ItemId>,
    pub dungeons: Vec<DungeonId>,
    pub locations: Vec<LocationId>,
}

impl PollChanges {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.dungeons.is_empty() && self.locations.is_empty()
    }
}

pub struct AutoTracker {
    watches: Vec<MemoryWatch>,
    last: Vec<Option<Vec<u8>>>,
}

impl AutoTracker {
    pub fn new(watches: Vec<MemoryWatch>) -> Result<AutoTracker> {
        for watch in &watches {
            ensure!(
                watch.len > 0,
                "memory watch at {:#x} has zero length",
                watch.addr
            );
        }
        let last = vec![None; watches.len()];
        Ok(AutoTracker { watches, last })
    }

    /// Reads every watched range and applies decoded deltas to `state`.
    /// Ranges whose bytes are unchanged since the last poll are skipped, so
    /// the first poll applies the full remote state.
    pub fn poll(
        &mut self,
        source: &mut dyn MemorySource,
        state: &mut TrackerState,
    ) -> Result<PollChanges> {
        let mut changes = PollChanges::default();
        for (watch, last) in self.watches.iter().zip(self.last.iter_mut()) {
            let bytes = source
                .read(watch.addr, watch.len)
                .with_context(|| format!("reading memory watch at {:#x}", watch.addr))?;
            ensure!(
                bytes.len() == watch.len,
                "memory watch at {:#x}: expected {} bytes, got {}",
                watch.addr,
                watch.len,
                bytes.len()
            );
            if last.as_deref() == Some(&bytes[..]) {
                continue;
            }
            match watch.kind {
                WatchKind::ItemCount(item) => {
                    state.set_item_count(item, bytes[0] as Capacity);
                    changes.items.push(item);
                }
                WatchKind::SmallKeys(dungeon) => {
                    state.set_small_keys(dungeon, bytes[0] as Capacity);
                    changes.dungeons.push(dungeon);
                }
                WatchKind::BigKey { dungeon, mask } => {
                    state.set_big_key(dungeon, bytes[0] & mask != 0);
                    changes.dungeons.push(dungeon);
                }
                WatchKind::Checked { location, mask } => {
                    if bytes[0] & mask != 0 {
                        state.check_location(location);
                    } else {
                        state.uncheck_location(location);
                    }
                    changes.locations.push(location);
                }
            }
            *last = Some(bytes);
        }
        if !changes.is_empty() {
            debug!(
                "auto-track poll: {} item, {} dungeon, {} location updates",
                changes.items.len(),
                changes.dungeons.len(),
                changes.locations.len()
            );
        }
        Ok(changes)
    }
}
