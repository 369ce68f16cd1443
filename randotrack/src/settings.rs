use anyhow::{bail, Result};
use randotrack_game::AccessibilityLevel;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
pub enum WorldLayout {
    Standard,
    Open,
    Inverted,
}

/// The randomizer mode the tracked seed was generated with. Gate flags on
/// key-layout nodes resolve against these toggles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub world_layout: WorldLayout,
    pub small_key_shuffle: bool,
    pub big_key_shuffle: bool,
    pub sequence_breaks: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings {
            world_layout: WorldLayout::Open,
            small_key_shuffle: false,
            big_key_shuffle: false,
            sequence_breaks: true,
        }
    }
}

impl TrackerSettings {
    /// Resolves a named gate flag to the level its leaf node carries. An
    /// unknown flag name is an authoring defect in the config.
    pub fn flag_level(&self, flag: &str) -> Result<AccessibilityLevel> {
        let met = match flag {
            "always" => true,
            "small_keys_in_dungeon" => !self.small_key_shuffle,
            "small_key_shuffle" => self.small_key_shuffle,
            "big_key_in_dungeon" => !self.big_key_shuffle,
            "big_key_shuffle" => self.big_key_shuffle,
            "sequence_breaks" => self.sequence_breaks,
            "standard_world" => self.world_layout == WorldLayout::Standard,
            "open_world" => self.world_layout == WorldLayout::Open,
            "inverted_world" => self.world_layout == WorldLayout::Inverted,
            _ => bail!("unknown settings flag: {flag}"),
        };
        Ok(if met {
            AccessibilityLevel::Normal
        } else {
            AccessibilityLevel::None
        })
    }
}
