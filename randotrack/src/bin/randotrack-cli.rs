use anyhow::{Context, Result};
use clap::Parser;
use hashbrown::{HashMap, HashSet};
use log::info;
use randotrack::provider::{AccessibilityProvider, DungeonPartitions, GateNodes};
use randotrack::requirement::RequirementGraph;
use randotrack::settings::TrackerSettings;
use randotrack_game::{Capacity, LocationId, TrackerData};
use randotrack_logic::{LocationPartition, TrackerState};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    scenario: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    #[serde(default)]
    settings: TrackerSettings,
    #[serde(default)]
    items: HashMap<String, Capacity>,
    #[serde(default)]
    small_keys: HashMap<String, Capacity>,
    #[serde(default)]
    big_keys: Vec<String>,
    #[serde(default)]
    checked: Vec<LocationId>,
    #[serde(default)]
    reachable: HashMap<String, Reachable>,
}

#[derive(Default, Deserialize)]
struct Reachable {
    #[serde(default)]
    normal: Vec<LocationId>,
    #[serde(default)]
    trick: Vec<LocationId>,
}

fn dungeon_id_by_name(data: &TrackerData, name: &str) -> Result<usize> {
    data.dungeons
        .iter()
        .position(|d| d.name == name)
        .with_context(|| format!("unknown dungeon '{name}'"))
}

fn get_state(data: &TrackerData, scenario: &Scenario) -> Result<TrackerState> {
    let mut state = TrackerState::new(data);
    for (name, &count) in &scenario.items {
        let item = *data
            .item_isv
            .index_by_key
            .get(name)
            .with_context(|| format!("unknown item '{name}'"))?;
        state.set_item_count(item, count);
    }
    for (name, &count) in &scenario.small_keys {
        state.set_small_keys(dungeon_id_by_name(data, name)?, count);
    }
    for name in &scenario.big_keys {
        state.set_big_key(dungeon_id_by_name(data, name)?, true);
    }
    for &loc in &scenario.checked {
        state.check_location(loc);
    }
    Ok(state)
}

fn get_partitions(
    all: &HashSet<LocationId>,
    reachable: Option<&Reachable>,
) -> DungeonPartitions {
    let default = Reachable::default();
    let reachable = reachable.unwrap_or(&default);
    DungeonPartitions {
        normal: LocationPartition::from_accessible(
            reachable.normal.iter().copied().collect(),
            all,
        ),
        trick: LocationPartition::from_accessible(reachable.trick.iter().copied().collect(), all),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let data = TrackerData::load(&args.config)?;
    let scenario_str = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("unable to read {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&scenario_str)
        .with_context(|| format!("unable to parse {}", args.scenario.display()))?;

    let state = get_state(&data, &scenario)?;
    let mut graph = RequirementGraph::new();
    let gates = GateNodes::install(&data, &scenario.settings, &mut graph)?;
    let provider = AccessibilityProvider::install(&data, &mut graph);

    let now = Instant::now();
    for (dungeon_id, dungeon) in data.dungeons.iter().enumerate() {
        let all = dungeon.location_ids();
        let partitions = get_partitions(&all, scenario.reachable.get(&dungeon.name));
        provider.refresh_dungeon(
            dungeon_id, &data, &partitions, &state, &gates, &mut graph, now,
        );
        for loc in &dungeon.locations {
            println!(
                "{} / {}: {}",
                dungeon.name,
                loc.name,
                graph.level(provider.node(loc.id))
            );
        }
    }
    info!(
        "evaluated {} dungeons, {} graph nodes",
        data.dungeons.len(),
        graph.len()
    );
    Ok(())
}
