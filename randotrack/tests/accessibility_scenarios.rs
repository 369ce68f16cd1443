use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use hashbrown::{HashMap, HashSet};
use randotrack::provider::{AccessibilityProvider, DungeonPartitions, GateNodes};
use randotrack::requirement::RequirementGraph;
use randotrack::settings::TrackerSettings;
use randotrack_game::{AccessibilityLevel, Capacity, LocationId, TrackerData};
use randotrack_logic::{LocationPartition, TrackerState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ScenariosList {
    scenarios: Vec<Scenario>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    name: String,
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
    expected: Vec<Expected>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reachable {
    #[serde(default)]
    normal: Vec<LocationId>,
    #[serde(default)]
    trick: Vec<LocationId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Expected {
    location: LocationId,
    level: String,
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

fn test_scenario(data: &TrackerData, scenario: &Scenario) -> Result<()> {
    let state = get_state(data, scenario)?;
    let mut graph = RequirementGraph::new();
    let gates = GateNodes::install(data, &scenario.settings, &mut graph)?;
    let provider = AccessibilityProvider::install(data, &mut graph);

    let now = Instant::now();
    for (dungeon_id, dungeon) in data.dungeons.iter().enumerate() {
        let all = dungeon.location_ids();
        let default = Reachable::default();
        let reachable = scenario.reachable.get(&dungeon.name).unwrap_or(&default);
        let partitions = DungeonPartitions {
            normal: LocationPartition::from_accessible(
                reachable.normal.iter().copied().collect::<HashSet<_>>(),
                &all,
            ),
            trick: LocationPartition::from_accessible(
                reachable.trick.iter().copied().collect::<HashSet<_>>(),
                &all,
            ),
        };
        provider.refresh_dungeon(dungeon_id, data, &partitions, &state, &gates, &mut graph, now);
    }

    for expected in &scenario.expected {
        let level = AccessibilityLevel::from_str(&expected.level)
            .map_err(|_| anyhow::anyhow!("bad level '{}'", expected.level))?;
        let actual = graph.level(provider.node(expected.location));
        if actual != level {
            bail!(
                "location {}: expected {}, got {}",
                expected.location,
                level,
                actual
            );
        }
    }
    Ok(())
}

#[test]
fn test_accessibility_scenarios() -> Result<()> {
    let data = TrackerData::load(Path::new("tests/data/config.json"))?;
    let scenarios_path = Path::new("tests/data/scenarios.json");
    let scenarios_str = std::fs::read_to_string(scenarios_path)
        .with_context(|| format!("loading {}", scenarios_path.display()))?;
    let scenarios_list: ScenariosList = serde_json::from_str(&scenarios_str)
        .with_context(|| format!("parsing {}", scenarios_path.display()))?;
    for scenario in &scenarios_list.scenarios {
        println!("Scenario: {}", scenario.name);
        test_scenario(&data, scenario)
            .with_context(|| format!("scenario '{}'", scenario.name))?;
    }
    Ok(())
}
