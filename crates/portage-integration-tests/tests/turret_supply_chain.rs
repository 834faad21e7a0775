//! Cross-crate turret supply chain tests.
//!
//! Content is authored as data files (RON, JSON and TOML mixed), loaded
//! through `portage-data`, spawned into a `portage-core` network and run
//! headless:
//!
//! ```text
//! miner --> smelter --> splitter --> turret_a
//!                                \-> turret_b
//! ```

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use portage_core::event::{Event, EventKind};
use portage_core::id::HostId;
use portage_core::network::Network;
use portage_core::test_utils::{fixed, run, stock_in};
use portage_core::timer::TimedAction;
use portage_core::upgrade::{LevelUp, StatModifier};
use portage_data::{GameData, load_game_data};

// ===========================================================================
// Data files
// ===========================================================================

const RESOURCES_TOML: &str = r#"
[[resources]]
name = "iron_ore"

[[resources]]
name = "iron_ingot"

[[resources]]
name = "crystal"
"#;

const RECIPES_RON: &str = r#"[
    (
        name: "smelt_iron",
        inputs: [("iron_ore", 2.0)],
        outputs: [("iron_ingot", 1.0)],
        duration: 1.0,
    ),
]"#;

const UPGRADES_JSON: &str = r#"[
    {
        "name": "turret_track",
        "levels": [
            {"material": "crystal", "amount": 5.0,
             "modifiers": [{"Multiply": {"stat": "fire_rate", "factor": 1.5}}]},
            {"material": "iron_ingot", "amount": 3.0,
             "modifiers": [{"Add": {"stat": "range", "value": 2.0}}]}
        ]
    }
]"#;

const HOSTS_RON: &str = r#"[
    (
        name: "miner",
        ports: [(name: "out", access: Output, capacity: Some(5.0))],
        max_outgoing: 1,
        extractor: Some((resource: "iron_ore", rate: 2.0, port: "out")),
    ),
    (
        name: "smelter",
        ports: [
            (name: "in", access: Input, capacity: Some(10.0)),
            (name: "out", access: Output, capacity: Some(10.0)),
        ],
        max_incoming: 1,
        max_outgoing: 1,
        recipe: Some("smelt_iron"),
    ),
    (
        name: "splitter",
        ports: [
            (name: "in", access: Input, capacity: Some(10.0)),
            (name: "out0", access: Output, capacity: Some(1.0)),
            (name: "out1", access: Output, capacity: Some(1.0)),
        ],
        max_incoming: 1,
        max_outgoing: 2,
        distributor: Some("in"),
    ),
    (
        name: "turret",
        ports: [
            (name: "ammo", access: Input, capacity: Some(50.0)),
            (name: "upgrade", access: Input, capacity: Some(10.0)),
        ],
        whitelist: Some(["iron_ingot", "crystal"]),
        max_incoming: 2,
        upgrade_port: Some("upgrade"),
        upgrades: Some("turret_track"),
    ),
]"#;

fn write_data_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "portage_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("resources.toml"), RESOURCES_TOML).unwrap();
    fs::write(dir.join("recipes.ron"), RECIPES_RON).unwrap();
    fs::write(dir.join("upgrades.json"), UPGRADES_JSON).unwrap();
    fs::write(dir.join("hosts.ron"), HOSTS_RON).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

// ===========================================================================
// Network builder
// ===========================================================================

struct Chain {
    net: Network,
    data: GameData,
    turret_a: HostId,
    turret_b: HostId,
}

fn build_chain(data: GameData) -> Chain {
    let mut net = Network::new();
    let spawn = |net: &mut Network, name: &str| data.host(name).unwrap().spawn(net).unwrap();

    let miner = spawn(&mut net, "miner");
    let smelter = spawn(&mut net, "smelter");
    let splitter = spawn(&mut net, "splitter");
    let turret_a = spawn(&mut net, "turret");
    let turret_b = spawn(&mut net, "turret");

    net.connect(miner, smelter).unwrap();
    net.connect(smelter, splitter).unwrap();
    net.connect(splitter, turret_a).unwrap();
    net.connect(splitter, turret_b).unwrap();

    Chain {
        net,
        data,
        turret_a,
        turret_b,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn ingots_alternate_between_turrets() {
    let dir = write_data_dir("alternate");
    let mut chain = build_chain(load_game_data(&dir).unwrap());
    let ingot = chain.data.resource("iron_ingot").unwrap();

    run(&mut chain.net, 10, 1.0);
    assert_eq!(stock_in(&chain.net, chain.turret_a, "ammo", ingot), fixed(5.0));
    assert_eq!(stock_in(&chain.net, chain.turret_b, "ammo", ingot), fixed(5.0));

    cleanup(&dir);
}

#[test]
fn upgrade_track_redirects_ingots_until_maxed() {
    let dir = write_data_dir("upgrade");
    let mut chain = build_chain(load_game_data(&dir).unwrap());
    let ingot = chain.data.resource("iron_ingot").unwrap();
    let crystal = chain.data.resource("crystal").unwrap();

    let applied: Rc<RefCell<Vec<StatModifier>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = applied.clone();
    chain
        .net
        .on_upgrade(
            chain.turret_a,
            Box::new(move |_, up: &LevelUp| sink.borrow_mut().extend(up.applied.modifiers.clone())),
        )
        .unwrap();

    run(&mut chain.net, 10, 1.0);
    assert!(chain.net.try_insert(chain.turret_a, crystal, fixed(5.0)));
    assert_eq!(chain.net.upgrade_gate(chain.turret_a).unwrap().current_level(), 1);

    // Level 2 wants ingots: the next three sent to turret_a feed the upgrade
    // port, the rest go back to ammo.
    run(&mut chain.net, 10, 1.0);
    let gate = chain.net.upgrade_gate(chain.turret_a).unwrap();
    assert!(gate.is_maxed());
    assert_eq!(stock_in(&chain.net, chain.turret_a, "ammo", ingot), fixed(7.0));
    assert_eq!(stock_in(&chain.net, chain.turret_a, "upgrade", ingot), fixed(0.0));
    assert_eq!(stock_in(&chain.net, chain.turret_b, "ammo", ingot), fixed(10.0));

    assert_eq!(
        *applied.borrow(),
        vec![
            StatModifier::Multiply {
                stat: "fire_rate".to_string(),
                factor: fixed(1.5),
            },
            StatModifier::Add {
                stat: "range".to_string(),
                value: fixed(2.0),
            },
        ]
    );

    cleanup(&dir);
}

#[test]
fn destroyed_turret_releases_its_branch() {
    let dir = write_data_dir("destroy");
    let mut chain = build_chain(load_game_data(&dir).unwrap());
    let ingot = chain.data.resource("iron_ingot").unwrap();
    chain
        .net
        .schedule(chain.turret_b, fixed(4.0), TimedAction::Destroy)
        .unwrap();

    run(&mut chain.net, 4, 1.0);
    assert!(!chain.net.contains(chain.turret_b));
    let before = stock_in(&chain.net, chain.turret_a, "ammo", ingot);

    run(&mut chain.net, 6, 1.0);
    assert_eq!(
        stock_in(&chain.net, chain.turret_a, "ammo", ingot),
        before + fixed(6.0)
    );

    cleanup(&dir);
}

#[test]
fn upgrade_events_reach_listeners() {
    let dir = write_data_dir("events");
    let mut chain = build_chain(load_game_data(&dir).unwrap());
    let crystal = chain.data.resource("crystal").unwrap();

    let levels = Rc::new(RefCell::new(Vec::new()));
    let seen = levels.clone();
    chain.net.events_mut().subscribe(
        EventKind::UpgradeApplied,
        Box::new(move |e: &Event| {
            if let Event::UpgradeApplied { level, .. } = e {
                seen.borrow_mut().push(*level);
            }
        }),
    );

    assert!(chain.net.try_insert(chain.turret_a, crystal, fixed(5.0)));
    assert!(chain.net.try_insert(chain.turret_b, crystal, fixed(5.0)));
    chain.net.deliver_events();
    assert_eq!(*levels.borrow(), vec![1, 1]);

    let snap = chain.net.snapshot(chain.turret_a).unwrap();
    assert_eq!(snap.upgrade_level, Some(1));
    assert_eq!(snap.incoming_links, 1);

    cleanup(&dir);
}
