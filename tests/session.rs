mod common;

use std::collections::BTreeSet;

use common::SimulatedDevice;
use hid_remapper_config::constants::commands::*;
use hid_remapper_config::protocol::{MappingRecord, UsageRange};
use hid_remapper_config::{
    Command, Config, Error, LayerSet, MacroSlot, Mapping, Session, Usage, document,
};

fn slot(chords: &[&[u32]]) -> MacroSlot {
    MacroSlot(
        chords
            .iter()
            .map(|c| c.iter().copied().map(Usage).collect())
            .collect(),
    )
}

fn mapping(target: u32, source: u32, layers: u8) -> Mapping {
    Mapping {
        target_usage: Usage(target),
        source_usage: Usage(source),
        layers: LayerSet::from_mask(layers),
        ..Default::default()
    }
}

fn sample_config() -> Config {
    let mut config = Config {
        unmapped_passthrough_layers: LayerSet::from_mask(0b0101),
        partial_scroll_timeout: 250_000,
        interval_override: 2,
        mappings: vec![
            mapping(0x00070005, 0x00070004, 0b0001),
            Mapping {
                scaling: -500,
                sticky: true,
                ..mapping(0xfff10003, 0x00090002, 0b0110)
            },
            mapping(0x00070006, 0x00070004, 0b1000),
        ],
        ..Default::default()
    };
    config.macros[0] = slot(&[&[0x00070004], &[], &[0x000700e1, 0x00070005]]);
    config.macros[3] = slot(&[&[1, 2, 3, 4, 5, 6, 7]]);
    config.macros[7] = slot(&[&[1, 2, 3], &[4, 5]]);
    config
}

#[test]
fn open_negotiates_current_version() {
    let session = Session::open(SimulatedDevice::default()).unwrap();
    assert_eq!(session.version(), 4);
    assert!(session.is_attached());

    let device = session.into_inner();
    assert_eq!(device.log, vec![Command::GetConfig]);
}

#[test]
fn open_reports_legacy_device() {
    let result = Session::open(SimulatedDevice::with_version(3));
    assert!(matches!(result, Err(Error::LegacyDevice { version: 3 })));
}

#[test]
fn open_rejects_unknown_device() {
    let result = Session::open(SimulatedDevice::with_version(9));
    assert!(matches!(result, Err(Error::IncompatibleDevice)));
}

#[test]
fn load_reads_device_state() {
    let mut device = SimulatedDevice {
        flags: 0b0011,
        partial_scroll_timeout: 42,
        interval_override: 1,
        ..Default::default()
    };
    device.mappings = vec![
        MappingRecord {
            target_usage: 0x000c00e9,
            source_usage: 0x00090004,
            scaling: 1000,
            layer_mask: 0b0100,
            flags: 1,
        },
        MappingRecord {
            target_usage: 0x00010031,
            source_usage: 0x00010030,
            scaling: -1000,
            layer_mask: 0b0001,
            flags: 0,
        },
    ];
    device.macros[1] = vec![vec![4], vec![], vec![5, 6]];
    device.macros[2] = vec![(1..=7).collect()];

    let mut session = Session::open(device).unwrap();
    let config = session.load_config().unwrap();

    assert_eq!(config.version, 4);
    assert_eq!(config.unmapped_passthrough_layers.iter().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(config.partial_scroll_timeout, 42);
    assert_eq!(config.interval_override, 1);
    assert_eq!(
        config.mappings,
        vec![
            Mapping {
                sticky: true,
                ..mapping(0x000c00e9, 0x00090004, 0b0100)
            },
            Mapping {
                scaling: -1000,
                ..mapping(0x00010031, 0x00010030, 0b0001)
            },
        ]
    );
    assert_eq!(config.macros.len(), 8);
    assert_eq!(config.macros[0], MacroSlot::default());
    assert_eq!(config.macros[1], slot(&[&[4], &[], &[5, 6]]));
    assert_eq!(config.macros[2], slot(&[&[1, 2, 3, 4, 5, 6, 7]]));
}

#[test]
fn save_then_load_round_trip() {
    let config = sample_config();
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.save_config(&config).unwrap();
    assert_eq!(session.load_config().unwrap(), config);

    let device = session.into_inner();
    assert_eq!(device.flags, 0b0101);
    assert_eq!(device.persisted, 1);
    assert!(!device.suspended);
}

#[test]
fn save_sends_full_sequence_in_order() {
    let config = sample_config();
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.save_config(&config).unwrap();
    let log = session.into_inner().log;

    let codes: Vec<u8> = log.iter().skip(1).map(Command::code).collect();
    let mut expected = vec![SUSPEND, SET_CONFIG, CLEAR_MAPPING];
    expected.extend([ADD_MAPPING; 3]);
    expected.push(CLEAR_MACROS);
    // slot 0: 5 items, slot 3: 7 items, slot 7: 6 items
    expected.extend([APPEND_TO_MACRO; 4]);
    expected.extend([PERSIST_CONFIG, RESUME]);
    assert_eq!(codes, expected);

    let added: Vec<MappingRecord> = log
        .iter()
        .filter_map(|cmd| match cmd {
            Command::AddMapping(record) => Some(*record),
            _ => None,
        })
        .collect();
    let sent_order: Vec<u32> = added.iter().map(|r| r.target_usage).collect();
    assert_eq!(sent_order, vec![0x00070005, 0xfff10003, 0x00070006]);
    assert_eq!(added[1].flags, 1);
    assert_eq!(added[1].layer_mask, 0b0110);
}

#[test]
fn save_drops_macros_beyond_eight() {
    let mut config = sample_config();
    config.macros.push(slot(&[&[0x00070009]]));
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.save_config(&config).unwrap();

    let loaded = session.load_config().unwrap();
    assert_eq!(loaded.macros.len(), 8);
    assert_eq!(&loaded.macros[..], &config.macros[..8]);
    let device = session.into_inner();
    assert!(
        !device
            .log
            .iter()
            .any(|cmd| matches!(cmd, Command::AppendToMacro { slot, .. } if *slot >= 8))
    );
}

#[test]
fn save_rejects_other_versions() {
    let config = Config {
        version: 3,
        ..sample_config()
    };
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    assert!(matches!(
        session.save_config(&config),
        Err(Error::UnsupportedVersion { version: 3 })
    ));
    assert!(session.is_attached());
    assert_eq!(session.into_inner().log.len(), 1);
}

#[test]
fn migrated_document_survives_device_round_trip() {
    let json = r#"{
        "version": 3,
        "unmapped_passthrough": true,
        "partial_scroll_timeout": 1000000,
        "interval_override": 0,
        "mappings": [
            {"target_usage": "0x00070005", "source_usage": "0x00070004", "scaling": 1000, "layer": 2, "sticky": false}
        ]
    }"#;
    let config = document::from_json(json).unwrap();
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.save_config(&config).unwrap();

    let loaded = session.load_config().unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.mappings[0].layers, LayerSet::single(2).unwrap());
    assert_eq!(loaded.unmapped_passthrough_layers, LayerSet::single(0).unwrap());
}

#[test]
fn extra_usages_skip_catalog_and_ignored() {
    let device = SimulatedDevice {
        our_usages: vec![
            UsageRange {
                start_usage: 0x00070004,
                count: 3,
            },
            UsageRange {
                start_usage: 0,
                count: 5,
            },
            UsageRange {
                start_usage: 0x00090001,
                count: 2,
            },
            UsageRange {
                start_usage: 0x00010030,
                count: 1,
            },
        ],
        their_usages: vec![UsageRange {
            start_usage: 0x000c00e9,
            count: 2,
        }],
        ..Default::default()
    };
    let catalog: BTreeSet<Usage> = [0x00070004, 0x00070005, 0x00090001]
        .into_iter()
        .map(Usage)
        .collect();
    let ignored = [Usage(0x000c00ea)];

    let mut session = Session::open(device).unwrap();
    let extra = session.extra_usages(&catalog, &ignored[..]).unwrap();
    assert_eq!(
        extra.into_iter().collect::<Vec<_>>(),
        vec![
            Usage(0x00010030),
            Usage(0x00070006),
            Usage(0x00090002),
            Usage(0x000c00e9)
        ]
    );

    let pages: Vec<Command> = session
        .into_inner()
        .log
        .into_iter()
        .filter(|cmd| matches!(cmd, Command::GetOurUsages { .. } | Command::GetTheirUsages { .. }))
        .collect();
    assert_eq!(
        pages,
        vec![
            Command::GetOurUsages { index: 0 },
            Command::GetOurUsages { index: 3 },
            Command::GetTheirUsages { index: 0 },
        ]
    );
}

#[test]
fn detach_mid_save_leaves_partial_state() {
    let mut device = SimulatedDevice {
        // negotiation, SUSPEND, SET_CONFIG, CLEAR_MAPPING, first ADD_MAPPING
        detach_after: Some(5),
        ..Default::default()
    };
    device.mappings = vec![MappingRecord::default(); 4];

    {
        let mut session = Session::open(&mut device).unwrap();
        assert!(matches!(
            session.save_config(&sample_config()),
            Err(Error::DeviceGone)
        ));
        assert!(!session.is_attached());
        assert!(matches!(session.read_header(), Err(Error::DeviceGone)));
        assert!(matches!(session.load_config(), Err(Error::DeviceGone)));
    }

    assert_eq!(device.mappings.len(), 1);
    assert_eq!(device.mappings[0].target_usage, 0x00070005);
    assert!(device.suspended);
    assert_eq!(device.persisted, 0);
}

#[test]
fn corrupt_reply_fails_without_closing_session() {
    let device = SimulatedDevice {
        corrupt_after: Some(1),
        ..Default::default()
    };
    let mut session = Session::open(device).unwrap();
    assert!(matches!(session.load_config(), Err(Error::Checksum { .. })));
    assert!(session.is_attached());
}

#[test]
fn bootsel_ends_session() {
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.reset_into_bootsel().unwrap();
    assert!(!session.is_attached());
    assert!(matches!(session.pair_new_device(), Err(Error::DeviceGone)));
    assert_eq!(session.into_inner().log.last(), Some(&Command::ResetIntoBootsel));
}

#[test]
fn device_actions_send_one_command_each() {
    let mut session = Session::open(SimulatedDevice::default()).unwrap();
    session.pair_new_device().unwrap();
    session.clear_bonds().unwrap();
    session.flash_b_side().unwrap();
    session.suspend().unwrap();
    session.persist_config().unwrap();
    session.resume().unwrap();

    let device = session.into_inner();
    assert_eq!(
        device.log[1..],
        [
            Command::PairNewDevice,
            Command::ClearBonds,
            Command::FlashBSide,
            Command::Suspend,
            Command::PersistConfig,
            Command::Resume,
        ]
    );
    assert_eq!(device.persisted, 1);
    assert!(!device.suspended);
}

#[test]
fn load_with_inflated_mapping_count_ends_on_detach() {
    let device = SimulatedDevice {
        reported_count: Some(u32::MAX),
        // negotiation, GET_CONFIG, two GET_MAPPING
        detach_after: Some(4),
        ..Default::default()
    };
    let mut session = Session::open(device).unwrap();
    assert!(matches!(session.load_config(), Err(Error::DeviceGone)));
    assert!(!session.is_attached());

    let device = session.into_inner();
    assert_eq!(
        &device.log[2..],
        &[
            Command::GetMapping { index: 0 },
            Command::GetMapping { index: 1 },
        ]
    );
}

#[test]
fn extra_usages_with_inflated_header_count_ends_on_detach() {
    let device = SimulatedDevice {
        reported_count: Some(u32::MAX),
        our_usages: vec![UsageRange {
            start_usage: 0x00070004,
            count: 1,
        }],
        // negotiation, GET_CONFIG, three usage pages
        detach_after: Some(5),
        ..Default::default()
    };
    let mut session = Session::open(device).unwrap();
    let catalog: BTreeSet<Usage> = BTreeSet::new();
    assert!(matches!(
        session.extra_usages(&catalog, &catalog),
        Err(Error::DeviceGone)
    ));
    assert!(!session.is_attached());

    let device = session.into_inner();
    assert_eq!(
        &device.log[2..],
        &[
            Command::GetOurUsages { index: 0 },
            Command::GetOurUsages { index: 3 },
            Command::GetOurUsages { index: 6 },
        ]
    );
}

#[test]
fn extra_usages_bound_a_huge_run_to_its_page() {
    let device = SimulatedDevice {
        our_usages: vec![UsageRange {
            start_usage: 0x00070004,
            count: u32::MAX,
        }],
        ..Default::default()
    };
    let mut session = Session::open(device).unwrap();
    let catalog: BTreeSet<Usage> = BTreeSet::new();
    let extra = session.extra_usages(&catalog, &catalog).unwrap();
    assert_eq!(extra.len(), 0x10000 - 4);
    assert_eq!(extra.first(), Some(&Usage(0x00070004)));
    assert_eq!(extra.last(), Some(&Usage(0x0007ffff)));
}
