//! End-to-end scenarios for the persistent log: empty open, leader append,
//! follower reconciliation at various points relative to the config
//! pointer, and crash recovery after out-of-band tail garbage.

use std::fs::OpenOptions;
use std::io::Write;

use rand::RngCore;
use raft_log::{ConfigValue, Entry, EntryKind, NewEntry, Options, PeerId, RaftLog};
use tempfile::tempdir;

/// A toy, self-delimiting encoding for a config payload carrying a single
/// `state` tag, used only by these tests: the log itself never interprets
/// `config` payloads (§9).
fn encode_config_state(state: &str) -> Vec<u8> {
    state.as_bytes().to_vec()
}

fn config_state(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap()
}

fn open(dir: &std::path::Path) -> RaftLog {
    let _ = tracing_subscriber::fmt::try_init();
    RaftLog::open(PeerId::new("test"), Options::new(dir)).unwrap()
}

#[test]
fn empty_open() {
    let dir = tempdir().unwrap();
    let log = open(dir.path());
    assert_eq!(log.get_last_entry(), None);
    assert_eq!(log.get_last_index(), 0);
    assert!(log.get_config().is_blank());
}

#[test]
fn leader_appends_config_then_noop() {
    let dir = tempdir().unwrap();
    let log = open(dir.path());

    let last = log
        .append(vec![NewEntry {
            term: 1,
            kind: EntryKind::Config,
            payload: encode_config_state("stable"),
        }])
        .unwrap();
    assert_eq!(last, 1);

    let config_offset_after_config = match &log.get_config() {
        ConfigValue::Present(bytes) => {
            assert_eq!(config_state(bytes), "stable");
        }
        ConfigValue::Blank => panic!("expected a config"),
    };
    let _ = config_offset_after_config;

    let last = log.append(vec![NewEntry::noop(1)]).unwrap();
    assert_eq!(last, 2);
    match log.get_config() {
        ConfigValue::Present(bytes) => assert_eq!(config_state(&bytes), "stable"),
        ConfigValue::Blank => panic!("config should survive a following noop append"),
    }
    assert_eq!(log.get_last_index(), 2);
}

#[test]
fn follower_overwrite_resets_config() {
    let dir = tempdir().unwrap();
    let log = open(dir.path());
    log.append(vec![NewEntry {
        term: 1,
        kind: EntryKind::Config,
        payload: encode_config_state("stable"),
    }])
    .unwrap();
    log.append(vec![NewEntry::noop(1)]).unwrap();

    let last = log
        .check_and_append(
            vec![Entry {
                term: 2,
                index: 1,
                kind: EntryKind::Noop,
                payload: Vec::new(),
            }],
            1,
        )
        .unwrap();
    assert_eq!(last, 1);
    assert!(log.get_config().is_blank());
    let last_entry = log.get_last_entry().unwrap();
    assert_eq!(last_entry.index, 1);
    assert_eq!(last_entry.term, 2);
}

#[test]
fn follower_preserves_prior_config() {
    let dir = tempdir().unwrap();
    let log = open(dir.path());
    log.append(vec![NewEntry {
        term: 1,
        kind: EntryKind::Config,
        payload: encode_config_state("initial"),
    }])
    .unwrap();
    log.append(vec![NewEntry::noop(1)]).unwrap();
    log.check_and_append(
        vec![Entry {
            term: 2,
            index: 1,
            kind: EntryKind::Noop,
            payload: Vec::new(),
        }],
        1,
    )
    .unwrap();

    // Leader-append two config entries at term 3.
    log.append(vec![
        NewEntry {
            term: 3,
            kind: EntryKind::Config,
            payload: encode_config_state("stable"),
        },
        NewEntry {
            term: 3,
            kind: EntryKind::Config,
            payload: encode_config_state("stabler"),
        },
    ])
    .unwrap();
    assert_eq!(log.get_last_index(), 3);
    match log.get_config() {
        ConfigValue::Present(bytes) => assert_eq!(config_state(&bytes), "stabler"),
        ConfigValue::Blank => panic!("expected a config"),
    }

    // Truncate just the last config.
    let last = log
        .check_and_append(
            vec![Entry {
                term: 4,
                index: 3,
                kind: EntryKind::Noop,
                payload: Vec::new(),
            }],
            3,
        )
        .unwrap();
    assert_eq!(last, 3);
    match log.get_config() {
        ConfigValue::Present(bytes) => assert_eq!(config_state(&bytes), "stable"),
        ConfigValue::Blank => panic!("expected the first config to survive"),
    }
}

#[test]
fn follower_truncates_past_all_configs() {
    let dir = tempdir().unwrap();
    let log = open(dir.path());
    log.append(vec![NewEntry {
        term: 1,
        kind: EntryKind::Config,
        payload: encode_config_state("initial"),
    }])
    .unwrap();
    log.append(vec![NewEntry::noop(1)]).unwrap();
    log.check_and_append(
        vec![Entry {
            term: 2,
            index: 1,
            kind: EntryKind::Noop,
            payload: Vec::new(),
        }],
        1,
    )
    .unwrap();
    log.append(vec![
        NewEntry {
            term: 3,
            kind: EntryKind::Config,
            payload: encode_config_state("stable"),
        },
        NewEntry {
            term: 3,
            kind: EntryKind::Config,
            payload: encode_config_state("stabler"),
        },
    ])
    .unwrap();
    log.check_and_append(
        vec![Entry {
            term: 4,
            index: 3,
            kind: EntryKind::Noop,
            payload: Vec::new(),
        }],
        3,
    )
    .unwrap();

    let last = log
        .check_and_append(
            vec![Entry {
                term: 5,
                index: 2,
                kind: EntryKind::Noop,
                payload: Vec::new(),
            }],
            2,
        )
        .unwrap();
    assert_eq!(last, 2);
    assert_eq!(log.get_last_index(), 2);
    assert!(log.get_config().is_blank());
}

#[test]
fn crash_recovery_discards_out_of_band_garbage() {
    let dir = tempdir().unwrap();
    let peer = PeerId::new("test");
    {
        let log = RaftLog::open(peer.clone(), Options::new(dir.path())).unwrap();
        log.append(vec![NewEntry {
            term: 1,
            kind: EntryKind::Config,
            payload: encode_config_state("stable"),
        }])
        .unwrap();
        log.append(vec![NewEntry::noop(1)]).unwrap();
        log.stop().unwrap();
    }

    let log_path = dir.path().join("rafter_test.log");
    let expected_size = std::fs::metadata(&log_path).unwrap().len();

    let mut garbage = vec![0u8; 500];
    rand::thread_rng().fill_bytes(&mut garbage);
    let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(&garbage).unwrap();
    drop(file);

    let log = RaftLog::open(peer, Options::new(dir.path())).unwrap();
    assert_eq!(log.get_last_index(), 2);
    let last_entry = log.get_last_entry().unwrap();
    assert_eq!(last_entry.index, 2);
    match log.get_config() {
        ConfigValue::Present(bytes) => assert_eq!(config_state(&bytes), "stable"),
        ConfigValue::Blank => panic!("expected config to survive recovery"),
    }
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), expected_size);
}

#[test]
fn metadata_round_trips_across_reopen() {
    let dir = tempdir().unwrap();
    let peer = PeerId::new("test");
    {
        let log = RaftLog::open(peer.clone(), Options::new(dir.path())).unwrap();
        log.set_metadata(Some("peer-b".to_string()), 9).unwrap();
        log.stop().unwrap();
    }
    let log = RaftLog::open(peer, Options::new(dir.path())).unwrap();
    let meta = log.get_metadata().unwrap();
    assert_eq!(meta.current_term, 9);
    assert_eq!(meta.voted_for.as_deref(), Some("peer-b"));
}
