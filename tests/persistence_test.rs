//! Tests for the binary session format
//!
//! Idle sessions persist the active list; running sessions persist the
//! pre-run topology plus the ids of the nodes that were active.

use std::cell::RefCell;
use std::rc::Rc;

use generational_arena::Index;

use storyrun::domain::{
    BinaryReader, BinaryWriter, Blackboard, Container, Lifecycle, LoadReport, NodeId,
    NodeRegistry, Pass, PersistError, RunMode, SetFlag, TickResult, Wait,
};
use storyrun::util::testing::{self, testing_registry, Scripted};

fn encode(container: &Container) -> Vec<u8> {
    let mut w = BinaryWriter::buffer();
    container.save(&mut w).unwrap();
    w.into_inner()
}

fn decode(bytes: &[u8], registry: &NodeRegistry) -> (Container, LoadReport) {
    let mut container = Container::new();
    let report = container
        .load(&mut BinaryReader::new(bytes), registry)
        .unwrap();
    (container, report)
}

fn tags(container: &Container, list: &[Index]) -> Vec<String> {
    list.iter()
        .map(|&idx| container.node(idx).unwrap().type_tag().to_string())
        .collect()
}

/// a(1, pass) -> [b(2, wait 2), c(3, set_flag)], d(4, scripted running)
fn story() -> Container {
    let mut container = Container::new();
    let a = container.attach(1, RunMode::StopBranch, Box::new(Pass));
    let b = container.insert_node(2, RunMode::ReturnToParent, Box::new(Wait::new(2)));
    let c = container.insert_node(3, RunMode::StopBranch, Box::new(SetFlag::new("lit", 1)));
    container.nodes_mut().link(a, b).unwrap();
    container.nodes_mut().link(a, c).unwrap();
    container.attach(
        4,
        RunMode::RetryUntilSuccess,
        Box::new(Scripted::always(TickResult::Running)),
    );
    container
}

// ============================================================
// idle sessions
// ============================================================

#[test]
fn given_idle_container_when_round_tripping_then_same_tags_and_payloads() {
    testing::init_test_setup();
    let original = story();
    let bytes = encode(&original);

    let (restored, report) = decode(&bytes, &testing_registry());

    assert!(!report.was_running);
    assert_eq!(report.originals, 2);
    assert_eq!(report.placeholders, 0);
    assert!(!restored.is_active());
    assert_eq!(
        tags(&restored, restored.active()),
        tags(&original, original.active())
    );
    assert_eq!(restored.active_ids(), vec![1, 4]);
    // payload-equal: re-encoding yields identical bytes
    assert_eq!(encode(&restored), bytes);
}

#[test]
fn given_idle_layout_when_encoding_then_starts_with_flag_and_count() {
    let mut container = Container::new();
    container.attach(5, RunMode::StopBranch, Box::new(Pass));

    let bytes = encode(&container);

    let mut expected = vec![0u8]; // not running
    expected.extend_from_slice(&1i32.to_le_bytes()); // count
    expected.push(4); // tag length
    expected.extend_from_slice(b"pass");
    expected.extend_from_slice(&5i32.to_le_bytes()); // id
    expected.extend_from_slice(&2i32.to_le_bytes()); // stop-branch
    expected.extend_from_slice(&0i32.to_le_bytes()); // empty behavior payload
    expected.extend_from_slice(&0i32.to_le_bytes()); // no successors
    assert_eq!(bytes, expected);
}

// ============================================================
// running sessions
// ============================================================

#[test]
fn given_running_container_when_round_tripping_then_active_ids_resume() {
    let mut original = story();
    let mut bb = Blackboard::new();
    original.start();
    original.tick(&mut bb);
    assert_eq!(original.active_ids(), vec![4, 2, 3]);

    let (restored, report) = decode(&encode(&original), &testing_registry());

    assert!(report.was_running);
    assert!(restored.is_active());
    assert_eq!(report.originals, 2);
    assert_eq!(report.active, 3);
    assert!(report.dropped_ids.is_empty());
    assert_eq!(restored.active_ids(), vec![4, 2, 3]);
}

#[test]
fn given_running_round_trip_when_ending_then_original_topology_restored() {
    let mut original = story();
    let mut bb = Blackboard::new();
    original.start();
    original.tick(&mut bb);

    let (mut restored, _) = decode(&encode(&original), &testing_registry());
    restored.end();

    assert!(!restored.is_active());
    assert_eq!(restored.active_ids(), vec![1, 4]);
    let root = restored.find_by_id(1).unwrap();
    let successors: Vec<NodeId> = restored
        .node(root)
        .unwrap()
        .next
        .iter()
        .map(|&idx| restored.node(idx).unwrap().id)
        .collect();
    assert_eq!(successors, vec![2, 3]);
}

#[test]
fn given_deep_running_chain_when_round_tripping_then_leaf_resumes() {
    const DEPTH: NodeId = 50_000;
    let mut original = Container::new();
    let leaf = original.insert_node(DEPTH, RunMode::StopBranch, Box::new(Wait::new(5)));
    let mut head = leaf;
    for id in (1..DEPTH).rev() {
        let parent = original.insert_node(id, RunMode::StopBranch, Box::new(Pass));
        original.nodes_mut().link(parent, head).unwrap();
        head = parent;
    }
    original.add(head);
    original.start();
    original.remove(head);
    original.add(leaf);

    let (mut restored, report) = decode(&encode(&original), &NodeRegistry::with_builtins());

    assert!(report.was_running);
    assert_eq!(report.originals, 1);
    assert_eq!(restored.active_ids(), vec![DEPTH]);
    restored.end();
    assert_eq!(restored.active_ids(), vec![1]);
    assert_eq!(restored.nodes().len(), DEPTH as usize);
}

#[test]
fn given_running_session_when_resumed_then_tick_counter_restarts() {
    let mut original = story();
    let mut bb = Blackboard::new();
    original.start();
    original.tick(&mut bb);
    original.tick(&mut bb);
    assert_eq!(original.state().ticks(), 2);

    let (mut restored, _) = decode(&encode(&original), &testing_registry());

    assert!(restored.is_active());
    assert_eq!(restored.state().ticks(), 0);
    restored.tick(&mut bb);
    assert_eq!(restored.state().ticks(), 1);
}

#[test]
fn given_mid_wait_save_when_resuming_then_wait_continues_where_it_stopped() {
    let mut container = Container::new();
    container.attach(1, RunMode::StopBranch, Box::new(Wait::new(2)));
    let mut bb = Blackboard::new();
    container.start();
    container.tick(&mut bb); // elapsed 1

    let (mut restored, _) = decode(&encode(&container), &NodeRegistry::with_builtins());

    restored.tick(&mut bb); // elapsed 2
    assert_eq!(restored.active_ids(), vec![1]);
    restored.tick(&mut bb); // success
    assert!(restored.is_empty());
}

#[test]
fn given_running_ids_not_in_topology_when_loading_then_dropped_and_reported() {
    let mut w = BinaryWriter::buffer();
    w.write_bool(true).unwrap();
    w.write_len(1).unwrap();
    w.write_string("pass").unwrap();
    w.write_i32(1).unwrap(); // id
    w.write_i32(2).unwrap(); // stop-branch
    w.write_bytes(&[]).unwrap();
    w.write_len(0).unwrap();
    w.write_len(2).unwrap(); // running ids
    w.write_i32(1).unwrap();
    w.write_i32(99).unwrap();

    let (restored, report) = decode(&w.into_inner(), &NodeRegistry::with_builtins());

    assert_eq!(restored.active_ids(), vec![1]);
    assert_eq!(report.dropped_ids, vec![99]);
}

// ============================================================
// unknown tags
// ============================================================

#[test]
fn given_unknown_tag_when_loading_then_placeholder_and_lossless_resave() {
    let original = story();
    let bytes = encode(&original);

    // no "scripted" constructor here
    let (restored, report) = decode(&bytes, &NodeRegistry::with_builtins());

    assert_eq!(report.placeholders, 1);
    assert_eq!(restored.active_ids(), vec![1, 4]);
    let idx = restored.find_by_id(4).unwrap();
    assert_eq!(restored.node(idx).unwrap().type_tag(), "scripted");
    assert_eq!(encode(&restored), bytes);
}

#[test]
fn given_placeholder_when_ticking_then_fails_under_its_run_mode() {
    let mut original = Container::new();
    original.attach(
        1,
        RunMode::StopBranch,
        Box::new(Scripted::always(TickResult::Running)),
    );
    let (mut restored, _) = decode(&encode(&original), &NodeRegistry::with_builtins());
    let mut bb = Blackboard::new();

    restored.start();
    restored.tick(&mut bb);

    assert!(restored.is_empty());
}

// ============================================================
// observers
// ============================================================

#[test]
fn given_observer_when_loading_then_notified_with_restored_container() {
    let seen: Rc<RefCell<Vec<Vec<NodeId>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut container = Container::new();
    container.subscribe(Box::new(move |c: &Container| {
        sink.borrow_mut().push(c.active_ids());
    }));

    container
        .load(
            &mut BinaryReader::new(encode(&story()).as_slice()),
            &testing_registry(),
        )
        .unwrap();

    assert_eq!(*seen.borrow(), vec![vec![1, 4]]);
}

// ============================================================
// malformed streams
// ============================================================

#[test]
fn given_truncated_stream_when_loading_then_io_error() {
    let bytes = encode(&story());
    let truncated = &bytes[..bytes.len() - 3];

    let err = Container::new()
        .load(&mut BinaryReader::new(truncated), &testing_registry())
        .unwrap_err();

    assert!(matches!(err, PersistError::Io(_)));
}

#[test]
fn given_bad_run_mode_when_loading_then_invalid_run_mode() {
    let mut w = BinaryWriter::buffer();
    w.write_bool(false).unwrap();
    w.write_len(1).unwrap();
    w.write_string("pass").unwrap();
    w.write_i32(1).unwrap();
    w.write_i32(9).unwrap();

    let err = Container::new()
        .load(
            &mut BinaryReader::new(w.into_inner().as_slice()),
            &NodeRegistry::with_builtins(),
        )
        .unwrap_err();

    assert!(matches!(err, PersistError::InvalidRunMode(9)));
}

#[test]
fn given_huge_running_count_when_loading_then_io_error_without_preallocating() {
    let mut w = BinaryWriter::buffer();
    w.write_bool(true).unwrap();
    w.write_len(0).unwrap(); // no originals
    w.write_i32(i32::MAX).unwrap(); // running ids, none follow

    let err = Container::new()
        .load(
            &mut BinaryReader::new(w.into_inner().as_slice()),
            &NodeRegistry::with_builtins(),
        )
        .unwrap_err();

    assert!(matches!(err, PersistError::Io(_)));
}

#[test]
fn given_huge_successor_count_when_loading_then_io_error() {
    let mut w = BinaryWriter::buffer();
    w.write_bool(false).unwrap();
    w.write_len(1).unwrap();
    w.write_string("pass").unwrap();
    w.write_i32(1).unwrap();
    w.write_i32(2).unwrap();
    w.write_bytes(&[]).unwrap();
    w.write_i32(i32::MAX).unwrap(); // successors, none follow

    let err = Container::new()
        .load(
            &mut BinaryReader::new(w.into_inner().as_slice()),
            &NodeRegistry::with_builtins(),
        )
        .unwrap_err();

    assert!(matches!(err, PersistError::Io(_)));
}

#[test]
fn given_negative_count_when_loading_then_negative_length() {
    let mut w = BinaryWriter::buffer();
    w.write_bool(false).unwrap();
    w.write_i32(-1).unwrap();

    let err = Container::new()
        .load(
            &mut BinaryReader::new(w.into_inner().as_slice()),
            &NodeRegistry::with_builtins(),
        )
        .unwrap_err();

    assert!(matches!(err, PersistError::NegativeLength(-1)));
}
