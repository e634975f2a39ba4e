use common::*;
use raftsim::event::Event;
use raftsim::message::{AppendResponse, Message, NodeId, Rpc, TermId};
use raftsim::world::Settings;

mod common;

fn short_step() -> Settings {
    Settings {
        ms_per_step: 30,
        ..Settings::default()
    }
}

#[test]
pub fn send_drop_opens_and_closes_its_window() {
    let mut world = world_with(short_step());
    let pristine = world.network().clone();

    // window 10..=60 spans two steps of 31 ticks each
    world
        .execute_step(vec![send_drop(10, 50, 0, &[1, 2])])
        .unwrap();
    assert!(!world.network().connected(NodeId(0), NodeId(1)));
    assert!(!world.network().connected(NodeId(0), NodeId(2)));
    assert!(world.network().connected(NodeId(0), NodeId(3)));
    assert!(world.network().connected(NodeId(1), NodeId(0)));

    world.execute_step(Vec::new()).unwrap();
    assert_eq!(world.network(), &pristine);
}

#[test]
pub fn send_delay_round_trips() {
    let mut world = world_with(short_step());
    let pristine = world.network().clone();

    world
        .execute_step(vec![send_delay(5, 40, 1, &[0, 3], 25)])
        .unwrap();
    assert_eq!(world.network().delay(NodeId(1), NodeId(0)), 25);
    assert_eq!(world.network().delay(NodeId(1), NodeId(3)), 25);
    assert_eq!(world.network().delay(NodeId(1), NodeId(2)), 0);

    world.execute_step(Vec::new()).unwrap();
    assert_eq!(world.network(), &pristine);
}

#[test]
pub fn receive_drop_round_trips() {
    let mut world = world_with(short_step());
    let pristine = world.network().clone();

    world.execute_step(vec![receive_drop(5, 40, &[4])]).unwrap();
    for from in 0..4 {
        assert!(!world.network().connected(NodeId(from), NodeId(4)));
    }
    assert!(world.network().connected(NodeId(4), NodeId(0)));

    world.execute_step(Vec::new()).unwrap();
    assert_eq!(world.network(), &pristine);
}

#[test]
pub fn transmit_drop_round_trips() {
    let mut world = world_with(short_step());
    let pristine = world.network().clone();

    world
        .execute_step(vec![transmit_drop(5, 40, 3, 4)])
        .unwrap();
    assert!(!world.network().connected(NodeId(3), NodeId(4)));
    assert!(world.network().connected(NodeId(4), NodeId(3)));

    world.execute_step(Vec::new()).unwrap();
    assert_eq!(world.network(), &pristine);
}

#[test]
pub fn duplicate_window_round_trips() {
    let mut world = world_with(short_step());

    world
        .execute_step(vec![send_duplicate(5, 40, 1)])
        .unwrap();
    assert_eq!(world.network().duplicates(NodeId(1), NodeId(0)), 1);
    assert_eq!(world.network().duplicates(NodeId(0), NodeId(1)), 0);

    world.execute_step(Vec::new()).unwrap();
    assert_eq!(world.network().duplicates(NodeId(1), NodeId(0)), 0);
}

#[test]
pub fn stray_stop_duplicate_floors_at_zero() {
    let mut world = world_with(short_step());

    world
        .execute_step(vec![Event::StopSendDuplicate {
            start_time: 5,
            affected_node: NodeId(2),
        }])
        .unwrap();
    assert_eq!(world.network().duplicates(NodeId(2), NodeId(0)), 0);
}

#[test]
pub fn power_down_round_trips_the_record() {
    let mut world = world_with(Settings {
        ms_per_step: 20,
        ..Settings::default()
    });

    world.execute_step(vec![power_down(10, 30, 1)]).unwrap();
    assert!(!world.power().is_up(NodeId(1)));
    assert_eq!(world.timers().deadline(NodeId(1)), None);

    // the preserved record is untouched
    let record = world.node(NodeId(1)).unwrap();
    assert!(record.is_follower());
    assert_eq!(record.term(), TermId(0));
    assert_eq!(record.voted_for(), None);

    world.execute_step(Vec::new()).unwrap();
    assert!(world.power().is_up(NodeId(1)));
    let record = world.node(NodeId(1)).unwrap();
    assert!(record.is_follower());
    assert_eq!(record.term(), TermId(0));
}

#[test]
pub fn heal_events_restore_the_initial_state() {
    let mut world = world();
    let pristine = world.network().clone();

    let batch = vec![
        send_drop(10, 600, 0, &[1, 2, 3, 4]),
        send_delay(10, 600, 1, &[0, 2], 30),
        send_duplicate(10, 600, 2),
        power_down(10, 600, 3),
        clock_skew(10, 4, 77),
        Event::HealNetwork { start_time: 500 },
        Event::HealPower { start_time: 500 },
        Event::HealTimer { start_time: 500 },
    ];
    world.execute_step(batch).unwrap();

    assert_eq!(world.network(), &pristine);
    assert!(world.power().down_ids().is_empty());
    for id in 0..5 {
        assert_eq!(world.timers().offset(NodeId(id)), 0);
    }
}

#[test]
pub fn trace_ticks_are_monotonic() {
    let mut world = world();
    world.execute_step(Vec::new()).unwrap();

    let trace = world.trace();
    assert!(!trace.is_empty());
    for pair in trace.windows(2) {
        assert!(pair[0].at() <= pair[1].at());
    }
}

#[test]
pub fn events_serialize_with_their_tag() {
    let event = send_drop(5, 10, 0, &[1]);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event_type"], "SendDrop");
    assert_eq!(value["start_time"], 5);
    assert_eq!(value["event_length"], 10);
    assert_eq!(value["from"], 0);

    let value = serde_json::to_value(&clock_skew(9, 2, -40)).unwrap();
    assert_eq!(value["event_type"], "ClockSkew");
    assert_eq!(value["skew_amount"], -40);
}

#[test]
pub fn file_interface_is_synchronous_and_ideal() {
    let mut world = world();
    world.write_file(NodeId(0), "term", bytes::Bytes::from_static(b"0"));
    // reading back invokes the node's completion hook; nothing persists in this core
    world.read_file(NodeId(0), "term");
    world.read_file(NodeId(0), "missing");
    world.execute_step(Vec::new()).unwrap();
}

#[test]
#[should_panic(expected = "send to itself")]
pub fn sending_to_self_is_forbidden() {
    let mut world = world();
    world.send_to(
        NodeId(0),
        NodeId(0),
        Message {
            term: TermId(0),
            rpc: Rpc::AppendResponse(AppendResponse::default()),
        },
    );
}
