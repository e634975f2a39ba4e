use std::collections::BTreeSet;

use proptest::prelude::*;

use common::*;
use raftsim::event::Event;
use raftsim::message::NodeId;
use raftsim::strategy::{event_batch, network_event, BatchParams};
use raftsim::world::Settings;

mod common;

const SETTINGS: Settings = Settings {
    catastrophy_level: 6,
    ms_per_step: 300,
    max_ms_per_event: 200,
    message_send_delay: 6,
    cluster_size: 5,
};

/// The batch descriptor the world will expose at the start of step `step`: the clock advances by
/// `ms_per_step + 1` ticks per step (the tick loop is inclusive).
fn step_params(step: u64) -> BatchParams {
    BatchParams {
        now: step * (SETTINGS.ms_per_step + 1),
        ms_per_step: SETTINGS.ms_per_step,
        max_ms_per_event: SETTINGS.max_ms_per_event,
        catastrophy_level: SETTINGS.catastrophy_level,
        cluster_size: SETTINGS.cluster_size,
    }
}

fn three_steps() -> impl Strategy<Value = (Vec<Event>, Vec<Event>, Vec<Event>)> {
    (
        event_batch(step_params(0)),
        event_batch(step_params(1)),
        event_batch(step_params(2)),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn leader_uniqueness_survives_adversity(batches in three_steps()) {
        let mut world = world_with(SETTINGS);
        let (first, second, third) = batches;

        for (step, batch) in vec![first, second, third].into_iter().enumerate() {
            TestLogger::set_step(Some(step as u32));
            prop_assert!(world.execute_step(batch).is_ok());

            // the registries partition the cluster at every step boundary
            let up: BTreeSet<NodeId> = world.power().up_ids().into_iter().collect();
            let down: BTreeSet<NodeId> = world.power().down_ids().into_iter().collect();
            prop_assert!(up.is_disjoint(&down));
            prop_assert_eq!(up.union(&down).count(), SETTINGS.cluster_size);
        }
        TestLogger::set_step(None);
    }

    #[test]
    fn network_windows_back_out_cleanly(event in network_event(BatchParams {
        now: 0,
        ms_per_step: 300,
        max_ms_per_event: 200,
        catastrophy_level: 1,
        cluster_size: 5,
    })) {
        // one step is long enough for any generated window to open and close
        let mut world = world();
        let pristine = world.network().clone();

        prop_assert!(world.execute_step(vec![event]).is_ok());
        prop_assert_eq!(world.network(), &pristine);
    }
}
