//! CLI driver: explores adversarial schedules and reports the first invariant violation.

use std::process;

use clap::Parser;
use log::info;
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::TestRunner;

use raftsim::error::SimError;
use raftsim::event::Event;
use raftsim::node::NodeConfig;
use raftsim::strategy::{event_batch, BatchParams};
use raftsim::world::{Settings, World};

#[derive(Debug, Parser)]
#[command(
    name = "simulate",
    about = "Searches adversarial schedules of a simulated Raft cluster for leader-election safety violations"
)]
struct Options {
    /// Maximum number of adversarial events to generate per step
    #[arg(short = 'c', long = "catastrophy-level", default_value_t = 0)]
    catastrophy_level: usize,

    /// Number of ms of virtual time to emulate per step
    #[arg(short = 's', long = "ms-per-step", default_value_t = 700)]
    ms_per_step: u64,

    /// Maximum number of ms that a window event can last
    #[arg(short = 'e', long = "max-ms-per-event", default_value_t = 400)]
    max_ms_per_event: u64,

    /// Number of steps to execute per attempt
    #[arg(long = "max-steps", default_value_t = 50)]
    max_steps: u32,

    /// Number of fresh worlds to explore
    #[arg(long = "attempts", default_value_t = 200)]
    attempts: u32,
}

fn main() {
    env_logger::init();
    let options = Options::parse();

    let settings = Settings {
        catastrophy_level: options.catastrophy_level,
        ms_per_step: options.ms_per_step,
        max_ms_per_event: options.max_ms_per_event,
        ..Settings::default()
    };

    let mut runner = TestRunner::deterministic();
    for attempt in 0..options.attempts {
        let mut world = World::new(settings, NodeConfig::default());
        for _ in 0..options.max_steps {
            let batch = sample_batch(&mut runner, world.batch_params());
            if let Err(violation) = world.execute_step(batch) {
                report(&world, &violation);
            }
        }
        if let Err(violation) = world.verify_liveness() {
            report(&world, &violation);
        }
        info!(
            "attempt {} survived {} steps at catastrophy level {}",
            attempt, options.max_steps, options.catastrophy_level
        );
    }

    println!(
        "no invariant violation found in {} attempts",
        options.attempts
    );
}

fn sample_batch(runner: &mut TestRunner, params: BatchParams) -> Vec<Event> {
    match event_batch(params).new_tree(runner) {
        Ok(tree) => tree.current(),
        Err(reason) => {
            eprintln!("failed to generate an event batch: {}", reason);
            process::exit(2);
        }
    }
}

/// Prints the violation and the reproduction trace as JSON lines, then exits non-zero.
fn report(world: &World, violation: &SimError) -> ! {
    eprintln!("invariant violation: {}", violation);
    for record in world.trace() {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(err) => eprintln!("unserializable trace record: {}", err),
        }
    }
    process::exit(1);
}
