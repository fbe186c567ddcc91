/**
 * Entry point: loads configuration, builds a `LocalBroker`, and spawns the
 * Scheduler, one Car Controller per car, and one Floor Agent per floor as
 * threads in a single process. A real deployment would swap `LocalBroker`
 * for an MQTT-backed `Broker` impl and run each component as its own
 * process; the threading here exists so the whole fleet can be exercised
 * end to end without an external broker.
 */
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use elevator_core::broker::{LocalBroker, SharedBroker};
use elevator_core::config::{load_config, Cli};
use elevator_core::{car, floor, scheduler};

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    let config = elevator_core::unwrap_or_exit!(load_config(&cli));
    log::info!(
        "starting fleet: {} cars, {} floors, {:?} scheduling",
        config.fleet.n_cars,
        config.fleet.n_floors,
        config.scheduler.mode
    );

    let broker: SharedBroker = Arc::new(LocalBroker::new());

    let mut handles = Vec::new();

    {
        let broker = Arc::clone(&broker);
        let config = config.clone();
        handles.push(thread::spawn(move || scheduler::run(broker, config)));
    }

    for car_id in 0..config.fleet.n_cars {
        let broker = Arc::clone(&broker);
        let car_config = config.car.clone();
        handles.push(thread::spawn(move || car::run(car_id, broker, car_config)));
    }

    for floor_id in 0..config.fleet.n_floors {
        let broker = Arc::clone(&broker);
        let tick = Duration::from_millis(config.car.tick_time_ms);
        handles.push(thread::spawn(move || floor::run(floor_id, broker, tick)));
    }

    for handle in handles {
        let _ = handle.join();
    }
}
