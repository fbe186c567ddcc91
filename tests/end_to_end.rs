/**
 * Integration test implementing spec.md §8 scenario 1: a single passenger,
 * a single car, ten floors, exercised end to end over `LocalBroker`.
 */
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use elevator_core::broker::{Broker, LocalBroker, Qos, SharedBroker};
use elevator_core::config::{CarConfig, Config, FleetConfig, SchedulerConfig, SchedulerMode};
use elevator_core::shared::{Passenger, PassengerWaitingRequest};
use elevator_core::{car, floor, scheduler};

fn test_config() -> Config {
    Config {
        fleet: FleetConfig {
            n_floors: 10,
            n_cars: 1,
        },
        scheduler: SchedulerConfig {
            mode: SchedulerMode::Smart,
            smart_threshold: 10,
        },
        car: CarConfig {
            max_capacity: 5,
            door_open_time_ms: 20,
            tick_time_ms: 20,
            heartbeat_period_ms: 500,
        },
    }
}

#[test]
fn single_passenger_single_car_is_delivered_end_to_end() {
    let broker: SharedBroker = Arc::new(LocalBroker::new());
    let config = test_config();

    let record_sub = broker.subscribe("record/floor/5/passenger_arrived");

    {
        let broker = Arc::clone(&broker);
        let config = config.clone();
        thread::spawn(move || scheduler::run(broker, config));
    }
    {
        let broker = Arc::clone(&broker);
        thread::spawn(move || car::run(0, broker, config.car.clone()));
    }
    for floor_id in 0..config.fleet.n_floors {
        let broker = Arc::clone(&broker);
        let tick = Duration::from_millis(config.car.tick_time_ms);
        thread::spawn(move || floor::run(floor_id, broker, tick));
    }

    // Let every subscription register before the scenario fires.
    thread::sleep(Duration::from_millis(50));

    let request = PassengerWaitingRequest {
        start: 0,
        destination: 5,
    };
    broker.publish(
        "simulation/floor/0/passenger_waiting",
        &serde_json::to_vec(&request).unwrap(),
        Qos::AtLeastOnce,
    );

    let msg = record_sub
        .receiver()
        .recv_timeout(Duration::from_secs(5))
        .expect("passenger should be recorded as arrived at floor 5");

    let arrived: Vec<Passenger> = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(arrived.len(), 1);
    let p = &arrived[0];
    assert_eq!(p.start_floor, 0);
    assert_eq!(p.end_floor, 5);
    assert!(p.enter_elevator_timestamp.is_some());
    assert!(p.leave_elevator_timestamp.is_some());
    assert!(p.end_timestamp.is_some());
    assert!(p.start_timestamp <= p.enter_elevator_timestamp.unwrap());
    assert!(p.enter_elevator_timestamp.unwrap() <= p.leave_elevator_timestamp.unwrap());
    assert!(p.leave_elevator_timestamp.unwrap() <= p.end_timestamp.unwrap());
}
