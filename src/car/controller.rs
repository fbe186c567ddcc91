/**
 * Wires a `CarFsm` to the broker: a motion thread driving ticks, a periodic
 * publishing thread, a heartbeat thread, a settle-delay thread, and a
 * broker-callback thread ingesting `next_floor`, boarding batches, and
 * resets. Mirrors the teacher's per-task-per-thread layout (`fsm.rs`'s
 * `run()` plus the coordinator's separate publishing cadence).
 */
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as cbc;

use crate::broker::{Message, Qos, SharedBroker};
use crate::config::CarConfig;
use crate::shared::{Capacity, CarStatus, Door, Passenger};

use super::fsm::{CarFsm, State};

fn decode<T: serde::de::DeserializeOwned>(msg: &Message) -> Option<T> {
    match serde_json::from_slice(&msg.payload) {
        Ok(v) => Some(v),
        Err(source) => {
            let err = crate::error::CoreError::MalformedPayload {
                topic: msg.topic.clone(),
                source,
            };
            log::warn!("{err}");
            None
        }
    }
}

fn publish_capacity(broker: &SharedBroker, id: u8, car: &CarFsm) {
    let capacity = Capacity {
        max: car.max_capacity,
        actual: car.actual_capacity(),
    };
    broker.publish(
        &format!("elevator/{id}/capacity"),
        &serde_json::to_vec(&capacity).unwrap(),
        Qos::AtMostOnce,
    );
}

fn publish_door(broker: &SharedBroker, id: u8, door: Door) {
    broker.publish(
        &format!("elevator/{id}/door"),
        &serde_json::to_vec(&door).unwrap(),
        Qos::AtMostOnce,
    );
}

fn publish_actual_floor(broker: &SharedBroker, id: u8, floor: u8) {
    broker.publish(
        &format!("elevator/{id}/actual_floor"),
        &serde_json::to_vec(&floor).unwrap(),
        Qos::AtLeastOnce,
    );
}

fn publish_selected_floors(broker: &SharedBroker, id: u8, car: &CarFsm) {
    broker.publish(
        &format!("elevator/{id}/selected_floors"),
        &serde_json::to_vec(&car.selected_floors()).unwrap(),
        Qos::AtLeastOnce,
    );
}

/**
 * Handles an arrival (whether reached by `tick()` or a noop same-floor
 * target): opens the door, unloads matching passengers, publishes the
 * arrival batch and capacity, and arms the settle timer.
 */
fn handle_arrival(
    broker: &SharedBroker,
    id: u8,
    car: &mut CarFsm,
    settle_tx: &cbc::Sender<()>,
) {
    publish_door(broker, id, Door::Open);
    let arrived_floor = car.floor;
    let left = car.unload();
    if !left.is_empty() {
        broker.publish(
            &format!("simulation/floor/{arrived_floor}/passenger_arrived"),
            &serde_json::to_vec(&left).unwrap(),
            Qos::AtLeastOnce,
        );
    }
    publish_capacity(broker, id, car);
    let _ = settle_tx.try_send(());
}

/**
 * Runs a single car's threads and blocks forever. Intended as the body of
 * its own `thread::spawn` closure from `main`.
 */
pub fn run(id: u8, broker: SharedBroker, config: CarConfig) {
    let car = Arc::new(Mutex::new(CarFsm::new(id, 0, config.max_capacity)));
    let (settle_tx, settle_rx) = cbc::bounded::<()>(1);

    let mut handles = Vec::new();

    {
        let car = Arc::clone(&car);
        let broker = Arc::clone(&broker);
        let tick = Duration::from_millis(config.tick_time_ms);
        let settle_tx = settle_tx.clone();
        handles.push(thread::spawn(move || motion_loop(id, car, broker, tick, settle_tx)));
    }
    {
        let car = Arc::clone(&car);
        let broker = Arc::clone(&broker);
        let tick = Duration::from_millis(config.tick_time_ms);
        handles.push(thread::spawn(move || publishing_loop(id, car, broker, tick)));
    }
    {
        let broker = Arc::clone(&broker);
        let period = Duration::from_millis(config.heartbeat_period_ms);
        handles.push(thread::spawn(move || heartbeat_loop(id, broker, period)));
    }
    {
        let car = Arc::clone(&car);
        let settle_delay = Duration::from_millis(config.door_open_time_ms);
        handles.push(thread::spawn(move || settle_loop(car, settle_rx, settle_delay)));
    }

    callback_loop(id, broker, car, settle_tx);

    for h in handles {
        let _ = h.join();
    }
}

fn motion_loop(
    id: u8,
    car: Arc<Mutex<CarFsm>>,
    broker: SharedBroker,
    tick: Duration,
    settle_tx: cbc::Sender<()>,
) {
    loop {
        thread::sleep(tick);
        let mut car = car.lock().unwrap();
        if car.tick().is_some() && car.state == State::PassengerExit {
            handle_arrival(&broker, id, &mut car, &settle_tx);
        }
    }
}

fn publishing_loop(id: u8, car: Arc<Mutex<CarFsm>>, broker: SharedBroker, tick: Duration) {
    loop {
        thread::sleep(tick);
        let car = car.lock().unwrap();
        publish_actual_floor(&broker, id, car.floor);
        publish_door(&broker, id, car.door);
        publish_capacity(&broker, id, &car);
    }
}

fn heartbeat_loop(id: u8, broker: SharedBroker, period: Duration) {
    loop {
        broker.publish(
            &format!("elevator/{id}/status"),
            &serde_json::to_vec(&CarStatus::Online).unwrap(),
            Qos::AtMostOnce,
        );
        thread::sleep(period);
    }
}

fn settle_loop(car: Arc<Mutex<CarFsm>>, settle_rx: cbc::Receiver<()>, delay: Duration) {
    while settle_rx.recv().is_ok() {
        thread::sleep(delay);
        let mut car = car.lock().unwrap();
        car.settle();
    }
}

fn callback_loop(id: u8, broker: SharedBroker, car: Arc<Mutex<CarFsm>>, settle_tx: cbc::Sender<()>) {
    let next_floor_sub = broker.subscribe(&format!("elevator/{id}/next_floor"));
    let passenger_sub = broker.subscribe(&format!("simulation/elevator/{id}/passenger"));
    let reset_sub = broker.subscribe("simulation/reset");

    let next_floor_rx = next_floor_sub.receiver();
    let passenger_rx = passenger_sub.receiver();
    let reset_rx = reset_sub.receiver();

    loop {
        cbc::select! {
            recv(next_floor_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(next) = decode::<u8>(&msg) else { continue };
                let mut car = car.lock().unwrap();
                car.set_next_floor(next);
                if car.state == State::PassengerExit {
                    handle_arrival(&broker, id, &mut car, &settle_tx);
                }
            }
            recv(passenger_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(mut passengers) = decode::<Vec<Passenger>>(&msg) else { continue };
                let mut car = car.lock().unwrap();
                if car.door != Door::Open {
                    let err = crate::error::CoreError::InconsistentState(format!(
                        "car {id}: boarding batch received with door closed, accepting anyway (floor agent is the admission authority)"
                    ));
                    log::warn!("{err}");
                }
                let room = (car.max_capacity.saturating_sub(car.actual_capacity())) as usize;
                if passengers.len() > room {
                    let rejected = passengers.split_off(room);
                    let err = crate::error::CoreError::OverfullCar {
                        car: id,
                        max: car.max_capacity,
                        attempted: (rejected.len() + passengers.len()) as u8,
                    };
                    log::warn!("{err}");
                }
                car.board(passengers);
                publish_selected_floors(&broker, id, &car);
                publish_capacity(&broker, id, &car);
            }
            recv(reset_rx) -> msg => {
                if msg.is_err() { break }
                log::info!("car {id}: resetting");
                let mut car = car.lock().unwrap();
                car.do_reset();
            }
        }
    }
}
