/**
 * Per-floor waiting list, call buttons, and admission/arrival handling.
 * `FloorAgent` is the pure, broker-free core; `run()` wires it to the
 * broker's car-observation and spawn/arrival topics.
 */
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as cbc;

use crate::broker::{topic_segment, Message, Qos, SharedBroker};
use crate::shared::{Capacity, Door, Passenger, PassengerWaitingRequest};

/***************************************/
/*       Public data structures        */
/***************************************/

pub struct FloorAgent {
    pub id: u8,
    pub waiting: VecDeque<Passenger>,
    pub up_pressed: bool,
    pub down_pressed: bool,
    pub arrived: Vec<Passenger>,
}

impl FloorAgent {
    pub fn new(id: u8) -> FloorAgent {
        FloorAgent {
            id,
            waiting: VecDeque::new(),
            up_pressed: false,
            down_pressed: false,
            arrived: Vec::new(),
        }
    }

    pub fn waiting_count(&self) -> u32 {
        self.waiting.len() as u32
    }

    /**
     * A new passenger starts waiting at this floor.
     */
    pub fn spawn(&mut self, destination: u8) {
        self.waiting.push_back(Passenger::new(self.id, destination));
        self.recompute_buttons();
    }

    /**
     * Admission: a car's door opened at this floor with `free` spare seats.
     * Admits tail-first (LIFO) per the documented boarding-order choice,
     * stamping `enter_elevator_timestamp`. Returns the admitted batch for
     * the caller to publish to the car.
     */
    pub fn admit(&mut self, free: u8) -> Vec<Passenger> {
        let n = free.min(self.waiting.len() as u8);
        let mut admitted = Vec::with_capacity(n as usize);
        for _ in 0..n {
            if let Some(mut p) = self.waiting.pop_back() {
                p.log_enter_elevator();
                admitted.push(p);
            }
        }
        if !admitted.is_empty() {
            self.recompute_buttons();
        }
        admitted
    }

    fn recompute_buttons(&mut self) {
        self.up_pressed = self.waiting.iter().any(|p| p.end_floor > self.id);
        self.down_pressed = self.waiting.iter().any(|p| p.end_floor < self.id);
    }

    /**
     * Arrival handling: a car delivered passengers to this floor. Stamps
     * `end_timestamp`, appends to the arrived log, and returns the batch
     * for the caller to publish to the recorder.
     */
    pub fn receive_arrivals(&mut self, mut arrived: Vec<Passenger>) -> Vec<Passenger> {
        for p in &mut arrived {
            p.log_end();
        }
        self.arrived.extend(arrived.iter().cloned());
        arrived
    }

    pub fn reset(&mut self) {
        self.waiting.clear();
        self.arrived.clear();
        self.up_pressed = false;
        self.down_pressed = false;
    }
}

/**
 * What this floor currently knows about one car, accumulated from its
 * last-value-wins subscriptions. Used only to decide when to admit.
 */
#[derive(Default, Clone, Copy)]
struct CarView {
    floor: Option<u8>,
    door: Option<Door>,
    capacity: Option<Capacity>,
}

impl CarView {
    fn free_capacity(&self) -> Option<u8> {
        self.capacity.map(|c| c.max.saturating_sub(c.actual))
    }

    fn door_open_here(&self, floor_id: u8) -> bool {
        self.door == Some(Door::Open) && self.floor == Some(floor_id)
    }
}

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

fn id_from(topic: &str, segment: usize) -> Option<u8> {
    topic_segment(topic, segment).and_then(|s| s.parse().ok())
}

fn publish_buttons(broker: &SharedBroker, floor: &FloorAgent) {
    broker.publish(
        &format!("floor/{}/button_pressed/up", floor.id),
        &serde_json::to_vec(&floor.up_pressed).unwrap(),
        Qos::AtLeastOnce,
    );
    broker.publish(
        &format!("floor/{}/button_pressed/down", floor.id),
        &serde_json::to_vec(&floor.down_pressed).unwrap(),
        Qos::AtLeastOnce,
    );
}

fn publish_waiting_count(broker: &SharedBroker, floor: &FloorAgent) {
    broker.publish(
        &format!("floor/{}/waiting_count", floor.id),
        &serde_json::to_vec(&floor.waiting_count()).unwrap(),
        Qos::AtMostOnce,
    );
}

/**
 * Checks whether `car_id`'s door is open at this floor with spare seats,
 * and if so admits and publishes the boarding batch to that car.
 */
fn maybe_admit(broker: &SharedBroker, floor: &mut FloorAgent, car_id: u8, view: &CarView) {
    if !view.door_open_here(floor.id) {
        return;
    }
    let Some(free) = view.free_capacity() else {
        return;
    };
    if free == 0 || floor.waiting.is_empty() {
        return;
    }
    let admitted = floor.admit(free);
    if admitted.is_empty() {
        return;
    }
    broker.publish(
        &format!("simulation/elevator/{car_id}/passenger"),
        &serde_json::to_vec(&admitted).unwrap(),
        Qos::AtLeastOnce,
    );
    publish_buttons(broker, floor);
}

/**
 * Runs one floor's threads and blocks forever. Intended as the body of its
 * own `thread::spawn` closure from `main`.
 */
pub fn run(id: u8, broker: SharedBroker, tick: Duration) {
    let floor = Arc::new(Mutex::new(FloorAgent::new(id)));

    let tick_handle = {
        let floor = Arc::clone(&floor);
        let broker = Arc::clone(&broker);
        thread::spawn(move || loop {
            thread::sleep(tick);
            let floor = floor.lock().unwrap();
            publish_waiting_count(&broker, &floor);
        })
    };

    callback_loop(id, broker, floor);

    let _ = tick_handle.join();
}

fn callback_loop(id: u8, broker: SharedBroker, floor: Arc<Mutex<FloorAgent>>) {
    let door_sub = broker.subscribe("elevator/+/door");
    let actual_floor_sub = broker.subscribe("elevator/+/actual_floor");
    let capacity_sub = broker.subscribe("elevator/+/capacity");
    let waiting_sub = broker.subscribe(&format!("simulation/floor/{id}/passenger_waiting"));
    let arrived_sub = broker.subscribe(&format!("simulation/floor/{id}/passenger_arrived"));
    let reset_sub = broker.subscribe("simulation/reset");

    let door_rx = door_sub.receiver();
    let actual_floor_rx = actual_floor_sub.receiver();
    let capacity_rx = capacity_sub.receiver();
    let waiting_rx = waiting_sub.receiver();
    let arrived_rx = arrived_sub.receiver();
    let reset_rx = reset_sub.receiver();

    let mut cars: HashMap<u8, CarView> = HashMap::new();

    loop {
        cbc::select! {
            recv(door_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(car_id) = id_from(&msg.topic, 1) else { continue };
                let Some(door) = decode::<Door>(&msg) else { continue };
                let view = cars.entry(car_id).or_default();
                view.door = Some(door);
                let view = *view;
                let mut floor = floor.lock().unwrap();
                maybe_admit(&broker, &mut floor, car_id, &view);
            }
            recv(actual_floor_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(car_id) = id_from(&msg.topic, 1) else { continue };
                let Some(car_floor) = decode::<u8>(&msg) else { continue };
                let view = cars.entry(car_id).or_default();
                view.floor = Some(car_floor);
                let view = *view;
                let mut floor = floor.lock().unwrap();
                maybe_admit(&broker, &mut floor, car_id, &view);
            }
            recv(capacity_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(car_id) = id_from(&msg.topic, 1) else { continue };
                let Some(capacity) = decode::<Capacity>(&msg) else { continue };
                let view = cars.entry(car_id).or_default();
                view.capacity = Some(capacity);
                let view = *view;
                let mut floor = floor.lock().unwrap();
                maybe_admit(&broker, &mut floor, car_id, &view);
            }
            recv(waiting_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(req) = decode::<PassengerWaitingRequest>(&msg) else { continue };
                let mut floor = floor.lock().unwrap();
                floor.spawn(req.destination);
                publish_buttons(&broker, &floor);
                publish_waiting_count(&broker, &floor);
            }
            recv(arrived_rx) -> msg => {
                let Ok(msg) = msg else { break };
                let Some(arrived) = decode::<Vec<Passenger>>(&msg) else { continue };
                let mut floor = floor.lock().unwrap();
                let recorded = floor.receive_arrivals(arrived);
                broker.publish(
                    &format!("record/floor/{id}/passenger_arrived"),
                    &serde_json::to_vec(&recorded).unwrap(),
                    Qos::AtLeastOnce,
                );
                broker.publish(
                    &format!("simulation/floor/{id}/arrived_count"),
                    &serde_json::to_vec(&(floor.arrived.len() as u32)).unwrap(),
                    Qos::AtMostOnce,
                );
            }
            recv(reset_rx) -> msg => {
                if msg.is_err() { break }
                let mut floor = floor.lock().unwrap();
                floor.reset();
                cars.clear();
            }
        }
    }
}
