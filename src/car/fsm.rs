/**
 * The per-car motion state machine. Externally driven: the car never picks
 * its own target, it reacts to `next_floor` published by the scheduler, and
 * the motion/door/unload/boarding mechanics close the loop the scheduler
 * depends on (`actual_floor`, `door`, `selected_floors`).
 */
use std::collections::BTreeSet;

use crate::shared::{Direction, Door, Passenger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    DrivingUp,
    DrivingDown,
    PassengerExit,
    Reset,
}

pub struct CarFsm {
    pub id: u8,
    pub floor: u8,
    pub direction: Direction,
    pub door: Door,
    pub state: State,
    pub max_capacity: u8,
    pub onboard: Vec<Passenger>,
    pub destinations: BTreeSet<u8>,
    next_floor: Option<u8>,
    start_floor: u8,
}

impl CarFsm {
    pub fn new(id: u8, start_floor: u8, max_capacity: u8) -> CarFsm {
        CarFsm {
            id,
            floor: start_floor,
            direction: Direction::Idle,
            door: Door::Closed,
            state: State::Idle,
            max_capacity,
            onboard: Vec::new(),
            destinations: BTreeSet::new(),
            next_floor: None,
            start_floor,
        }
    }

    pub fn actual_capacity(&self) -> u8 {
        self.onboard.len() as u8
    }

    /**
     * The scheduler published a new target for this car. An idle (or just
     * settled) car starts traveling immediately; a car already in motion
     * finishes its current one-floor step and recomputes direction at the
     * next tick (spec.md §4.2: "pre-emptible").
     */
    pub fn set_next_floor(&mut self, next: u8) {
        self.next_floor = Some(next);
        if matches!(self.state, State::Idle | State::PassengerExit) {
            self.begin_travel_or_arrive(next);
        }
    }

    fn begin_travel_or_arrive(&mut self, next: u8) {
        if next == self.floor {
            self.arrive();
        } else if next > self.floor {
            self.direction = Direction::Up;
            self.state = State::DrivingUp;
        } else {
            self.direction = Direction::Down;
            self.state = State::DrivingDown;
        }
    }

    /**
     * Advances the car by one floor, per the one-floor-per-tick motion
     * model. Returns the new floor if the car actually moved.
     */
    pub fn tick(&mut self) -> Option<u8> {
        match self.state {
            State::DrivingUp => {
                self.door = Door::Closed;
                self.floor += 1;
                self.after_step();
                Some(self.floor)
            }
            State::DrivingDown => {
                self.door = Door::Closed;
                self.floor -= 1;
                self.after_step();
                Some(self.floor)
            }
            _ => None,
        }
    }

    fn after_step(&mut self) {
        let Some(next) = self.next_floor else {
            self.state = State::Idle;
            self.direction = Direction::Idle;
            return;
        };
        if self.floor == next {
            self.arrive();
        } else if next > self.floor {
            self.direction = Direction::Up;
            self.state = State::DrivingUp;
        } else {
            self.direction = Direction::Down;
            self.state = State::DrivingDown;
        }
    }

    fn arrive(&mut self) {
        self.state = State::PassengerExit;
        self.door = Door::Open;
    }

    /**
     * Door/unload on arrival: removes onboard passengers whose destination
     * is this floor and stamps their `leave_elevator_timestamp`. The caller
     * publishes the batch to the destination floor's arrival topic and
     * republishes `capacity`.
     */
    pub fn unload(&mut self) -> Vec<Passenger> {
        let floor = self.floor;
        let (mut leaving, staying): (Vec<Passenger>, Vec<Passenger>) =
            self.onboard.drain(..).partition(|p| p.end_floor == floor);
        self.onboard = staying;
        for p in &mut leaving {
            p.log_leave_elevator();
        }
        self.destinations.remove(&floor);
        leaving
    }

    /**
     * Boarding: appends a Floor Agent's admitted batch to `onboard`, stamps
     * `enter_elevator_timestamp`, and folds each destination into the
     * selected-floors set published to the scheduler.
     */
    pub fn board(&mut self, mut passengers: Vec<Passenger>) {
        for p in &mut passengers {
            p.log_enter_elevator();
            self.destinations.insert(p.end_floor);
        }
        self.onboard.extend(passengers);
    }

    pub fn selected_floors(&self) -> Vec<u8> {
        self.destinations.iter().copied().collect()
    }

    /**
     * PASSENGER_EXIT -> IDLE after the settle delay. Called by the
     * controller's own timer, not by `tick()`, since the settle delay is
     * independent of the per-floor tick period.
     */
    pub fn settle(&mut self) {
        self.door = Door::Closed;
        self.state = State::Idle;
    }

    /**
     * Any state -> RESET -> IDLE at the car's start floor. In-flight motion
     * is expected to have already finished its current floor transition;
     * the scheduler's next `next_floor` re-establishes the queue.
     */
    pub fn do_reset(&mut self) {
        self.floor = self.start_floor;
        self.direction = Direction::Idle;
        self.door = Door::Closed;
        self.onboard.clear();
        self.destinations.clear();
        self.next_floor = None;
        self.state = State::Idle;
    }
}
