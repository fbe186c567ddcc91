/***************************************/
/*        3rd party libraries          */
/***************************************/
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/***************************************/
/*       Public data structures        */
/***************************************/

/**
 * A car's direction of travel. Published nowhere on the wire directly, but
 * drives SCAN queue ordering (scheduler) and the car's own FSM transitions.
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Idle,
}

/**
 * Car door state. Wire representation is the bare string `"open"`/`"closed"`
 * (topic `elevator/{id}/door`).
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Door {
    Open,
    Closed,
}

/**
 * Car connectivity, last-will driven. Wire representation is the bare
 * string `"online"`/`"offline"` (topic `elevator/{id}/status`).
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Online,
    Offline,
}

/**
 * Payload for topic `elevator/{id}/capacity`.
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max: u8,
    pub actual: u8,
}

/**
 * A passenger as it travels through the system. Lifecycle timestamps are
 * set in order as the passenger is created, boards, is dropped off, and is
 * observed arrived by its destination floor; all four must be monotonic
 * non-decreasing per passenger.
 */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Passenger {
    pub start_floor: u8,
    pub end_floor: u8,
    pub start_timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enter_elevator_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub leave_elevator_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_timestamp: Option<DateTime<Utc>>,
}

impl Passenger {
    pub fn new(start_floor: u8, end_floor: u8) -> Passenger {
        Passenger {
            start_floor,
            end_floor,
            start_timestamp: Utc::now(),
            enter_elevator_timestamp: None,
            leave_elevator_timestamp: None,
            end_timestamp: None,
        }
    }

    pub fn log_enter_elevator(&mut self) {
        self.enter_elevator_timestamp = Some(Utc::now());
    }

    pub fn log_leave_elevator(&mut self) {
        self.leave_elevator_timestamp = Some(Utc::now());
    }

    pub fn log_end(&mut self) {
        self.end_timestamp = Some(Utc::now());
    }
}

/**
 * A passenger-waiting spawn request as published by the (out-of-scope)
 * passenger feeder on `simulation/floor/{id}/passenger_waiting`.
 */
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassengerWaitingRequest {
    pub start: u8,
    pub destination: u8,
}
