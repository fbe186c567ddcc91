pub mod macros;
pub mod structs;

pub use structs::{Capacity, CarStatus, Direction, Door, Passenger, PassengerWaitingRequest};
