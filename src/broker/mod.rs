/**
 * The publish/subscribe broker seam.
 *
 * The real message broker (an MQTT-style transport with topic wildcards and
 * per-message quality of service) is an external collaborator and out of
 * scope for this crate. `Broker` is the interface contract the three core
 * components depend on; `LocalBroker` is an in-process implementation of
 * that contract sufficient to run a whole fleet as threads in a single
 * binary, and is the seam a real MQTT client would be plugged in behind.
 */
pub mod local;

use crossbeam_channel as cbc;
use std::sync::Arc;

pub use local::LocalBroker;

/***************************************/
/*             Public API              */
/***************************************/

/**
 * Per-message delivery guarantee, mirroring MQTT's QoS levels. `LocalBroker`
 * delivers every message reliably regardless of the requested level (its
 * transport cannot lose or duplicate messages), so the level is carried for
 * interface fidelity and logged, not enforced.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/**
 * A message delivered to a subscriber, carrying the concrete topic it
 * matched (useful when the subscription pattern contains wildcards, e.g.
 * extracting the car id from `elevator/+/status`).
 */
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait Broker: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos);
    fn subscribe(&self, pattern: &str) -> Subscription;
}

/**
 * A live subscription. Dropping it unregisters the receiver from the
 * broker's dispatch table.
 */
pub struct Subscription {
    rx: cbc::Receiver<Message>,
}

impl Subscription {
    pub fn new(rx: cbc::Receiver<Message>) -> Subscription {
        Subscription { rx }
    }

    pub fn receiver(&self) -> &cbc::Receiver<Message> {
        &self.rx
    }
}

pub type SharedBroker = Arc<dyn Broker>;

/**
 * MQTT-style topic matching: `+` matches exactly one segment, `#` matches
 * the rest of the topic (and must be the final segment of the pattern).
 */
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pat_segments = pattern.split('/');
    let mut topic_segments = topic.split('/');

    loop {
        match (pat_segments.next(), topic_segments.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(p), Some(t)) => {
                if p != t {
                    return false;
                }
            }
            (Some(_), None) => return false,
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}

/**
 * Extracts the `n`th `/`-separated segment of a topic, used to pull ids out
 * of matched wildcard topics (e.g. segment 1 of `elevator/3/status` is `3`).
 */
pub fn topic_segment(topic: &str, n: usize) -> Option<&str> {
    topic.split('/').nth(n)
}
