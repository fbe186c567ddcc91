use super::{topic_matches, Broker, Message, Qos, Subscription};
use crossbeam_channel as cbc;
use std::sync::Mutex;

/***************************************/
/*             Public API              */
/***************************************/

/**
 * An in-process broker over unbounded `crossbeam_channel`s. Every publish
 * fans out synchronously to every subscription whose pattern matches the
 * topic; a subscriber whose receiver has been dropped is pruned lazily on
 * the next publish that would have reached it.
 */
pub struct LocalBroker {
    subscribers: Mutex<Vec<(String, cbc::Sender<Message>)>>,
}

impl LocalBroker {
    pub fn new() -> LocalBroker {
        LocalBroker {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        LocalBroker::new()
    }
}

impl Broker for LocalBroker {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos) {
        log::debug!("publish {topic} ({} bytes, {qos:?})", payload.len());
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|(pattern, tx)| {
            if !topic_matches(pattern, topic) {
                return true;
            }
            let msg = Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            };
            tx.send(msg).is_ok()
        });
    }

    fn subscribe(&self, pattern: &str) -> Subscription {
        let (tx, rx) = cbc::unbounded();
        self.subscribers
            .lock()
            .unwrap()
            .push((pattern.to_string(), tx));
        Subscription::new(rx)
    }
}
