/**
 * A reusable passenger-arrival schedule: the in-core analogue of the
 * out-of-scope feeder's scenario file
 * (`original_source/input-feeder/input_feeder.py`), kept here as test
 * tooling so integration tests can drive a fleet deterministically without
 * hand-writing passenger lists.
 */
use serde::{Deserialize, Serialize};

/**
 * One scheduled passenger arrival: spawn at `start` heading to
 * `destination`, `delay_ms` after the scenario begins.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub delay_ms: u64,
    pub start: u8,
    pub destination: u8,
}

/**
 * A named, time-ordered passenger-arrival schedule.
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub entries: Vec<ScenarioEntry>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Scenario {
        Scenario {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, delay_ms: u64, start: u8, destination: u8) -> &mut Scenario {
        self.entries.push(ScenarioEntry {
            delay_ms,
            start,
            destination,
        });
        self
    }

    /**
     * Returns the entries in non-decreasing delay order, the order a
     * feeder thread would fire them in.
     */
    pub fn ordered(&self) -> Vec<ScenarioEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.delay_ms);
        entries
    }

    /**
     * The total number of arrivals expected at each destination floor,
     * matching the shape the (out-of-scope) feeder publishes to
     * `simulation/passengers/expected`.
     */
    pub fn expected_by_destination(&self) -> std::collections::BTreeMap<u8, u32> {
        let mut counts = std::collections::BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.destination).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_sorts_entries_by_delay() {
        let mut scenario = Scenario::new("basic");
        scenario.push(500, 2, 4).push(0, 0, 5).push(200, 1, 3);

        let ordered = scenario.ordered();
        let delays: Vec<u64> = ordered.iter().map(|e| e.delay_ms).collect();
        assert_eq!(delays, vec![0, 200, 500]);
    }

    #[test]
    fn expected_by_destination_counts_arrivals_per_floor() {
        let mut scenario = Scenario::new("busy-floor");
        scenario.push(0, 0, 5).push(10, 1, 5).push(20, 2, 3);

        let expected = scenario.expected_by_destination();
        assert_eq!(expected.get(&5), Some(&2));
        assert_eq!(expected.get(&3), Some(&1));
    }
}
