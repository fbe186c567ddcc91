/**
 * Pure call-assignment logic: source-floor selection (dumb/smart mode),
 * car selection, SCAN queue ordering, and selected-floor merging.
 *
 * Kept free of broker/thread concerns so the literal scenarios in spec.md
 * §8 can be asserted directly against plain data.
 */
use std::collections::{HashSet, VecDeque};

use crate::config::SchedulerMode;
use crate::shared::Direction;

/***************************************/
/*       Public data structures        */
/***************************************/

/**
 * The scheduler's view of one car's relevant state.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct CarInfo {
    pub id: u8,
    pub floor: u8,
    pub direction: Direction,
    pub actual_capacity: u8,
    pub max_capacity: u8,
    pub queue: VecDeque<u8>,
}

impl CarInfo {
    pub fn new(id: u8, max_capacity: u8) -> CarInfo {
        CarInfo {
            id,
            floor: 0,
            direction: Direction::Idle,
            actual_capacity: 0,
            max_capacity,
            queue: VecDeque::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.actual_capacity >= self.max_capacity
    }
}

/**
 * The scheduler's view of one floor's hall-call state.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorInfo {
    pub id: u8,
    pub waiting_count: u32,
    pub up_pressed: bool,
    pub down_pressed: bool,
}

impl FloorInfo {
    pub fn new(id: u8) -> FloorInfo {
        FloorInfo {
            id,
            ..Default::default()
        }
    }

    pub fn button_pressed(&self) -> bool {
        self.up_pressed || self.down_pressed
    }
}

/***************************************/
/*             Public API              */
/***************************************/

/**
 * SCAN-orders `targets` given the car's `current` floor and `direction`:
 * visit everything in the current direction first, then reverse.
 */
pub fn sort_scan(current: u8, direction: Direction, targets: &VecDeque<u8>) -> VecDeque<u8> {
    let mut upper: Vec<u8> = targets.iter().copied().filter(|&f| f > current).collect();
    upper.sort_unstable();

    let mut lower: Vec<u8> = targets.iter().copied().filter(|&f| f < current).collect();
    lower.sort_unstable_by(|a, b| b.cmp(a));

    if lower.is_empty() {
        return upper.into();
    }
    if upper.is_empty() {
        return lower.into();
    }

    match direction {
        // An idle car has no established direction of travel; treat it as
        // UP for ordering purposes, matching the source's own fallback.
        Direction::Up | Direction::Idle => {
            upper.extend(lower);
            upper.into()
        }
        Direction::Down => {
            lower.extend(upper);
            lower.into()
        }
    }
}

/**
 * Floors already queued by some car (used to exclude them from hall-call
 * selection, except where smart mode lets a busy floor be double-served).
 */
pub fn queued_floors(cars: &[CarInfo]) -> HashSet<u8> {
    cars.iter().flat_map(|c| c.queue.iter().copied()).collect()
}

fn pick_max_waiting(candidates: Vec<&FloorInfo>) -> Option<u8> {
    candidates
        .into_iter()
        .max_by(|a, b| {
            a.waiting_count
                .cmp(&b.waiting_count)
                .then(b.id.cmp(&a.id)) // smaller id wins ties
        })
        .map(|f| f.id)
}

/**
 * Dumb-mode source-floor choice: the pressed, not-yet-queued floor with the
 * greatest waiting count (ties to the smaller floor id).
 */
pub fn choose_source_floor_dumb(floors: &[FloorInfo], queued: &HashSet<u8>) -> Option<u8> {
    let candidates = floors
        .iter()
        .filter(|f| f.button_pressed() && !queued.contains(&f.id))
        .collect();
    pick_max_waiting(candidates)
}

/**
 * Smart-mode source-floor choice: like dumb mode, but an already-queued
 * floor remains eligible once its waiting count exceeds `threshold`,
 * letting a second car assist a busy floor.
 */
pub fn choose_source_floor_smart(
    floors: &[FloorInfo],
    queued: &HashSet<u8>,
    threshold: u32,
) -> Option<u8> {
    let candidates = floors
        .iter()
        .filter(|f| {
            f.button_pressed() && (!queued.contains(&f.id) || f.waiting_count > threshold)
        })
        .collect();
    pick_max_waiting(candidates)
}

pub fn choose_source_floor(
    mode: SchedulerMode,
    floors: &[FloorInfo],
    queued: &HashSet<u8>,
    smart_threshold: u32,
) -> Option<u8> {
    match mode {
        SchedulerMode::Dumb => choose_source_floor_dumb(floors, queued),
        SchedulerMode::Smart => choose_source_floor_smart(floors, queued, smart_threshold),
    }
}

/**
 * Car-selection priority: first idle-queue car, else first empty car
 * (queue cleared as a side effect of selection), else nearest car by
 * `|floor - source_floor|` with ties to the smaller car id. Cars must be
 * passed in ascending id order for tie-breaks to hold.
 */
pub fn select_car(cars: &mut [CarInfo], source_floor: u8) -> Option<usize> {
    if let Some(i) = cars.iter().position(|c| c.queue.is_empty()) {
        return Some(i);
    }
    if let Some(i) = cars.iter().position(|c| c.actual_capacity == 0) {
        cars[i].queue.clear();
        return Some(i);
    }
    cars.iter()
        .enumerate()
        .min_by_key(|(_, c)| ((c.floor as i32 - source_floor as i32).abs(), c.id))
        .map(|(i, _)| i)
}

/**
 * Appends `source_floor` to the car's queue if eligible: not already
 * queued, the car isn't already there, and the car has spare capacity.
 * Returns whether the append happened.
 */
pub fn append_call_if_eligible(car: &mut CarInfo, source_floor: u8) -> bool {
    if car.queue.contains(&source_floor) || car.floor == source_floor || car.is_full() {
        return false;
    }
    car.queue.push_back(source_floor);
    true
}

/**
 * Merges a car's newly-published selected (destination) floors into its
 * queue: appended while the car has spare capacity, otherwise the queue is
 * replaced outright (onboard riders must be served before new hall calls).
 */
pub fn merge_selected_floors(car: &mut CarInfo, selected: &[u8]) {
    if car.actual_capacity < car.max_capacity {
        for &f in selected {
            if !car.queue.contains(&f) {
                car.queue.push_back(f);
            }
        }
    } else {
        car.queue = selected.iter().copied().collect();
    }
}

/**
 * Re-sorts a car's queue in place per SCAN ordering.
 */
pub fn resort_queue(car: &mut CarInfo) {
    car.queue = sort_scan(car.floor, car.direction, &car.queue);
}

/**
 * The arrival handshake: if the car's reported floor matches its queue
 * head, pop the head and return it (the caller clears the matching hall
 * button and wakes the car's dispatcher).
 */
pub fn pop_on_arrival(car: &mut CarInfo) -> Option<u8> {
    if car.queue.front() == Some(&car.floor) {
        car.queue.pop_front()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(id: u8, floor: u8, queue: &[u8]) -> CarInfo {
        CarInfo {
            id,
            floor,
            direction: Direction::Idle,
            actual_capacity: 0,
            max_capacity: 5,
            queue: queue.iter().copied().collect(),
        }
    }

    // Scenario 2: SCAN ordering, direction UP.
    #[test]
    fn scan_ordering_up() {
        let q: VecDeque<u8> = vec![8, 1, 6, 7, 2, 3].into_iter().collect();
        let sorted = sort_scan(5, Direction::Up, &q);
        assert_eq!(sorted, VecDeque::from(vec![6, 7, 8, 3, 2, 1]));
    }

    // Scenario 3: SCAN ordering, direction DOWN.
    #[test]
    fn scan_ordering_down() {
        let q: VecDeque<u8> = vec![8, 1, 6, 7, 2, 3].into_iter().collect();
        let sorted = sort_scan(5, Direction::Down, &q);
        assert_eq!(sorted, VecDeque::from(vec![3, 2, 1, 6, 7, 8]));
    }

    #[test]
    fn scan_sort_is_idempotent() {
        let q: VecDeque<u8> = vec![8, 1, 6, 7, 2, 3].into_iter().collect();
        let sorted_once = sort_scan(5, Direction::Up, &q);
        let sorted_twice = sort_scan(5, Direction::Up, &sorted_once);
        assert_eq!(sorted_once, sorted_twice);
    }

    #[test]
    fn scan_all_upper_or_all_lower() {
        let upper_only: VecDeque<u8> = vec![6, 7, 8].into_iter().collect();
        assert_eq!(
            sort_scan(5, Direction::Down, &upper_only),
            VecDeque::from(vec![6, 7, 8])
        );

        let lower_only: VecDeque<u8> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(
            sort_scan(5, Direction::Up, &lower_only),
            VecDeque::from(vec![3, 2, 1])
        );
    }

    // Scenario 4: full car must not be assigned a new hall call.
    #[test]
    fn full_car_is_skipped_for_new_hall_call() {
        let mut full = car(0, 0, &[9]);
        full.actual_capacity = 2;
        full.max_capacity = 2;
        let mut idle = car(1, 9, &[]);

        let mut cars = vec![full.clone(), idle.clone()];
        let chosen = select_car(&mut cars, 3).unwrap();
        assert_eq!(cars[chosen].id, 1);

        // Even if somehow selected, the full car must refuse the append.
        assert!(!append_call_if_eligible(&mut full, 3));
        assert!(append_call_if_eligible(&mut idle, 3));
    }

    // Scenario 5: dumb vs smart mode with a busy already-queued floor.
    #[test]
    fn dumb_mode_does_not_reassign_busy_queued_floor() {
        let mut floors = vec![FloorInfo::new(0), FloorInfo::new(4)];
        floors[1].waiting_count = 15;
        floors[1].up_pressed = true;

        let queued: HashSet<u8> = [4].into_iter().collect();
        assert_eq!(choose_source_floor_dumb(&floors, &queued), None);
    }

    #[test]
    fn smart_mode_permits_second_car_above_threshold() {
        let mut floors = vec![FloorInfo::new(0), FloorInfo::new(4)];
        floors[1].waiting_count = 15;
        floors[1].up_pressed = true;

        let queued: HashSet<u8> = [4].into_iter().collect();
        assert_eq!(choose_source_floor_smart(&floors, &queued, 10), Some(4));
    }

    #[test]
    fn smart_mode_below_threshold_behaves_like_dumb() {
        let mut floors = vec![FloorInfo::new(4)];
        floors[0].waiting_count = 5;
        floors[0].up_pressed = true;

        let queued: HashSet<u8> = [4].into_iter().collect();
        assert_eq!(choose_source_floor_smart(&floors, &queued, 10), None);
    }

    #[test]
    fn dumb_mode_ties_broken_by_smaller_floor_id() {
        let mut floors = vec![FloorInfo::new(2), FloorInfo::new(5)];
        floors[0].waiting_count = 4;
        floors[0].up_pressed = true;
        floors[1].waiting_count = 4;
        floors[1].up_pressed = true;

        let queued = HashSet::new();
        assert_eq!(choose_source_floor_dumb(&floors, &queued), Some(2));
    }

    // Scenario 6: arrival pops queue head.
    #[test]
    fn arrival_pops_queue_head() {
        let mut c = car(0, 3, &[3, 7]);
        let popped = pop_on_arrival(&mut c);
        assert_eq!(popped, Some(3));
        assert_eq!(c.queue, VecDeque::from(vec![7]));
    }

    #[test]
    fn arrival_does_not_pop_when_floor_is_not_head() {
        let mut c = car(0, 5, &[3, 7]);
        assert_eq!(pop_on_arrival(&mut c), None);
        assert_eq!(c.queue, VecDeque::from(vec![3, 7]));
    }

    #[test]
    fn select_car_prefers_idle_queue_first() {
        let busy = car(0, 0, &[5]);
        let idle = car(1, 2, &[]);
        let mut cars = vec![busy, idle];
        let chosen = select_car(&mut cars, 3).unwrap();
        assert_eq!(cars[chosen].id, 1);
    }

    #[test]
    fn select_car_falls_back_to_empty_capacity_car_and_clears_its_queue() {
        let mut busy_full = car(0, 0, &[5]);
        busy_full.actual_capacity = 2;
        busy_full.max_capacity = 2;

        let mut empty_but_queued = car(1, 1, &[9]);
        empty_but_queued.actual_capacity = 0;

        let mut cars = vec![busy_full, empty_but_queued];
        let chosen = select_car(&mut cars, 3).unwrap();
        assert_eq!(cars[chosen].id, 1);
        assert!(cars[chosen].queue.is_empty());
    }

    #[test]
    fn select_car_falls_back_to_nearest_with_id_tiebreak() {
        let mut a = car(0, 0, &[1]);
        a.actual_capacity = 1;
        let mut b = car(1, 10, &[1]);
        b.actual_capacity = 1;
        let mut c = car(2, 5, &[1]);
        c.actual_capacity = 1;

        let mut cars = vec![a, b, c];
        // source floor 5: car 2 is at distance 0, wins outright.
        let chosen = select_car(&mut cars, 5).unwrap();
        assert_eq!(cars[chosen].id, 2);
    }

    #[test]
    fn merge_appends_when_spare_capacity() {
        let mut c = car(0, 0, &[3]);
        c.actual_capacity = 1;
        c.max_capacity = 5;
        merge_selected_floors(&mut c, &[3, 7]);
        assert_eq!(c.queue, VecDeque::from(vec![3, 7]));
    }

    #[test]
    fn merge_replaces_queue_when_full() {
        let mut c = car(0, 0, &[3]);
        c.actual_capacity = 5;
        c.max_capacity = 5;
        merge_selected_floors(&mut c, &[7, 9]);
        assert_eq!(c.queue, VecDeque::from(vec![7, 9]));
    }

    #[test]
    fn queued_floors_combines_all_cars() {
        let cars = vec![car(0, 0, &[1, 2]), car(1, 0, &[3])];
        let set = queued_floors(&cars);
        assert_eq!(set, [1, 2, 3].into_iter().collect());
    }
}
