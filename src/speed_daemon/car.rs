//! Per-plate observation history and ticket derivation.
//!
//! A car may be seen by any camera on any road, in any order (UDP-style
//! out-of-order delivery isn't in play here since this is TCP, but cameras
//! are independent processes and nothing guarantees their reports arrive in
//! timestamp order). [`PlateHistory`] keeps every observation seen so far
//! for one plate, grouped by road, and computes the fastest pair of
//! observations on a road whenever a new one arrives.

use std::collections::{HashMap, HashSet};

/// A single sighting of a plate by one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub mile: u16,
    pub timestamp: u32,
}

/// A computed average speed between two observations on the same road that
/// exceeds the posted limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCandidate {
    pub road: u16,
    pub mile1: u16,
    pub timestamp1: u32,
    pub mile2: u16,
    pub timestamp2: u32,
    /// Speed in hundredths of a mile per hour, as the wire format requires.
    pub speed_centi_mph: u16,
}

/// A car is considered to have been ticketed on every calendar day (UTC,
/// 86400-second buckets) its offending observation pair spans; at most one
/// ticket is ever issued for a day already covered by a previous ticket,
/// across all roads (the "cumulative ticketed-days" reading of the one
/// ambiguous rule in this protocol — see `DESIGN.md`).
#[derive(Debug, Default)]
pub struct PlateHistory {
    by_road: HashMap<u16, Vec<Observation>>,
    ticketed_days: HashSet<u32>,
}

fn days_covered(timestamp1: u32, timestamp2: u32) -> impl Iterator<Item = u32> {
    (timestamp1 / 86400)..=(timestamp2 / 86400)
}

impl PlateHistory {
    /// Records a new sighting and returns the highest-speed offending pair
    /// it forms with any prior sighting on the same road, if any exceeds the
    /// limit by more than the protocol's dead band (0.5 mph).
    pub fn record_observation(
        &mut self,
        road: u16,
        limit_mph: u16,
        obs: Observation,
    ) -> Option<TicketCandidate> {
        let entries = self.by_road.entry(road).or_default();

        let mut best: Option<TicketCandidate> = None;
        for &other in entries.iter() {
            if other.timestamp == obs.timestamp {
                continue;
            }
            let (a, b) = if other.timestamp < obs.timestamp { (other, obs) } else { (obs, other) };
            let hours = (b.timestamp - a.timestamp) as f64 / 3600.0;
            let miles = (b.mile as f64 - a.mile as f64).abs();
            let mph = miles / hours;

            if mph > limit_mph as f64 + 0.5 {
                let speed_centi_mph = (mph * 100.0).round() as u16;
                let candidate = TicketCandidate {
                    road,
                    mile1: a.mile,
                    timestamp1: a.timestamp,
                    mile2: b.mile,
                    timestamp2: b.timestamp,
                    speed_centi_mph,
                };
                if best.as_ref().map_or(true, |b| candidate.speed_centi_mph > b.speed_centi_mph) {
                    best = Some(candidate);
                }
            }
        }

        entries.push(obs);
        entries.sort_by_key(|o| o.timestamp);
        best
    }

    /// Attempts to claim every day a candidate ticket spans. Returns `false`
    /// (and claims nothing) if any of those days was already ticketed.
    pub fn try_claim(&mut self, candidate: &TicketCandidate) -> bool {
        let days: Vec<u32> = days_covered(candidate.timestamp1, candidate.timestamp2).collect();
        if days.iter().any(|d| self.ticketed_days.contains(d)) {
            return false;
        }
        self.ticketed_days.extend(days);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ticket_below_limit() {
        let mut h = PlateHistory::default();
        assert!(h.record_observation(1, 60, Observation { mile: 0, timestamp: 0 }).is_none());
        let cand = h.record_observation(1, 60, Observation { mile: 1, timestamp: 120 });
        // 1 mile in 120s = 30mph, under the 60mph limit.
        assert!(cand.is_none());
    }

    #[test]
    fn tickets_when_over_limit_by_more_than_dead_band() {
        let mut h = PlateHistory::default();
        h.record_observation(1, 60, Observation { mile: 0, timestamp: 0 });
        let cand = h
            .record_observation(1, 60, Observation { mile: 1, timestamp: 50 })
            .expect("72mph over a 60mph limit should ticket");
        assert_eq!(cand.mile1, 0);
        assert_eq!(cand.mile2, 1);
        assert_eq!(cand.speed_centi_mph, 7200);
    }

    #[test]
    fn second_ticket_same_day_is_rejected() {
        let mut h = PlateHistory::default();
        let c1 = TicketCandidate {
            road: 1,
            mile1: 0,
            timestamp1: 0,
            mile2: 1,
            timestamp2: 50,
            speed_centi_mph: 7200,
        };
        assert!(h.try_claim(&c1));

        let c2 = TicketCandidate {
            road: 1,
            mile1: 10,
            timestamp1: 100,
            mile2: 11,
            timestamp2: 150,
            speed_centi_mph: 7200,
        };
        assert!(!h.try_claim(&c2));
    }

    #[test]
    fn ticket_on_a_later_day_is_accepted() {
        let mut h = PlateHistory::default();
        let c1 = TicketCandidate { road: 1, mile1: 0, timestamp1: 0, mile2: 1, timestamp2: 50, speed_centi_mph: 7200 };
        assert!(h.try_claim(&c1));

        let c2 = TicketCandidate {
            road: 1,
            mile1: 0,
            timestamp1: 90_000,
            mile2: 1,
            timestamp2: 90_050,
            speed_centi_mph: 7200,
        };
        assert!(h.try_claim(&c2));
    }
}
