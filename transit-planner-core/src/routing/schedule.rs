//! Materializes a stop path into time-stamped legs by matching each hop
//! against the trip timetable.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use geo::Point;
use hashbrown::HashMap;
use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::Path;
use crate::{
    EdgeKind, Error, GraphConfig, Time, TransportMode,
    loading::{TRANSFER_LABEL, ride_duration},
    model::{Route, Stop, StopTime, Timetable},
};

/// Shortest duration a matched ride leg may have
pub const MIN_LEG_DURATION: Time = 60;
/// Duration given to a hop with no ride or transfer behind it
pub const FALLBACK_LEG_DURATION: Time = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Ride,
    Transfer,
    /// Nothing in the timetable matched this hop
    Unmatched,
    /// Zero-duration leg marking arrival at the last stop
    Arrival,
}

/// One time-stamped step of an itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub from_stop: String,
    /// `None` on the arrival leg
    pub to_stop: Option<String>,
    pub from_name: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub duration_seconds: Time,
    pub duration_minutes: Time,
    /// Time spent at `from_stop` waiting for this departure
    pub wait_seconds: Time,
    pub route_name: String,
    pub mode: TransportMode,
    pub kind: LegKind,
    pub trip_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl Leg {
    pub fn location(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    pub fn mode_label(&self) -> &'static str {
        match self.kind {
            LegKind::Transfer => TRANSFER_LABEL,
            LegKind::Arrival => "",
            LegKind::Ride | LegKind::Unmatched => self.mode.label(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == LegKind::Arrival
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    /// Every hop of the path followed by the arrival leg
    pub legs: Vec<Leg>,
    /// Seconds from the first departure to the last arrival
    pub total_duration: Time,
    /// Changes of mode or route between consecutive ride legs
    pub mode_changes: usize,
    pub unmatched_legs: usize,
    /// `total_duration` plus the modal-change penalty for each change
    pub penalized_duration: Time,
}

impl Itinerary {
    pub fn departure(&self) -> Option<NaiveDateTime> {
        self.legs.first().map(|leg| leg.departure)
    }

    pub fn arrival(&self) -> Option<NaiveDateTime> {
        self.legs.last().map(|leg| leg.arrival)
    }
}

/// Scheduled run of one trip between two consecutive stops
#[derive(Debug, Clone)]
struct Segment {
    departure: Time,
    duration: Time,
    trip_id: String,
    route_id: Option<String>,
    route_name: String,
    mode: TransportMode,
}

impl Segment {
    /// Runs on the same line as a ride edge; edges without a route only
    /// match their own trip
    fn same_line(&self, trip_id: &str, route_id: Option<&str>) -> bool {
        match route_id {
            Some(route_id) => self.route_id.as_deref() == Some(route_id),
            None => self.trip_id == trip_id,
        }
    }
}

#[derive(Debug, Clone)]
struct StopInfo {
    name: String,
    lat: f64,
    lon: f64,
}

/// Result of matching one hop against the timetable
struct Hop<'a> {
    kind: LegKind,
    wait: Time,
    duration: Time,
    segment: Option<&'a Segment>,
}

/// Timetable lookups for turning paths into itineraries.
///
/// Built once per timetable and shared between queries.
#[derive(Debug, Clone)]
pub struct ScheduleEstimator {
    segments: HashMap<String, HashMap<String, Vec<Segment>>>,
    transfers: HashMap<String, HashMap<String, Time>>,
    stops: HashMap<String, StopInfo>,
    modal_change_penalty: Time,
}

impl ScheduleEstimator {
    pub fn new(timetable: &Timetable, config: &GraphConfig) -> Self {
        let routes_by_trip = timetable.routes_by_trip();

        let mut segments: HashMap<String, HashMap<String, Vec<Segment>>> = HashMap::new();
        let by_trip = timetable
            .stop_times
            .iter()
            .into_group_map_by(|stop_time| stop_time.trip_id.as_str());

        for (trip_id, mut stop_times) in by_trip {
            stop_times.sort_by_key(|stop_time| stop_time.sequence);
            let route = routes_by_trip.get(trip_id).copied();
            for (current, next) in stop_times.iter().copied().tuple_windows() {
                if current.stop_id == next.stop_id {
                    continue;
                }
                if let Some(segment) = segment_for(trip_id, route, current, next) {
                    segments
                        .entry_ref(current.stop_id.as_str())
                        .or_default()
                        .entry_ref(next.stop_id.as_str())
                        .or_default()
                        .push(segment);
                }
            }
        }
        for candidates in segments.values_mut().flat_map(HashMap::values_mut) {
            candidates.sort_by(|a, b| {
                a.departure
                    .cmp(&b.departure)
                    .then_with(|| a.trip_id.cmp(&b.trip_id))
            });
        }

        let mut transfers: HashMap<String, HashMap<String, Time>> = HashMap::new();
        for transfer in &timetable.transfers {
            let time = transfer
                .min_transfer_time
                .unwrap_or(config.default_transfer_time);
            transfers
                .entry_ref(transfer.from_stop.as_str())
                .or_default()
                .entry_ref(transfer.to_stop.as_str())
                .and_modify(|existing| *existing = (*existing).min(time))
                .or_insert(time);
        }

        let stops = timetable
            .stops
            .iter()
            .map(|Stop { stop_id, name, lat, lon }| {
                (
                    stop_id.clone(),
                    StopInfo {
                        name: name.clone(),
                        lat: *lat,
                        lon: *lon,
                    },
                )
            })
            .collect();

        Self {
            segments,
            transfers,
            stops,
            modal_change_penalty: config.modal_change_penalty,
        }
    }

    /// Walks `path` from `departure` and returns one leg per hop plus a
    /// terminal arrival leg.
    ///
    /// Each hop boards the first scheduled segment leaving at or after the
    /// running clock and the wait for it is recorded on the leg. When a
    /// declared transfer reaches the next stop strictly earlier, the transfer
    /// is taken instead. Hops with no timetable entry get
    /// [`FALLBACK_LEG_DURATION`]; they never fail the itinerary.
    ///
    /// Paths returned by a search also carry the edge chosen for each hop.
    /// A chosen ride boards the next run of the same route, and a chosen
    /// transfer is walked, so legs stay attributed to what was costed.
    pub fn estimate(&self, path: &Path, departure: NaiveDateTime) -> Itinerary {
        let Some(last) = path.stops.last() else {
            return Itinerary::default();
        };

        let mut legs = Vec::with_capacity(path.stops.len());
        let mut clock = departure;
        let mut unmatched_legs = 0;

        let chosen = |i: usize| {
            (path.hops.len() + 1 == path.stops.len())
                .then(|| path.hops.get(i))
                .flatten()
        };

        for (i, (from, to)) in path.stops.iter().tuple_windows().enumerate() {
            let hop = self.match_hop(from, to, time_of_day(clock), chosen(i));
            if hop.kind == LegKind::Unmatched {
                unmatched_legs += 1;
                warn!(
                    "{}, using {FALLBACK_LEG_DURATION}s",
                    Error::MissingTimetableMatch {
                        from: from.clone(),
                        to: to.clone(),
                    }
                );
            }

            let leg_departure = clock + seconds(hop.wait);
            let arrival = leg_departure + seconds(hop.duration);
            let (route_name, mode, trip_id) = match hop.segment {
                Some(segment) => (
                    segment.route_name.clone(),
                    segment.mode,
                    Some(segment.trip_id.clone()),
                ),
                None if hop.kind == LegKind::Transfer => {
                    (TRANSFER_LABEL.to_string(), TransportMode::Unknown, None)
                }
                None => (String::new(), TransportMode::Unknown, None),
            };

            legs.push(Leg {
                to_stop: Some(to.clone()),
                departure: leg_departure,
                arrival,
                duration_seconds: hop.duration,
                duration_minutes: hop.duration / 60,
                wait_seconds: hop.wait,
                route_name,
                mode,
                kind: hop.kind,
                trip_id,
                ..self.leg_at(from)
            });
            clock = arrival;
        }

        legs.push(Leg {
            departure: clock,
            arrival: clock,
            ..self.leg_at(last)
        });

        let total_duration = legs
            .first()
            .map(|first| clock.signed_duration_since(first.departure).num_seconds())
            .and_then(|secs| Time::try_from(secs).ok())
            .unwrap_or_default();

        let mode_changes = legs
            .iter()
            .filter(|leg| leg.kind == LegKind::Ride)
            .tuple_windows()
            .filter(|(a, b)| a.mode != b.mode || a.route_name != b.route_name)
            .count();
        let penalty = Time::try_from(mode_changes)
            .unwrap_or(Time::MAX)
            .saturating_mul(self.modal_change_penalty);

        debug!(
            "Estimated {} legs over {total_duration}s with {mode_changes} mode changes",
            legs.len()
        );

        Itinerary {
            legs,
            total_duration,
            mode_changes,
            unmatched_legs,
            penalized_duration: total_duration.saturating_add(penalty),
        }
    }

    fn match_hop(&self, from: &str, to: &str, now: Time, chosen: Option<&EdgeKind>) -> Hop<'_> {
        let ride = self
            .segments
            .get(from)
            .and_then(|targets| targets.get(to))
            .and_then(|candidates| board(candidates, now, chosen))
            .map(|(segment, wait)| Hop {
                kind: LegKind::Ride,
                wait,
                duration: segment.duration.max(MIN_LEG_DURATION),
                segment: Some(segment),
            });

        let transfer = self
            .transfers
            .get(from)
            .and_then(|targets| targets.get(to))
            .map(|&duration| Hop {
                kind: LegKind::Transfer,
                wait: 0,
                duration,
                segment: None,
            });

        match (ride, transfer) {
            (Some(_), Some(transfer)) if matches!(chosen, Some(EdgeKind::Transfer)) => transfer,
            (Some(ride), Some(_)) if matches!(chosen, Some(EdgeKind::Ride { .. })) => ride,
            (Some(ride), Some(transfer)) if transfer.duration < ride.wait.saturating_add(ride.duration) => {
                transfer
            }
            (Some(ride), _) => ride,
            (None, Some(transfer)) => transfer,
            (None, None) => Hop {
                kind: LegKind::Unmatched,
                wait: 0,
                duration: FALLBACK_LEG_DURATION,
                segment: None,
            },
        }
    }

    /// Zero-duration arrival leg at `stop_id`; callers override what differs
    fn leg_at(&self, stop_id: &str) -> Leg {
        let info = self.stops.get(stop_id);
        Leg {
            from_stop: stop_id.to_string(),
            to_stop: None,
            from_name: info.map_or_else(|| stop_id.to_string(), |info| info.name.clone()),
            departure: NaiveDateTime::default(),
            arrival: NaiveDateTime::default(),
            duration_seconds: 0,
            duration_minutes: 0,
            wait_seconds: 0,
            route_name: String::new(),
            mode: TransportMode::Unknown,
            kind: LegKind::Arrival,
            trip_id: None,
            lat: info.map_or(0.0, |info| info.lat),
            lon: info.map_or(0.0, |info| info.lon),
        }
    }
}

/// Run to board and the wait for it.
///
/// Boards the first run leaving at or after `now`, preferring the line of the
/// chosen ride edge. Once the day's service is over, the chosen line's first
/// run (or the first run at all) is used without waiting.
fn board<'a>(
    candidates: &'a [Segment],
    now: Time,
    chosen: Option<&EdgeKind>,
) -> Option<(&'a Segment, Time)> {
    let line = match chosen {
        Some(EdgeKind::Ride { trip_id, route_id }) => Some((trip_id.as_str(), route_id.as_deref())),
        _ => None,
    };
    let on_line = |segment: &&Segment| {
        line.is_some_and(|(trip_id, route_id)| segment.same_line(trip_id, route_id))
    };
    let upcoming = move || candidates.iter().filter(move |segment| segment.departure >= now);

    upcoming()
        .find(&on_line)
        .or_else(|| upcoming().next())
        .map(|segment| (segment, segment.departure - now))
        .or_else(|| {
            candidates
                .iter()
                .find(&on_line)
                .or_else(|| candidates.first())
                .map(|segment| (segment, 0))
        })
}

fn segment_for(
    trip_id: &str,
    route: Option<&Route>,
    current: &StopTime,
    next: &StopTime,
) -> Option<Segment> {
    let duration = ride_duration(current, next)?;
    Some(Segment {
        departure: current.departure?,
        duration,
        trip_id: trip_id.to_string(),
        route_id: route.map(|route| route.route_id.clone()),
        route_name: route.map(Route::display_name).unwrap_or_default().to_string(),
        mode: route.map_or(TransportMode::Unknown, |route| route.mode),
    })
}

fn time_of_day(clock: NaiveDateTime) -> Time {
    clock.time().num_seconds_from_midnight()
}

fn seconds(value: Time) -> TimeDelta {
    TimeDelta::seconds(i64::from(value))
}

/// One-shot estimation without keeping the estimator around
pub fn estimate(
    path: &Path,
    departure: NaiveDateTime,
    timetable: &Timetable,
    config: &GraphConfig,
) -> Itinerary {
    ScheduleEstimator::new(timetable, config).estimate(path, departure)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{Transfer, Trip};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn stop_time(trip: &str, stop: &str, seq: u32, time: Time) -> StopTime {
        StopTime {
            trip_id: trip.into(),
            stop_id: stop.into(),
            sequence: seq,
            arrival: Some(time),
            departure: Some(time),
        }
    }

    fn timetable() -> Timetable {
        let stops = ["A", "B", "C"]
            .into_iter()
            .map(|id| Stop {
                stop_id: id.into(),
                name: format!("Place {id}"),
                lat: 43.6,
                lon: 1.44,
            })
            .collect();
        Timetable {
            stops,
            trips: vec![
                Trip {
                    trip_id: "early".into(),
                    route_id: "M1".into(),
                },
                Trip {
                    trip_id: "late".into(),
                    route_id: "M1".into(),
                },
                Trip {
                    trip_id: "bus".into(),
                    route_id: "B2".into(),
                },
            ],
            routes: vec![
                Route {
                    route_id: "M1".into(),
                    short_name: "1".into(),
                    long_name: String::new(),
                    mode: TransportMode::Metro,
                },
                Route {
                    route_id: "B2".into(),
                    short_name: "2".into(),
                    long_name: String::new(),
                    mode: TransportMode::Bus,
                },
            ],
            stop_times: vec![
                stop_time("late", "A", 1, 9 * 3600),
                stop_time("late", "B", 2, 9 * 3600 + 600),
                stop_time("early", "A", 1, 8 * 3600),
                stop_time("early", "B", 2, 8 * 3600 + 20),
                stop_time("bus", "B", 1, 9 * 3600 + 900),
                stop_time("bus", "C", 2, 9 * 3600 + 1500),
            ],
            transfers: vec![Transfer {
                from_stop: "C".into(),
                to_stop: "A".into(),
                min_transfer_time: None,
            }],
        }
    }

    fn path(stops: &[&str]) -> Path {
        Path::from_stops(stops.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn waits_for_next_departure_and_tracks_mode_changes() {
        let estimator = ScheduleEstimator::new(&timetable(), &GraphConfig::default());
        let itinerary = estimator.estimate(&path(&["A", "B", "C"]), at(8, 30));

        assert_eq!(itinerary.legs.len(), 3);
        let first = &itinerary.legs[0];
        assert_eq!(first.trip_id.as_deref(), Some("late"));
        assert_eq!(first.wait_seconds, 1800);
        assert_eq!(first.departure, at(9, 0));
        assert_eq!(first.arrival, at(9, 10));
        assert_eq!(first.duration_minutes, 10);
        assert_eq!(first.from_name, "Place A");

        let second = &itinerary.legs[1];
        assert_eq!(second.mode, TransportMode::Bus);
        assert_eq!(second.wait_seconds, 300);
        assert_eq!(second.departure, at(9, 15));

        let terminal = &itinerary.legs[2];
        assert!(terminal.is_terminal());
        assert_eq!(terminal.to_stop, None);
        assert_eq!(terminal.departure, terminal.arrival);

        // Measured from the first departure, not the request time
        assert_eq!(itinerary.total_duration, 25 * 60);
        assert_eq!(itinerary.mode_changes, 1);
        assert_eq!(itinerary.penalized_duration, 25 * 60 + 300);
    }

    #[test]
    fn short_rides_are_stretched_to_a_minute() {
        let estimator = ScheduleEstimator::new(&timetable(), &GraphConfig::default());
        let itinerary = estimator.estimate(&path(&["A", "B"]), at(7, 59));
        assert_eq!(itinerary.legs[0].trip_id.as_deref(), Some("early"));
        assert_eq!(itinerary.legs[0].duration_seconds, MIN_LEG_DURATION);
    }

    #[test]
    fn after_last_run_uses_first_run_without_waiting() {
        let estimator = ScheduleEstimator::new(&timetable(), &GraphConfig::default());
        let itinerary = estimator.estimate(&path(&["B", "C"]), at(22, 0));
        let leg = &itinerary.legs[0];
        assert_eq!(leg.wait_seconds, 0);
        assert_eq!(leg.departure, at(22, 0));
        assert_eq!(leg.arrival, at(22, 10));
    }

    #[test]
    fn transfers_and_unmatched_hops_fall_back() {
        let estimator = ScheduleEstimator::new(&timetable(), &GraphConfig::default());
        let itinerary = estimator.estimate(&path(&["C", "A", "C"]), at(12, 0));

        let transfer = &itinerary.legs[0];
        assert_eq!(transfer.kind, LegKind::Transfer);
        assert_eq!(transfer.duration_seconds, 300);
        assert_eq!(transfer.mode_label(), "Transfer");

        let unmatched = &itinerary.legs[1];
        assert_eq!(unmatched.kind, LegKind::Unmatched);
        assert_eq!(unmatched.duration_seconds, FALLBACK_LEG_DURATION);
        assert_eq!(unmatched.route_name, "");
        assert_eq!(itinerary.unmatched_legs, 1);
        assert_eq!(itinerary.total_duration, 300 + FALLBACK_LEG_DURATION);
    }

    fn searched(stops: &[&str], hops: Vec<EdgeKind>) -> Path {
        Path {
            hops,
            ..path(stops)
        }
    }

    fn ride(trip_id: &str, route_id: &str) -> EdgeKind {
        EdgeKind::Ride {
            trip_id: trip_id.into(),
            route_id: Some(route_id.into()),
        }
    }

    #[test]
    fn boards_the_line_of_the_chosen_edge() {
        let mut timetable = timetable();
        timetable.trips.push(Trip {
            trip_id: "shuttle".into(),
            route_id: "B2".into(),
        });
        timetable.stop_times.extend([
            stop_time("shuttle", "A", 1, 8 * 3600 + 2400),
            stop_time("shuttle", "B", 2, 8 * 3600 + 3000),
        ]);
        let estimator = ScheduleEstimator::new(&timetable, &GraphConfig::default());

        // Without a chosen edge the next run wins, whatever its line
        let plain = estimator.estimate(&path(&["A", "B"]), at(8, 30));
        assert_eq!(plain.legs[0].trip_id.as_deref(), Some("shuttle"));
        assert_eq!(plain.legs[0].mode, TransportMode::Bus);

        // A metro edge keeps the leg on the metro, even on another run
        let metro = estimator.estimate(&searched(&["A", "B"], vec![ride("early", "M1")]), at(8, 30));
        let leg = &metro.legs[0];
        assert_eq!(leg.trip_id.as_deref(), Some("late"));
        assert_eq!(leg.mode, TransportMode::Metro);
        assert_eq!(leg.departure, at(9, 0));

        // After the last run the chosen line is used without waiting
        let night = estimator.estimate(&searched(&["A", "B"], vec![ride("late", "M1")]), at(23, 0));
        assert_eq!(night.legs[0].trip_id.as_deref(), Some("early"));
        assert_eq!(night.legs[0].wait_seconds, 0);

        // Hops that do not line up with the stops are ignored
        let mismatched = estimator.estimate(
            &searched(&["A", "B"], vec![ride("early", "M1"), EdgeKind::Transfer]),
            at(8, 30),
        );
        assert_eq!(mismatched.legs[0].trip_id.as_deref(), Some("shuttle"));
    }

    #[test]
    fn chosen_transfer_is_walked() {
        let mut timetable = timetable();
        timetable.transfers.push(Transfer {
            from_stop: "A".into(),
            to_stop: "B".into(),
            min_transfer_time: Some(900),
        });
        let estimator = ScheduleEstimator::new(&timetable, &GraphConfig::default());

        // The ride (wait until 09:00, then 10 min) arrives earlier than the walk
        let plain = estimator.estimate(&path(&["A", "B"]), at(8, 59));
        assert_eq!(plain.legs[0].kind, LegKind::Ride);

        let walked = estimator.estimate(&searched(&["A", "B"], vec![EdgeKind::Transfer]), at(8, 59));
        assert_eq!(walked.legs[0].kind, LegKind::Transfer);
        assert_eq!(walked.legs[0].duration_seconds, 900);
        assert_eq!(walked.legs[0].trip_id, None);
    }

    #[test]
    fn single_stop_and_empty_paths() {
        let estimator = ScheduleEstimator::new(&timetable(), &GraphConfig::default());
        let itinerary = estimator.estimate(&path(&["B"]), at(10, 0));
        assert_eq!(itinerary.legs.len(), 1);
        assert_eq!(itinerary.total_duration, 0);

        let unknown = estimator.estimate(&path(&["Z"]), at(10, 0));
        assert_eq!(unknown.legs[0].from_name, "Z");

        assert!(estimator.estimate(&path(&[]), at(10, 0)).legs.is_empty());
    }
}
