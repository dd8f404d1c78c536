//! Aircraft roster and flight-plan tracking
//!
//!  Maintains the authoritative map of currently-tracked aircraft,
//!  the flight-plan side table, and the controller roster.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::Serialize;

use crate::phase::{self, Phase, Ruleset};
use crate::protocol::{ControllerPosition, FlightPlan, Position, RawAircraftSnapshot};

/// Shared handle to the store. The upstream task is the only writer;
/// network handlers take short read locks and clone out.
pub type SharedStore = Arc<RwLock<Store>>;

/// One tracked aircraft, as published to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedAircraft {
    /// Callsign, unique key of the roster
    pub callsign: String,
    /// Pilot player name
    pub pilot: String,
    /// Aircraft type string
    pub aircraft: String,
    /// Altitude in feet
    pub altitude: f64,
    /// Indicated speed in knots
    pub speed: f64,
    /// Ground speed in knots
    pub ground_speed: f64,
    /// Heading in degrees
    pub heading: f64,
    /// Position in the sim's projected plane
    pub position: Position,
    /// Wind string, `DDD@SS`
    pub wind: String,
    pub is_on_ground: bool,
    /// Derived flight phase
    pub phase: Phase,
    /// Route summary, `DEP → ARR`, when a plan is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_plan: Option<FlightPlan>,
    /// Wall-clock stamp of the last snapshot, epoch milliseconds
    pub last_update: u64,
    /// Monotonic sighting time, used for grace eviction
    #[serde(skip)]
    pub seen: Instant,
}

/// Store for the roster, flight plans, and controller positions.
///
/// The roster is a last-write-wins projection of the latest snapshot
/// batch: exactly one entry per callsign, rebuilt on every batch.
pub struct Store {
    aircraft: HashMap<String, EnhancedAircraft>,
    flight_plans: HashMap<String, FlightPlan>,
    controllers: Vec<ControllerPosition>,
    ruleset: Ruleset,
    /// How long an entry omitted from a batch survives. Zero means
    /// strict batch diffing: the roster exactly tracks the last batch.
    stale_grace: Duration,
}

impl Store {
    pub fn new(ruleset: Ruleset, stale_grace: Duration) -> Self {
        Self {
            aircraft: HashMap::new(),
            flight_plans: HashMap::new(),
            controllers: Vec::new(),
            ruleset,
            stale_grace,
        }
    }

    /// Replace the roster from a snapshot batch in one atomic step.
    ///
    /// Every callsign in the batch gets a freshly built entry (phase
    /// classified, known flight plan merged in, timestamp stamped).
    /// Callsigns absent from the batch drop out, unless still within
    /// the stale grace period.
    pub fn apply_snapshot_batch(&mut self, batch: HashMap<String, RawAircraftSnapshot>) {
        let now = Instant::now();
        let stamp = epoch_millis();
        let mut next = HashMap::with_capacity(batch.len());

        for (callsign, snap) in batch {
            let plan = self.flight_plans.get(&callsign).cloned();
            let route = plan.as_ref().map(route_summary);
            let phase = phase::classify(&snap, self.ruleset);
            next.insert(
                callsign.clone(),
                EnhancedAircraft {
                    callsign,
                    pilot: snap.player_name,
                    aircraft: snap.aircraft_type,
                    altitude: snap.altitude,
                    speed: snap.speed,
                    ground_speed: snap.ground_speed,
                    heading: snap.heading,
                    position: snap.position,
                    wind: snap.wind,
                    is_on_ground: snap.is_on_ground,
                    phase,
                    route,
                    flight_plan: plan,
                    last_update: stamp,
                    seen: now,
                },
            );
        }

        if !self.stale_grace.is_zero() {
            for (callsign, prev) in self.aircraft.drain() {
                if !next.contains_key(&callsign)
                    && now.duration_since(prev.seen) <= self.stale_grace
                {
                    next.insert(callsign, prev);
                }
            }
        }

        self.aircraft = next;
    }

    /// Store or overwrite a flight plan, and patch any live roster
    /// entry for the same callsign in place. Never creates a roster
    /// entry by itself.
    pub fn apply_flight_plan(&mut self, plan: FlightPlan) {
        if let Some(entry) = self.aircraft.get_mut(&plan.callsign) {
            entry.route = Some(route_summary(&plan));
            entry.flight_plan = Some(plan.clone());
        }
        self.flight_plans.insert(plan.callsign.clone(), plan);
    }

    /// Replace the controller roster wholesale
    pub fn set_controllers(&mut self, controllers: Vec<ControllerPosition>) {
        self.controllers = controllers;
    }

    /// All tracked aircraft, cloned out of the lock
    pub fn all(&self) -> Vec<EnhancedAircraft> {
        self.aircraft.values().cloned().collect()
    }

    /// Look up one aircraft by callsign
    pub fn get(&self, callsign: &str) -> Option<EnhancedAircraft> {
        self.aircraft.get(callsign).cloned()
    }

    pub fn controllers(&self) -> Vec<ControllerPosition> {
        self.controllers.clone()
    }

    /// Number of tracked aircraft
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

fn route_summary(plan: &FlightPlan) -> String {
    format!("{} → {}", plan.departing, plan.arriving)
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Static roster served when no live data is available, so the UI has
/// something to render during development.
pub fn demo_roster() -> Vec<EnhancedAircraft> {
    let stamp = epoch_millis();
    let now = Instant::now();
    vec![
        EnhancedAircraft {
            callsign: "UAL123".to_string(),
            pilot: "Captain Smith".to_string(),
            aircraft: "Boeing 737-800".to_string(),
            altitude: 37000.0,
            speed: 480.0,
            ground_speed: 480.0,
            heading: 95.0,
            position: Position { x: -74.0060, y: 40.7128 },
            wind: "270@15".to_string(),
            is_on_ground: false,
            phase: Phase::Cruise,
            route: Some("KJFK → KLAX".to_string()),
            flight_plan: None,
            last_update: stamp,
            seen: now,
        },
        EnhancedAircraft {
            callsign: "DLH456".to_string(),
            pilot: "Captain Mueller".to_string(),
            aircraft: "Airbus A320".to_string(),
            altitude: 12000.0,
            speed: 250.0,
            ground_speed: 250.0,
            heading: 180.0,
            position: Position { x: 13.4050, y: 52.5200 },
            wind: "240@12".to_string(),
            is_on_ground: false,
            phase: Phase::Descent,
            route: Some("EDDF → EGLL".to_string()),
            flight_plan: None,
            last_update: stamp,
            seen: now,
        },
        EnhancedAircraft {
            callsign: "BAW789".to_string(),
            pilot: "Captain Wilson".to_string(),
            aircraft: "Boeing 777-300ER".to_string(),
            altitude: 2500.0,
            speed: 180.0,
            ground_speed: 180.0,
            heading: 270.0,
            position: Position { x: -0.4543, y: 51.4700 },
            wind: "260@18".to_string(),
            is_on_ground: false,
            phase: Phase::Approach,
            route: Some("EGLL → KJFK".to_string()),
            flight_plan: None,
            last_update: stamp,
            seen: now,
        },
    ]
}
