//! Flight-phase classification
//!
//!  Maps an instantaneous kinematic snapshot to a coarse operational
//!  phase label. Pure functions of the snapshot, no history.

use serde::Serialize;

use crate::protocol::RawAircraftSnapshot;

/// Coarse operational phase of a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Taxi,
    Takeoff,
    Climb,
    Cruise,
    Descent,
    Approach,
    Landing,
}

/// Which classification rules to apply.
///
/// `Coarse` reproduces the upstream app's heuristic, which never emits
/// `Descent` or `Landing` (the 3000-30000 ft band always reads as
/// cruise). `Corrected` makes all seven phases reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ruleset {
    #[default]
    Coarse,
    Corrected,
}

/// Classify a snapshot into a phase.
///
/// Ground handling reads ground speed; airborne rules read indicated
/// speed. Altitudes in feet, speeds in knots.
pub fn classify(snap: &RawAircraftSnapshot, rules: Ruleset) -> Phase {
    match rules {
        Ruleset::Coarse => classify_coarse(snap),
        Ruleset::Corrected => classify_corrected(snap),
    }
}

fn classify_coarse(snap: &RawAircraftSnapshot) -> Phase {
    if snap.is_on_ground {
        return if snap.ground_speed > 50.0 {
            Phase::Takeoff
        } else {
            Phase::Taxi
        };
    }

    if snap.altitude < 1000.0 {
        if snap.speed > 100.0 {
            Phase::Takeoff
        } else {
            Phase::Approach
        }
    } else if snap.altitude < 3000.0 {
        Phase::Climb
    } else {
        // 3000-30000 ft and above both read as cruise
        Phase::Cruise
    }
}

/// The wire carries no vertical rate, so the mid band is split on
/// indicated speed: departures below 10000 ft are speed-restricted,
/// descents run near the high-speed limit.
fn classify_corrected(snap: &RawAircraftSnapshot) -> Phase {
    if snap.is_on_ground {
        return if snap.ground_speed > 50.0 {
            Phase::Takeoff
        } else {
            Phase::Taxi
        };
    }

    if snap.altitude < 500.0 && snap.speed < 160.0 {
        Phase::Landing
    } else if snap.altitude < 1000.0 {
        if snap.speed > 100.0 {
            Phase::Takeoff
        } else {
            Phase::Approach
        }
    } else if snap.altitude < 3000.0 {
        if snap.speed > 180.0 {
            Phase::Climb
        } else {
            Phase::Approach
        }
    } else if snap.altitude < 30000.0 {
        if snap.speed > 240.0 {
            Phase::Descent
        } else {
            Phase::Climb
        }
    } else {
        Phase::Cruise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Position;

    fn snap(altitude: f64, speed: f64, ground_speed: f64, on_ground: bool) -> RawAircraftSnapshot {
        RawAircraftSnapshot {
            heading: 0.0,
            player_name: "p".to_string(),
            altitude,
            aircraft_type: "B737".to_string(),
            position: Position { x: 0.0, y: 0.0 },
            speed,
            wind: "000@00".to_string(),
            is_on_ground: on_ground,
            ground_speed,
        }
    }

    #[test]
    fn test_coarse_boundaries() {
        // on ground, split at 50 kts ground speed
        assert_eq!(classify(&snap(0.0, 0.0, 60.0, true), Ruleset::Coarse), Phase::Takeoff);
        assert_eq!(classify(&snap(0.0, 0.0, 10.0, true), Ruleset::Coarse), Phase::Taxi);
        // low altitude, split at 100 kts
        assert_eq!(classify(&snap(500.0, 150.0, 0.0, false), Ruleset::Coarse), Phase::Takeoff);
        assert_eq!(classify(&snap(500.0, 50.0, 0.0, false), Ruleset::Coarse), Phase::Approach);
        // climb band
        assert_eq!(classify(&snap(2000.0, 200.0, 0.0, false), Ruleset::Coarse), Phase::Climb);
        // high altitude
        assert_eq!(classify(&snap(35000.0, 450.0, 0.0, false), Ruleset::Coarse), Phase::Cruise);
    }

    #[test]
    fn test_coarse_mid_band_reads_cruise() {
        // 3000-30000 ft band is cruise regardless of speed; descent and
        // landing are unreachable with these rules
        assert_eq!(classify(&snap(3000.0, 180.0, 0.0, false), Ruleset::Coarse), Phase::Cruise);
        assert_eq!(classify(&snap(15000.0, 300.0, 0.0, false), Ruleset::Coarse), Phase::Cruise);
        assert_eq!(classify(&snap(29999.0, 250.0, 0.0, false), Ruleset::Coarse), Phase::Cruise);
    }

    #[test]
    fn test_default_ruleset_is_coarse() {
        assert_eq!(Ruleset::default(), Ruleset::Coarse);
    }

    #[test]
    fn test_corrected_reaches_descent_and_landing() {
        assert_eq!(
            classify(&snap(12000.0, 280.0, 0.0, false), Ruleset::Corrected),
            Phase::Descent
        );
        assert_eq!(
            classify(&snap(300.0, 130.0, 0.0, false), Ruleset::Corrected),
            Phase::Landing
        );
        // ground rules unchanged between rulesets
        assert_eq!(
            classify(&snap(0.0, 0.0, 60.0, true), Ruleset::Corrected),
            Phase::Takeoff
        );
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Takeoff).unwrap(), "\"takeoff\"");
        assert_eq!(serde_json::to_string(&Phase::Cruise).unwrap(), "\"cruise\"");
    }
}
