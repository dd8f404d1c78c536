//! ATC24 feed wire protocol
//!
//!  Frame envelope and payload types for the upstream data feed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Position in the sim's local projected plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Raw per-aircraft kinematic state as reported by the feed.
///
/// Replaced wholesale on every tick; no history is kept. The wind string
/// is passed through verbatim (`DDD@SS` format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAircraftSnapshot {
    pub heading: f64,
    pub player_name: String,
    pub altitude: f64,
    pub aircraft_type: String,
    pub position: Position,
    /// Indicated speed in knots
    pub speed: f64,
    pub wind: String,
    /// Absent on the wire for airborne traffic
    #[serde(default)]
    pub is_on_ground: bool,
    pub ground_speed: f64,
}

/// A filed flight plan. Keyed by callsign, kept independent of whether
/// the aircraft is currently reporting positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    #[serde(rename = "robloxName")]
    pub roblox_name: String,
    pub callsign: String,
    pub realcallsign: String,
    pub aircraft: String,
    pub flightrules: String,
    pub departing: String,
    pub arriving: String,
    pub route: String,
    pub flightlevel: String,
}

/// One controller position from the `CONTROLLERS` roster.
/// Replaced wholesale on every roster event, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerPosition {
    pub holder: Option<String>,
    pub claimable: bool,
    pub airport: String,
    pub position: String,
    pub queue: Vec<String>,
}

/// Decoded feed frame.
///
/// The feed sends each of the snapshot and flight-plan types under two
/// tags (a base and an `EVENT_` form); both decode to the same variant
/// so downstream handling has a single path.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum FeedEvent {
    #[serde(rename = "ACFT_DATA", alias = "EVENT_ACFT_DATA")]
    AircraftData(HashMap<String, RawAircraftSnapshot>),

    #[serde(rename = "FLIGHT_PLAN", alias = "EVENT_FLIGHT_PLAN")]
    FlightPlan(FlightPlan),

    #[serde(rename = "CONTROLLERS")]
    Controllers(Vec<ControllerPosition>),
}

/// Decode one raw text frame into a typed event.
///
/// Unknown tags and malformed payloads are errors; the caller drops the
/// frame and keeps the connection alive.
pub fn decode_frame(text: &str) -> Result<FeedEvent> {
    Ok(serde_json::from_str(text)?)
}

/// Message pushed to subscribers on the downstream hop, serialized as
/// `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Update {
    /// Full roster snapshot, sent on join and after every batch
    Aircraft(Vec<crate::roster::EnhancedAircraft>),
    /// Full controller roster
    Controllers(Vec<ControllerPosition>),
    /// One created or updated flight plan
    FlightPlan(FlightPlan),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT_FRAME: &str = r#"{
        "t": "ACFT_DATA",
        "d": {
            "SWA283": {
                "heading": 270,
                "playerName": "someone",
                "altitude": 12500,
                "aircraftType": "B737",
                "position": {"x": 1200.5, "y": -300.25},
                "speed": 250,
                "wind": "270@09",
                "isOnGround": false,
                "groundSpeed": 265
            }
        }
    }"#;

    #[test]
    fn test_decode_snapshot_frame() {
        let event = decode_frame(SNAPSHOT_FRAME).unwrap();
        match event {
            FeedEvent::AircraftData(batch) => {
                let snap = &batch["SWA283"];
                assert_eq!(snap.player_name, "someone");
                assert_eq!(snap.altitude, 12500.0);
                assert_eq!(snap.position.x, 1200.5);
                assert!(!snap.is_on_ground);
            }
            other => panic!("expected AircraftData, got {:?}", other),
        }
    }

    #[test]
    fn test_event_variant_decodes_identically() {
        let event_form = SNAPSHOT_FRAME.replace("ACFT_DATA", "EVENT_ACFT_DATA");
        let a = decode_frame(SNAPSHOT_FRAME).unwrap();
        let b = decode_frame(&event_form).unwrap();
        match (a, b) {
            (FeedEvent::AircraftData(x), FeedEvent::AircraftData(y)) => {
                assert_eq!(x["SWA283"].ground_speed, y["SWA283"].ground_speed);
            }
            _ => panic!("variants decoded to different event kinds"),
        }
    }

    #[test]
    fn test_decode_flight_plan() {
        let frame = r#"{
            "t": "EVENT_FLIGHT_PLAN",
            "d": {
                "robloxName": "pilot99",
                "callsign": "SWA283",
                "realcallsign": "Southwest 283",
                "aircraft": "B737",
                "flightrules": "IFR",
                "departing": "IRFD",
                "arriving": "ITKO",
                "route": "DCT",
                "flightlevel": "120"
            }
        }"#;
        match decode_frame(frame).unwrap() {
            FeedEvent::FlightPlan(plan) => {
                assert_eq!(plan.callsign, "SWA283");
                assert_eq!(plan.departing, "IRFD");
                assert_eq!(plan.arriving, "ITKO");
            }
            other => panic!("expected FlightPlan, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_controllers() {
        let frame = r#"{
            "t": "CONTROLLERS",
            "d": [
                {"holder": null, "claimable": true, "airport": "IRFD", "position": "TWR", "queue": []},
                {"holder": "ctl1", "claimable": false, "airport": "ITKO", "position": "GND", "queue": ["ctl2"]}
            ]
        }"#;
        match decode_frame(frame).unwrap() {
            FeedEvent::Controllers(list) => {
                assert_eq!(list.len(), 2);
                assert!(list[0].holder.is_none());
                assert_eq!(list[1].queue, vec!["ctl2".to_string()]);
            }
            other => panic!("expected Controllers, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        assert!(decode_frame(r#"{"t": "METAR", "d": {}}"#).is_err());
        assert!(decode_frame("not json at all").is_err());
        assert!(decode_frame(r#"{"t": "ACFT_DATA", "d": 42}"#).is_err());
    }

    #[test]
    fn test_missing_on_ground_defaults_false() {
        let frame = SNAPSHOT_FRAME.replace("\"isOnGround\": false,", "");
        match decode_frame(&frame).unwrap() {
            FeedEvent::AircraftData(batch) => assert!(!batch["SWA283"].is_on_ground),
            other => panic!("expected AircraftData, got {:?}", other),
        }
    }

    #[test]
    fn test_update_envelope_shape() {
        let json = serde_json::to_value(Update::Controllers(vec![])).unwrap();
        assert_eq!(json["type"], "controllers");
        assert!(json["data"].as_array().unwrap().is_empty());

        let plan = FlightPlan {
            roblox_name: "player".to_string(),
            callsign: "SWA283".to_string(),
            realcallsign: "Southwest 283".to_string(),
            aircraft: "B737".to_string(),
            flightrules: "IFR".to_string(),
            departing: "IRFD".to_string(),
            arriving: "ITKO".to_string(),
            route: "DCT".to_string(),
            flightlevel: "120".to_string(),
        };
        let json = serde_json::to_value(Update::FlightPlan(plan)).unwrap();
        assert_eq!(json["type"], "flightPlan");
        assert_eq!(json["data"]["robloxName"], "player");
        assert_eq!(json["data"]["callsign"], "SWA283");
    }
}
