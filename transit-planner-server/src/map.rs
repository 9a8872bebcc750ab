//! Map rendering of itineraries

use geo::{LineString, line_string};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde_json::json;
use transit_planner_core::{Itinerary, Leg};

/// One `LineString` feature per hop and a `Point` for the arrival stop
pub fn itinerary_to_geojson(itinerary: &Itinerary) -> Result<FeatureCollection, String> {
    let mut features = Vec::with_capacity(itinerary.legs.len());

    for (idx, leg) in itinerary.legs.iter().enumerate() {
        let geometry = match itinerary.legs.get(idx + 1) {
            Some(next) => {
                let line: LineString<f64> = line_string![
                    (x: leg.lon, y: leg.lat),
                    (x: next.lon, y: next.lat),
                ];
                Geometry::new(GeoJsonValue::from(&line))
            }
            None => Geometry::new(GeoJsonValue::from(&leg.location())),
        };
        features.push(leg_feature(idx, leg, geometry)?);
    }

    Ok(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    })
}

fn leg_feature(idx: usize, leg: &Leg, geometry: Geometry) -> Result<Feature, String> {
    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "leg_index": idx,
            "leg_type": leg.kind,
            "from_stop": leg.from_stop,
            "to_stop": leg.to_stop,
            "from_name": leg.from_name,
            "departure": leg.departure,
            "arrival": leg.arrival,
            "duration_minutes": leg.duration_minutes,
            "wait_seconds": leg.wait_seconds,
            "route_name": leg.route_name,
            "mode": leg.mode_label(),
            "trip_id": leg.trip_id,
        }
    });
    serde_json::from_value::<Feature>(value).map_err(|e| e.to_string())
}
