//! Geographic coordinates accepted by remote methods.

use serde::Serialize;
use serde_json::Value;

/// A latitude/longitude pair in degrees.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {} is out of range", lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(format!("longitude {} is out of range", lng));
        }
        Ok(Self { lat, lng })
    }

    /// Build a point from an argument value.
    ///
    /// Accepts `{"lat":…, "lng":…}` with numbers or numeric strings, the
    /// same object as JSON text, or the text `"lat,lng"`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => {
                let lat = map.get("lat").ok_or("missing `lat`")?;
                let lng = map.get("lng").ok_or("missing `lng`")?;
                Self::new(coordinate(lat)?, coordinate(lng)?)
            }
            Value::String(text) => {
                let trimmed = text.trim();
                if trimmed.starts_with('{') {
                    let parsed: Value = serde_json::from_str(trimmed)
                        .map_err(|err| format!("invalid geo point JSON: {}", err))?;
                    return Self::from_value(&parsed);
                }
                let (lat, lng) = trimmed
                    .split_once(',')
                    .ok_or_else(|| format!("`{}` is not a geo point", text))?;
                Self::new(parse_coordinate(lat)?, parse_coordinate(lng)?)
            }
            other => Err(format!("`{}` is not a geo point", other)),
        }
    }
}

fn coordinate(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("`{}` is not a number", n)),
        Value::String(s) => parse_coordinate(s),
        other => Err(format!("`{}` is not a number", other)),
    }
}

fn parse_coordinate(text: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("`{}` is not a number", text.trim()))
}
