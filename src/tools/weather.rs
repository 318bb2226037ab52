//! Stub weather lookup.
//!
//! Answers from a fixed table so the agent has a non-arithmetic tool to
//! choose from. Matching is a case-insensitive substring test against the
//! location; the first matching row wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::tool::{Tool, ToolKind, parse_args};
use crate::error::ToolError;

/// Known locations: (substring, temperature, unit).
const TABLE: &[(&str, &str, &str)] = &[
    ("tokyo", "10", "celsius"),
    ("san francisco", "72", "fahrenheit"),
    ("rotterdam", "1", "celsius"),
    ("amsterdam", "-2", "celsius"),
    ("zoetermeer", "3", "celsius"),
];

/// Reading returned for locations not in the table.
const FALLBACK: (&str, &str) = ("22", "celsius");

/// A weather reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Weather {
    /// Location as given by the caller.
    pub location: String,
    /// Temperature, as text.
    pub temperature: String,
    /// Unit of `temperature`.
    pub unit: String,
}

/// Looks up the current weather for `location`.
///
/// The requested unit is accepted for signature compatibility but the
/// table's own unit is always reported.
#[must_use]
pub fn get_current_weather(location: &str, _unit: &str) -> Weather {
    let needle = location.to_lowercase();
    let (temperature, unit) = TABLE
        .iter()
        .find(|(key, _, _)| needle.contains(key))
        .map_or(FALLBACK, |&(_, t, u)| (t, u));

    Weather {
        location: location.to_string(),
        temperature: temperature.to_string(),
        unit: unit.to_string(),
    }
}

/// The weather lookup as a [`Tool`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherTool;

#[derive(Deserialize)]
struct Args {
    location: String,
    #[serde(default = "default_unit")]
    unit: String,
}

fn default_unit() -> String {
    "fahrenheit".to_string()
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_current_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather in a given location"
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city, e.g. San Francisco"
                },
                "unit": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "default": "fahrenheit"
                }
            },
            "required": ["location"],
            "additionalProperties": false
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Lookup
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let Args { location, unit } = parse_args(self.name(), args)?;
        serde_json::to_value(get_current_weather(&location, &unit)).map_err(|e| {
            ToolError::Execution {
                name: self.name().to_string(),
                message: format!("serialization error: {e}"),
            }
        })
    }
}
