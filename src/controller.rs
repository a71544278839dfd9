//! Demo driver domain - an in-memory controller/point store.
//!
//! This is the concrete driver behind the `example_tool` binary: a store of
//! controllers, each holding named point values, and a tool facade exposing
//! the three driver operations over it. Real drivers would talk to hardware
//! here; the demo loads the caller's own points into controller `"TEMP"` and
//! reads them back.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DriverWireError, Result};
use crate::point::PointValue;

/// Controller identity the demo tool reads from.
const DEMO_CONTROLLER: &str = "TEMP";

/// A read-points request document.
///
/// Deserialization is strict: unknown fields are rejected, which is the
/// request validation step for the demo tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadPointsRequest {
    /// Points to read, in the order results must come back.
    pub points: Vec<PointSample>,
}

/// One named point with its value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointSample {
    /// Point name.
    pub name: String,
    /// Point value.
    pub value: PointValue,
}

/// In-memory store of controllers and their point values.
#[derive(Default)]
pub struct PointStore {
    controllers: RwLock<HashMap<String, HashMap<String, PointValue>>>,
}

impl PointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller with its point values, replacing any previous
    /// registration under the same id.
    pub fn add_controller(
        &self,
        id: &str,
        points: impl IntoIterator<Item = (String, PointValue)>,
    ) {
        let mut controllers = self
            .controllers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        controllers.insert(id.to_string(), points.into_iter().collect());
    }

    /// Read the named points from a controller, preserving `names` order.
    ///
    /// # Errors
    ///
    /// Returns [`DriverWireError::ControllerNotFound`] for an unknown
    /// controller and [`DriverWireError::PointNotFound`] for an unknown
    /// point name.
    pub fn read_points(&self, id: &str, names: &[String]) -> Result<Vec<PointValue>> {
        let controllers = self
            .controllers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let points = controllers
            .get(id)
            .ok_or(DriverWireError::ControllerNotFound)?;

        names
            .iter()
            .map(|name| {
                points
                    .get(name)
                    .cloned()
                    .ok_or(DriverWireError::PointNotFound)
            })
            .collect()
    }
}

/// The demo tool: schema, instruction and read-points over a [`PointStore`].
#[derive(Default)]
pub struct DemoTool;

impl DemoTool {
    /// Create the demo tool.
    pub fn new() -> Self {
        Self
    }

    /// The tool's JSON schema, compacted.
    ///
    /// # Errors
    ///
    /// Returns error if the embedded schema document fails to parse.
    pub fn schema(&self) -> Result<Bytes> {
        let value: serde_json::Value = serde_json::from_str(SCHEMA)?;
        Ok(Bytes::from(serde_json::to_vec(&value)?))
    }

    /// Usage instruction text for the tool.
    pub fn instruction(&self) -> String {
        INSTRUCTION.to_string()
    }

    /// Load the request's points into the demo controller and read them
    /// back by name, preserving request order.
    ///
    /// # Errors
    ///
    /// Returns a store error if a point vanishes between load and read
    /// (not reachable through the public request path).
    pub fn read_points(&self, request: &ReadPointsRequest) -> Result<Vec<PointValue>> {
        let store = PointStore::new();
        store.add_controller(
            DEMO_CONTROLLER,
            request
                .points
                .iter()
                .map(|point| (point.name.clone(), point.value.clone())),
        );

        let names: Vec<String> = request.points.iter().map(|p| p.name.clone()).collect();
        store.read_points(DEMO_CONTROLLER, &names)
    }
}

const SCHEMA: &str = r#"{
    "$schema": "http://json-schema.org/2020-12/schema",
    "title": "Example Tool Schema",
    "type": "object",
    "properties": {
        "points": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of the point"
                    },
                    "value": {
                        "type": ["string", "number", "boolean"],
                        "description": "The value of the point, can be string, number or boolean"
                    }
                },
                "required": ["name", "value"],
                "additionalProperties": false
            },
            "description": "List of points to read"
        }
    }
}"#;

const INSTRUCTION: &str = r#"This tool reads points from a controller named "TEMP".

To use this tool, provide a list of points with their names and values.
Example:
{
    "points": [
        {
            "name": "temperature",
            "value": 22.5
        },
        {
            "name": "humidity",
            "value": 45
        }
    ]
}"#;
