// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of one sensor of a thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub sensor_id: i32,
    pub value_type: i32,
    pub unit: i32,
    pub type_id: i32,
    pub name: String,
}

/// A sensor reading. The value is whatever JSON the device sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    pub sensor_id: i32,
    pub value: Value,
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<Schema>>,
}
