// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Outbound Payloads
//!
//! JSON bodies published by the bridge. Responses carry an `error` field that
//! is `null` when the operation succeeded and the failure text otherwise.

use crate::{
    entities::{Data, Schema, Thing},
    errors::{AmqpError, ControllerError},
};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRegisteredResponse {
    pub id: String,
    pub name: String,
    pub token: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUnregisteredResponse {
    pub id: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaUpdatedResponse {
    pub id: String,
    pub schema: Vec<Schema>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub id: String,
    pub sensor_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataUpdate {
    pub id: String,
    pub data: Vec<Data>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSent {
    pub id: String,
    pub data: Vec<Data>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAuthResponse {
    pub id: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<Thing>,
    pub error: Option<String>,
}

pub(crate) fn error_message(err: Option<&ControllerError>) -> Option<String> {
    err.map(|e| e.to_string())
}

pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, AmqpError> {
    serde_json::to_vec(payload).map_err(|err| {
        error!(error = err.to_string(), "failure to serialize payload");
        AmqpError::ParsePayloadError
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_encode_null_error_on_success() {
        let resp = DeviceUnregisteredResponse {
            id: "fbe64efa6c7f717e".to_owned(),
            error: error_message(None),
        };

        let value: serde_json::Value = serde_json::from_slice(&encode(&resp).unwrap()).unwrap();

        assert_eq!(value, json!({"id": "fbe64efa6c7f717e", "error": null}));
    }

    #[test]
    fn should_round_trip_schema_response_with_error() {
        let resp = SchemaUpdatedResponse {
            id: "fbe64efa6c7f717e".to_owned(),
            schema: vec![Schema {
                sensor_id: 0,
                value_type: 3,
                unit: 0,
                type_id: 65521,
                name: "LED".to_owned(),
            }],
            error: error_message(Some(&ControllerError::new("invalid schema"))),
        };

        let decoded: SchemaUpdatedResponse = serde_json::from_slice(&encode(&resp).unwrap()).unwrap();

        assert_eq!(decoded, resp);
        assert_eq!(decoded.error.as_deref(), Some("invalid schema"));
    }

    #[test]
    fn should_use_wire_field_names() {
        let req = DataRequest {
            id: "fbe64efa6c7f717e".to_owned(),
            sensor_ids: vec![0, 1],
        };
        let update = DataUpdate {
            id: "fbe64efa6c7f717e".to_owned(),
            data: vec![Data {
                sensor_id: 1,
                value: json!(true),
            }],
        };

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"id": "fbe64efa6c7f717e", "sensorIds": [0, 1]})
        );
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"id": "fbe64efa6c7f717e", "data": [{"sensorId": 1, "value": true}]})
        );
    }

    #[test]
    fn should_round_trip_device_list() {
        let resp = DeviceListResponse {
            devices: vec![Thing {
                id: "fbe64efa6c7f717e".to_owned(),
                token: None,
                name: "thing".to_owned(),
                schema: None,
            }],
            error: None,
        };

        let decoded: DeviceListResponse = serde_json::from_slice(&encode(&resp).unwrap()).unwrap();

        assert_eq!(decoded, resp);
    }
}
