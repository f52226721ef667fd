use crate::models::endpoint::EndpointDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub wallet_ready: bool,
    pub endpoints: usize,
    pub outstanding_requirements: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Stats {
    pub tool_calls: u64,
    pub requirements_issued: u64,
    pub payments_settled: u64,
    pub revenue_lamports: u64,
    pub uptime_seconds: u64,
}

/// JSON-schema-shaped property description for one tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

/// What an agent sees in the tool listing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

impl ToolDefinition {
    pub fn from_descriptor(descriptor: &EndpointDescriptor) -> Self {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for param in &descriptor.parameters {
            properties.insert(
                param.name.clone(),
                PropertySchema {
                    schema_type: param.param_type.as_str().to_string(),
                    description: param.description.clone(),
                    default: param.default.clone(),
                },
            );
            if param.required && param.default.is_none() {
                required.push(param.name.clone());
            }
        }
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required,
            },
            price: descriptor.price,
        }
    }
}

/// Outcome of a dispatched tool call. `status` is the upstream HTTP status
/// for endpoint-backed tools, 200 for built-ins.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,
    pub status: u16,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_definition_marks_required_parameters() {
        let descriptor: EndpointDescriptor = serde_json::from_value(json!({
            "name": "get_user",
            "url": "https://x/users/{id}",
            "method": "GET",
            "parameters": [
                {"name": "id", "type": "number", "required": true},
                {"name": "verbose", "type": "boolean", "required": false, "default": false}
            ]
        }))
        .unwrap();

        let tool = ToolDefinition::from_descriptor(&descriptor);
        assert_eq!(tool.input_schema.required, vec!["id".to_string()]);
        assert_eq!(tool.input_schema.properties["verbose"].default, Some(json!(false)));
        assert_eq!(tool.input_schema.schema_type, "object");
    }
}
