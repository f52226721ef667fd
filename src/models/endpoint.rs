use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
        }
    }

    /// Methods that carry arguments in the query string rather than a body.
    pub fn uses_query(&self) -> bool {
        matches!(self, HttpMethod::GET | HttpMethod::DELETE)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::DELETE => reqwest::Method::DELETE,
            HttpMethod::PATCH => reqwest::Method::PATCH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }

    /// Check a JSON value against this tag. Returns the value unchanged when
    /// it matches, or a description of what was found instead.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
        };
        if ok {
            Ok(())
        } else {
            Err(json_type_name(value).to_string())
        }
    }

    /// Render a validated value for URL/query placement. Strings drop their
    /// quotes; numbers and booleans use their JSON rendering.
    pub fn render(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn default_required() -> bool {
    true
}

fn default_timeout() -> f64 {
    30.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A registered REST endpoint exposed to agents as a callable tool.
///
/// `url` may contain `{param}` placeholders; every placeholder must match a
/// declared parameter. `price` is in lamports; a priced endpoint demands the
/// 402 handshake before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<EndpointParameter>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

impl EndpointDescriptor {
    /// Placeholder names appearing in the URL template, in order.
    pub fn placeholders(&self) -> Vec<String> {
        extract_placeholders(&self.url)
    }

    pub fn parameter(&self, name: &str) -> Option<&EndpointParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn is_priced(&self) -> bool {
        self.price.is_some()
    }
}

pub fn extract_placeholders(url: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = url;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        if !name.is_empty() {
            names.push(name.to_string());
        }
        rest = &rest[open + close + 1..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_extracted_in_order() {
        assert_eq!(
            extract_placeholders("https://x/users/{id}/posts/{post_id}"),
            vec!["id".to_string(), "post_id".to_string()]
        );
        assert!(extract_placeholders("https://x/users").is_empty());
        assert!(extract_placeholders("https://x/{}").is_empty());
    }

    #[test]
    fn param_type_checks_json_values() {
        assert!(ParamType::String.check(&json!("hi")).is_ok());
        assert!(ParamType::Number.check(&json!(42)).is_ok());
        assert!(ParamType::Number.check(&json!(4.5)).is_ok());
        assert!(ParamType::Boolean.check(&json!(true)).is_ok());

        assert_eq!(ParamType::Number.check(&json!("42")), Err("string".to_string()));
        assert_eq!(ParamType::String.check(&json!(1)), Err("number".to_string()));
        assert_eq!(ParamType::Boolean.check(&json!(null)), Err("null".to_string()));
    }

    #[test]
    fn render_strips_string_quotes() {
        assert_eq!(ParamType::String.render(&json!("abc")), "abc");
        assert_eq!(ParamType::Number.render(&json!(42)), "42");
        assert_eq!(ParamType::Boolean.render(&json!(false)), "false");
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let descriptor: EndpointDescriptor = serde_json::from_value(json!({
            "name": "get_user",
            "url": "https://x/users/{id}",
            "method": "GET",
            "description": "Fetch a user",
            "parameters": [{"name": "id", "type": "number"}]
        }))
        .unwrap();

        assert_eq!(descriptor.timeout, 30.0);
        assert!(descriptor.headers.is_empty());
        assert!(descriptor.price.is_none());
        assert!(descriptor.parameters[0].required);
    }
}
