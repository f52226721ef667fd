use crate::error::GatewayError;
use crate::models::{
    EndpointDescriptor, PaymentProof, PropertySchema, ToolDefinition, ToolInputSchema, ToolOutcome,
};
use crate::services::negotiator::PaymentNegotiator;
use crate::services::registry::EndpointRegistry;
use crate::services::stats::GatewayStats;
use crate::services::wallet::WalletService;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Native tools served by the gateway itself; these names are reserved in
/// the registry.
pub const BUILTIN_TOOLS: [&str; 2] = ["wallet_info", "transfer"];

/// Tool Dispatcher: resolves a tool call to either a built-in capability or
/// a registered endpoint, enforcing the payment handshake for priced tools.
pub struct ToolDispatcher {
    registry: Arc<EndpointRegistry>,
    negotiator: Option<Arc<PaymentNegotiator>>,
    wallet: Option<Arc<WalletService>>,
    stats: Arc<GatewayStats>,
    http: reqwest::Client,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        negotiator: Option<Arc<PaymentNegotiator>>,
        wallet: Option<Arc<WalletService>>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            registry,
            negotiator,
            wallet,
            stats,
            http: reqwest::Client::new(),
        }
    }

    /// Everything an agent can call: built-ins first, then registered
    /// endpoints in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = builtin_definitions();
        tools.extend(
            self.registry
                .list()
                .iter()
                .map(ToolDefinition::from_descriptor),
        );
        tools
    }

    pub async fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        proof: Option<PaymentProof>,
    ) -> Result<ToolOutcome, GatewayError> {
        self.stats.record_tool_call();

        if BUILTIN_TOOLS.contains(&name) {
            return self.invoke_builtin(name, &arguments).await;
        }

        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| GatewayError::ToolNotFound(name.to_string()))?;

        let validated = validate_arguments(&descriptor, arguments)?;

        if let Some(price) = descriptor.price {
            let negotiator = self
                .negotiator
                .as_ref()
                .ok_or(GatewayError::WalletUnavailable)?;
            match proof {
                None => {
                    self.stats.record_requirement();
                    let requirement = negotiator.require(&descriptor.name, price).await;
                    return Err(GatewayError::PaymentRequired(requirement));
                }
                Some(proof) => {
                    let settled = negotiator.settle(&proof, &descriptor.name).await?;
                    self.stats.record_settlement(settled.amount);
                }
            }
        }

        self.execute(&descriptor, validated).await
    }

    async fn invoke_builtin(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutcome, GatewayError> {
        let wallet = self.wallet.as_ref().ok_or(GatewayError::WalletUnavailable)?;

        let data = match name {
            "wallet_info" => {
                let balance = wallet.get_balance().await?;
                json!({
                    "address": wallet.address(),
                    "balance": balance,
                    "transactions": wallet.recent(5).await,
                })
            }
            "transfer" => {
                let recipient = arguments
                    .get("recipient")
                    .ok_or_else(|| {
                        GatewayError::MissingRequiredParameter("recipient".to_string())
                    })?
                    .as_str()
                    .ok_or_else(|| GatewayError::TypeMismatch {
                        parameter: "recipient".to_string(),
                        expected: "string".to_string(),
                        found: "non-string".to_string(),
                    })?;
                let amount = arguments
                    .get("amount")
                    .ok_or_else(|| GatewayError::MissingRequiredParameter("amount".to_string()))?
                    .as_u64()
                    .ok_or(GatewayError::InvalidAmount(0))?;
                let record = wallet.transfer(recipient, amount).await?;
                json!(record)
            }
            _ => unreachable!("unknown builtin"),
        };

        Ok(ToolOutcome {
            tool: name.to_string(),
            status: 200,
            data,
        })
    }

    /// Perform the outbound call for a registered endpoint. Never retried:
    /// the wrapped API may not be idempotent, so retrying is the agent's
    /// decision.
    async fn execute(
        &self,
        descriptor: &EndpointDescriptor,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutcome, GatewayError> {
        let mut url = descriptor.url.clone();
        let mut path_consumed = Vec::new();
        for placeholder in descriptor.placeholders() {
            let value = arguments.get(&placeholder).ok_or_else(|| {
                GatewayError::MissingRequiredParameter(placeholder.clone())
            })?;
            let param = descriptor
                .parameter(&placeholder)
                .expect("validated at registration");
            url = url.replace(
                &format!("{{{}}}", placeholder),
                &param.param_type.render(value),
            );
            path_consumed.push(placeholder);
        }

        let remaining: Map<String, Value> = arguments
            .into_iter()
            .filter(|(name, _)| !path_consumed.contains(name))
            .collect();

        let mut request = self
            .http
            .request(descriptor.method.into(), &url)
            .timeout(Duration::from_secs_f64(descriptor.timeout));

        for (key, value) in &descriptor.headers {
            request = request.header(key, value);
        }

        if descriptor.method.uses_query() {
            let query: Vec<(String, String)> = remaining
                .iter()
                .map(|(name, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), rendered)
                })
                .collect();
            request = request.query(&query);
        } else {
            request = request.json(&Value::Object(remaining));
        }

        tracing::info!(
            tool = %descriptor.name,
            method = descriptor.method.as_str(),
            %url,
            "Dispatching tool call"
        );

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::UpstreamTimeout {
                    seconds: descriptor.timeout,
                }
            } else {
                GatewayError::UpstreamUnreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;

        let data = if is_json {
            serde_json::from_str(&body).unwrap_or(Value::String(body.clone()))
        } else {
            Value::String(body.clone())
        };

        if status.is_success() {
            tracing::info!(tool = %descriptor.name, status = status.as_u16(), "Tool call succeeded");
            return Ok(ToolOutcome {
                tool: descriptor.name.clone(),
                status: status.as_u16(),
                data,
            });
        }

        // The wrapped API's own 402 travels through untouched so the agent
        // sees the deeper payment requirement.
        if status.as_u16() == 402 {
            tracing::info!(tool = %descriptor.name, "Upstream demands payment, passing through");
            return Ok(ToolOutcome {
                tool: descriptor.name.clone(),
                status: 402,
                data,
            });
        }

        tracing::warn!(tool = %descriptor.name, status = status.as_u16(), "Upstream error");
        Err(GatewayError::UpstreamError {
            status: status.as_u16(),
            body,
        })
    }
}

/// Type-check supplied arguments, fill declared defaults, reject unknowns.
fn validate_arguments(
    descriptor: &EndpointDescriptor,
    arguments: Map<String, Value>,
) -> Result<Map<String, Value>, GatewayError> {
    for name in arguments.keys() {
        if descriptor.parameter(name).is_none() {
            return Err(GatewayError::UnknownParameter(name.clone()));
        }
    }

    let mut validated = Map::new();
    for param in &descriptor.parameters {
        match arguments.get(&param.name) {
            Some(value) => {
                param.param_type.check(value).map_err(|found| {
                    GatewayError::TypeMismatch {
                        parameter: param.name.clone(),
                        expected: param.param_type.as_str().to_string(),
                        found,
                    }
                })?;
                validated.insert(param.name.clone(), value.clone());
            }
            None => {
                if let Some(default) = &param.default {
                    validated.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(GatewayError::MissingRequiredParameter(param.name.clone()));
                }
            }
        }
    }
    Ok(validated)
}

fn builtin_definitions() -> Vec<ToolDefinition> {
    let wallet_info = ToolDefinition {
        name: "wallet_info".to_string(),
        description: "Gateway wallet address, balance and recent transactions".to_string(),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        },
        price: None,
    };

    let mut transfer_props = BTreeMap::new();
    transfer_props.insert(
        "recipient".to_string(),
        PropertySchema {
            schema_type: "string".to_string(),
            description: "Recipient address (base58)".to_string(),
            default: None,
        },
    );
    transfer_props.insert(
        "amount".to_string(),
        PropertySchema {
            schema_type: "number".to_string(),
            description: "Amount in lamports".to_string(),
            default: None,
        },
    );
    let transfer = ToolDefinition {
        name: "transfer".to_string(),
        description: "Sign and submit a transfer from the gateway wallet".to_string(),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties: transfer_props,
            required: vec!["amount".to_string(), "recipient".to_string()],
        },
        price: None,
    };

    vec![wallet_info, transfer]
}
