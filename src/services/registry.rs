use crate::error::GatewayError;
use crate::models::EndpointDescriptor;
use crate::services::dispatcher::BUILTIN_TOOLS;
use std::sync::{Arc, RwLock};

/// Endpoint Registry: the set of dynamically registered tools.
///
/// Readers take an `Arc` snapshot, so `list` observes a consistent set even
/// while registrations run; writers swap in a fresh vector (copy-on-write).
/// Descriptors are immutable once registered; changing one is remove +
/// re-register.
pub struct EndpointRegistry {
    descriptors: RwLock<Arc<Vec<EndpointDescriptor>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn register(&self, descriptor: EndpointDescriptor) -> Result<(), GatewayError> {
        validate_descriptor(&descriptor)?;

        let mut guard = self.descriptors.write().expect("registry lock poisoned");
        if guard.iter().any(|d| d.name == descriptor.name) {
            return Err(GatewayError::DuplicateName(descriptor.name));
        }

        tracing::info!(
            name = %descriptor.name,
            method = descriptor.method.as_str(),
            url = %descriptor.url,
            priced = descriptor.is_priced(),
            "Registered endpoint"
        );

        let mut next = guard.as_ref().clone();
        next.push(descriptor);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Registration-order snapshot.
    pub fn list(&self) -> Arc<Vec<EndpointDescriptor>> {
        self.descriptors
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<EndpointDescriptor> {
        self.list().iter().find(|d| d.name == name).cloned()
    }

    /// Idempotent removal; reports whether anything was removed.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.descriptors.write().expect("registry lock poisoned");
        if !guard.iter().any(|d| d.name == name) {
            return false;
        }
        let next: Vec<EndpointDescriptor> =
            guard.iter().filter(|d| d.name != name).cloned().collect();
        *guard = Arc::new(next);
        tracing::info!(name, "Removed endpoint");
        true
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_descriptor(descriptor: &EndpointDescriptor) -> Result<(), GatewayError> {
    if descriptor.name.is_empty() {
        return Err(GatewayError::InvalidDescriptor(
            "name must not be empty".to_string(),
        ));
    }
    if !descriptor
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GatewayError::InvalidDescriptor(format!(
            "name '{}' may only contain alphanumerics, '_' and '-'",
            descriptor.name
        )));
    }
    if BUILTIN_TOOLS.contains(&descriptor.name.as_str()) {
        return Err(GatewayError::InvalidDescriptor(format!(
            "'{}' is a built-in tool name",
            descriptor.name
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for param in &descriptor.parameters {
        if !seen.insert(param.name.as_str()) {
            return Err(GatewayError::InvalidDescriptor(format!(
                "duplicate parameter '{}'",
                param.name
            )));
        }
        if let Some(default) = &param.default {
            if let Err(found) = param.param_type.check(default) {
                return Err(GatewayError::InvalidDescriptor(format!(
                    "default for '{}' is {}, declared {}",
                    param.name,
                    found,
                    param.param_type.as_str()
                )));
            }
        }
    }

    // Every URL placeholder needs a declared parameter; extra declared
    // parameters are fine (they go to the query string or body instead).
    for placeholder in descriptor.placeholders() {
        if descriptor.parameter(&placeholder).is_none() {
            return Err(GatewayError::InvalidDescriptor(format!(
                "URL placeholder '{{{}}}' has no declared parameter",
                placeholder
            )));
        }
    }

    let probe = descriptor
        .placeholders()
        .iter()
        .fold(descriptor.url.clone(), |url, p| {
            url.replace(&format!("{{{}}}", p), "probe")
        });
    let parsed = reqwest::Url::parse(&probe)
        .map_err(|e| GatewayError::InvalidDescriptor(format!("invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::InvalidDescriptor(format!(
            "unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }

    if !descriptor.timeout.is_finite() || descriptor.timeout <= 0.0 {
        return Err(GatewayError::InvalidDescriptor(
            "timeout must be positive".to_string(),
        ));
    }
    if descriptor.price == Some(0) {
        return Err(GatewayError::InvalidDescriptor(
            "price must be positive when set".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str, url: &str) -> EndpointDescriptor {
        serde_json::from_value(json!({
            "name": name,
            "url": url,
            "method": "GET",
            "parameters": [{"name": "id", "type": "number"}]
        }))
        .unwrap()
    }

    #[test]
    fn duplicate_names_rejected() {
        let registry = EndpointRegistry::new();
        registry
            .register(descriptor("get_user", "https://x/users/{id}"))
            .unwrap();
        let err = registry
            .register(descriptor("get_user", "https://x/other/{id}"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateName(_)));
    }

    #[test]
    fn remove_then_reregister_succeeds() {
        let registry = EndpointRegistry::new();
        registry
            .register(descriptor("get_user", "https://x/users/{id}"))
            .unwrap();
        assert!(registry.remove("get_user"));
        assert!(!registry.remove("get_user"));
        registry
            .register(descriptor("get_user", "https://x/users/{id}"))
            .unwrap();
    }

    #[test]
    fn undeclared_placeholder_rejected() {
        let registry = EndpointRegistry::new();
        let err = registry
            .register(descriptor("bad", "https://x/users/{user_id}"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidDescriptor(_)));
    }

    #[test]
    fn extra_declared_parameters_allowed() {
        let registry = EndpointRegistry::new();
        let d: EndpointDescriptor = serde_json::from_value(json!({
            "name": "search",
            "url": "https://x/search",
            "method": "GET",
            "parameters": [
                {"name": "q", "type": "string"},
                {"name": "limit", "type": "number", "required": false}
            ]
        }))
        .unwrap();
        registry.register(d).unwrap();
    }

    #[test]
    fn builtin_and_malformed_names_rejected() {
        let registry = EndpointRegistry::new();
        for name in ["wallet_info", "transfer", "", "has space"] {
            let err = registry
                .register(descriptor(name, "https://x/users/{id}"))
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidDescriptor(_)), "{name}");
        }
    }

    #[test]
    fn zero_price_and_bad_timeout_rejected() {
        let registry = EndpointRegistry::new();
        let mut d = descriptor("priced", "https://x/users/{id}");
        d.price = Some(0);
        assert!(registry.register(d).is_err());

        let mut d = descriptor("slow", "https://x/users/{id}");
        d.timeout = 0.0;
        assert!(registry.register(d).is_err());
    }

    #[test]
    fn unsupported_method_fails_deserialization() {
        let result: Result<EndpointDescriptor, _> = serde_json::from_value(json!({
            "name": "t",
            "url": "https://x/",
            "method": "TRACE"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn list_preserves_registration_order_and_snapshots() {
        let registry = EndpointRegistry::new();
        registry
            .register(descriptor("a", "https://x/a/{id}"))
            .unwrap();
        registry
            .register(descriptor("b", "https://x/b/{id}"))
            .unwrap();

        let snapshot = registry.list();
        registry.remove("a");

        // The held snapshot is unaffected by the concurrent removal.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].name, "a");
        assert_eq!(snapshot[1].name, "b");
        assert_eq!(registry.list().len(), 1);
    }
}
