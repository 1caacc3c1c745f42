//! Connector trait and registry: lookup connectors by id.
//!
//! The registry is built once from config at start and only read afterwards,
//! so it needs no locking.

use crate::channels::inbound::InboundRequest;
use crate::channels::{SlackConnector, WebConnector};
use crate::config::{self, Config};
use crate::content::ResponseContent;
use crate::error::{Error, Result};
use crate::event::Event;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One channel's translation: inbound envelope extraction and outbound wire format.
pub trait Connector: Send + Sync {
    /// Connector id (e.g. "web").
    fn id(&self) -> &str;

    /// Longest button payload the channel accepts, in bytes.
    fn max_payload_len(&self) -> Option<usize>;

    /// Locale applied to requests that carry none.
    fn default_locale(&self) -> &str;

    /// Pull the generic inbound fields out of the channel's raw body.
    fn extract(&self, raw: &[u8]) -> Result<InboundRequest>;

    /// Raw inbound body to one event.
    fn parse(&self, raw: &[u8], application_id: &str) -> Result<Event> {
        let request = self.extract(raw)?;
        let event = request.to_event(application_id)?;
        log::debug!(
            "{}: inbound from {} ({}) parsed as {}",
            self.id(),
            request.user_id,
            request.resolve_locale(self.default_locale()),
            event.kind()
        );
        Ok(event)
    }

    /// One message to the channel's wire JSON.
    fn serialize(&self, content: &ResponseContent) -> Result<Value>;

    /// Wire JSON back to one message.
    fn deserialize(&self, wire: &Value) -> Result<ResponseContent>;

    /// Messages wrapped as `{ "responses": [...] }`. Fails on the first message that cannot be serialized.
    fn serialize_responses(&self, contents: &[ResponseContent]) -> Result<Value> {
        let responses = contents
            .iter()
            .map(|c| self.serialize(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(json!({ "responses": responses }))
    }

    fn deserialize_responses(&self, wire: &Value) -> Result<Vec<ResponseContent>> {
        let responses = wire
            .get("responses")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::wire(self.id(), "missing responses array"))?;
        responses.iter().map(|r| self.deserialize(r)).collect()
    }
}

/// Registry of connector ids to connectors.
pub struct ConnectorRegistry {
    inner: BTreeMap<String, Arc<dyn Connector>>,
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Register every connector enabled in config.
    pub fn from_config(config: &Config) -> Self {
        let locale = config::resolve_default_locale(config);
        let mut registry = Self::new();
        if config.connectors.web.enabled {
            registry.register(Arc::new(WebConnector::new(
                config.connectors.web.max_payload_length,
                locale.clone(),
            )));
        }
        if config.connectors.slack.enabled {
            registry.register(Arc::new(SlackConnector::new(
                config.connectors.slack.max_payload_length,
                locale,
            )));
        }
        registry
    }

    /// Register under the connector's own id, replacing any earlier one.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let id = connector.id().to_string();
        if self.inner.insert(id.clone(), connector).is_some() {
            log::warn!("connector {} registered twice, keeping the latest", id);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Connector>> {
        self.inner.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_registers_web_and_slack() {
        let registry = ConnectorRegistry::from_config(&Config::default());
        assert_eq!(registry.ids(), vec!["slack".to_string(), "web".to_string()]);
        assert_eq!(registry.get("slack").unwrap().max_payload_len(), Some(2000));
        assert_eq!(registry.get("web").unwrap().max_payload_len(), None);
        assert!(registry.get("messenger").is_none());
    }

    #[test]
    fn disabled_connectors_are_skipped() {
        let mut config = Config::default();
        config.connectors.slack.enabled = false;
        let registry = ConnectorRegistry::from_config(&config);
        assert_eq!(registry.ids(), vec!["web".to_string()]);
    }

    #[test]
    fn batch_envelope_wraps_each_message() {
        let web = WebConnector::new(None, "en".to_string());
        let contents = vec![ResponseContent::text("a"), ResponseContent::deep_link("b")];
        let wire = web.serialize_responses(&contents).unwrap();
        assert_eq!(wire["responses"].as_array().map(Vec::len), Some(2));
        assert_eq!(web.deserialize_responses(&wire).unwrap(), contents);
        assert!(matches!(
            web.deserialize_responses(&json!({ "messages": [] })),
            Err(Error::MalformedWireFormat { .. })
        ));
    }
}
