//! Inbound request from a channel, normalized to one generic [`Event`].
//!
//! Connectors differ only in how they pull these fields out of their envelope;
//! the precedence below is shared by all of them.

use crate::choice;
use crate::error::{Error, Result};
use crate::event::Event;
use serde::Deserialize;

/// Parameter key under which an inbound referral is merged into a choice.
pub const REFERRAL_PARAMETER: &str = "_referral";

/// Channel-neutral inbound fields. This is also the web connector's wire body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    #[serde(default)]
    pub query: Option<String>,
    /// Choice token or raw intent name.
    #[serde(default)]
    pub payload: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default, rename = "ref")]
    pub referral: Option<String>,
}

impl InboundRequest {
    /// Text wins over payload, payload over referral.
    pub fn to_event(&self, application_id: &str) -> Result<Event> {
        if let Some(text) = &self.query {
            return Ok(Event::sentence(&self.user_id, application_id, text.clone()));
        }
        if let Some(payload) = &self.payload {
            let (intent, mut parameters) = choice::decode(payload)?;
            if let Some(referral) = &self.referral {
                if !parameters.insert_if_absent(REFERRAL_PARAMETER, referral.clone()) {
                    log::debug!(
                        "inbound: payload already sets {}, keeping it over the channel referral",
                        REFERRAL_PARAMETER
                    );
                }
            }
            return Ok(Event::choice(&self.user_id, application_id, intent, parameters));
        }
        if let Some(referral) = &self.referral {
            return Ok(Event::referral(&self.user_id, application_id, referral.clone()));
        }
        Err(Error::MalformedInbound("no recognizable content".to_string()))
    }

    /// The request locale when it is a well-formed language tag, otherwise `default`.
    pub fn resolve_locale(&self, default: &str) -> String {
        match self.locale.as_deref() {
            None => default.to_string(),
            Some(tag) => normalize_locale(tag).unwrap_or_else(|| {
                log::warn!("inbound: ignoring malformed locale {:?}, using {}", tag, default);
                default.to_string()
            }),
        }
    }
}

/// Normalize `fr_FR` to `fr-FR`; `None` when any subtag is empty, too long or not alphanumeric.
pub fn normalize_locale(tag: &str) -> Option<String> {
    let subtags: Vec<&str> = tag.trim().split(['-', '_']).collect();
    let well_formed = subtags
        .iter()
        .all(|s| (1..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric()));
    let primary_ok = subtags[0].chars().all(|c| c.is_ascii_alphabetic());
    (well_formed && primary_ok).then(|| subtags.join("-"))
}

/// Parse a JSON [`InboundRequest`] body.
pub fn parse_request(raw: &[u8]) -> Result<InboundRequest> {
    serde_json::from_slice(raw).map_err(|e| Error::MalformedInbound(e.to_string()))
}
