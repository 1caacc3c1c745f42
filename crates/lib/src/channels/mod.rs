//! Channel connectors (web widget, Slack).
//!
//! Each connector turns its channel's inbound body into one generic event and
//! serializes generic responses into its wire JSON (and back). The registry
//! selects a connector by id at the transport boundary.

mod inbound;
mod registry;
mod slack;
mod web;

pub use inbound::{normalize_locale, parse_request, InboundRequest, REFERRAL_PARAMETER};
pub use registry::{Connector, ConnectorRegistry};
pub use slack::SlackConnector;
pub use web::{
    WebButton, WebCard, WebCarousel, WebConnector, WebDeepLink, WebMediaFile, WebMessageContent,
};
