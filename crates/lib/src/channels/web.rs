//! Web widget connector: JSON request body in, `MessageContent` JSON out.
//!
//! Every response shape has a wire form here. Empty button lists are left off
//! the wire and read back as empty.

use crate::channels::inbound::{self, InboundRequest};
use crate::channels::registry::Connector;
use crate::content::{
    check_payload_lengths, Button, Card, CardParts, MediaParts, MessageParts, ResponseContent,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CONNECTOR_ID: &str = "web";

/// Wire message: at most one of `text`, `card`, `carousel`, `deepLink`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WebMessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<WebCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carousel: Option<WebCarousel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<WebDeepLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<WebButton>,
}

/// Wire button: `{ "type": "postback" | "quick_reply" | "web_url", ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebButton {
    Postback {
        title: String,
        payload: String,
    },
    QuickReply {
        title: String,
        payload: String,
        #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
    WebUrl {
        title: String,
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WebCard {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<WebMediaFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<WebButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebMediaFile {
    pub url: String,
    pub name: String,
    /// image, audio, video or file.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebCarousel {
    pub cards: Vec<WebCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WebDeepLink {
    pub link_id: String,
}

impl From<&Button> for WebButton {
    fn from(button: &Button) -> Self {
        match button.clone() {
            Button::Postback { title, payload } => WebButton::Postback { title, payload },
            Button::QuickReply {
                title,
                payload,
                image_url,
            } => WebButton::QuickReply {
                title,
                payload,
                image_url,
            },
            Button::Url { title, url } => WebButton::WebUrl { title, url },
        }
    }
}

impl From<WebButton> for Button {
    fn from(button: WebButton) -> Self {
        match button {
            WebButton::Postback { title, payload } => Button::Postback { title, payload },
            WebButton::QuickReply {
                title,
                payload,
                image_url,
            } => Button::QuickReply {
                title,
                payload,
                image_url,
            },
            WebButton::WebUrl { title, url } => Button::Url { title, url },
        }
    }
}

fn web_buttons(buttons: &[Button]) -> Vec<WebButton> {
    buttons.iter().map(WebButton::from).collect()
}

impl From<&Card> for WebCard {
    fn from(card: &Card) -> Self {
        Self {
            title: card.title.clone(),
            sub_title: card.subtitle.clone(),
            file: card.media.as_ref().map(|m| WebMediaFile {
                url: m.url.clone(),
                name: m.name.clone(),
                kind: m.attachment_type.to_string(),
            }),
            buttons: web_buttons(&card.buttons),
        }
    }
}

impl From<WebCard> for CardParts {
    fn from(card: WebCard) -> Self {
        Self {
            title: card.title,
            subtitle: card.sub_title,
            media: card.file.map(|f| MediaParts {
                url: f.url,
                name: f.name,
                attachment_type: f.kind,
            }),
            buttons: card.buttons.into_iter().map(Button::from).collect(),
        }
    }
}

impl From<&ResponseContent> for WebMessageContent {
    fn from(content: &ResponseContent) -> Self {
        match content {
            ResponseContent::Text(m) => WebMessageContent {
                text: m.text.clone(),
                buttons: web_buttons(&m.buttons),
                ..Default::default()
            },
            ResponseContent::Card(m) => WebMessageContent {
                card: Some(WebCard::from(&m.card)),
                buttons: web_buttons(&m.buttons),
                ..Default::default()
            },
            ResponseContent::Carousel(m) => WebMessageContent {
                carousel: Some(WebCarousel {
                    cards: m.cards.iter().map(WebCard::from).collect(),
                }),
                buttons: web_buttons(&m.buttons),
                ..Default::default()
            },
            ResponseContent::DeepLink(m) => WebMessageContent {
                deep_link: Some(WebDeepLink {
                    link_id: m.link_id.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<WebMessageContent> for ResponseContent {
    type Error = Error;

    fn try_from(message: WebMessageContent) -> Result<Self> {
        MessageParts {
            text: message.text,
            card: message.card.map(CardParts::from),
            carousel: message
                .carousel
                .map(|c| c.cards.into_iter().map(CardParts::from).collect()),
            deep_link: message.deep_link.map(|d| d.link_id),
            buttons: message.buttons.into_iter().map(Button::from).collect(),
        }
        .build()
    }
}

/// Web widget connector.
pub struct WebConnector {
    max_payload_len: Option<usize>,
    default_locale: String,
}

impl WebConnector {
    pub fn new(max_payload_len: Option<usize>, default_locale: String) -> Self {
        Self {
            max_payload_len,
            default_locale,
        }
    }
}

impl Connector for WebConnector {
    fn id(&self) -> &str {
        CONNECTOR_ID
    }

    fn max_payload_len(&self) -> Option<usize> {
        self.max_payload_len
    }

    fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn extract(&self, raw: &[u8]) -> Result<InboundRequest> {
        inbound::parse_request(raw)
    }

    fn serialize(&self, content: &ResponseContent) -> Result<Value> {
        content.validate()?;
        let buttons: Vec<Button> = content.all_buttons().into_iter().cloned().collect();
        check_payload_lengths(&buttons, self.max_payload_len)?;
        let wire = serde_json::to_value(WebMessageContent::from(content))
            .map_err(|e| Error::wire(CONNECTOR_ID, e.to_string()))?;
        log::debug!("{}: serialized {} message", CONNECTOR_ID, content.shape());
        Ok(wire)
    }

    fn deserialize(&self, wire: &Value) -> Result<ResponseContent> {
        let message = WebMessageContent::deserialize(wire)
            .map_err(|e| Error::wire(CONNECTOR_ID, e.to_string()))?;
        ResponseContent::try_from(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CarouselMessage, MediaFile, TextMessage};
    use crate::event::Event;
    use serde_json::json;

    fn connector() -> WebConnector {
        WebConnector::new(None, "en".to_string())
    }

    #[test]
    fn text_only_wire_form() {
        let wire = connector().serialize(&ResponseContent::text("Text only")).unwrap();
        assert_eq!(wire, json!({ "text": "Text only" }));
    }

    #[test]
    fn deep_link_wire_form() {
        let c = connector();
        let wire = c.serialize(&ResponseContent::deep_link("aaa-bbb-123")).unwrap();
        assert_eq!(wire, json!({ "deepLink": { "linkId": "aaa-bbb-123" } }));
        assert_eq!(c.deserialize(&wire).unwrap(), ResponseContent::deep_link("aaa-bbb-123"));
    }

    #[test]
    fn card_with_media_reads_from_wire() {
        let wire = json!({
            "card": {
                "title": "title",
                "subTitle": "subTitle",
                "file": { "url": "http://example.com/image.png", "name": "imageName", "type": "image" },
                "buttons": [
                    { "type": "postback", "title": "title", "payload": "payload" },
                    { "type": "web_url", "title": "title", "url": "http://example.com" }
                ]
            }
        });
        let ResponseContent::Card(message) = connector().deserialize(&wire).unwrap() else {
            panic!("expected card");
        };
        assert_eq!(message.card.subtitle.as_deref(), Some("subTitle"));
        assert_eq!(
            message.card.media,
            Some(MediaFile::new("http://example.com/image.png", "imageName", "image").unwrap())
        );
        assert_eq!(
            message.card.buttons,
            vec![
                Button::postback("title", "payload"),
                Button::url("title", "http://example.com"),
            ]
        );
        assert!(message.buttons.is_empty());
    }

    #[test]
    fn unknown_button_type_is_malformed() {
        let wire = json!({ "text": "x", "buttons": [{ "type": "call", "title": "t", "number": "1" }] });
        assert!(matches!(
            connector().deserialize(&wire),
            Err(Error::MalformedWireFormat { .. })
        ));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        assert!(matches!(
            connector().deserialize(&json!({ "text": 42 })),
            Err(Error::MalformedWireFormat { .. })
        ));
    }

    #[test]
    fn two_shapes_on_the_wire_are_rejected() {
        let wire = json!({ "text": "x", "deepLink": { "linkId": "y" } });
        assert!(matches!(
            connector().deserialize(&wire),
            Err(Error::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn unknown_media_type_on_the_wire_is_rejected() {
        let wire = json!({ "card": { "title": "t", "file": { "url": "u", "name": "n", "type": "sticker" } } });
        assert_eq!(
            connector().deserialize(&wire),
            Err(Error::UnsupportedAttachmentType("sticker".to_string()))
        );
    }

    #[test]
    fn oversized_payload_is_refused() {
        let c = WebConnector::new(Some(8), "en".to_string());
        let content = ResponseContent::Text(TextMessage {
            text: None,
            buttons: vec![Button::quick_reply("go", "a_rather_long_intent")],
        });
        assert_eq!(
            c.serialize(&content),
            Err(Error::TokenTooLong { len: 20, max: 8 })
        );
    }

    #[test]
    fn invalid_directly_built_content_is_not_serialized() {
        let c = connector();
        let empty_carousel = ResponseContent::Carousel(CarouselMessage {
            cards: Vec::new(),
            buttons: vec![Button::postback("r", "r")],
        });
        assert!(matches!(
            c.serialize(&empty_carousel),
            Err(Error::InvalidResponseShape(_))
        ));
        let empty_text = ResponseContent::Text(TextMessage {
            text: None,
            buttons: Vec::new(),
        });
        assert!(matches!(
            c.serialize(&empty_text),
            Err(Error::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn parses_inbound_body() {
        let event = connector()
            .parse(br#"{"query":"hello","userId":"u1","locale":"fr_FR"}"#, "app")
            .unwrap();
        assert_eq!(event, Event::sentence("u1", "app", "hello"));
    }
}
