//! Structured bot responses, independent of any channel.
//!
//! [`ResponseContent`] holds exactly one top-level shape. [`MessageParts`] is the
//! loose form (every shape optional, attachment type as a string) that
//! deserializers and callers fill in; [`MessageParts::build`] is where the shape
//! invariants are checked.

use crate::choice::{self, Parameters};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    Image,
    Audio,
    Video,
    File,
}

impl AttachmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentType::Image => "image",
            AttachmentType::Audio => "audio",
            AttachmentType::Video => "video",
            AttachmentType::File => "file",
        }
    }
}

impl FromStr for AttachmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(AttachmentType::Image),
            "audio" => Ok(AttachmentType::Audio),
            "video" => Ok(AttachmentType::Video),
            "file" => Ok(AttachmentType::File),
            other => Err(Error::UnsupportedAttachmentType(other.to_string())),
        }
    }
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub url: String,
    pub name: String,
    pub attachment_type: AttachmentType,
}

impl MediaFile {
    /// Build from a wire-level type name; unknown names fail with [`Error::UnsupportedAttachmentType`].
    pub fn new(url: impl Into<String>, name: impl Into<String>, attachment_type: &str) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            name: name.into(),
            attachment_type: attachment_type.parse()?,
        })
    }
}

/// A button. Payloads are passed through untouched: choice tokens or raw intent names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
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
    Url {
        title: String,
        url: String,
    },
}

impl Button {
    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Button::Postback {
            title: title.into(),
            payload: payload.into(),
        }
    }

    pub fn quick_reply(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Button::QuickReply {
            title: title.into(),
            payload: payload.into(),
            image_url: None,
        }
    }

    pub fn url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            title: title.into(),
            url: url.into(),
        }
    }

    /// Postback whose payload is the choice token for `intent` and `params`.
    pub fn choice(
        title: impl Into<String>,
        intent: &str,
        params: &Parameters,
        max_len: Option<usize>,
    ) -> Result<Self> {
        Ok(Button::postback(title, choice::encode_bounded(intent, params, max_len)?))
    }

    /// Quick reply whose payload is the choice token for `intent` and `params`.
    pub fn quick_reply_choice(
        title: impl Into<String>,
        intent: &str,
        params: &Parameters,
        max_len: Option<usize>,
    ) -> Result<Self> {
        Ok(Button::quick_reply(title, choice::encode_bounded(intent, params, max_len)?))
    }

    pub fn title(&self) -> &str {
        match self {
            Button::Postback { title, .. }
            | Button::QuickReply { title, .. }
            | Button::Url { title, .. } => title,
        }
    }

    /// Postback or quick-reply payload; `None` for URL buttons.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Button::Postback { payload, .. } | Button::QuickReply { payload, .. } => Some(payload),
            Button::Url { .. } => None,
        }
    }
}

/// Fail with [`Error::TokenTooLong`] if any payload exceeds `max_len` bytes.
pub fn check_payload_lengths(buttons: &[Button], max_len: Option<usize>) -> Result<()> {
    let Some(max) = max_len else {
        return Ok(());
    };
    for payload in buttons.iter().filter_map(Button::payload) {
        if payload.len() > max {
            return Err(Error::TokenTooLong {
                len: payload.len(),
                max,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub subtitle: Option<String>,
    pub media: Option<MediaFile>,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub text: Option<String>,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardMessage {
    pub card: Card,
    pub buttons: Vec<Button>,
}

/// Cards in order; `buttons` sit below the carousel, not on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselMessage {
    pub cards: Vec<Card>,
    pub buttons: Vec<Button>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinkMessage {
    pub link_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseContent {
    Text(TextMessage),
    Card(CardMessage),
    Carousel(CarouselMessage),
    DeepLink(DeepLinkMessage),
}

impl ResponseContent {
    pub fn text(text: impl Into<String>) -> Self {
        ResponseContent::Text(TextMessage {
            text: Some(text.into()),
            buttons: Vec::new(),
        })
    }

    pub fn deep_link(link_id: impl Into<String>) -> Self {
        ResponseContent::DeepLink(DeepLinkMessage {
            link_id: link_id.into(),
        })
    }

    /// Shape name used in logs and [`Error::UnsupportedShape`].
    pub fn shape(&self) -> &'static str {
        match self {
            ResponseContent::Text(_) => "text",
            ResponseContent::Card(_) => "card",
            ResponseContent::Carousel(_) => "carousel",
            ResponseContent::DeepLink(_) => "deep link",
        }
    }

    /// Top-level buttons (empty for deep links).
    pub fn buttons(&self) -> &[Button] {
        match self {
            ResponseContent::Text(m) => &m.buttons,
            ResponseContent::Card(m) => &m.buttons,
            ResponseContent::Carousel(m) => &m.buttons,
            ResponseContent::DeepLink(_) => &[],
        }
    }

    /// Re-check the shape rules `MessageParts::build` enforces, for values built directly.
    pub fn validate(&self) -> Result<()> {
        MessageParts::from(self).build().map(|_| ())
    }

    /// Every button in the message, card buttons included.
    pub fn all_buttons(&self) -> Vec<&Button> {
        let mut all: Vec<&Button> = self.buttons().iter().collect();
        match self {
            ResponseContent::Card(m) => all.extend(&m.card.buttons),
            ResponseContent::Carousel(m) => {
                all.extend(m.cards.iter().flat_map(|c| &c.buttons))
            }
            _ => {}
        }
        all
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaParts {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub attachment_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardParts {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaParts>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl CardParts {
    fn build(self) -> Result<Card> {
        let media = self
            .media
            .map(|m| MediaFile::new(m.url, m.name, &m.attachment_type))
            .transpose()?;
        Ok(Card {
            title: self.title,
            subtitle: self.subtitle,
            media,
            buttons: self.buttons,
        })
    }
}

impl From<&Card> for CardParts {
    fn from(card: &Card) -> Self {
        Self {
            title: card.title.clone(),
            subtitle: card.subtitle.clone(),
            media: card.media.as_ref().map(|m| MediaParts {
                url: m.url.clone(),
                name: m.name.clone(),
                attachment_type: m.attachment_type.to_string(),
            }),
            buttons: card.buttons.clone(),
        }
    }
}

/// Unvalidated message: at most one of `text`, `card`, `carousel`, `deep_link` may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardParts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carousel: Option<Vec<CardParts>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl MessageParts {
    /// Validate and build. A message with only buttons is a text message without text.
    pub fn build(self) -> Result<ResponseContent> {
        let populated: Vec<&str> = [
            ("text", self.text.is_some()),
            ("card", self.card.is_some()),
            ("carousel", self.carousel.is_some()),
            ("deepLink", self.deep_link.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        if populated.len() > 1 {
            return Err(Error::InvalidResponseShape(format!(
                "more than one shape populated: {}",
                populated.join(", ")
            )));
        }

        let MessageParts {
            text,
            card,
            carousel,
            deep_link,
            buttons,
        } = self;

        if let Some(link_id) = deep_link {
            if !buttons.is_empty() {
                return Err(Error::InvalidResponseShape(
                    "deep link messages do not carry buttons".to_string(),
                ));
            }
            return Ok(ResponseContent::DeepLink(DeepLinkMessage { link_id }));
        }
        if let Some(card) = card {
            return Ok(ResponseContent::Card(CardMessage {
                card: card.build()?,
                buttons,
            }));
        }
        if let Some(cards) = carousel {
            if cards.is_empty() {
                return Err(Error::InvalidResponseShape(
                    "carousel has no cards".to_string(),
                ));
            }
            let cards = cards.into_iter().map(CardParts::build).collect::<Result<_>>()?;
            return Ok(ResponseContent::Carousel(CarouselMessage { cards, buttons }));
        }
        if text.is_none() && buttons.is_empty() {
            return Err(Error::InvalidResponseShape("no shape populated".to_string()));
        }
        Ok(ResponseContent::Text(TextMessage { text, buttons }))
    }
}

impl From<&ResponseContent> for MessageParts {
    fn from(content: &ResponseContent) -> Self {
        match content {
            ResponseContent::Text(m) => MessageParts {
                text: m.text.clone(),
                buttons: m.buttons.clone(),
                ..Default::default()
            },
            ResponseContent::Card(m) => MessageParts {
                card: Some(CardParts::from(&m.card)),
                buttons: m.buttons.clone(),
                ..Default::default()
            },
            ResponseContent::Carousel(m) => MessageParts {
                carousel: Some(m.cards.iter().map(CardParts::from).collect()),
                buttons: m.buttons.clone(),
                ..Default::default()
            },
            ResponseContent::DeepLink(m) => MessageParts {
                deep_link: Some(m.link_id.clone()),
                ..Default::default()
            },
        }
    }
}
