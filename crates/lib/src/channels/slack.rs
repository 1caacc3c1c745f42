//! Slack connector: Events API / interaction payloads in, Block Kit messages out.
//!
//! Each block's `block_id` names its role so a message reads back exactly:
//! `text`, `buttons`, `card.<role>`, `carousel.<i>.<role>`, where role is
//! `title`, `subtitle`, `media`, `media.<type>`, `buttons` or `end`. Button
//! `action_id`s are `<kind>:<block_id>:<n>`.
//!
//! Fixed policy: carousels flatten to consecutive card blocks split by
//! dividers. Deep links and quick replies with an image are rejected, as are
//! actions blocks over 25 elements, messages over 50 blocks, card titles that
//! are empty or over 150 characters and button labels that are empty or over
//! 75 characters. Only the first action of an interaction is read. The inbound
//! body is the JSON payload itself; form decoding belongs to the transport.

use crate::channels::inbound::InboundRequest;
use crate::channels::registry::Connector;
use crate::content::{
    check_payload_lengths, AttachmentType, Button, Card, CardParts, MediaParts, MessageParts,
    ResponseContent,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CONNECTOR_ID: &str = "slack";
const MAX_BLOCKS: usize = 50;
const MAX_ACTIONS: usize = 25;
const MAX_HEADER_CHARS: usize = 150;
const MAX_BUTTON_CHARS: usize = 75;

/// Plain text for a header or button: non-empty and at most `max` characters.
fn check_text(text: &str, max: usize, what: &str) -> Result<()> {
    let len = text.chars().count();
    if len == 0 || len > max {
        return Err(Error::unsupported(
            CONNECTOR_ID,
            format!("{} text of {} characters (1 to {} allowed)", what, len, max),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SlackMessage {
    /// Notification fallback; ignored when reading back.
    #[serde(default)]
    text: String,
    blocks: Vec<SlackBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackBlock {
    Section {
        block_id: String,
        text: SlackText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accessory: Option<SlackElement>,
    },
    Header {
        block_id: String,
        text: SlackText,
    },
    Context {
        block_id: String,
        elements: Vec<SlackText>,
    },
    Image {
        block_id: String,
        image_url: String,
        alt_text: String,
    },
    Actions {
        block_id: String,
        elements: Vec<SlackElement>,
    },
    Divider {
        block_id: String,
    },
}

impl SlackBlock {
    fn block_id(&self) -> &str {
        match self {
            SlackBlock::Section { block_id, .. }
            | SlackBlock::Header { block_id, .. }
            | SlackBlock::Context { block_id, .. }
            | SlackBlock::Image { block_id, .. }
            | SlackBlock::Actions { block_id, .. }
            | SlackBlock::Divider { block_id } => block_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SlackText {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verbatim: Option<bool>,
}

impl SlackText {
    fn plain(text: &str) -> Self {
        Self {
            kind: "plain_text".to_string(),
            text: text.to_string(),
            verbatim: None,
        }
    }

    fn mrkdwn(text: &str) -> Self {
        Self {
            kind: "mrkdwn".to_string(),
            text: text.to_string(),
            verbatim: Some(true),
        }
    }
}

/// Button element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SlackElement {
    #[serde(rename = "type")]
    kind: String,
    action_id: String,
    text: SlackText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

fn button_element(button: &Button, block_id: &str, n: usize) -> Result<SlackElement> {
    let (kind, value, url) = match button {
        Button::Postback { payload, .. } => ("postback", Some(payload.clone()), None),
        Button::QuickReply {
            image_url: Some(_), ..
        } => return Err(Error::unsupported(CONNECTOR_ID, "quick reply with image")),
        Button::QuickReply { payload, .. } => ("quick_reply", Some(payload.clone()), None),
        Button::Url { url, .. } => ("url", None, Some(url.clone())),
    };
    check_text(button.title(), MAX_BUTTON_CHARS, "button")?;
    Ok(SlackElement {
        kind: "button".to_string(),
        action_id: format!("{}:{}:{}", kind, block_id, n),
        text: SlackText::plain(button.title()),
        value,
        url,
    })
}

fn element_button(element: SlackElement) -> Result<Button> {
    let kind = element.action_id.split(':').next().unwrap_or_default();
    let title = element.text.text;
    let missing = |field: &str| {
        Error::wire(
            CONNECTOR_ID,
            format!("button {} has no {}", element.action_id, field),
        )
    };
    match kind {
        "postback" => Ok(Button::Postback {
            title,
            payload: element.value.clone().ok_or_else(|| missing("value"))?,
        }),
        "quick_reply" => Ok(Button::QuickReply {
            title,
            payload: element.value.clone().ok_or_else(|| missing("value"))?,
            image_url: None,
        }),
        "url" => Ok(Button::Url {
            title,
            url: element.url.clone().ok_or_else(|| missing("url"))?,
        }),
        other => Err(Error::wire(
            CONNECTOR_ID,
            format!("unknown button kind {:?}", other),
        )),
    }
}

fn push_actions(blocks: &mut Vec<SlackBlock>, block_id: String, buttons: &[Button]) -> Result<()> {
    if buttons.is_empty() {
        return Ok(());
    }
    if buttons.len() > MAX_ACTIONS {
        return Err(Error::unsupported(
            CONNECTOR_ID,
            format!("more than {} buttons in one block", MAX_ACTIONS),
        ));
    }
    let elements = buttons
        .iter()
        .enumerate()
        .map(|(n, b)| button_element(b, &block_id, n))
        .collect::<Result<_>>()?;
    blocks.push(SlackBlock::Actions { block_id, elements });
    Ok(())
}

fn push_card(blocks: &mut Vec<SlackBlock>, prefix: &str, card: &Card) -> Result<()> {
    check_text(&card.title, MAX_HEADER_CHARS, "header")?;
    blocks.push(SlackBlock::Header {
        block_id: format!("{}.title", prefix),
        text: SlackText::plain(&card.title),
    });
    if let Some(subtitle) = &card.subtitle {
        blocks.push(SlackBlock::Context {
            block_id: format!("{}.subtitle", prefix),
            elements: vec![SlackText::mrkdwn(subtitle)],
        });
    }
    match &card.media {
        Some(media) if media.attachment_type == AttachmentType::Image => {
            blocks.push(SlackBlock::Image {
                block_id: format!("{}.media", prefix),
                image_url: media.url.clone(),
                alt_text: media.name.clone(),
            })
        }
        Some(media) => blocks.push(SlackBlock::Section {
            block_id: format!("{}.media.{}", prefix, media.attachment_type),
            text: SlackText::plain(&media.name),
            accessory: Some(SlackElement {
                kind: "button".to_string(),
                action_id: format!("url:{}.media:0", prefix),
                text: SlackText::plain("Open"),
                value: None,
                url: Some(media.url.clone()),
            }),
        }),
        None => {}
    }
    push_actions(blocks, format!("{}.buttons", prefix), &card.buttons)
}

fn to_slack(content: &ResponseContent) -> Result<SlackMessage> {
    let mut blocks = Vec::new();
    let fallback = match content {
        ResponseContent::Text(m) => {
            if let Some(text) = &m.text {
                blocks.push(SlackBlock::Section {
                    block_id: "text".to_string(),
                    text: SlackText::mrkdwn(text),
                    accessory: None,
                });
            }
            m.text.clone().unwrap_or_default()
        }
        ResponseContent::Card(m) => {
            push_card(&mut blocks, "card", &m.card)?;
            m.card.title.clone()
        }
        ResponseContent::Carousel(m) => {
            for (i, card) in m.cards.iter().enumerate() {
                if i > 0 {
                    blocks.push(SlackBlock::Divider {
                        block_id: format!("carousel.{}.end", i - 1),
                    });
                }
                push_card(&mut blocks, &format!("carousel.{}", i), card)?;
            }
            m.cards.first().map(|c| c.title.clone()).unwrap_or_default()
        }
        ResponseContent::DeepLink(_) => {
            return Err(Error::unsupported(CONNECTOR_ID, content.shape()))
        }
    };
    push_actions(&mut blocks, "buttons".to_string(), content.buttons())?;
    if blocks.len() > MAX_BLOCKS {
        return Err(Error::unsupported(
            CONNECTOR_ID,
            format!("more than {} blocks", MAX_BLOCKS),
        ));
    }
    Ok(SlackMessage {
        text: fallback,
        blocks,
    })
}

/// Which part of the message a block belongs to.
enum Target {
    Message,
    Card,
    Carousel(usize),
}

fn classify(block_id: &str) -> Result<(Target, &str)> {
    if block_id == "text" || block_id == "buttons" {
        return Ok((Target::Message, block_id));
    }
    if let Some(role) = block_id.strip_prefix("card.") {
        return Ok((Target::Card, role));
    }
    if let Some((index, role)) = block_id
        .strip_prefix("carousel.")
        .and_then(|rest| rest.split_once('.'))
    {
        if let Ok(i) = index.parse() {
            return Ok((Target::Carousel(i), role));
        }
    }
    Err(Error::wire(
        CONNECTOR_ID,
        format!("unknown block_id {:?}", block_id),
    ))
}

fn unexpected(block_id: &str) -> Error {
    Error::wire(
        CONNECTOR_ID,
        format!("block {:?} is out of place or has the wrong type", block_id),
    )
}

fn apply_card_block(card: &mut CardParts, role: &str, block: SlackBlock) -> Result<()> {
    let block_id = block.block_id().to_string();
    match (role, block) {
        ("subtitle", SlackBlock::Context { mut elements, .. })
            if card.subtitle.is_none() && elements.len() == 1 =>
        {
            card.subtitle = elements.pop().map(|t| t.text);
        }
        ("media", SlackBlock::Image {
            image_url,
            alt_text,
            ..
        }) if card.media.is_none() => {
            card.media = Some(MediaParts {
                url: image_url,
                name: alt_text,
                attachment_type: AttachmentType::Image.to_string(),
            });
        }
        (role, SlackBlock::Section {
            text,
            accessory: Some(SlackElement { url: Some(url), .. }),
            ..
        }) if role.starts_with("media.") && card.media.is_none() => {
            card.media = Some(MediaParts {
                url,
                name: text.text,
                attachment_type: role["media.".len()..].to_string(),
            });
        }
        ("buttons", SlackBlock::Actions { elements, .. }) if card.buttons.is_empty() => {
            card.buttons = elements
                .into_iter()
                .map(element_button)
                .collect::<Result<_>>()?;
        }
        _ => return Err(unexpected(&block_id)),
    }
    Ok(())
}

fn new_card(role: &str, block: SlackBlock) -> Result<CardParts> {
    match (role, block) {
        ("title", SlackBlock::Header { text, .. }) => Ok(CardParts {
            title: text.text,
            ..Default::default()
        }),
        (_, block) => Err(unexpected(block.block_id())),
    }
}

fn from_slack(message: SlackMessage) -> Result<ResponseContent> {
    let mut parts = MessageParts::default();
    let mut card: Option<CardParts> = None;
    let mut carousel: Vec<CardParts> = Vec::new();

    for block in message.blocks {
        let block_id = block.block_id().to_string();
        match classify(&block_id)? {
            (Target::Message, "text") => match block {
                SlackBlock::Section {
                    text,
                    accessory: None,
                    ..
                } if parts.text.is_none() => parts.text = Some(text.text),
                _ => return Err(unexpected(&block_id)),
            },
            (Target::Message, _) => match block {
                SlackBlock::Actions { elements, .. } if parts.buttons.is_empty() => {
                    parts.buttons = elements
                        .into_iter()
                        .map(element_button)
                        .collect::<Result<_>>()?;
                }
                _ => return Err(unexpected(&block_id)),
            },
            (Target::Card, role) => match card.as_mut() {
                None => card = Some(new_card(role, block)?),
                Some(c) => apply_card_block(c, role, block)?,
            },
            (Target::Carousel(i), role) if i == carousel.len() => {
                carousel.push(new_card(role, block)?);
            }
            (Target::Carousel(i), "end") if i + 1 == carousel.len() => match block {
                SlackBlock::Divider { .. } => {}
                _ => return Err(unexpected(&block_id)),
            },
            (Target::Carousel(i), role) if i + 1 == carousel.len() => {
                if let Some(c) = carousel.last_mut() {
                    apply_card_block(c, role, block)?;
                }
            }
            (Target::Carousel(_), _) => return Err(unexpected(&block_id)),
        }
    }

    parts.card = card;
    if !carousel.is_empty() {
        parts.carousel = Some(carousel);
    }
    parts.build()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackInbound {
    EventCallback { event: SlackMessageEvent },
    BlockActions {
        user: SlackUser,
        actions: Vec<SlackAction>,
    },
}

#[derive(Debug, Deserialize)]
struct SlackMessageEvent {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SlackAction {
    #[serde(default)]
    value: Option<String>,
}

/// Slack Block Kit connector.
pub struct SlackConnector {
    max_payload_len: Option<usize>,
    default_locale: String,
}

impl SlackConnector {
    pub fn new(max_payload_len: Option<usize>, default_locale: String) -> Self {
        Self {
            max_payload_len,
            default_locale,
        }
    }
}

impl Connector for SlackConnector {
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
        let inbound: SlackInbound =
            serde_json::from_slice(raw).map_err(|e| Error::MalformedInbound(e.to_string()))?;
        match inbound {
            SlackInbound::EventCallback { event } => Ok(InboundRequest {
                query: event.text,
                user_id: event.user.ok_or_else(|| {
                    Error::MalformedInbound("message event has no user".to_string())
                })?,
                ..Default::default()
            }),
            SlackInbound::BlockActions { user, actions } => Ok(InboundRequest {
                payload: actions.into_iter().next().and_then(|a| a.value),
                user_id: user.id,
                ..Default::default()
            }),
        }
    }

    fn serialize(&self, content: &ResponseContent) -> Result<Value> {
        content.validate()?;
        let buttons: Vec<Button> = content.all_buttons().into_iter().cloned().collect();
        check_payload_lengths(&buttons, self.max_payload_len)?;
        let message = to_slack(content)?;
        log::debug!(
            "{}: serialized {} message into {} blocks",
            CONNECTOR_ID,
            content.shape(),
            message.blocks.len()
        );
        serde_json::to_value(message).map_err(|e| Error::wire(CONNECTOR_ID, e.to_string()))
    }

    fn deserialize(&self, wire: &Value) -> Result<ResponseContent> {
        let message = SlackMessage::deserialize(wire)
            .map_err(|e| Error::wire(CONNECTOR_ID, e.to_string()))?;
        from_slack(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CardMessage, CarouselMessage, MediaFile, TextMessage};
    use crate::event::Event;
    use serde_json::json;

    fn connector() -> SlackConnector {
        SlackConnector::new(Some(2000), "en".to_string())
    }

    fn card(title: &str, media: Option<MediaFile>) -> Card {
        Card {
            title: title.to_string(),
            subtitle: Some(format!("about {}", title)),
            media,
            buttons: vec![Button::postback(format!("pick {}", title), title)],
        }
    }

    #[test]
    fn text_with_buttons_wire_form() {
        let content = ResponseContent::Text(TextMessage {
            text: Some("*Hi*".to_string()),
            buttons: vec![Button::postback("Yes", "yes"), Button::url("Docs", "http://example.com")],
        });
        let wire = connector().serialize(&content).unwrap();
        assert_eq!(
            wire,
            json!({
                "text": "*Hi*",
                "blocks": [
                    { "type": "section", "block_id": "text",
                      "text": { "type": "mrkdwn", "text": "*Hi*", "verbatim": true } },
                    { "type": "actions", "block_id": "buttons", "elements": [
                        { "type": "button", "action_id": "postback:buttons:0",
                          "text": { "type": "plain_text", "text": "Yes" }, "value": "yes" },
                        { "type": "button", "action_id": "url:buttons:1",
                          "text": { "type": "plain_text", "text": "Docs" }, "url": "http://example.com" }
                    ] }
                ]
            })
        );
        assert_eq!(connector().deserialize(&wire).unwrap(), content);
    }

    #[test]
    fn card_with_non_image_media_round_trips() {
        let media = MediaFile::new("http://example.com/clip.mp4", "clip", "video").unwrap();
        let content = ResponseContent::Card(CardMessage {
            card: card("film", Some(media)),
            buttons: vec![Button::quick_reply("more", "more")],
        });
        let wire = connector().serialize(&content).unwrap();
        assert_eq!(wire["blocks"][2]["block_id"], "card.media.video");
        assert_eq!(connector().deserialize(&wire).unwrap(), content);
    }

    #[test]
    fn deep_link_is_unsupported() {
        assert!(matches!(
            connector().serialize(&ResponseContent::deep_link("x")),
            Err(Error::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn quick_reply_image_is_unsupported() {
        let content = ResponseContent::Text(TextMessage {
            text: Some("pick".to_string()),
            buttons: vec![Button::QuickReply {
                title: "a".to_string(),
                payload: "a".to_string(),
                image_url: Some("http://example.com/a.png".to_string()),
            }],
        });
        assert!(matches!(
            connector().serialize(&content),
            Err(Error::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn too_many_buttons_is_unsupported() {
        let content = ResponseContent::Text(TextMessage {
            text: None,
            buttons: (0..26).map(|i| Button::postback(i.to_string(), i.to_string())).collect(),
        });
        assert!(matches!(
            connector().serialize(&content),
            Err(Error::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn invalid_directly_built_content_is_not_serialized() {
        let empty_carousel = ResponseContent::Carousel(CarouselMessage {
            cards: Vec::new(),
            buttons: vec![Button::postback("r", "r")],
        });
        assert!(matches!(
            connector().serialize(&empty_carousel),
            Err(Error::InvalidResponseShape(_))
        ));
        let empty_text = ResponseContent::Text(TextMessage {
            text: None,
            buttons: Vec::new(),
        });
        assert!(matches!(
            connector().serialize(&empty_text),
            Err(Error::InvalidResponseShape(_))
        ));
    }

    #[test]
    fn header_and_button_text_limits_are_enforced() {
        let card_titled = |title: String| {
            ResponseContent::Card(CardMessage {
                card: Card {
                    title,
                    subtitle: None,
                    media: None,
                    buttons: Vec::new(),
                },
                buttons: Vec::new(),
            })
        };
        assert!(connector().serialize(&card_titled("é".repeat(150))).is_ok());
        for bad in [String::new(), "t".repeat(151)] {
            assert!(matches!(
                connector().serialize(&card_titled(bad)),
                Err(Error::UnsupportedShape { .. })
            ));
        }
        let long_button = ResponseContent::Text(TextMessage {
            text: Some("pick".to_string()),
            buttons: vec![Button::postback("b".repeat(76), "p")],
        });
        assert!(matches!(
            connector().serialize(&long_button),
            Err(Error::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn payload_over_slack_limit_is_refused() {
        let content = ResponseContent::Text(TextMessage {
            text: None,
            buttons: vec![Button::postback("big", "x".repeat(2001))],
        });
        assert_eq!(
            connector().serialize(&content),
            Err(Error::TokenTooLong { len: 2001, max: 2000 })
        );
    }

    #[test]
    fn out_of_order_carousel_blocks_are_malformed() {
        let wire = json!({
            "text": "",
            "blocks": [
                { "type": "header", "block_id": "carousel.1.title",
                  "text": { "type": "plain_text", "text": "second" } }
            ]
        });
        assert!(matches!(
            connector().deserialize(&wire),
            Err(Error::MalformedWireFormat { .. })
        ));
    }

    #[test]
    fn unknown_block_id_is_malformed() {
        let wire = json!({
            "blocks": [{ "type": "divider", "block_id": "footer" }]
        });
        assert!(matches!(
            connector().deserialize(&wire),
            Err(Error::MalformedWireFormat { .. })
        ));
    }

    #[test]
    fn message_event_becomes_sentence() {
        let raw = br#"{"type":"event_callback","team_id":"T1","event":{"type":"message","user":"U1","text":"hello"}}"#;
        assert_eq!(
            connector().parse(raw, "app").unwrap(),
            Event::sentence("U1", "app", "hello")
        );
    }

    #[test]
    fn block_action_becomes_choice() {
        let raw = br#"{"type":"block_actions","user":{"id":"U1","name":"ann"},
            "actions":[{"action_id":"postback:buttons:0","value":"book&city=Paris"}]}"#;
        let Event::Choice(choice) = connector().parse(raw, "app").unwrap() else {
            panic!("expected choice");
        };
        assert_eq!(choice.intent_name, "book");
        assert_eq!(choice.parameters.get("city"), Some("Paris"));
    }

    #[test]
    fn only_the_first_action_is_read() {
        let raw = br#"{"type":"block_actions","user":{"id":"U1"},
            "actions":[{"action_id":"url:buttons:0"},{"action_id":"postback:buttons:1","value":"greet"}]}"#;
        assert_eq!(connector().extract(raw).unwrap().payload, None);
        assert!(matches!(
            connector().parse(raw, "app"),
            Err(Error::MalformedInbound(_))
        ));
    }

    #[test]
    fn url_button_click_has_no_content() {
        let raw = br#"{"type":"block_actions","user":{"id":"U1"},"actions":[{"action_id":"url:buttons:1"}]}"#;
        assert!(matches!(
            connector().parse(raw, "app"),
            Err(Error::MalformedInbound(_))
        ));
    }

    #[test]
    fn unsupported_envelope_is_malformed() {
        let raw = br#"{"type":"url_verification","challenge":"abc"}"#;
        assert!(matches!(
            connector().extract(raw),
            Err(Error::MalformedInbound(_))
        ));
    }
}
