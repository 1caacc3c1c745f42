//! Generic conversation events handed to the dialog engine.
//!
//! The set is closed: every inbound payload becomes exactly one [`Event`],
//! whatever channel it arrived on.

use crate::choice::Parameters;
use serde::Serialize;

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    User,
    Bot,
}

/// A conversation participant. Equality is by (id, role).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerId {
    pub id: String,
    pub role: PlayerRole,
}

impl PlayerId {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: PlayerRole::User,
        }
    }

    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: PlayerRole::Bot,
        }
    }
}

/// Who sent an event, to whom, for which application.
pub trait Addressed {
    fn sender(&self) -> &PlayerId;
    fn recipient(&self) -> &PlayerId;
    fn application_id(&self) -> &str;
}

/// Free-form user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceEvent {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub application_id: String,
    pub text: String,
}

/// A button or menu selection resolved to an intent plus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceEvent {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub application_id: String,
    pub intent_name: String,
    pub parameters: Parameters,
}

/// Channel-level deep-link referral without text or payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEvent {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub application_id: String,
    #[serde(rename = "ref")]
    pub referral: String,
}

macro_rules! addressed {
    ($($ty:ty),*) => {
        $(impl Addressed for $ty {
            fn sender(&self) -> &PlayerId {
                &self.sender
            }

            fn recipient(&self) -> &PlayerId {
                &self.recipient
            }

            fn application_id(&self) -> &str {
                &self.application_id
            }
        })*
    };
}

addressed!(SentenceEvent, ChoiceEvent, ReferralEvent);

/// One inbound interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Sentence(SentenceEvent),
    Choice(ChoiceEvent),
    Referral(ReferralEvent),
}

impl Event {
    /// User `user_id` talking to the bot of `application_id`.
    pub fn sentence(user_id: &str, application_id: &str, text: impl Into<String>) -> Self {
        Event::Sentence(SentenceEvent {
            sender: PlayerId::user(user_id),
            recipient: PlayerId::bot(application_id),
            application_id: application_id.to_string(),
            text: text.into(),
        })
    }

    pub fn choice(
        user_id: &str,
        application_id: &str,
        intent_name: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Event::Choice(ChoiceEvent {
            sender: PlayerId::user(user_id),
            recipient: PlayerId::bot(application_id),
            application_id: application_id.to_string(),
            intent_name: intent_name.into(),
            parameters,
        })
    }

    pub fn referral(user_id: &str, application_id: &str, referral: impl Into<String>) -> Self {
        Event::Referral(ReferralEvent {
            sender: PlayerId::user(user_id),
            recipient: PlayerId::bot(application_id),
            application_id: application_id.to_string(),
            referral: referral.into(),
        })
    }

    /// Short name for logs ("sentence", "choice", "referral").
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Sentence(_) => "sentence",
            Event::Choice(_) => "choice",
            Event::Referral(_) => "referral",
        }
    }

    fn addressed(&self) -> &dyn Addressed {
        match self {
            Event::Sentence(e) => e,
            Event::Choice(e) => e,
            Event::Referral(e) => e,
        }
    }
}

impl Addressed for Event {
    fn sender(&self) -> &PlayerId {
        self.addressed().sender()
    }

    fn recipient(&self) -> &PlayerId {
        self.addressed().recipient()
    }

    fn application_id(&self) -> &str {
        self.addressed().application_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_equality_includes_role() {
        assert_eq!(PlayerId::user("a"), PlayerId::user("a"));
        assert_ne!(PlayerId::user("a"), PlayerId::bot("a"));
    }

    #[test]
    fn every_variant_answers_addressing() {
        let events = [
            Event::sentence("u1", "app", "hi"),
            Event::choice("u1", "app", "greet", Parameters::new()),
            Event::referral("u1", "app", "promo"),
        ];
        for e in &events {
            assert_eq!(e.sender(), &PlayerId::user("u1"));
            assert_eq!(e.recipient(), &PlayerId::bot("app"));
            assert_eq!(e.application_id(), "app");
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::referral("u1", "app", "promo")).unwrap();
        assert_eq!(json["type"], "referral");
        assert_eq!(json["ref"], "promo");
        assert_eq!(json["applicationId"], "app");
        assert_eq!(json["sender"]["role"], "user");
    }
}
