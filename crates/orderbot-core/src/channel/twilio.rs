use quick_xml::escape::escape;
use serde::Deserialize;

use crate::error::ValidationError;
use crate::types::InboundMessage;

pub const CHANNEL_NAME: &str = "twilio";

/// Form fields Twilio posts for an incoming SMS/WhatsApp message.
/// Only the fields the bot reads are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioWebhook {
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Body")]
    pub body: Option<String>,
    #[serde(rename = "ProfileName")]
    pub profile_name: Option<String>,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

impl TwilioWebhook {
    /// Validate and convert. A missing body is an empty message; a missing
    /// sender cannot be answered and is rejected.
    pub fn into_inbound(self) -> Result<InboundMessage, ValidationError> {
        let sender = self
            .from
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingSender)?;
        let body = self.body.as_deref().unwrap_or("").trim();

        let mut msg = InboundMessage::new(CHANNEL_NAME, sender, body);
        msg.profile_name = self.profile_name;
        msg.message_id = self.message_sid;
        Ok(msg)
    }
}

/// TwiML envelope carrying exactly one reply message.
pub fn twiml_message(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape(text)
    )
}

/// TwiML envelope that sends nothing back.
pub fn twiml_empty() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_inbound() {
        let hook = TwilioWebhook {
            from: Some("whatsapp:+15551234".into()),
            body: Some("  do you have headphones?\n".into()),
            profile_name: Some("Sam".into()),
            message_sid: Some("SM123".into()),
        };
        let msg = hook.into_inbound().unwrap();
        assert_eq!(msg.channel, "twilio");
        assert_eq!(msg.sender_id, "whatsapp:+15551234");
        assert_eq!(msg.content, "do you have headphones?");
        assert_eq!(msg.profile_name.as_deref(), Some("Sam"));
        assert_eq!(msg.message_id.as_deref(), Some("SM123"));
    }

    #[test]
    fn test_missing_body_is_empty() {
        let hook = TwilioWebhook {
            from: Some("+1555".into()),
            ..Default::default()
        };
        assert_eq!(hook.into_inbound().unwrap().content, "");
    }

    #[test]
    fn test_missing_sender_rejected() {
        let hook = TwilioWebhook {
            from: Some("   ".into()),
            body: Some("hi".into()),
            ..Default::default()
        };
        assert!(matches!(hook.into_inbound(), Err(ValidationError::MissingSender)));
        assert!(TwilioWebhook::default().into_inbound().is_err());
    }

    #[test]
    fn test_twiml_escapes_text() {
        let xml = twiml_message("Tom & Jerry <3");
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>Tom &amp; Jerry &lt;3</Message></Response>"
        );
        assert!(twiml_empty().ends_with("<Response></Response>"));
    }
}
