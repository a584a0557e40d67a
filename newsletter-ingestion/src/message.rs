use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unparsable mail payload")]
    Unparsable,
    #[error("message has no sender address")]
    MissingSender,
}

/// The slice of an RFC822 message this pipeline cares about: who sent it and
/// the markup body. Everything else (routing headers, attachments) is left
/// to the mail layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterMessage {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

impl NewsletterMessage {
    /// Parse a raw RFC822 payload. Prefers the HTML body since newsletter
    /// structure lives in the markup; falls back to the text part.
    pub fn parse(raw: &[u8]) -> Result<Self, MailError> {
        let parsed = mail_parser::MessageParser::default()
            .parse(raw)
            .ok_or(MailError::Unparsable)?;

        let sender = parsed
            .from()
            .and_then(|addrs| addrs.first())
            .and_then(|addr| addr.address.as_ref())
            .map(|addr| addr.to_string())
            .ok_or(MailError::MissingSender)?;

        let subject = parsed.subject().unwrap_or("").to_string();

        let body = parsed
            .body_html(0)
            .or_else(|| parsed.body_text(0))
            .unwrap_or(Cow::Borrowed(""))
            .into_owned();

        Ok(Self {
            sender,
            subject,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sender_subject_and_body() {
        let raw = b"From: crew@morningbrew.com\r\n\
            To: reader@example.com\r\n\
            Subject: Daily Brew\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            Good morning.\r\n";
        let msg = NewsletterMessage::parse(raw).unwrap();
        assert_eq!(msg.sender, "crew@morningbrew.com");
        assert_eq!(msg.subject, "Daily Brew");
        assert!(msg.body.contains("Good morning."));
    }

    #[test]
    fn missing_sender_is_an_error() {
        let raw = b"Subject: orphan\r\n\r\nbody\r\n";
        assert!(matches!(
            NewsletterMessage::parse(raw),
            Err(MailError::MissingSender)
        ));
    }
}
