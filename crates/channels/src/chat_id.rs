use std::fmt;

use crate::error::ChannelError;

/// Server part of a personal chat in WhatsApp Web addressing.
pub const USER_SERVER: &str = "c.us";
/// Server part of a group chat.
pub const GROUP_SERVER: &str = "g.us";

/// A WhatsApp chat address, `user@server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatId {
    user: String,
    server: String,
}

impl ChatId {
    /// Build a personal chat id from a phone number: `15551234567` becomes
    /// `15551234567@c.us`. Surrounding whitespace and one leading `+` are
    /// dropped; anything else that is not a digit is rejected.
    pub fn from_phone(raw: &str) -> Result<Self, ChannelError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ChannelError::InvalidRecipient(raw.to_string()));
        }
        Ok(Self {
            user: digits.to_string(),
            server: USER_SERVER.to_string(),
        })
    }

    /// Accept either a full `user@server` id or a bare phone number.
    pub fn parse(raw: &str) -> Result<Self, ChannelError> {
        let trimmed = raw.trim();
        let Some((user, server)) = trimmed.split_once('@') else {
            return Self::from_phone(trimmed);
        };
        let valid = !user.is_empty()
            && !server.is_empty()
            && !server.contains('@')
            && !trimmed.chars().any(char::is_whitespace);
        if !valid {
            return Err(ChannelError::InvalidRecipient(raw.to_string()));
        }
        Ok(Self {
            user: user.to_string(),
            server: server.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_gets_user_suffix() {
        let id = ChatId::from_phone("15551234567").unwrap();
        assert_eq!(id.to_string(), "15551234567@c.us");
        assert!(!id.is_group());
    }

    #[test]
    fn phone_strips_plus_and_whitespace() {
        assert_eq!(
            ChatId::from_phone("  +4915112345678 ").unwrap().to_string(),
            "4915112345678@c.us"
        );
    }

    #[test]
    fn phone_rejects_non_digits() {
        for bad in ["", "+", "555-1234", "12 34", "abc", "++1555"] {
            assert!(
                matches!(ChatId::from_phone(bad), Err(ChannelError::InvalidRecipient(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn parse_accepts_full_ids() {
        let group = ChatId::parse("120363025246125486@g.us").unwrap();
        assert!(group.is_group());
        assert_eq!(group.user(), "120363025246125486");

        let user = ChatId::parse("15551234567@c.us").unwrap();
        assert_eq!(user.server(), USER_SERVER);
        assert_eq!(ChatId::parse("15551234567").unwrap(), user);
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in ["@c.us", "1555@", "a@b@c", "15 55@c.us"] {
            assert!(ChatId::parse(bad).is_err(), "{bad:?}");
        }
    }
}
