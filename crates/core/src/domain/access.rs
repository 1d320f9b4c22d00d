use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque caller credential. The core only uses it as a lookup key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("AuthToken(<empty>)")
        } else {
            f.write_str("AuthToken(<redacted>)")
        }
    }
}

impl From<&str> for AuthToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    CanReadCustomer,
    CanWriteCustomer,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CanReadCustomer => "CAN_READ_CUSTOMER",
            Self::CanWriteCustomer => "CAN_WRITE_CUSTOMER",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthToken, Privilege};

    #[test]
    fn debug_output_never_contains_the_token() {
        let token = AuthToken::new("super-secret-token");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-token"));
        assert_eq!(format!("{:?}", AuthToken::new("")), "AuthToken(<empty>)");
    }

    #[test]
    fn privileges_use_screaming_snake_case_on_the_wire() {
        let parsed: Vec<Privilege> =
            serde_json::from_str(r#"["CAN_READ_CUSTOMER","CAN_WRITE_CUSTOMER"]"#).expect("parse");
        assert_eq!(parsed, vec![Privilege::CanReadCustomer, Privilege::CanWriteCustomer]);
        assert_eq!(Privilege::CanWriteCustomer.to_string(), "CAN_WRITE_CUSTOMER");
    }
}
