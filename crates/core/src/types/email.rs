//! Email address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a string was refused as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    /// Zero or several `@`.
    #[error("email must contain exactly one @ (found {found})")]
    AtSign { found: usize },
    #[error("email is missing the part {0} the @")]
    MissingPart(Side),
}

/// Which side of the `@` an [`EmailError::MissingPart`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::After => "after",
        })
    }
}

/// A customer's login address, trimmed and lowercased.
///
/// At most 254 characters with a non-empty mailbox and domain around a
/// single `@`. Deliverability is left to the confirmation email.
///
/// ```
/// use fnuc_core::Email;
///
/// let email = Email::parse(" Buyer@Shop.Test ").unwrap();
/// assert_eq!(email.as_str(), "buyer@shop.test");
/// assert!(Email::parse("buyer.shop.test").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Normalize and check `input`.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the trimmed input violates.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let found = trimmed.matches('@').count();
        let Some((mailbox, domain)) = trimmed.split_once('@').filter(|_| found == 1) else {
            return Err(EmailError::AtSign { found });
        };
        if mailbox.is_empty() {
            return Err(EmailError::MissingPart(Side::Before));
        }
        if domain.is_empty() {
            return Err(EmailError::MissingPart(Side::After));
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mailbox name, shown when the account has no display name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_emails_are_normalized() {
        let email = Email::parse("  Jane.Doe@Example.COM\n").unwrap();
        assert_eq!(email.as_str(), "jane.doe@example.com");
        assert_eq!(email, "jane.doe@example.com".parse().unwrap());
        assert_eq!(email.local_part(), "jane.doe");
    }

    #[test]
    fn test_rejections() {
        let cases = [
            ("   ", "email cannot be empty"),
            ("staff.example.com", "email must contain exactly one @ (found 0)"),
            ("a@b@shop.test", "email must contain exactly one @ (found 2)"),
            ("@shop.test", "email is missing the part before the @"),
            ("orders@", "email is missing the part after the @"),
        ];
        for (input, message) in cases {
            assert_eq!(Email::parse(input).unwrap_err().to_string(), message, "{input:?}");
        }

        let long = format!("{}@shop.test", "x".repeat(Email::MAX_LENGTH));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        ));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let email = Email::parse("buyer+gift@shop.test").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"buyer+gift@shop.test\"");
        assert_eq!(email.to_string(), "buyer+gift@shop.test");
    }
}
