//! Shopify shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9.-]`.
    #[error("shop domain contains invalid character: {found:?}")]
    InvalidCharacter {
        /// The offending character.
        found: char,
    },
    /// The input has no dot, so it cannot be a hostname.
    #[error("shop domain must be a hostname (e.g. my-store.myshopify.com)")]
    NotAHostname,
}

/// A Shopify shop domain (e.g. `my-store.myshopify.com`).
///
/// Shop domains arrive from two places with different casing habits: the
/// `X-Shopify-Shop-Domain` webhook header and our own brand records. This
/// type normalizes to lowercase on parse so lookups by domain always agree.
///
/// ## Constraints
///
/// - Length: 1-254 characters
/// - Characters: ASCII letters, digits, `.` and `-` (normalized to lowercase)
/// - Must contain at least one dot
///
/// ## Examples
///
/// ```
/// use brandpulse_core::ShopDomain;
///
/// let domain = ShopDomain::parse("My-Store.myshopify.com").unwrap();
/// assert_eq!(domain.as_str(), "my-store.myshopify.com");
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("not a domain").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a shop domain (RFC 1035 hostname limit).
    pub const MAX_LENGTH: usize = 254;

    /// Parse a `ShopDomain` from a string, normalizing to lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains characters
    /// invalid in a hostname, or has no dot.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        if s.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let normalized = s.to_ascii_lowercase();

        if let Some(found) = normalized
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-'))
        {
            return Err(ShopDomainError::InvalidCharacter { found });
        }

        if !normalized.contains('.') {
            return Err(ShopDomainError::NotAHostname);
        }

        Ok(Self(normalized))
    }

    /// Returns the shop domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopDomain {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed normalized
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopDomain {
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
    fn test_parse_valid_domains() {
        assert!(ShopDomain::parse("my-store.myshopify.com").is_ok());
        assert!(ShopDomain::parse("store123.myshopify.com").is_ok());
        assert!(ShopDomain::parse("shop.example.co.uk").is_ok());
    }

    #[test]
    fn test_parse_normalizes_case() {
        let domain = ShopDomain::parse("My-Store.MyShopify.COM").unwrap();
        assert_eq!(domain.as_str(), "my-store.myshopify.com");
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(ShopDomain::parse(""), Err(ShopDomainError::Empty)));
    }

    #[test]
    fn test_parse_too_long() {
        let long = format!("{}.myshopify.com", "a".repeat(250));
        assert!(matches!(
            ShopDomain::parse(&long),
            Err(ShopDomainError::TooLong { .. })
        ));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert!(matches!(
            ShopDomain::parse("my store.myshopify.com"),
            Err(ShopDomainError::InvalidCharacter { found: ' ' })
        ));
        assert!(matches!(
            ShopDomain::parse("store/../etc.myshopify.com"),
            Err(ShopDomainError::InvalidCharacter { found: '/' })
        ));
    }

    #[test]
    fn test_parse_not_a_hostname() {
        assert!(matches!(
            ShopDomain::parse("localhost"),
            Err(ShopDomainError::NotAHostname)
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let domain = ShopDomain::parse("my-store.myshopify.com").unwrap();
        let json = serde_json::to_string(&domain).unwrap();
        assert_eq!(json, "\"my-store.myshopify.com\"");

        let parsed: ShopDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, domain);
    }

    #[test]
    fn test_from_str() {
        let domain: ShopDomain = "my-store.myshopify.com".parse().unwrap();
        assert_eq!(domain.as_str(), "my-store.myshopify.com");
    }
}
