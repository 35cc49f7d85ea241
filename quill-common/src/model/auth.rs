//! Bearer tokens.
//!
//! A token is `{user id}.{secret}.{salt}` with both binary parts encoded as
//! unpadded URL-safe base64. Only the argon2 hash of the secret is stored.

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const AUTH_TOKEN_SECRET_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 16;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Expected three parts separated by '.'")]
    MalformedToken,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The secret part has the wrong length")]
    InvalidSecretLength,
    #[error("The salt part has the wrong length")]
    InvalidSaltLength,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    secret: [u8; AUTH_TOKEN_SECRET_LEN],
    salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(Box<[u8; AUTH_TOKEN_HASH_LEN]>);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    /// A lifetime reaching past the representable range never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_after.is_some_and(|lifetime| {
            self.created_at
                .checked_add(lifetime.get())
                .is_some_and(|expires_at| expires_at < now)
        })
    }
}

impl AuthToken {
    #[must_use]
    pub fn generate(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            secret: rand::random(),
            salt: rand::random(),
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        format!(
            "{}.{}.{}",
            self.user_id,
            BASE64_URL_SAFE_NO_PAD.encode(self.secret),
            BASE64_URL_SAFE_NO_PAD.encode(self.salt),
        )
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        Argon2::default()
            .hash_password_into(&self.secret, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [user_id, secret, salt] = s
            .split('.')
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| Self::Err::MalformedToken)?;

        Ok(Self {
            user_id: u64::from_str(user_id)
                .map_err(Self::Err::InvalidUserId)?
                .into(),
            secret: BASE64_URL_SAFE_NO_PAD
                .decode(secret)?
                .try_into()
                .map_err(|_| Self::Err::InvalidSecretLength)?,
            salt: BASE64_URL_SAFE_NO_PAD
                .decode(salt)?
                .try_into()
                .map_err(|_| Self::Err::InvalidSaltLength)?,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl AuthTokenHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Vec<u8>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let bytes: Box<[u8]> = value.into_boxed_slice();
        Ok(Self(bytes.try_into().map_err(|_| InvalidAuthTokenHashError)?))
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthToken, AuthTokenDecodeError, Authentication};
    use crate::util::PositiveDuration;
    use time::{Duration, macros::datetime};

    #[test]
    fn token_string_round_trip() {
        let token = AuthToken::generate(42.into());
        let parsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(parsed, token);
        assert_eq!(parsed.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn malformed_tokens() {
        assert_eq!(
            "42.abc".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::MalformedToken)
        );
        assert!(matches!(
            "x.AAAA.AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "42.AAAA.AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidSecretLength)
        );
    }

    #[test]
    fn expiry() {
        let token = AuthToken::generate(1.into());
        let created_at = datetime!(2026-01-01 12:00 UTC);
        let authentication = Authentication {
            user: 1.into(),
            token_hash: token.hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::hours(1)),
        };

        assert!(!authentication.is_expired_at(created_at + Duration::minutes(59)));
        assert!(authentication.is_expired_at(created_at + Duration::minutes(61)));
    }

    #[test]
    fn lifetimes_past_the_calendar_never_expire() {
        let token = AuthToken::generate(1.into());
        let created_at = datetime!(2026-01-01 12:00 UTC);
        let authentication = Authentication {
            user: 1.into(),
            token_hash: token.hash().unwrap(),
            created_at,
            expires_after: PositiveDuration::new(Duration::hours(u32::MAX.into())),
        };

        assert!(!authentication.is_expired_at(created_at));
        assert!(!authentication.is_expired_at(datetime!(9999-12-31 23:59 UTC)));
    }
}
