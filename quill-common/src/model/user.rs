use crate::model::Id;
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, PasswordHash as PhcHash, SaltString},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub const USER_HANDLE_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PROFILE_FIELD_MAX_LEN: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

impl Profile {
    pub fn validate(&self) -> Result<(), InvalidProfileError> {
        for (field, value) in [("country", &self.country), ("city", &self.city)] {
            if value.chars().count() > PROFILE_FIELD_MAX_LEN {
                return Err(InvalidProfileError(field));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub handle: UserHandle,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub profile: Profile,
}

/// What login needs to know about a user.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct UserHandle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user handle is invalid: {0}")]
pub struct InvalidUserHandleError(String);

impl UserHandle {
    pub fn new(handle: String) -> Result<Self, InvalidUserHandleError> {
        let valid_chars = handle
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));

        if !handle.is_empty() && valid_chars && handle.chars().count() <= USER_HANDLE_MAX_LEN {
            Ok(UserHandle(handle))
        } else {
            Err(InvalidUserHandleError(handle))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserHandle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserHandle"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl EmailAddress {
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

        if well_formed && !email.contains(char::is_whitespace) && email.len() <= EMAIL_MAX_LEN {
            Ok(Self(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        EmailAddress::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"EmailAddress"))
    }
}

/// A plain text password as submitted by a client.
#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The password must have at least {PASSWORD_MIN_LEN} characters")]
pub struct InvalidPasswordError;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing the password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

impl Password {
    #[must_use]
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn validate(&self) -> Result<(), InvalidPasswordError> {
        if self.0.chars().count() >= PASSWORD_MIN_LEN {
            Ok(())
        } else {
            Err(InvalidPasswordError)
        }
    }

    pub fn hash(&self) -> Result<PasswordHash, PasswordHashError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;
        let phc = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(PasswordHash(phc.to_string()))
    }

    /// Malformed stored hashes never match.
    #[must_use]
    pub fn matches(&self, hash: &PasswordHash) -> bool {
        PhcHash::new(&hash.0).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(self.0.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

/// An argon2 hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    #[must_use]
    pub fn from_phc(phc: String) -> Self {
        Self(phc)
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Profile field {0} is too long")]
pub struct InvalidProfileError(pub &'static str);

#[cfg(test)]
mod tests {
    use super::{EmailAddress, Password, UserHandle};

    #[test]
    fn handles() {
        assert!(UserHandle::new("ada_lovelace".to_owned()).is_ok());
        assert!(UserHandle::new(String::new()).is_err());
        assert!(UserHandle::new("has space".to_owned()).is_err());
        assert!(UserHandle::new("x".repeat(51)).is_err());
    }

    #[test]
    fn emails() {
        assert!(EmailAddress::new("ada@example.org".to_owned()).is_ok());
        assert!(EmailAddress::new("ada.example.org".to_owned()).is_err());
        assert!(EmailAddress::new("@example.org".to_owned()).is_err());
        assert!(EmailAddress::new("ada @example.org".to_owned()).is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let password = Password::new("correct horse".to_owned());
        let hash = password.hash().unwrap();

        assert!(hash.as_phc().starts_with("$argon2"));
        assert!(password.matches(&hash));
        assert!(!Password::new("wrong horse".to_owned()).matches(&hash));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(Password::new("short".to_owned()).validate().is_err());
        assert!(Password::new("long enough".to_owned()).validate().is_ok());
    }
}
