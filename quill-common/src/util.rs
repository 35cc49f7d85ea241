use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::Duration;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidTextError {
    #[error("Text must not be blank")]
    Blank,
    #[error("Text has {len} characters, at most {max} are allowed")]
    TooLong { len: usize, max: usize },
}

/// Non-blank text of at most `MAX` characters.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct BoundedText<const MAX: usize>(String);

impl<const MAX: usize> BoundedText<MAX> {
    pub fn new(text: String) -> Result<Self, InvalidTextError> {
        if text.trim().is_empty() {
            return Err(InvalidTextError::Blank);
        }
        let len = text.chars().count();
        if len > MAX {
            return Err(InvalidTextError::TooLong { len, max: MAX });
        }
        Ok(Self(text))
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

impl<const MAX: usize> Display for BoundedText<MAX> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de, const MAX: usize> Deserialize<'de> for BoundedText<MAX> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Self::new(inner).map_err(|err| match err {
            InvalidTextError::Blank => Error::invalid_value(Unexpected::Str(""), &"non-blank text"),
            InvalidTextError::TooLong { len, .. } => Error::invalid_length(len, &"shorter text"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundedText, InvalidTextError};

    #[test]
    fn bounded_text_limits() {
        assert!(BoundedText::<5>::new("hello".to_owned()).is_ok());
        assert!(BoundedText::<5>::new("äöüßé".to_owned()).is_ok());
        assert_eq!(
            BoundedText::<5>::new("hello!".to_owned()),
            Err(InvalidTextError::TooLong { len: 6, max: 5 })
        );
        assert_eq!(
            BoundedText::<5>::new("  \n".to_owned()),
            Err(InvalidTextError::Blank)
        );
    }

    #[test]
    fn bounded_text_deserialization_validates() {
        let ok: BoundedText<10> = serde_json::from_str("\"subject\"").unwrap();
        assert_eq!(ok.get(), "subject");
        assert!(serde_json::from_str::<BoundedText<3>>("\"subject\"").is_err());
    }
}
