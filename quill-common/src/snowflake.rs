//! Snowflake ids: 64 bit integers ordered by creation time.
//!
//! Layout from the most significant bit: 42 bits of milliseconds since
//! [`QUILL_EPOCH`], 5 bits worker id, 5 bits process id, 12 bits increment.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{Duration, UtcDateTime, macros::utc_datetime};

pub const QUILL_EPOCH: UtcDateTime = utc_datetime!(2025-01-01 00:00);

const TIMESTAMP_BITS: u32 = 42;
const WORKER_ID_BITS: u32 = 5;
const PROCESS_ID_BITS: u32 = 5;
const INCREMENT_BITS: u32 = 12;

const INCREMENT_SHIFT: u32 = 0;
const PROCESS_ID_SHIFT: u32 = INCREMENT_SHIFT + INCREMENT_BITS;
const WORKER_ID_SHIFT: u32 = PROCESS_ID_SHIFT + PROCESS_ID_BITS;
const TIMESTAMP_SHIFT: u32 = WORKER_ID_SHIFT + WORKER_ID_BITS;

const INCREMENT_MASK: u16 = (1 << INCREMENT_BITS) - 1;

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeError {
    #[error("Time {0} lies before the snowflake epoch")]
    BeforeEpoch(UtcDateTime),
    #[error("Time {0} does not fit into the snowflake timestamp")]
    TimestampOverflow(UtcDateTime),
    #[error("Worker id {0} is out of range")]
    WorkerId(u8),
    #[error("Process id {0} is out of range")]
    ProcessId(u8),
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Snowflake(u64);

impl Snowflake {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds since [`QUILL_EPOCH`].
    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        (self.0 >> TIMESTAMP_SHIFT) & mask(TIMESTAMP_BITS)
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.timestamp_millis() as i64;
        QUILL_EPOCH + Duration::milliseconds(millis)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> u8 {
        ((self.0 >> WORKER_ID_SHIFT) & mask(WORKER_ID_BITS)) as u8
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> u8 {
        ((self.0 >> PROCESS_ID_SHIFT) & mask(PROCESS_ID_BITS)) as u8
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        ((self.0 >> INCREMENT_SHIFT) & mask(INCREMENT_BITS)) as u16
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(value: Snowflake) -> Self {
        value.0
    }
}

fn millis_since_epoch(time: UtcDateTime) -> Result<u64, SnowflakeError> {
    let millis = (time - QUILL_EPOCH).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeError::BeforeEpoch(time));
    }
    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= mask(TIMESTAMP_BITS))
        .ok_or(SnowflakeError::TimestampOverflow(time))
}

/// Hands out unique snowflakes for one worker/process pair.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator {
    worker_id: u8,
    process_id: u8,
    next_increment: u16,
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u8, process_id: u8) -> Result<Self, SnowflakeError> {
        if u64::from(worker_id) > mask(WORKER_ID_BITS) {
            return Err(SnowflakeError::WorkerId(worker_id));
        }
        if u64::from(process_id) > mask(PROCESS_ID_BITS) {
            return Err(SnowflakeError::ProcessId(process_id));
        }

        Ok(Self {
            worker_id,
            process_id,
            next_increment: 0,
        })
    }

    pub fn generate_at(&mut self, time: UtcDateTime) -> Result<Snowflake, SnowflakeError> {
        let millis = millis_since_epoch(time)?;
        let increment = self.next_increment;
        self.next_increment = increment.wrapping_add(1) & INCREMENT_MASK;

        Ok(Snowflake(
            millis << TIMESTAMP_SHIFT
                | u64::from(self.worker_id) << WORKER_ID_SHIFT
                | u64::from(self.process_id) << PROCESS_ID_SHIFT
                | u64::from(increment) << INCREMENT_SHIFT,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake, SnowflakeError> {
        self.generate_at(UtcDateTime::now())
    }
}
