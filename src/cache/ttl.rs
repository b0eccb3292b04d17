//! TTL (time-to-live) policy
//!
//! A TTL is a number of seconds with two reserved values: `0` bypasses the cache
//! entirely and `-1` keeps an entry forever. [`Ttl::is_expired`] is the one place
//! that decides whether a stored entry is still usable.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// No caching
pub const TTL_DISABLED: i64 = 0;
/// Cache permanently
pub const TTL_PERMANENT: i64 = -1;
/// 24 hours in seconds
pub const TTL_ONE_DAY: i64 = 86_400;

/// Error types for TTL validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TtlError {
    /// An integer below -1
    #[error("cache_ttl must be -1, 0, or positive, got {0}")]
    OutOfRange(i64),

    /// Anything that is not an integer
    #[error("cache_ttl must be an integer, got '{0}'")]
    NotAnInteger(String),
}

/// A validated TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Ttl {
    /// Cache bypassed: no lookup and no write
    Disabled,
    /// Entry never expires
    Permanent,
    /// Entry valid for this many seconds after creation
    Timed(NonZeroU64),
}

impl Ttl {
    pub const ONE_DAY: Ttl = match NonZeroU64::new(TTL_ONE_DAY as u64) {
        Some(secs) => Ttl::Timed(secs),
        None => panic!("one day is a non-zero number of seconds"),
    };

    /// Whether responses fetched under this TTL are written to disk
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Ttl::Disabled)
    }

    /// The raw integer form used on disk and at the API boundary
    pub fn as_secs(&self) -> i64 {
        i64::from(*self)
    }

    /// Decides whether an entry created at `created_at` has expired at `now`
    ///
    /// Timed entries expire once the elapsed time reaches the TTL, so an entry with
    /// a 60 second TTL is still valid after 59 seconds and expired at exactly 60.
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Ttl::Disabled => true,
            Ttl::Permanent => false,
            Ttl::Timed(secs) => match i64::try_from(secs.get()).ok().and_then(Duration::try_seconds) {
                Some(ttl) => now.signed_duration_since(created_at) >= ttl,
                // Too large for chrono to represent: nothing can outlive it
                None => false,
            },
        }
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Ttl::ONE_DAY
    }
}

impl TryFrom<i64> for Ttl {
    type Error = TtlError;

    fn try_from(secs: i64) -> Result<Self, Self::Error> {
        match secs {
            TTL_DISABLED => Ok(Ttl::Disabled),
            TTL_PERMANENT => Ok(Ttl::Permanent),
            n if n > 0 => Ok(Ttl::Timed(
                NonZeroU64::new(n.unsigned_abs()).ok_or(TtlError::OutOfRange(n))?,
            )),
            n => Err(TtlError::OutOfRange(n)),
        }
    }
}

impl FromStr for Ttl {
    type Err = TtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s
            .trim()
            .parse::<i64>()
            .map_err(|_| TtlError::NotAnInteger(s.to_string()))?;
        Ttl::try_from(secs)
    }
}

impl From<Ttl> for i64 {
    fn from(ttl: Ttl) -> Self {
        match ttl {
            Ttl::Disabled => TTL_DISABLED,
            Ttl::Permanent => TTL_PERMANENT,
            Ttl::Timed(secs) => i64::try_from(secs.get()).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Disabled => f.write_str("disabled"),
            Ttl::Permanent => f.write_str("permanent"),
            Ttl::Timed(secs) => write!(f, "{}s", secs),
        }
    }
}

/// Raw TTL inputs accepted by the cached client
///
/// Validation happens once, when the client converts the argument, so invalid
/// values are rejected before any disk or network activity.
pub trait IntoTtl {
    fn into_ttl(self) -> Result<Ttl, TtlError>;
}

impl IntoTtl for Ttl {
    fn into_ttl(self) -> Result<Ttl, TtlError> {
        Ok(self)
    }
}

impl IntoTtl for i64 {
    fn into_ttl(self) -> Result<Ttl, TtlError> {
        Ttl::try_from(self)
    }
}

/// Floats are never TTLs, even integral ones such as `60.0`
impl IntoTtl for f64 {
    fn into_ttl(self) -> Result<Ttl, TtlError> {
        Err(TtlError::NotAnInteger(self.to_string()))
    }
}
