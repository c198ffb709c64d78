//! Sync interval configuration with a `disabled` sentinel.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a scheduled sync job ticks.
///
/// `Disabled` is a valid configuration: the job schedules no periodic tick
/// but remains triggerable on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncInterval {
    Disabled,
    Every(Duration),
}

impl SyncInterval {
    pub fn from_millis(ms: u64) -> Self {
        Self::Every(Duration::from_millis(ms))
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

// Config files write either the string "disabled" or a millisecond count.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IntervalRepr {
    Millis(u64),
    Word(String),
}

impl Serialize for SyncInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_str("disabled"),
            Self::Every(d) => serializer.serialize_u64(d.as_millis() as u64),
        }
    }
}

impl<'de> Deserialize<'de> for SyncInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match IntervalRepr::deserialize(deserializer)? {
            IntervalRepr::Millis(0) => Err(de::Error::custom(
                "sync interval must be positive; use \"disabled\" to turn the schedule off",
            )),
            IntervalRepr::Millis(ms) => Ok(Self::from_millis(ms)),
            IntervalRepr::Word(w) if w == "disabled" => Ok(Self::Disabled),
            IntervalRepr::Word(w) => Err(de::Error::custom(format!(
                "expected millisecond count or \"disabled\", got {w:?}"
            ))),
        }
    }
}
