use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Time-of-day window during which grid charging is permitted.
///
/// The window wraps over midnight when the end comes before the start, for example `22:00-06:00`.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChargingWindow {
    /// Inclusive.
    pub start: NaiveTime,

    /// Exclusive.
    pub end: NaiveTime,
}

impl ChargingWindow {
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        ensure!(start != end, "charging window `{start}-{end}` is empty");
        Ok(Self { start, end })
    }

    pub fn contains(self, time: NaiveTime) -> bool {
        if self.start < self.end {
            (self.start <= time) && (time < self.end)
        } else {
            (self.start <= time) || (time < self.end)
        }
    }

    /// Time left until the window closes, assuming the window is currently open.
    pub fn remaining(self, time: NaiveTime) -> TimeDelta {
        let remaining = self.end.signed_duration_since(time);
        if remaining > TimeDelta::zero() { remaining } else { remaining + TimeDelta::days(1) }
    }
}

impl Display for ChargingWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl FromStr for ChargingWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) =
            s.split_once('-').with_context(|| format!("expected `HH:MM-HH:MM`, got `{s}`"))?;
        let parse = |time: &str| {
            NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .with_context(|| format!("invalid time `{time}` in charging window `{s}`"))
        };
        Self::try_new(parse(start)?, parse(end)?)
    }
}

impl TryFrom<String> for ChargingWindow {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChargingWindow> for String {
    fn from(window: ChargingWindow) -> Self {
        window.to_string()
    }
}
