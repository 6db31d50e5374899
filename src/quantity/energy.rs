use std::ops::{Div, Mul};

use chrono::TimeDelta;

use crate::quantity::{power::Kilowatts, ratios::Percent};

quantity!(KilowattHours, via: f64, suffix: "kWh", precision: 3);

impl Mul<Percent> for KilowattHours {
    type Output = Self;

    fn mul(self, percent: Percent) -> Self::Output {
        self * percent.to_proportion()
    }
}

impl Div<TimeDelta> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        Kilowatts(self.0 / hours)
    }
}
