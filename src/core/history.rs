use std::{collections::VecDeque, num::NonZeroUsize};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::energy::KilowattHours};

/// Net consumption over a single day.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(NaiveDate, KilowattHours)", into = "(NaiveDate, KilowattHours)")]
pub struct DailyConsumption {
    pub date: NaiveDate,
    pub net: KilowattHours,
}

impl From<(NaiveDate, KilowattHours)> for DailyConsumption {
    fn from((date, net): (NaiveDate, KilowattHours)) -> Self {
        Self { date, net }
    }
}

impl From<DailyConsumption> for (NaiveDate, KilowattHours) {
    fn from(consumption: DailyConsumption) -> Self {
        (consumption.date, consumption.net)
    }
}

/// Rolling log of the most recent completed days.
#[must_use]
#[derive(Clone, Debug)]
pub struct ConsumptionHistory {
    window: NonZeroUsize,

    /// Completed days, strictly increasing by date.
    days: VecDeque<DailyConsumption>,

    /// Latest known figure of the day in progress.
    today: Option<DailyConsumption>,
}

impl ConsumptionHistory {
    pub fn new(window: NonZeroUsize) -> Self {
        Self { window, days: VecDeque::with_capacity(window.get() + 1), today: None }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> impl ExactSizeIterator<Item = &DailyConsumption> {
        self.days.iter()
    }

    pub const fn today(&self) -> Option<DailyConsumption> {
        self.today
    }

    /// Append a completed day.
    ///
    /// Returns `false` and leaves the history untouched if the date does not come after the
    /// latest recorded day.
    pub fn record(&mut self, date: NaiveDate, net: KilowattHours) -> bool {
        let is_recorded = self.push(DailyConsumption { date, net });
        if is_recorded {
            info!(%date, ?net, n_days = self.days.len(), "recorded daily consumption");
        } else {
            warn!(%date, ?net, last_date = ?self.last_date(), "rejected out-of-order consumption");
        }
        is_recorded
    }

    /// Track the day in progress and record the previous day once the date changes.
    pub fn observe(&mut self, date: NaiveDate, net: Option<KilowattHours>) {
        if let Some(today) = self.today {
            if today.date < date {
                self.record(today.date, today.net);
                self.today = None;
            } else if today.date > date {
                warn!(%date, today = %today.date, "ignoring an observation from the past");
                return;
            }
        }
        if let Some(net) = net {
            self.today = Some(DailyConsumption { date, net });
        }
    }

    /// Arithmetic mean over the recorded days, or [`None`] while there is no history yet.
    pub fn average_consumption(&self) -> Option<KilowattHours> {
        if self.is_empty() {
            return None;
        }
        #[expect(clippy::cast_precision_loss)]
        let n_days = self.days.len() as f64;
        Some(self.days.iter().map(|day| day.net).sum::<KilowattHours>() / n_days)
    }

    /// Replace the history with previously persisted days.
    ///
    /// Entries that duplicate or precede an earlier date are dropped.
    pub fn restore(
        &mut self,
        days: impl IntoIterator<Item = DailyConsumption>,
        today: Option<DailyConsumption>,
    ) {
        self.days.clear();
        for day in days {
            if !self.push(day) {
                warn!(date = %day.date, "dropped an inconsistent history entry");
            }
        }
        self.today = today.filter(|today| self.last_date().is_none_or(|last| last < today.date));
        info!(n_days = self.days.len(), average = ?self.average_consumption(), "restored");
    }

    fn last_date(&self) -> Option<NaiveDate> {
        self.days.back().map(|day| day.date)
    }

    fn push(&mut self, day: DailyConsumption) -> bool {
        if self.last_date().is_some_and(|last| last >= day.date) {
            return false;
        }
        self.days.push_back(day);
        while self.days.len() > self.window.get() {
            self.days.pop_front();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use itertools::Itertools;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
    }

    fn history(window: usize) -> ConsumptionHistory {
        ConsumptionHistory::new(NonZeroUsize::new(window).unwrap())
    }

    #[test]
    fn test_window_eviction() {
        let mut history = history(3);
        for day in 1..=5 {
            assert!(history.record(date(day), KilowattHours(f64::from(day))));
        }
        assert_eq!(history.days().map(|day| day.date).collect_vec(), [date(3), date(4), date(5)]);
        assert_abs_diff_eq!(history.average_consumption().unwrap().0, 4.0);
    }

    #[test]
    fn test_average_empty() {
        assert_eq!(history(7).average_consumption(), None);
    }

    #[test]
    fn test_record_rejects_duplicates() {
        let mut history = history(7);
        assert!(history.record(date(2), KilowattHours(1.0)));
        assert!(!history.record(date(2), KilowattHours(5.0)));
        assert!(!history.record(date(1), KilowattHours(5.0)));
        assert_eq!(history.len(), 1);
        assert_abs_diff_eq!(history.average_consumption().unwrap().0, 1.0);
    }

    #[test]
    fn test_observe_rolls_over() {
        let mut history = history(7);
        history.observe(date(1), Some(KilowattHours(1.0)));
        history.observe(date(1), Some(KilowattHours(2.5)));
        assert!(history.is_empty());

        history.observe(date(2), Some(KilowattHours(0.1)));
        assert_eq!(
            history.days().copied().collect_vec(),
            [DailyConsumption { date: date(1), net: KilowattHours(2.5) }],
        );
        assert_eq!(history.today().map(|today| today.date), Some(date(2)));
    }

    #[test]
    fn test_observe_without_data() {
        let mut history = history(7);
        history.observe(date(1), Some(KilowattHours(3.0)));
        history.observe(date(2), None);
        assert_eq!(history.len(), 1);
        assert_eq!(history.today(), None);
    }

    #[test]
    fn test_observe_ignores_the_past() {
        let mut history = history(7);
        history.observe(date(5), Some(KilowattHours(3.0)));
        history.observe(date(4), Some(KilowattHours(9.0)));
        assert!(history.is_empty());
        assert_eq!(history.today().map(|today| today.net), Some(KilowattHours(3.0)));
    }

    #[test]
    fn test_restore_drops_inconsistent_entries() {
        let mut history = history(3);
        history.restore(
            [
                DailyConsumption { date: date(1), net: KilowattHours(1.0) },
                DailyConsumption { date: date(3), net: KilowattHours(3.0) },
                DailyConsumption { date: date(3), net: KilowattHours(30.0) },
                DailyConsumption { date: date(2), net: KilowattHours(20.0) },
                DailyConsumption { date: date(4), net: KilowattHours(4.0) },
                DailyConsumption { date: date(5), net: KilowattHours(5.0) },
            ],
            Some(DailyConsumption { date: date(5), net: KilowattHours(1.0) }),
        );
        assert_eq!(history.days().map(|day| day.date).collect_vec(), [date(3), date(4), date(5)]);
        assert_abs_diff_eq!(history.average_consumption().unwrap().0, 4.0);
        assert_eq!(history.today(), None);
    }

    #[test]
    fn test_serialize_as_pairs() -> serde_json::Result<()> {
        let day = DailyConsumption { date: date(19), net: KilowattHours(4.25) };
        let json = serde_json::to_string(&day)?;
        assert_eq!(json, r#"["2025-10-19",4.25]"#);
        assert_eq!(serde_json::from_str::<DailyConsumption>(&json)?, day);
        Ok(())
    }
}
