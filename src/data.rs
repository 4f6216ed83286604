use chrono::NaiveDate;
use serde::Serialize;

/// Average month length used when converting a day span to months.
pub const AVG_DAYS_PER_MONTH: f64 = 30.44;

/// Single daily bar. `high`/`low` may be NaN when the source had no price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, high: f64, low: f64) -> Self {
        Self { date, high, low }
    }

    pub fn has_finite_extremes(&self) -> bool {
        self.high.is_finite() && self.low.is_finite()
    }
}

/// First and last date covered by a bar sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Earliest and latest bar dates; `None` for an empty slice.
    pub fn of(bars: &[Bar]) -> Option<Self> {
        let start = bars.iter().map(|bar| bar.date).min()?;
        let end = bars.iter().map(|bar| bar.date).max()?;
        Some(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn months(&self) -> f64 {
        self.days() as f64 / AVG_DAYS_PER_MONTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn span_uses_extreme_dates_regardless_of_order() {
        let bars = vec![
            Bar::new(day(2024, 3, 1), 2.0, 1.0),
            Bar::new(day(2024, 1, 1), 2.0, 1.0),
            Bar::new(day(2024, 2, 1), 2.0, 1.0),
        ];
        let span = DateSpan::of(&bars).unwrap();
        assert_eq!(span.start, day(2024, 1, 1));
        assert_eq!(span.end, day(2024, 3, 1));
        assert_eq!(span.days(), 60);
    }

    #[test]
    fn months_use_average_month_length() {
        let span = DateSpan {
            start: day(2024, 1, 1),
            end: day(2024, 5, 1),
        };
        assert!((span.months() - 121.0 / 30.44).abs() < 1e-12);
        assert!(span.months() > 3.0);
    }

    #[test]
    fn empty_bars_have_no_span() {
        assert!(DateSpan::of(&[]).is_none());
    }

    #[test]
    fn missing_price_is_not_finite() {
        let bar = Bar::new(day(2024, 1, 2), 110.0, f64::NAN);
        assert!(!bar.has_finite_extremes());
        assert!(Bar::new(day(2024, 1, 2), 110.0, 100.0).has_finite_extremes());
    }
}
