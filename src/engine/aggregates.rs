use crate::catalog::Event;
use crate::data::Value;
use crate::view::{SummaryDirection, SummaryType};

/// Accumulator trait for summary columns
pub trait Accumulator: Send + Sync {
    /// Add a raw value from the window. Nulls are ignored.
    fn accumulate(&mut self, value: &Value);

    /// Final value, `Null` when nothing was accumulated
    fn result(&self) -> Value;
}

/// Number of non-null values
#[derive(Debug, Clone, Default)]
pub struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn accumulate(&mut self, value: &Value) {
        if !value.is_null() {
            self.count += 1;
        }
    }

    fn result(&self) -> Value {
        if self.count > 0 {
            Value::Int64(self.count)
        } else {
            Value::Null
        }
    }
}

/// Minimum or maximum by value ordering
#[derive(Debug, Clone)]
pub struct ExtremeAccumulator {
    best: Option<Value>,
    max: bool,
}

impl ExtremeAccumulator {
    pub fn min() -> Self {
        Self { best: None, max: false }
    }

    pub fn max() -> Self {
        Self { best: None, max: true }
    }
}

impl Accumulator for ExtremeAccumulator {
    fn accumulate(&mut self, value: &Value) {
        if value.is_null() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some(current) if self.max => value > current,
            Some(current) => value < current,
        };
        if replace {
            self.best = Some(value.clone());
        }
    }

    fn result(&self) -> Value {
        self.best.clone().unwrap_or(Value::Null)
    }
}

/// Running moments over numeric values, shared by total, mean, range and
/// the standard deviations
#[derive(Debug, Clone, Default)]
struct Moments {
    count: u64,
    sum: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Moments {
    fn push(&mut self, x: f64) {
        if self.count == 0 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        self.count += 1;
        self.sum += x;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statistic {
    Total,
    Mean,
    Range,
    SampleStdDev,
    PopulationStdDev,
}

#[derive(Debug, Clone)]
pub struct NumericAccumulator {
    statistic: Statistic,
    moments: Moments,
}

impl NumericAccumulator {
    fn new(statistic: Statistic) -> Self {
        Self {
            statistic,
            moments: Moments::default(),
        }
    }
}

impl Accumulator for NumericAccumulator {
    fn accumulate(&mut self, value: &Value) {
        if let Some(x) = value.as_f64() {
            self.moments.push(x);
        }
    }

    fn result(&self) -> Value {
        let m = &self.moments;
        if m.count == 0 {
            return Value::Null;
        }
        match self.statistic {
            Statistic::Total => Value::Float64(m.sum),
            Statistic::Mean => Value::Float64(m.sum / m.count as f64),
            Statistic::Range => Value::Float64(m.max - m.min),
            Statistic::PopulationStdDev => Value::Float64((m.m2 / m.count as f64).sqrt()),
            Statistic::SampleStdDev if m.count > 1 => {
                Value::Float64((m.m2 / (m.count - 1) as f64).sqrt())
            }
            Statistic::SampleStdDev => Value::Null,
        }
    }
}

/// Accumulator for a summary type; `None` for `Unspecified`
pub fn create_accumulator(summary_type: SummaryType) -> Option<Box<dyn Accumulator>> {
    let acc: Box<dyn Accumulator> = match summary_type {
        SummaryType::Unspecified => return None,
        SummaryType::Count => Box::new(CountAccumulator::default()),
        SummaryType::Minimum => Box::new(ExtremeAccumulator::min()),
        SummaryType::Maximum => Box::new(ExtremeAccumulator::max()),
        SummaryType::Range => Box::new(NumericAccumulator::new(Statistic::Range)),
        SummaryType::Mean => Box::new(NumericAccumulator::new(Statistic::Mean)),
        SummaryType::Total => Box::new(NumericAccumulator::new(Statistic::Total)),
        SummaryType::StandardDeviation => Box::new(NumericAccumulator::new(Statistic::SampleStdDev)),
        SummaryType::PopulationStandardDeviation => {
            Box::new(NumericAccumulator::new(Statistic::PopulationStdDev))
        }
    };
    Some(acc)
}

/// Summarize the member at `pos` over the window of `slot`: `[slot, slot + interval)`
/// forward, `(slot - interval, slot]` backward. `events` must be ordered by
/// index.
pub fn summarize(
    events: &[Event],
    pos: usize,
    slot: i64,
    interval: i64,
    direction: SummaryDirection,
    summary_type: SummaryType,
) -> Value {
    let Some(mut acc) = create_accumulator(summary_type) else {
        return Value::Null;
    };

    let window = match direction {
        SummaryDirection::Unspecified => return Value::Null,
        SummaryDirection::Forward => {
            let lo = events.partition_point(|e| e.index < slot);
            let hi = events.partition_point(|e| e.index < slot.saturating_add(interval));
            &events[lo..hi.max(lo)]
        }
        SummaryDirection::Backward => {
            let lo = events.partition_point(|e| e.index <= slot.saturating_sub(interval));
            let hi = events.partition_point(|e| e.index <= slot);
            &events[lo..hi.max(lo)]
        }
    };

    for event in window {
        if let Some(value) = event.values.get(pos) {
            acc.accumulate(value);
        }
    }
    acc.result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[(i64, f64)]) -> Vec<Event> {
        values
            .iter()
            .map(|&(t, v)| Event::new(t, vec![Value::Timestamp(t), Value::Float64(v)]))
            .collect()
    }

    fn run(summary_type: SummaryType, values: &[f64]) -> Value {
        let mut acc = create_accumulator(summary_type).unwrap();
        for v in values {
            acc.accumulate(&Value::Float64(*v));
        }
        acc.accumulate(&Value::Null);
        acc.result()
    }

    #[test]
    fn test_statistics() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(run(SummaryType::Count, &xs), Value::Int64(8));
        assert_eq!(run(SummaryType::Minimum, &xs), Value::Float64(2.0));
        assert_eq!(run(SummaryType::Maximum, &xs), Value::Float64(9.0));
        assert_eq!(run(SummaryType::Range, &xs), Value::Float64(7.0));
        assert_eq!(run(SummaryType::Mean, &xs), Value::Float64(5.0));
        assert_eq!(run(SummaryType::Total, &xs), Value::Float64(40.0));
        let Value::Float64(population) = run(SummaryType::PopulationStandardDeviation, &xs) else {
            panic!("expected a float");
        };
        assert!((population - 2.0).abs() < 1e-12);

        let Value::Float64(sample) = run(SummaryType::StandardDeviation, &xs) else {
            panic!("expected a float");
        };
        assert!((sample - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window_is_null_for_every_type() {
        for summary_type in [
            SummaryType::Count,
            SummaryType::Minimum,
            SummaryType::Maximum,
            SummaryType::Range,
            SummaryType::Mean,
            SummaryType::Total,
            SummaryType::StandardDeviation,
            SummaryType::PopulationStandardDeviation,
        ] {
            assert_eq!(run(summary_type, &[]), Value::Null, "{summary_type:?}");
        }
        assert!(create_accumulator(SummaryType::Unspecified).is_none());
    }

    #[test]
    fn test_window_bounds() {
        let events = series(&[(0, 1.0), (10, 2.0), (20, 4.0), (30, 8.0)]);

        // [10, 30)
        assert_eq!(
            summarize(&events, 1, 10, 20, SummaryDirection::Forward, SummaryType::Total),
            Value::Float64(6.0)
        );
        // (0, 20]
        assert_eq!(
            summarize(&events, 1, 20, 20, SummaryDirection::Backward, SummaryType::Total),
            Value::Float64(6.0)
        );
        // Nothing in [31, 41)
        assert_eq!(
            summarize(&events, 1, 31, 10, SummaryDirection::Forward, SummaryType::Count),
            Value::Null
        );
    }
}
