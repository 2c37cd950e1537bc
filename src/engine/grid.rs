use crate::view::ValidationError;

/// The fixed time slots an evaluation produces rows for.
///
/// `ceil((end - start) / interval) + 1` slots starting at `start`; the last
/// one is clamped to `end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeGrid {
    pub start: i64,
    pub end: i64,
    pub interval: i64,
    slots: Vec<i64>,
}

impl TimeGrid {
    pub fn new(start: i64, end: i64, interval: i64, max_slots: u64) -> Result<Self, ValidationError> {
        if interval <= 0 {
            return Err(ValidationError::NonPositiveInterval);
        }
        if end < start {
            return Err(ValidationError::ReversedRange);
        }

        let span = (end as i128) - (start as i128);
        let steps = (span + interval as i128 - 1) / interval as i128;
        let count = steps as u64 + 1;
        if count > max_slots {
            return Err(ValidationError::TooManySlots {
                requested: count,
                limit: max_slots,
            });
        }

        let slots = (0..count as i64)
            .map(|i| start.saturating_add(i.saturating_mul(interval)).min(end))
            .collect();

        Ok(Self {
            start,
            end,
            interval,
            slots,
        })
    }

    pub fn slots(&self) -> &[i64] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Range of raw data needed to evaluate every slot, including summary
    /// windows reaching one interval beyond either end
    pub fn read_range(&self) -> (i64, i64) {
        (
            self.start.saturating_sub(self.interval),
            self.end.saturating_add(self.interval),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    #[test]
    fn test_hour_at_twenty_minutes() {
        let t = 1_700_000_000_000;
        let grid = TimeGrid::new(t, t + 60 * MINUTE, 20 * MINUTE, 1000).unwrap();
        assert_eq!(
            grid.slots(),
            &[t, t + 20 * MINUTE, t + 40 * MINUTE, t + 60 * MINUTE]
        );
    }

    #[test]
    fn test_last_slot_clamped() {
        let grid = TimeGrid::new(0, 60 * MINUTE, 25 * MINUTE, 1000).unwrap();
        assert_eq!(grid.slots(), &[0, 25 * MINUTE, 50 * MINUTE, 60 * MINUTE]);
    }

    #[test]
    fn test_single_slot() {
        let grid = TimeGrid::new(5, 5, MINUTE, 1000).unwrap();
        assert_eq!(grid.slots(), &[5]);
    }

    #[test]
    fn test_invalid_grids() {
        assert_eq!(TimeGrid::new(0, 10, 0, 10), Err(ValidationError::NonPositiveInterval));
        assert_eq!(TimeGrid::new(10, 0, 1, 10), Err(ValidationError::ReversedRange));
        assert_eq!(
            TimeGrid::new(0, 100, 1, 10),
            Err(ValidationError::TooManySlots {
                requested: 101,
                limit: 10
            })
        );
    }
}
