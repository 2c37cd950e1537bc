//! Point-in-time values from an item's raw events

use crate::catalog::{Event, InterpolationMode};
use crate::data::{DataType, Value};

/// Mode actually applied to a member. Continuous on a non-numeric member
/// falls back to stepwise-leading.
pub fn effective_mode(data_type: DataType, mode: InterpolationMode) -> InterpolationMode {
    match mode {
        InterpolationMode::Continuous if !data_type.is_numeric() => {
            InterpolationMode::StepwiseContinuousLeading
        }
        other => other,
    }
}

/// Value of the member at position `pos` at time `t`.
///
/// `events` must be ordered by index. Events whose value for the member is
/// null are skipped. An exact index hit always returns the stored value;
/// slots before the first or after the last usable event are null.
pub fn value_at(events: &[Event], pos: usize, data_type: DataType, mode: InterpolationMode, t: i64) -> Value {
    let usable = |e: &&Event| e.values.get(pos).is_some_and(|v| !v.is_null());

    let split = events.partition_point(|e| e.index < t);
    let (before, after) = events.split_at(split);

    if let Some(hit) = after.iter().take_while(|e| e.index == t).find(usable) {
        return hit.values[pos].clone();
    }

    let prev = before.iter().rev().find(usable);
    let next = after.iter().find(|e| e.index > t && usable(e));
    let (Some(prev), Some(next)) = (prev, next) else {
        return Value::Null;
    };

    match effective_mode(data_type, mode) {
        InterpolationMode::Discrete => Value::Null,
        InterpolationMode::StepwiseContinuousLeading => prev.values[pos].clone(),
        InterpolationMode::StepwiseContinuousTrailing => next.values[pos].clone(),
        InterpolationMode::Continuous => {
            match (prev.values[pos].as_f64(), next.values[pos].as_f64()) {
                (Some(a), Some(b)) => {
                    let fraction = (t - prev.index) as f64 / (next.index - prev.index) as f64;
                    Value::Float64(a + (b - a) * fraction)
                }
                _ => Value::Null,
            }
        }
    }
}
