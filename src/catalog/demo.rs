//! Sample tank streams used by the server's demo mode and the walkthrough

use rand::Rng;

use super::item::{Event, Item, Member};
use super::store::{CatalogError, InMemoryCatalog};
use crate::data::{DataType, Value};

pub const TANK_TYPE_1: &str = "Time_SampleType1";
pub const TANK_TYPE_2: &str = "Time_SampleType2";
pub const TANK_STREAM_1: &str = "dvTank2";
pub const TANK_STREAM_2: &str = "dvTank100";
pub const SETTINGS_STREAM: &str = "dvTankSettings";

/// Spacing of generated events; unrelated to any view interval
pub const SAMPLE_SPACING_MS: i64 = 120_000;

/// Register the sample tanks and fill `[end - range, end]` with random
/// pressure (0-100) and temperature (50-70) readings.
///
/// Also registers a settings stream keyed by name, which a `dvTank*` query
/// reports as ineligible.
pub fn seed_sample_tanks<R: Rng>(
    catalog: &InMemoryCatalog,
    end_ms: i64,
    range_ms: i64,
    rng: &mut R,
) -> Result<usize, CatalogError> {
    catalog.register_item(
        Item::new(TANK_STREAM_1, "Tank2", TANK_TYPE_1)
            .with_description("A stream to hold sample Pressure and Temperature events")
            .with_member(Member::time_key("Time"))
            .with_member(Member::new("Pressure", DataType::Float64).with_uom("psi"))
            .with_member(Member::new("Temperature", DataType::Float64).with_uom("degF")),
    )?;
    catalog.register_item(
        Item::new(TANK_STREAM_2, "Tank100", TANK_TYPE_2)
            .with_description("A stream to hold sample Pressure and Ambient Temperature events")
            .with_member(Member::time_key("Time"))
            .with_member(Member::new("Pressure", DataType::Float64).with_uom("psi"))
            .with_member(Member::new("AmbientTemperature", DataType::Float64).with_uom("degC")),
    )?;
    catalog.register_item(
        Item::new(SETTINGS_STREAM, "TankSettings", "Settings")
            .with_member(Member::new("Setting", DataType::String).as_key())
            .with_member(Member::new("Value", DataType::Float64)),
    )?;

    let start_ms = end_ms - range_ms;
    let mut first = Vec::new();
    let mut second = Vec::new();
    let mut offset = 0;
    while offset <= range_ms {
        let index = start_ms + offset;
        first.push(Event::new(
            index,
            vec![
                Value::Null,
                Value::Float64(rng.gen_range(0.0..100.0)),
                Value::Float64(rng.gen_range(50.0..70.0)),
            ],
        ));
        second.push(Event::new(
            index,
            vec![
                Value::Null,
                Value::Float64(rng.gen_range(0.0..100.0)),
                Value::Float64(rng.gen_range(50.0..70.0)),
            ],
        ));
        offset += SAMPLE_SPACING_MS;
    }

    let inserted = catalog.insert_events(TANK_STREAM_1, first)?
        + catalog.insert_events(TANK_STREAM_2, second)?;

    tracing::info!(events = inserted, "Seeded sample tank streams");
    Ok(inserted)
}
