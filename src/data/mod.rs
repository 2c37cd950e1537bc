pub mod time;
pub mod value;

pub use time::{format_millis, parse_interval, parse_time, TimeParseError};
pub use value::{DataType, Value};
