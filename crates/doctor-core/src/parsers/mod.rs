//! Step output parsers.
//!
//! Deterministic parsers for the outputs of the inspection steps. Each parser
//! takes the step id (for error context) and the raw stdout, and returns a
//! typed struct or a `ParseError`.
//!
//! # Supported steps
//!
//! - `uptime`: load averages and uptime span → `UptimeInfo`
//! - `cat /proc/loadavg`: load averages and task counts → `LoadAverage`
//! - `ps -eo ...`: process table → `Vec<ProcessInfo>`
//! - `free -h`: memory and swap → `MemoryInfo`
//! - `df -h`: disk usage per mount → `Vec<DiskUsage>`
//! - `sensors`: temperatures and fans → `SensorReadings`

pub mod atoms;
pub mod df;
pub mod free;
pub mod load;
pub mod ps;
pub mod sensors;

pub use atoms::{parse_decimal, parse_percent, parse_size, percent_of, ParseError, ParseErrorReason};
pub use df::{fullest_mount, parse_df, DiskUsage};
pub use free::{parse_free, MemoryInfo};
pub use load::{parse_loadavg, parse_uptime, LoadAverage, UptimeInfo};
pub use ps::{parse_ps, top_by_cpu, top_by_mem, ProcessInfo};
pub use sensors::{parse_sensors, FanReading, SensorReadings, TemperatureReading};
