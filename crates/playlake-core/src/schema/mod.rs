pub mod field_names;
pub mod raw;
pub mod star;

pub use raw::{log_event_schema, song_catalog_schema};
pub use star::{start_time_type, StarTable, START_TIME_ZONE};
