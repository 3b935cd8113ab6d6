//! Storage layer for playlake
//!
//! Loads the raw JSON sources into Arrow tables and persists star-schema
//! tables as Hive-partitioned Parquet, both over OpenDAL operators supplied
//! by the caller.

mod encoding;
mod error;
mod glob;
mod loader;
mod partition;
mod storage;
mod write;

pub use encoding::{encode_parquet, writer_properties, EncodedFile, DEFAULT_ROW_GROUP_SIZE};
pub use error::{ErrorCode, Result, WriterError};
pub use glob::GlobPattern;
pub use loader::{decode_json, RawLoader};
pub use partition::{escape_path_value, unescape_path_value, DEFAULT_PARTITION};
pub use storage::build_operator;
pub use write::{read_table, PartitionedWriter, WriteSummary, SUCCESS_MARKER};

pub use opendal::Operator;
