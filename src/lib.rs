pub mod error;
pub mod types;
pub mod config;
pub mod logging;
pub mod monitoring;
pub mod catalog_reader;
pub mod schema_converter;
pub mod data_exporter;
pub mod dump_writer;

pub use config::DumpConfig;
pub use dump_writer::{run_dump, DumpWriter};
pub use error::{ConvertError, ConvertResult};
pub use monitoring::{DumpOutcome, DumpReport};
