// Data exporter module: type mapping, literal encoding and INSERT batching
pub mod blob_externalizer;
pub mod sql_generator;
pub mod type_mapper;
pub mod value_encoder;


pub use blob_externalizer::*;
pub use sql_generator::*;
pub use type_mapper::*;
pub use value_encoder::*;
