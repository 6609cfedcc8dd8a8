// Catalog reader module: source access and descriptor construction
pub mod introspector;
pub mod source;


pub use introspector::*;
pub use source::*;
