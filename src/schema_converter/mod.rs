// Schema converter module: ordering and MySQL DDL generation
pub mod constraint_generator;
pub mod ddl_generator;
pub mod dependency_resolver;
pub mod identifiers;
pub mod index_generator;
pub mod object_rewriter;

#[cfg(test)]
mod tests;

pub use constraint_generator::*;
pub use ddl_generator::*;
pub use dependency_resolver::*;
pub use index_generator::*;
pub use object_rewriter::*;
