// Dump writer module: output stream and run orchestration
pub mod output;
pub mod writer;

#[cfg(test)]
mod tests;

pub use output::OutputSink;
pub use writer::{run_dump, DumpWriter, TOOL_NAME};
