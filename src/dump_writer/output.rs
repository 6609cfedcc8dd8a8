use crate::error::{ConvertError, ConvertResult};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Destination stream for the script, plain or gzip-compressed
pub enum OutputSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputSink {
    pub fn create(path: &Path, compress: bool) -> ConvertResult<Self> {
        let file = File::create(path).map_err(|e| {
            ConvertError::setup(format!("Cannot create output file {}: {}", path.display(), e))
        })?;
        let writer = BufWriter::new(file);
        Ok(if compress {
            OutputSink::Gzip(GzEncoder::new(writer, Compression::default()))
        } else {
            OutputSink::Plain(writer)
        })
    }

    /// Flush everything and write the gzip trailer
    pub fn finish(self) -> ConvertResult<()> {
        let mut writer = match self {
            OutputSink::Plain(writer) => writer,
            OutputSink::Gzip(encoder) => encoder.finish().map_err(ConvertError::Output)?,
        };
        writer.flush().map_err(ConvertError::Output)
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(writer) => writer.write(buf),
            OutputSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(writer) => writer.flush(),
            OutputSink::Gzip(encoder) => encoder.flush(),
        }
    }
}
