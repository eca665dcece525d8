use thiserror::Error;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};

use crate::record::{RecordError, SamRecord};

/// A line from a SAM text stream.
#[derive(Debug)]
pub enum SamLine {
    Header(String),
    Record(SamRecord),
}

/// SamIo is created from a `Read` and a `Write`. It classifies input lines
/// into header and alignment lines, parsing the latter into [`SamRecord`]s,
/// and writes surviving lines back out. The input must be sorted by
/// chromosome and position for downstream grouping to be correct; SamIo
/// itself has no ordering requirements.
pub struct SamIo<R, W>
where
    R: AsyncRead,
    W: AsyncWrite,
{
    input: BufReader<R>,
    output: BufWriter<W>,
    line_buf: String,
}

impl<R, W> SamIo<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(read: R, write: W) -> SamIo<R, W> {
        SamIo {
            input: BufReader::new(read),
            output: BufWriter::new(write),
            line_buf: String::new(),
        }
    }

    /// Next header or record line, `None` at end of input. Blank lines are
    /// skipped.
    pub async fn read_line(&mut self) -> Result<Option<SamLine>, SamIoError> {
        loop {
            self.line_buf.clear();
            if self.input.read_line(&mut self.line_buf).await? == 0 {
                return Ok(None);
            }
            let line = self.line_buf.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if line.starts_with('@') {
                return Ok(Some(SamLine::Header(line.to_string())));
            }
            return Ok(Some(SamLine::Record(SamRecord::parse(line)?)));
        }
    }

    pub async fn write_header(&mut self, line: &str) -> std::io::Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await
    }

    pub async fn write_record(&mut self, record: &SamRecord) -> std::io::Result<()> {
        self.output.write_all(record.to_string().as_bytes()).await?;
        self.output.write_all(b"\n").await
    }

    /// Flush buffered output and shut the writer down.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.output.flush().await?;
        self.output.shutdown().await
    }

    /// Consume the io pair and return the writer. Call [`shutdown`] first so
    /// no buffered output is lost.
    ///
    /// [`shutdown`]: SamIo::shutdown
    pub fn into_write(self) -> W {
        self.output.into_inner()
    }
}

#[derive(Debug, Error)]
pub enum SamIoError {
    #[error("io error reading SAM")]
    IoError(#[from] std::io::Error),
    #[error("error parsing SAM record: {0}")]
    ParseError(#[from] RecordError),
}
