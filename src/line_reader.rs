//! Line reading with a bound on line length.
//!
//! Capture tool output and broadcast records are read line by line from
//! sources the service does not control. [`CappedLines`] keeps at most
//! `max_len` bytes of any line and discards the rest up to the next newline,
//! so a peer that never sends a newline cannot grow a buffer without limit.

use log::warn;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Default bound for capture output and broadcast records.
pub const MAX_LINE_LEN: usize = 8 * 1024;

pub struct CappedLines<R> {
    reader: R,
    max_len: usize,
    buf: Vec<u8>,
}

impl<R> CappedLines<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            max_len,
            buf: Vec::new(),
        }
    }

    /// Returns the next line without its `\n` or `\r\n` terminator, or `None`
    /// at EOF. A line longer than the bound is cut to `max_len` bytes. Invalid
    /// UTF-8 is replaced rather than treated as an error.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let limit = self.max_len as u64 + 1;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        } else if self.buf.len() > self.max_len {
            self.buf.truncate(self.max_len);
            let discarded = self.discard_line().await? + 1;
            warn!(
                "Line longer than {} bytes cut short, {} bytes discarded",
                self.max_len, discarded
            );
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Consumes input up to and including the next newline. Returns the
    /// number of bytes dropped.
    async fn discard_line(&mut self) -> io::Result<usize> {
        let mut dropped = 0;
        loop {
            let (consumed, done) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    return Ok(dropped);
                }
                match available.iter().position(|byte| *byte == b'\n') {
                    Some(newline) => (newline + 1, true),
                    None => (available.len(), false),
                }
            };
            self.reader.consume(consumed);
            dropped += consumed;
            if done {
                return Ok(dropped);
            }
        }
    }
}
