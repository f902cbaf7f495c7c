//! Incremental chunked transfer decoding
//!
//! Feed bytes as they arrive; the decoder consumes what it can and says
//! whether the terminating `0\r\n\r\n` has been seen. Trailer fields after
//! the last chunk are consumed and discarded.

use crate::error::{self, Error};

/// Framing violations. Converted into the crate error at the decoder's
/// boundary; every variant means the peer's framing is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("bad chunk size: {0}")]
    BadSize(String),
    #[error("missing CRLF after chunk")]
    MissingCrlf,
    #[error("non-UTF-8 chunk framing")]
    NonUtf8Line,
}

impl From<ChunkError> for Error {
    fn from(e: ChunkError) -> Self {
        error::parse(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading the hex size line.
    Size,
    /// Reading chunk payload; `remaining` bytes left.
    Data,
    /// Expecting the CRLF after a chunk payload.
    DataEnd,
    /// After the zero-size chunk: reading trailer lines until blank.
    Trailers,
    Done,
}

/// Streaming decoder for `Transfer-Encoding: chunked` bodies.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
    line: Vec<u8>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Size,
            remaining: 0,
            line: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Consume `input`, appending decoded payload bytes to `out`.
    /// Returns the number of input bytes consumed; the decoder consumes
    /// everything offered unless it is already done.
    pub fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize, Error> {
        let mut pos = 0;

        while pos < input.len() {
            match self.state {
                State::Size => {
                    pos += self.take_line(&input[pos..]);
                    if self.line_complete() {
                        let line = self.finish_line()?;
                        // Chunk extensions after ';' are ignored.
                        let size_text = line.split(';').next().unwrap_or("").trim();
                        let size = u64::from_str_radix(size_text, 16)
                            .map_err(|_| ChunkError::BadSize(size_text.to_string()))?;
                        if size == 0 {
                            self.state = State::Trailers;
                        } else {
                            self.remaining = size;
                            self.state = State::Data;
                        }
                    }
                }
                State::Data => {
                    let take = (input.len() - pos).min(self.remaining as usize);
                    out.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    self.remaining -= take as u64;
                    if self.remaining == 0 {
                        self.state = State::DataEnd;
                    }
                }
                State::DataEnd => {
                    pos += self.take_line(&input[pos..]);
                    if self.line_complete() {
                        let line = self.finish_line()?;
                        if !line.is_empty() {
                            return Err(ChunkError::MissingCrlf.into());
                        }
                        self.state = State::Size;
                    }
                }
                State::Trailers => {
                    pos += self.take_line(&input[pos..]);
                    if self.line_complete() {
                        let line = self.finish_line()?;
                        if line.is_empty() {
                            self.state = State::Done;
                        }
                        // Non-empty trailer fields are discarded.
                    }
                }
                State::Done => break,
            }
        }

        Ok(pos)
    }

    /// Accumulate bytes into the pending line buffer up to and including a
    /// newline; returns how many bytes were taken.
    fn take_line(&mut self, input: &[u8]) -> usize {
        match input.iter().position(|&b| b == b'\n') {
            Some(nl) => {
                self.line.extend_from_slice(&input[..=nl]);
                nl + 1
            }
            None => {
                self.line.extend_from_slice(input);
                input.len()
            }
        }
    }

    fn line_complete(&self) -> bool {
        self.line.last() == Some(&b'\n')
    }

    /// Take the pending line without its CRLF.
    fn finish_line(&mut self) -> Result<String, ChunkError> {
        let mut line = std::mem::take(&mut self.line);
        line.pop(); // \n
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line).map_err(|_| ChunkError::NonUtf8Line)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
