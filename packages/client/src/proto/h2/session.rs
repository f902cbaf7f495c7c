//! HTTP/2 session
//!
//! One session per connection. All I/O is non-blocking: callers queue work
//! with [`H2Session::submit`], then alternate [`pump_writes`] and
//! [`pump_reads`] as readiness allows — directly from the request state
//! machine in sequential mode, or from the session manager's I/O thread in
//! concurrent mode.
//!
//! [`pump_writes`]: H2Session::pump_writes
//! [`pump_reads`]: H2Session::pump_reads

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::fd::RawFd;

use super::frame::{self, Frame, FrameReader, PrioritySpec, CONNECTION_PREFACE};
use super::hpack;
use crate::error::{self, Error};
use crate::http::{HeaderList, Request};
use crate::tls::Transport;

/// SETTINGS the session opens with when the profile carries none:
/// INITIAL_WINDOW_SIZE, MAX_CONCURRENT_STREAMS, MAX_FRAME_SIZE.
pub const DEFAULT_SETTINGS: &[(u16, u32)] = &[(4, 16 * 1024 * 1024), (3, 256), (5, 16 * 1024)];

/// Connection WINDOW_UPDATE paired with the default SETTINGS.
pub const DEFAULT_WINDOW_UPDATE: u32 = 16 * 1024 * 1024 - 65_535;

const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 4;
const SETTINGS_MAX_FRAME_SIZE: u16 = 5;

const DEFAULT_SEND_WINDOW: i64 = 65_535;
const DEFAULT_MAX_FRAME_SIZE: usize = 16_384;

/// Everything a request needs to become an HTTP/2 stream.
#[derive(Debug, Clone)]
pub struct H2RequestHead {
    pub method: String,
    pub path: String,
    pub authority: String,
    /// Caller headers, lowercased, `host` removed.
    pub headers: Vec<(String, String)>,
    pub priority: Option<PrioritySpec>,
    pub body: Option<Vec<u8>>,
}

impl H2RequestHead {
    pub fn from_request(request: &Request) -> Self {
        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("host"))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let priority = request.priority.is_non_default().then(|| PrioritySpec {
            depends_on: request.priority.depends_on,
            weight: request.priority.weight,
            exclusive: request.priority.exclusive,
        });
        Self {
            method: request.method.as_str().to_string(),
            path: request.path_and_query(),
            authority: request.host().to_string(),
            headers,
            priority,
            body: request.body.as_ref().map(|b| b.to_vec()),
        }
    }
}

/// Per-stream context.
#[derive(Debug)]
pub struct StreamState {
    pub stream_id: u32,
    pub status: Option<u16>,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub headers_complete: bool,
    pub closed: bool,
    pub error: Option<String>,
    /// Request body bytes pushed to the wire so far.
    pub body_sent: usize,
    send_window: i64,
    pending_body: Vec<u8>,
    pending_pos: usize,
    end_queued: bool,
}

impl StreamState {
    fn new(stream_id: u32, buffer_size: usize, send_window: i64) -> Self {
        Self {
            stream_id,
            status: None,
            headers: HeaderList::new(),
            body: Vec::with_capacity(buffer_size),
            headers_complete: false,
            closed: false,
            error: None,
            body_sent: 0,
            send_window,
            pending_body: Vec::new(),
            pending_pos: 0,
            end_queued: false,
        }
    }

    fn pending_remaining(&self) -> usize {
        self.pending_body.len() - self.pending_pos
    }

    /// A closed, errored placeholder for signalling failures to waiters
    /// that never got a real stream context.
    pub(crate) fn failed(reason: &str) -> Self {
        let mut stream = Self::new(0, 0, 0);
        stream.closed = true;
        stream.error = Some(reason.to_string());
        stream
    }
}

/// One HTTP/2 connection.
pub struct H2Session {
    transport: Transport,
    reader: FrameReader,
    encoder: hpack::Encoder,
    decoder: hpack::Decoder,
    outbound: Vec<u8>,
    outbound_pos: usize,
    next_stream_id: u32,
    streams: HashMap<u32, StreamState>,
    /// In-progress header block split across CONTINUATION frames.
    continuation: Option<(u32, Vec<u8>, bool)>,
    send_window: i64,
    peer_initial_window: i64,
    peer_max_frame_size: usize,
    preface_sent: bool,
    dead: Option<String>,
    goaway_last_stream: Option<u32>,
    stream_buffer_size: usize,
}

impl H2Session {
    pub fn new(transport: Transport, stream_buffer_size: usize) -> Self {
        Self {
            transport,
            reader: FrameReader::new(),
            encoder: hpack::Encoder::new(),
            decoder: hpack::Decoder::new(),
            outbound: Vec::with_capacity(4096),
            outbound_pos: 0,
            next_stream_id: 1,
            streams: HashMap::new(),
            continuation: None,
            send_window: DEFAULT_SEND_WINDOW,
            peer_initial_window: DEFAULT_SEND_WINDOW,
            peer_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            preface_sent: false,
            dead: None,
            goaway_last_stream: None,
            stream_buffer_size,
        }
    }

    /// Queue the connection preface, SETTINGS in the given order, and the
    /// connection-level WINDOW_UPDATE. Idempotent.
    pub fn send_preamble(&mut self, settings: &[(u16, u32)], window_update: u32) {
        if self.preface_sent {
            return;
        }
        self.outbound.extend_from_slice(CONNECTION_PREFACE);
        let settings = if settings.is_empty() {
            DEFAULT_SETTINGS
        } else {
            settings
        };
        frame::encode_settings(settings, &mut self.outbound);
        frame::encode_window_update(0, window_update, &mut self.outbound);
        self.preface_sent = true;
    }

    pub fn preface_sent(&self) -> bool {
        self.preface_sent
    }

    pub fn raw_fd(&self) -> RawFd {
        self.transport.raw_fd()
    }

    pub fn is_alive(&self) -> bool {
        self.dead.is_none() && self.goaway_last_stream.is_none()
    }

    /// Negotiated TLS identity accessors for pooling metadata.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Open a stream: HPACK-encode pseudo-headers and caller headers,
    /// queue HEADERS (with PRIORITY when non-default), queue body DATA as
    /// flow control allows. Returns the stream id.
    pub fn submit(&mut self, head: &H2RequestHead) -> Result<u32, Error> {
        if let Some(ref reason) = self.dead {
            return Err(error::protocol(format!("session dead: {reason}")));
        }
        if self.goaway_last_stream.is_some() {
            return Err(error::protocol("session received GOAWAY"));
        }
        if !self.preface_sent {
            self.send_preamble(&[], DEFAULT_WINDOW_UPDATE);
        }

        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        let mut fields: Vec<(String, String)> = Vec::with_capacity(head.headers.len() + 4);
        fields.push((":method".into(), head.method.clone()));
        fields.push((":path".into(), head.path.clone()));
        fields.push((":scheme".into(), "https".into()));
        fields.push((":authority".into(), head.authority.clone()));
        fields.extend(head.headers.iter().cloned());

        let mut fragment = Vec::with_capacity(256);
        self.encoder.encode(&fields, &mut fragment);

        let has_body = head.body.as_ref().map(|b| !b.is_empty()).unwrap_or(false);
        frame::encode_headers(
            stream_id,
            &fragment,
            !has_body,
            head.priority,
            &mut self.outbound,
        );

        let mut stream = StreamState::new(stream_id, self.stream_buffer_size, self.peer_initial_window);
        if has_body {
            stream.pending_body = head.body.clone().unwrap_or_default();
        } else {
            stream.end_queued = true;
        }
        self.streams.insert(stream_id, stream);

        if has_body {
            self.flush_stream_body(stream_id);
        }
        Ok(stream_id)
    }

    /// Push as much pending request body as the connection and stream
    /// windows allow, in max-frame-size slices. The data source sets
    /// END_STREAM when it drains.
    fn flush_stream_body(&mut self, stream_id: u32) {
        let max_frame = self.peer_max_frame_size;
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        while stream.pending_remaining() > 0 {
            let window = self.send_window.min(stream.send_window);
            if window <= 0 {
                return;
            }
            let take = stream
                .pending_remaining()
                .min(window as usize)
                .min(max_frame);
            let start = stream.pending_pos;
            let end = start + take;
            let last = end == stream.pending_body.len();
            frame::encode_data(
                stream_id,
                &stream.pending_body[start..end],
                last,
                &mut self.outbound,
            );
            stream.pending_pos = end;
            stream.body_sent += take;
            stream.send_window -= take as i64;
            self.send_window -= take as i64;
            if last {
                stream.end_queued = true;
                stream.pending_body = Vec::new();
                stream.pending_pos = 0;
            }
        }
    }

    /// Drain queued wire bytes. `Ok(true)` when everything flushed,
    /// `Ok(false)` when the socket would block.
    pub fn pump_writes(&mut self) -> Result<bool, Error> {
        while self.outbound_pos < self.outbound.len() {
            match self.transport.write(&self.outbound[self.outbound_pos..]) {
                Ok(0) => {
                    return Err(self.fatal("connection closed while writing"));
                }
                Ok(n) => self.outbound_pos += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fatal(format!("write failed: {e}"))),
            }
        }
        self.outbound.clear();
        self.outbound_pos = 0;
        Ok(true)
    }

    pub fn has_pending_writes(&self) -> bool {
        self.outbound_pos < self.outbound.len()
    }

    /// Read whatever the socket has and process complete frames.
    /// Returns the number of frames handled.
    pub fn pump_reads(&mut self) -> Result<usize, Error> {
        let mut scratch = [0u8; 16 * 1024];
        loop {
            match self.transport.read(&mut scratch) {
                Ok(0) => {
                    if self.streams.values().any(|s| !s.closed) {
                        return Err(self.fatal("connection closed mid-stream"));
                    }
                    self.dead = Some("connection closed".to_string());
                    break;
                }
                Ok(n) => self.reader.feed(&scratch[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.fatal(format!("read failed: {e}"))),
            }
        }

        let mut handled = 0;
        loop {
            let frame = match self.reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Err(self.fatal(e.message())),
            };
            self.on_frame_recv(frame)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Frame dispatch. END_STREAM on HEADERS or DATA with a non-zero
    /// stream id marks the stream complete.
    fn on_frame_recv(&mut self, frame: Frame) -> Result<(), Error> {
        match frame {
            Frame::Settings { ack, settings } => {
                if !ack {
                    for (id, value) in &settings {
                        match *id {
                            SETTINGS_INITIAL_WINDOW_SIZE => {
                                let delta = i64::from(*value) - self.peer_initial_window;
                                self.peer_initial_window = i64::from(*value);
                                for stream in self.streams.values_mut() {
                                    stream.send_window += delta;
                                }
                            }
                            SETTINGS_MAX_FRAME_SIZE => {
                                self.peer_max_frame_size = *value as usize;
                            }
                            _ => {}
                        }
                    }
                    frame::encode_settings_ack(&mut self.outbound);
                }
            }
            Frame::Ping { ack, data } => {
                if !ack {
                    frame::encode_ping_ack(data, &mut self.outbound);
                }
            }
            Frame::Headers {
                stream_id,
                fragment,
                end_stream,
                end_headers,
                ..
            } => {
                if stream_id == 0 {
                    return Err(self.fatal("HEADERS on stream 0"));
                }
                if end_headers {
                    self.apply_header_block(stream_id, &fragment, end_stream)?;
                } else {
                    self.continuation = Some((stream_id, fragment, end_stream));
                }
            }
            Frame::Continuation {
                stream_id,
                fragment,
                end_headers,
            } => {
                let Some((pending_id, mut block, end_stream)) = self.continuation.take() else {
                    return Err(self.fatal("CONTINUATION without HEADERS"));
                };
                if pending_id != stream_id {
                    return Err(self.fatal("CONTINUATION stream mismatch"));
                }
                block.extend_from_slice(&fragment);
                if end_headers {
                    self.apply_header_block(stream_id, &block, end_stream)?;
                } else {
                    self.continuation = Some((stream_id, block, end_stream));
                }
            }
            Frame::Data {
                stream_id,
                data,
                end_stream,
            } => {
                if stream_id == 0 {
                    return Err(self.fatal("DATA on stream 0"));
                }
                self.on_data_chunk(stream_id, &data);
                if !data.is_empty() {
                    frame::encode_window_update(0, data.len() as u32, &mut self.outbound);
                    if !end_stream {
                        frame::encode_window_update(
                            stream_id,
                            data.len() as u32,
                            &mut self.outbound,
                        );
                    }
                }
                if end_stream {
                    if let Some(stream) = self.streams.get_mut(&stream_id) {
                        stream.closed = true;
                    }
                }
            }
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.error = Some(format!("stream reset by peer: error {error_code}"));
                    stream.closed = true;
                }
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                if stream_id == 0 {
                    self.send_window += i64::from(increment);
                } else if let Some(stream) = self.streams.get_mut(&stream_id) {
                    stream.send_window += i64::from(increment);
                }
                let flushable: Vec<u32> = self
                    .streams
                    .values()
                    .filter(|s| s.pending_remaining() > 0)
                    .map(|s| s.stream_id)
                    .collect();
                for id in flushable {
                    self.flush_stream_body(id);
                }
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
            } => {
                self.goaway_last_stream = Some(last_stream_id);
                for stream in self.streams.values_mut() {
                    if stream.stream_id > last_stream_id && !stream.closed {
                        stream.error =
                            Some(format!("GOAWAY before stream completion: error {error_code}"));
                        stream.closed = true;
                    }
                }
            }
            Frame::PushPromise { stream_id } => {
                // Push is disabled in our SETTINGS; a pushing peer is broken.
                frame::encode_rst_stream(stream_id, 0x7, &mut self.outbound);
            }
            Frame::Priority { .. } | Frame::Unknown { .. } => {}
        }
        Ok(())
    }

    /// Decode a complete header block and route each field to the stream.
    fn apply_header_block(
        &mut self,
        stream_id: u32,
        block: &[u8],
        end_stream: bool,
    ) -> Result<(), Error> {
        let fields = match self.decoder.decode(block) {
            Ok(fields) => fields,
            Err(e) => return Err(self.fatal(e.message())),
        };
        for (name, value) in fields {
            self.on_header(stream_id, &name, &value);
        }
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.headers_complete = true;
            if end_stream {
                stream.closed = true;
            }
        }
        Ok(())
    }

    /// `:status` sets the response code; everything else is stored in
    /// arrival order. Unknown stream ids are ignored (a late frame after
    /// local removal).
    fn on_header(&mut self, stream_id: u32, name: &str, value: &str) {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if name == ":status" {
            stream.status = value.parse().ok();
        } else if !name.starts_with(':') {
            stream.headers.append(name, value);
        }
    }

    /// Append a DATA chunk to the stream's body buffer (geometric growth
    /// is `Vec`'s).
    fn on_data_chunk(&mut self, stream_id: u32, data: &[u8]) {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.body.extend_from_slice(data);
        }
    }

    pub fn stream_complete(&self, stream_id: u32) -> bool {
        self.streams
            .get(&stream_id)
            .map(|s| s.closed)
            .unwrap_or(false)
    }

    /// Ids of every stream that has reached END_STREAM (or errored).
    pub fn completed_streams(&self) -> Vec<u32> {
        self.streams
            .values()
            .filter(|s| s.closed)
            .map(|s| s.stream_id)
            .collect()
    }

    /// Remove and return a finished (or still-running) stream context.
    pub fn take_stream(&mut self, stream_id: u32) -> Option<StreamState> {
        self.streams.remove(&stream_id)
    }

    pub fn open_stream_count(&self) -> usize {
        self.streams.values().filter(|s| !s.closed).count()
    }

    /// Mark the session dead and every open stream failed; returns the
    /// failed stream ids so the caller can signal waiters after releasing
    /// its session lock.
    pub fn fail_all(&mut self, reason: &str) -> Vec<u32> {
        self.dead = Some(reason.to_string());
        let mut failed = Vec::new();
        for stream in self.streams.values_mut() {
            if !stream.closed {
                stream.error = Some(reason.to_string());
                stream.closed = true;
                failed.push(stream.stream_id);
            }
        }
        failed
    }

    fn fatal(&mut self, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        self.fail_all(&reason);
        error::protocol(reason)
    }

    /// Queue a GOAWAY for orderly teardown.
    pub fn queue_goaway(&mut self) {
        frame::encode_goaway(0, 0, &mut self.outbound);
    }
}

impl std::fmt::Debug for H2Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H2Session")
            .field("streams", &self.streams.len())
            .field("preface_sent", &self.preface_sent)
            .field("alive", &self.is_alive())
            .finish()
    }
}
