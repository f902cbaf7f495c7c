//! HTTP/2 frame codec (RFC 7540 §4, §6)
//!
//! Incremental reader over an accumulation buffer plus direct-to-buffer
//! writers. Padding is stripped on read; HEADERS-borne priority is
//! surfaced so browser-shaped PRIORITY emission round-trips.

use crate::error::{self, Error};

pub const FRAME_HEADER_LEN: usize = 9;
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Largest frame payload we accept before calling the peer abusive.
const MAX_ACCEPTED_FRAME_SIZE: usize = 1 << 24;

pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;
}

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// Stream dependency carried on PRIORITY frames and prioritized HEADERS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritySpec {
    pub depends_on: u32,
    /// Wire weight is value-1; this field holds the 1..=256 weight.
    pub weight: u16,
    pub exclusive: bool,
}

/// One parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: u32,
        data: Vec<u8>,
        end_stream: bool,
    },
    Headers {
        stream_id: u32,
        fragment: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
        priority: Option<PrioritySpec>,
    },
    Priority {
        stream_id: u32,
        spec: PrioritySpec,
    },
    RstStream {
        stream_id: u32,
        error_code: u32,
    },
    Settings {
        ack: bool,
        settings: Vec<(u16, u32)>,
    },
    PushPromise {
        stream_id: u32,
    },
    Ping {
        ack: bool,
        data: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error_code: u32,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        fragment: Vec<u8>,
        end_headers: bool,
    },
    /// Unknown types are ignored per RFC 7540 §4.1.
    Unknown {
        frame_type: u8,
    },
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_stream_id(buf: &[u8]) -> u32 {
    read_u32(buf) & 0x7fff_ffff
}

fn strip_padding(payload: &[u8], padded: bool) -> Result<&[u8], Error> {
    if !padded {
        return Ok(payload);
    }
    let pad_len = *payload
        .first()
        .ok_or_else(|| error::protocol("PADDED frame without pad length"))? as usize;
    let body = &payload[1..];
    if pad_len > body.len() {
        return Err(error::protocol("padding longer than frame"));
    }
    Ok(&body[..body.len() - pad_len])
}

fn parse_priority(buf: &[u8]) -> Result<PrioritySpec, Error> {
    if buf.len() < 5 {
        return Err(error::protocol("truncated priority fields"));
    }
    Ok(PrioritySpec {
        depends_on: read_stream_id(buf),
        weight: u16::from(buf[4]) + 1,
        exclusive: buf[0] & 0x80 != 0,
    })
}

/// Accumulates wire bytes and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let length =
            usize::from(self.buf[0]) << 16 | usize::from(self.buf[1]) << 8 | usize::from(self.buf[2]);
        if length > MAX_ACCEPTED_FRAME_SIZE {
            return Err(error::protocol(format!("frame of {length} bytes refused")));
        }
        if self.buf.len() < FRAME_HEADER_LEN + length {
            return Ok(None);
        }

        let frame_type = self.buf[3];
        let frame_flags = self.buf[4];
        let stream_id = read_stream_id(&self.buf[5..9]);
        let payload: Vec<u8> = self
            .buf
            .drain(..FRAME_HEADER_LEN + length)
            .skip(FRAME_HEADER_LEN)
            .collect();

        let frame = match frame_type {
            frame_type::DATA => {
                let body = strip_padding(&payload, frame_flags & flags::PADDED != 0)?;
                Frame::Data {
                    stream_id,
                    data: body.to_vec(),
                    end_stream: frame_flags & flags::END_STREAM != 0,
                }
            }
            frame_type::HEADERS => {
                let mut body = strip_padding(&payload, frame_flags & flags::PADDED != 0)?;
                let priority = if frame_flags & flags::PRIORITY != 0 {
                    let spec = parse_priority(body)?;
                    body = &body[5..];
                    Some(spec)
                } else {
                    None
                };
                Frame::Headers {
                    stream_id,
                    fragment: body.to_vec(),
                    end_stream: frame_flags & flags::END_STREAM != 0,
                    end_headers: frame_flags & flags::END_HEADERS != 0,
                    priority,
                }
            }
            frame_type::PRIORITY => Frame::Priority {
                stream_id,
                spec: parse_priority(&payload)?,
            },
            frame_type::RST_STREAM => {
                if payload.len() != 4 {
                    return Err(error::protocol("RST_STREAM length"));
                }
                Frame::RstStream {
                    stream_id,
                    error_code: read_u32(&payload),
                }
            }
            frame_type::SETTINGS => {
                if payload.len() % 6 != 0 {
                    return Err(error::protocol("SETTINGS length"));
                }
                let settings = payload
                    .chunks_exact(6)
                    .map(|c| (u16::from_be_bytes([c[0], c[1]]), read_u32(&c[2..6])))
                    .collect();
                Frame::Settings {
                    ack: frame_flags & flags::ACK != 0,
                    settings,
                }
            }
            frame_type::PUSH_PROMISE => Frame::PushPromise { stream_id },
            frame_type::PING => {
                if payload.len() != 8 {
                    return Err(error::protocol("PING length"));
                }
                let mut data = [0u8; 8];
                data.copy_from_slice(&payload);
                Frame::Ping {
                    ack: frame_flags & flags::ACK != 0,
                    data,
                }
            }
            frame_type::GOAWAY => {
                if payload.len() < 8 {
                    return Err(error::protocol("GOAWAY length"));
                }
                Frame::GoAway {
                    last_stream_id: read_stream_id(&payload),
                    error_code: read_u32(&payload[4..8]),
                }
            }
            frame_type::WINDOW_UPDATE => {
                if payload.len() != 4 {
                    return Err(error::protocol("WINDOW_UPDATE length"));
                }
                Frame::WindowUpdate {
                    stream_id,
                    increment: read_u32(&payload) & 0x7fff_ffff,
                }
            }
            frame_type::CONTINUATION => Frame::Continuation {
                stream_id,
                fragment: payload,
                end_headers: frame_flags & flags::END_HEADERS != 0,
            },
            other => Frame::Unknown { frame_type: other },
        };

        Ok(Some(frame))
    }
}

fn write_frame_header(out: &mut Vec<u8>, length: usize, frame_type: u8, frame_flags: u8, stream_id: u32) {
    out.push((length >> 16) as u8);
    out.push((length >> 8) as u8);
    out.push(length as u8);
    out.push(frame_type);
    out.push(frame_flags);
    out.extend_from_slice(&stream_id.to_be_bytes());
}

pub fn encode_settings(settings: &[(u16, u32)], out: &mut Vec<u8>) {
    write_frame_header(out, settings.len() * 6, frame_type::SETTINGS, 0, 0);
    for (id, value) in settings {
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&value.to_be_bytes());
    }
}

pub fn encode_settings_ack(out: &mut Vec<u8>) {
    write_frame_header(out, 0, frame_type::SETTINGS, flags::ACK, 0);
}

pub fn encode_window_update(stream_id: u32, increment: u32, out: &mut Vec<u8>) {
    write_frame_header(out, 4, frame_type::WINDOW_UPDATE, 0, stream_id);
    out.extend_from_slice(&(increment & 0x7fff_ffff).to_be_bytes());
}

pub fn encode_headers(
    stream_id: u32,
    fragment: &[u8],
    end_stream: bool,
    priority: Option<PrioritySpec>,
    out: &mut Vec<u8>,
) {
    let mut frame_flags = flags::END_HEADERS;
    if end_stream {
        frame_flags |= flags::END_STREAM;
    }
    let priority_len = if priority.is_some() { 5 } else { 0 };
    if priority.is_some() {
        frame_flags |= flags::PRIORITY;
    }
    write_frame_header(
        out,
        fragment.len() + priority_len,
        frame_type::HEADERS,
        frame_flags,
        stream_id,
    );
    if let Some(spec) = priority {
        let mut dep = spec.depends_on & 0x7fff_ffff;
        if spec.exclusive {
            dep |= 0x8000_0000;
        }
        out.extend_from_slice(&dep.to_be_bytes());
        out.push((spec.weight - 1) as u8);
    }
    out.extend_from_slice(fragment);
}

pub fn encode_data(stream_id: u32, data: &[u8], end_stream: bool, out: &mut Vec<u8>) {
    let frame_flags = if end_stream { flags::END_STREAM } else { 0 };
    write_frame_header(out, data.len(), frame_type::DATA, frame_flags, stream_id);
    out.extend_from_slice(data);
}

pub fn encode_ping_ack(data: [u8; 8], out: &mut Vec<u8>) {
    write_frame_header(out, 8, frame_type::PING, flags::ACK, 0);
    out.extend_from_slice(&data);
}

pub fn encode_rst_stream(stream_id: u32, error_code: u32, out: &mut Vec<u8>) {
    write_frame_header(out, 4, frame_type::RST_STREAM, 0, stream_id);
    out.extend_from_slice(&error_code.to_be_bytes());
}

pub fn encode_goaway(last_stream_id: u32, error_code: u32, out: &mut Vec<u8>) {
    write_frame_header(out, 8, frame_type::GOAWAY, 0, 0);
    out.extend_from_slice(&(last_stream_id & 0x7fff_ffff).to_be_bytes());
    out.extend_from_slice(&error_code.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_preserves_order() {
        let settings = vec![(1u16, 65536u32), (2, 0), (4, 6_291_456), (6, 262_144)];
        let mut wire = Vec::new();
        encode_settings(&settings, &mut wire);

        // The ids must appear on the wire in emission order.
        assert_eq!(&wire[9..11], &1u16.to_be_bytes());
        assert_eq!(&wire[15..17], &2u16.to_be_bytes());
        assert_eq!(&wire[21..23], &4u16.to_be_bytes());

        let mut reader = FrameReader::new();
        reader.feed(&wire);
        match reader.next_frame().expect("parse") {
            Some(Frame::Settings { ack, settings: s }) => {
                assert!(!ack);
                assert_eq!(s, settings);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_partial_feed_yields_nothing() {
        let mut wire = Vec::new();
        encode_window_update(0, 1024, &mut wire);
        let mut reader = FrameReader::new();
        reader.feed(&wire[..7]);
        assert_eq!(reader.next_frame().expect("partial"), None);
        reader.feed(&wire[7..]);
        assert_eq!(
            reader.next_frame().expect("complete"),
            Some(Frame::WindowUpdate {
                stream_id: 0,
                increment: 1024
            })
        );
    }

    #[test]
    fn test_headers_with_priority_round_trip() {
        let spec = PrioritySpec {
            depends_on: 3,
            weight: 256,
            exclusive: true,
        };
        let mut wire = Vec::new();
        encode_headers(5, b"\x82", false, Some(spec), &mut wire);

        let mut reader = FrameReader::new();
        reader.feed(&wire);
        match reader.next_frame().expect("parse") {
            Some(Frame::Headers {
                stream_id,
                fragment,
                end_stream,
                end_headers,
                priority,
            }) => {
                assert_eq!(stream_id, 5);
                assert_eq!(fragment, b"\x82");
                assert!(!end_stream);
                assert!(end_headers);
                assert_eq!(priority, Some(spec));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_data_end_stream_flag() {
        let mut wire = Vec::new();
        encode_data(7, b"hello", true, &mut wire);
        let mut reader = FrameReader::new();
        reader.feed(&wire);
        match reader.next_frame().expect("parse") {
            Some(Frame::Data {
                stream_id,
                data,
                end_stream,
            }) => {
                assert_eq!(stream_id, 7);
                assert_eq!(data, b"hello");
                assert!(end_stream);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_padded_data_is_stripped() {
        // Hand-built PADDED DATA: pad length 3, body "ab", padding zeros.
        let mut wire = Vec::new();
        write_frame_header(&mut wire, 6, frame_type::DATA, flags::PADDED, 9);
        wire.push(3);
        wire.extend_from_slice(b"ab");
        wire.extend_from_slice(&[0, 0, 0]);

        let mut reader = FrameReader::new();
        reader.feed(&wire);
        match reader.next_frame().expect("parse") {
            Some(Frame::Data { data, .. }) => assert_eq!(data, b"ab"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frame_type_is_skipped() {
        let mut wire = Vec::new();
        write_frame_header(&mut wire, 2, 0xbe, 0, 0);
        wire.extend_from_slice(b"??");
        let mut reader = FrameReader::new();
        reader.feed(&wire);
        assert_eq!(
            reader.next_frame().expect("parse"),
            Some(Frame::Unknown { frame_type: 0xbe })
        );
    }

    #[test]
    fn test_goaway_parse() {
        let mut wire = Vec::new();
        encode_goaway(5, 2, &mut wire);
        let mut reader = FrameReader::new();
        reader.feed(&wire);
        assert_eq!(
            reader.next_frame().expect("parse"),
            Some(Frame::GoAway {
                last_stream_id: 5,
                error_code: 2
            })
        );
    }
}
