//! Response body decoding
//!
//! Transparent `Content-Encoding` handling for gzip, deflate, and brotli.
//! HTTP "deflate" is zlib-wrapped in the wild but some servers send raw
//! deflate; both are accepted.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::error::{self, Error};

/// Decode `body` per the `Content-Encoding` header value. `None`,
/// `identity`, or an unknown token returns the bytes untouched.
pub fn decode_body(encoding: Option<&str>, body: &[u8]) -> Result<Vec<u8>, Error> {
    let Some(encoding) = encoding else {
        return Ok(body.to_vec());
    };
    match encoding.trim().to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => {
            let mut out = Vec::with_capacity(body.len() * 4);
            GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(error::parse)?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::with_capacity(body.len() * 4);
            match ZlibDecoder::new(body).read_to_end(&mut out) {
                Ok(_) => Ok(out),
                Err(_) => {
                    out.clear();
                    DeflateDecoder::new(body)
                        .read_to_end(&mut out)
                        .map_err(error::parse)?;
                    Ok(out)
                }
            }
        }
        "br" => {
            let mut out = Vec::with_capacity(body.len() * 4);
            brotli::Decompressor::new(body, 4096)
                .read_to_end(&mut out)
                .map_err(error::parse)?;
            Ok(out)
        }
        _ => Ok(body.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_gzip_round_trip() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(10);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let decoded = decode_body(Some("gzip"), &compressed).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_deflate_zlib_round_trip() {
        let payload = b"deflate me".repeat(20);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("compress");
        let compressed = encoder.finish().expect("finish");

        let decoded = decode_body(Some("deflate"), &compressed).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_brotli_round_trip() {
        let payload = b"brotli brotli brotli".repeat(30);
        let mut compressed = Vec::new();
        {
            let mut writer =
                brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(&payload).expect("compress");
        }
        let decoded = decode_body(Some("br"), &compressed).expect("decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_identity_passthrough() {
        assert_eq!(
            decode_body(None, b"plain").expect("decode"),
            b"plain".to_vec()
        );
        assert_eq!(
            decode_body(Some("identity"), b"plain").expect("decode"),
            b"plain".to_vec()
        );
    }

    #[test]
    fn test_corrupt_gzip_is_parse_error() {
        let err = decode_body(Some("gzip"), b"not gzip at all").unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::Parse);
    }
}
