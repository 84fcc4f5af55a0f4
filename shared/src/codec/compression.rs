//! Content-encoding handling.

use super::DecodeError;
use bytes::Bytes;
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Largest body a payload may inflate to.
pub const MAX_DECOMPRESSED_BYTES: u64 = 64 * 1024 * 1024;

/// Undoes the content encodings listed in a `Content-Encoding` header.
///
/// Encodings are applied by the sender in listed order, so they are removed in
/// reverse. A missing header leaves the body untouched. Each decoded stage is
/// capped at [`MAX_DECOMPRESSED_BYTES`].
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedEncoding`] for an unknown encoding and
/// [`DecodeError::Compression`] if a compressed stream is corrupt or inflates
/// past the cap.
pub fn decompress(body: Bytes, content_encoding: Option<&str>) -> Result<Bytes, DecodeError> {
    decompress_with_limit(body, content_encoding, MAX_DECOMPRESSED_BYTES)
}

/// Like [`decompress`], with an explicit cap on the decoded size.
///
/// # Errors
///
/// See [`decompress`].
pub fn decompress_with_limit(
    body: Bytes,
    content_encoding: Option<&str>,
    limit: u64,
) -> Result<Bytes, DecodeError> {
    let Some(header) = content_encoding else {
        return Ok(body);
    };

    let mut decoded = body;
    for encoding in header.rsplit(',').map(str::trim) {
        decoded = match encoding {
            "" | "identity" => decoded,
            "gzip" | "x-gzip" => {
                read_all(MultiGzDecoder::new(decoded.as_ref()), encoding, limit)?
            }
            "deflate" | "x-deflate" => {
                read_all(ZlibDecoder::new(decoded.as_ref()), encoding, limit)?
            }
            other => return Err(DecodeError::UnsupportedEncoding(other.to_string())),
        };
    }
    Ok(decoded)
}

fn read_all(reader: impl Read, encoding: &str, limit: u64) -> Result<Bytes, DecodeError> {
    let failed = |source| DecodeError::Compression {
        encoding: encoding.to_string(),
        source,
    };

    let mut buffer = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(failed)?;
    if buffer.len() as u64 > limit {
        return Err(failed(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("decompressed payload exceeds {limit} bytes"),
        )));
    }
    Ok(buffer.into())
}

/// Compression applied to outgoing batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Send the body as is.
    #[default]
    None,
    /// Gzip the body.
    Gzip,
}

impl Compression {
    /// Returns the `Content-Encoding` value for this compression.
    #[must_use]
    pub const fn content_encoding(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
        }
    }

    /// Compresses a body.
    ///
    /// # Errors
    ///
    /// Returns an error if the compressor fails.
    pub fn compress(self, body: Vec<u8>) -> std::io::Result<Vec<u8>> {
        match self {
            Self::None => Ok(body),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&body)?;
                encoder.finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;

    #[test]
    fn test_no_header_passes_through() {
        let body = Bytes::from_static(b"plain");
        assert_eq!(decompress(body.clone(), None).unwrap(), body);
    }

    #[test]
    fn test_identity_passes_through() {
        let body = Bytes::from_static(b"plain");
        assert_eq!(decompress(body.clone(), Some("identity")).unwrap(), body);
    }

    #[test]
    fn test_gzip_roundtrip() {
        let compressed = Compression::Gzip.compress(b"hello gzip".to_vec()).unwrap();

        let body = decompress(compressed.clone().into(), Some("gzip")).unwrap();
        assert_eq!(body.as_ref(), b"hello gzip");

        let body = decompress(compressed.into(), Some("x-gzip")).unwrap();
        assert_eq!(body.as_ref(), b"hello gzip");
    }

    #[test]
    fn test_deflate() {
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello deflate").unwrap();
        let compressed = encoder.finish().unwrap();

        let body = decompress(compressed.into(), Some("deflate")).unwrap();
        assert_eq!(body.as_ref(), b"hello deflate");
    }

    #[test]
    fn test_stacked_encodings_are_removed_in_reverse() {
        let inner = Compression::Gzip.compress(b"twice".to_vec()).unwrap();
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&inner).unwrap();
        let outer = encoder.finish().unwrap();

        let body = decompress(outer.into(), Some("gzip, deflate")).unwrap();
        assert_eq!(body.as_ref(), b"twice");
    }

    #[test]
    fn test_unknown_encoding() {
        let result = decompress(Bytes::from_static(b"x"), Some("br"));
        assert!(matches!(result, Err(DecodeError::UnsupportedEncoding(e)) if e == "br"));
    }

    #[test]
    fn test_corrupt_gzip() {
        let result = decompress(Bytes::from_static(b"not gzip at all"), Some("gzip"));
        assert!(matches!(
            result,
            Err(DecodeError::Compression { encoding, .. }) if encoding == "gzip"
        ));
    }

    #[test]
    fn test_inflation_is_capped() {
        let compressed = Compression::Gzip.compress(vec![0; 4096]).unwrap();

        let result = decompress_with_limit(compressed.clone().into(), Some("gzip"), 1024);
        assert!(matches!(
            result,
            Err(DecodeError::Compression { encoding, source })
                if encoding == "gzip" && source.kind() == std::io::ErrorKind::InvalidData
        ));

        let body = decompress_with_limit(compressed.into(), Some("gzip"), 4096).unwrap();
        assert_eq!(body.len(), 4096);
    }

    #[test]
    fn test_compression_content_encoding() {
        assert_eq!(Compression::None.content_encoding(), None);
        assert_eq!(Compression::Gzip.content_encoding(), Some("gzip"));
        assert_eq!(Compression::None.compress(b"x".to_vec()).unwrap(), b"x");
    }
}
