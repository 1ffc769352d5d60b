//! UTF-8 text codec.
//!
//! Mirrors the host's `TextEncoder`/`TextDecoder` pair: decoding is fatal on
//! malformed input and keeps a leading byte-order mark. A degraded host may
//! have no codec at all; that only surfaces when the codec is first used.

use crate::error::EncodingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodecState {
    Available,
    Unavailable,
}

/// Outcome of [`TextCodec::encode_into`], counted like the host does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeResult {
    /// UTF-16 code units consumed from the source
    pub read: usize,
    /// Bytes written to the destination
    pub written: usize,
}

/// The host text codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCodec {
    state: CodecState,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::utf8()
    }
}

impl TextCodec {
    /// A working UTF-8 codec.
    pub fn utf8() -> Self {
        TextCodec {
            state: CodecState::Available,
        }
    }

    /// A codec for a host without `TextEncoder`/`TextDecoder`.
    pub fn unavailable() -> Self {
        TextCodec {
            state: CodecState::Unavailable,
        }
    }

    /// Whether the codec can be used.
    pub fn is_available(&self) -> bool {
        self.state == CodecState::Available
    }

    /// Decodes UTF-8, failing on malformed input.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError> {
        if !self.is_available() {
            return Err(EncodingError::Unavailable("TextDecoder"));
        }
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| EncodingError::InvalidUtf8 {
                valid_up_to: e.valid_up_to(),
            })
    }

    /// Encodes a whole string.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        if !self.is_available() {
            return Err(EncodingError::Unavailable("TextEncoder"));
        }
        Ok(text.as_bytes().to_vec())
    }

    /// Encodes as many whole characters of `text` as fit into `dest`.
    pub fn encode_into(&self, text: &str, dest: &mut [u8]) -> Result<EncodeResult, EncodingError> {
        if !self.is_available() {
            return Err(EncodingError::Unavailable("TextEncoder"));
        }
        let mut read = 0;
        let mut written = 0;
        for ch in text.chars() {
            let width = ch.len_utf8();
            if written + width > dest.len() {
                break;
            }
            ch.encode_utf8(&mut dest[written..written + width]);
            written += width;
            read += ch.len_utf16();
        }
        Ok(EncodeResult { read, written })
    }
}
