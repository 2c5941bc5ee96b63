// src/io/serial/framer.rs
//
// Line framing for text-oriented serial streams.
// Turns arbitrary read chunks into complete, decoded, trimmed lines.
//
// Each chunk is decoded on its own: UTF-8 first, then GBK with lossy substitution.
// A multi-byte character that straddles two reads is therefore misdecoded. Line
// protocols on these ports are overwhelmingly ASCII, and the behaviour is kept as is.

use encoding_rs::GBK;

/// Stateful line decoder for one serial session.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded text not yet terminated by a newline
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw read chunk.
    /// Returns every line completed by this chunk, in stream order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        if data.is_empty() {
            return Vec::new();
        }

        self.buffer.push_str(&decode_chunk(data));

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let segment: String = self.buffer.drain(..=pos).collect();
            let line = segment.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        lines
    }

    /// Text received after the last newline
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop any partial line (used when a session is reset)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Decode one chunk: strict UTF-8, falling back to GBK with replacement characters.
pub fn decode_chunk(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _had_errors) = GBK.decode_without_bom_handling(data);
            text.into_owned()
        }
    }
}
