//! Text decoding applied to file bytes before hashing.
//!
//! When an encoding is configured the digest is computed over the UTF-8
//! form of the decoded text, not over the raw bytes. Decoding is streaming:
//! multi-byte sequences split across chunk boundaries are carried over, so
//! the result never depends on how the file was chunked.

use std::str::FromStr;

use base64::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Hex,
    Base64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown text encoding {0:?}")]
pub struct UnknownEncoding(pub String);

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(UnknownEncoding(s.to_owned())),
        }
    }
}

impl TextEncoding {
    pub fn decoder(self) -> StreamDecoder {
        StreamDecoder {
            encoding: self,
            carry: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct StreamDecoder {
    encoding: TextEncoding,
    carry: Vec<u8>,
}

impl StreamDecoder {
    /// Decodes as much of `chunk` (plus any carried bytes) as is complete.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        match self.encoding {
            TextEncoding::Ascii => chunk.iter().map(|b| char::from(b & 0x7f)).collect(),
            TextEncoding::Latin1 => chunk.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Hex => hex::encode(chunk),
            TextEncoding::Utf8 => {
                self.carry.extend_from_slice(chunk);
                let (text, rest) = decode_utf8_prefix(&self.carry);
                self.carry.drain(..self.carry.len() - rest);
                text
            }
            TextEncoding::Utf16Le => {
                self.carry.extend_from_slice(chunk);
                let mut usable = self.carry.len() & !1;
                if usable >= 2 {
                    let last = u16::from_le_bytes([self.carry[usable - 2], self.carry[usable - 1]]);
                    if (0xD800..=0xDBFF).contains(&last) {
                        usable -= 2;
                    }
                }
                let text = decode_utf16le(&self.carry[..usable]);
                self.carry.drain(..usable);
                text
            }
            TextEncoding::Base64 => {
                self.carry.extend_from_slice(chunk);
                let usable = self.carry.len() - self.carry.len() % 3;
                let text = base64::engine::general_purpose::STANDARD.encode(&self.carry[..usable]);
                self.carry.drain(..usable);
                text
            }
        }
    }

    /// Flushes whatever is still carried.
    pub fn finish(self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        match self.encoding {
            TextEncoding::Utf8 => String::from_utf8_lossy(&self.carry).into_owned(),
            // a dangling odd byte is dropped; a dangling high surrogate is replaced
            TextEncoding::Utf16Le => decode_utf16le(&self.carry[..self.carry.len() & !1]),
            TextEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(&self.carry),
            TextEncoding::Ascii | TextEncoding::Latin1 | TextEncoding::Hex => String::new(),
        }
    }
}

/// Returns the decoded text and the length of the incomplete tail.
fn decode_utf8_prefix(buf: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(buf.len());
    let mut pos = 0;
    loop {
        match std::str::from_utf8(&buf[pos..]) {
            Ok(s) => {
                out.push_str(s);
                return (out, 0);
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(std::str::from_utf8(&buf[pos..pos + valid]).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pos += valid + len;
                    }
                    None => return (out, buf.len() - pos - valid),
                }
            }
        }
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
