use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use regex::Regex;

use crate::errors::{Error, Result};
use crate::options::Options;
use crate::value::Value;

/// A fragment or record as handed to the engine: already text, or raw
/// bytes still to be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Text(String),
    Bytes(Vec<u8>),
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        match self {
            Chunk::Text(s) => s.is_empty(),
            Chunk::Bytes(b) => b.is_empty(),
        }
    }
}

impl From<&str> for Chunk {
    fn from(s: &str) -> Self {
        Chunk::Text(s.to_string())
    }
}

impl From<String> for Chunk {
    fn from(s: String) -> Self {
        Chunk::Text(s)
    }
}

impl From<&[u8]> for Chunk {
    fn from(b: &[u8]) -> Self {
        Chunk::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(b: Vec<u8>) -> Self {
        Chunk::Bytes(b)
    }
}

/// Windows-1252 code points for bytes 0x80..=0x9F; `None` marks the five
/// undefined positions.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Cp1252,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "latin-1",
            Charset::Cp1252 => "cp1252",
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes).map(str::to_string).map_err(|e| {
                let pos = e.valid_up_to();
                Error::Decoding(format!(
                    "'utf-8' codec can't decode byte 0x{:02x} in position {pos}",
                    bytes[pos]
                ))
            }),
            Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Cp1252 => bytes
                .iter()
                .enumerate()
                .map(|(pos, &b)| match b {
                    0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize].ok_or_else(|| {
                        Error::Decoding(format!(
                            "'cp1252' codec can't decode byte 0x{b:02x} in position {pos}"
                        ))
                    }),
                    _ => Ok(b as char),
                })
                .collect(),
        }
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        let unencodable = |pos: usize, c: char| {
            Error::Decoding(format!(
                "'{}' codec can't encode character '\\u{{{:04x}}}' in position {pos}",
                self.name(),
                c as u32
            ))
        };
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Latin1 => text
                .chars()
                .enumerate()
                .map(|(pos, c)| u8::try_from(c as u32).map_err(|_| unencodable(pos, c)))
                .collect(),
            Charset::Cp1252 => text
                .chars()
                .enumerate()
                .map(|(pos, c)| match c as u32 {
                    n @ (0..=0x7F | 0xA0..=0xFF) => Ok(n as u8),
                    _ => CP1252_HIGH
                        .iter()
                        .position(|&m| m == Some(c))
                        .map(|i| 0x80 + i as u8)
                        .ok_or_else(|| unencodable(pos, c)),
                })
                .collect(),
        }
    }
}

impl FromStr for Charset {
    type Err = Error;

    /// Unset, empty and ASCII all mean UTF-8.
    fn from_str(name: &str) -> Result<Self> {
        let norm = name.trim().to_ascii_lowercase().replace('_', "-");
        match norm.as_str() {
            "" | "utf-8" | "utf8" | "ascii" | "us-ascii" => Ok(Charset::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(Charset::Latin1),
            "cp1252" | "windows-1252" => Ok(Charset::Cp1252),
            _ => Err(Error::Configuration(format!("unknown encoding: {name}"))),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Turns raw records into text: decode, strip trailing characters, split.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    charset: Charset,
    strip: String,
    split: Option<Regex>,
}

impl Decoder {
    pub fn new(charset: Charset, strip: impl Into<String>, split: Option<Regex>) -> Self {
        Self { charset, strip: strip.into(), split }
    }

    /// Build from options; bad charset names and bad split patterns are
    /// configuration errors.
    pub fn from_options(options: &Options) -> Result<Self> {
        let charset = options.stdin_charset.parse()?;
        let split = match options.split.as_deref() {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                Error::Configuration(format!("invalid split pattern {pattern:?}: {e}"))
            })?),
            None => None,
        };
        Ok(Self::new(charset, options.rstrip.clone(), split))
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Text passes through unchanged; bytes are decoded with the charset.
    pub fn decode(&self, raw: &Chunk) -> Result<String> {
        match raw {
            Chunk::Text(s) => Ok(s.clone()),
            Chunk::Bytes(b) => self.charset.decode(b),
        }
    }

    /// Decode one line and apply the strip policy.
    pub fn record(&self, raw: &[u8]) -> Result<String> {
        let mut text = self.charset.decode(raw)?;
        let keep = self.strip(&text).len();
        text.truncate(keep);
        Ok(text)
    }

    /// Remove every trailing character found in the strip set.
    pub fn strip<'s>(&self, text: &'s str) -> &'s str {
        if self.strip.is_empty() {
            return text;
        }
        text.trim_end_matches(|c| self.strip.contains(c))
    }

    /// Split fields for `f`, when a pattern is configured.
    pub fn fields(&self, text: &str) -> Option<Value> {
        self.split
            .as_ref()
            .map(|re| Value::List(re.split(text).map(Value::from).collect()))
    }
}

/// Writer that re-encodes UTF-8 output into the configured charset.
///
/// Each `write` must receive whole characters, which holds for everything
/// the engine and `print` emit.
pub struct EncodingWriter<W: Write> {
    inner: W,
    charset: Charset,
}

impl<W: Write> EncodingWriter<W> {
    pub fn new(inner: W, charset: Charset) -> Self {
        Self { inner, charset }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.charset == Charset::Utf8 {
            return self.inner.write(buf);
        }
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let bytes = self
            .charset
            .encode(text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.write_all(&bytes)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
