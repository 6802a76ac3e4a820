//! Byte-to-text decoding for log files.
//!
//! Instrument software writes logs in whatever encoding the host happens to
//! use. Detection order: byte-order mark, then strict UTF-8, then
//! Windows-1252. Decoding never fails; the engine only ever sees text.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CollectError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Bom => "utf-8-sig",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Windows1252 => "windows-1252",
        };
        f.write_str(name)
    }
}

impl Encoding {
    fn bom(self) -> &'static [u8] {
        match self {
            Encoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf16Be => &[0xFE, 0xFF],
            Encoding::Utf8 | Encoding::Windows1252 => &[],
        }
    }
}

/// Guess the encoding of `bytes`.
pub fn detect(bytes: &[u8]) -> Encoding {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => Encoding::Utf8Bom,
        [0xFF, 0xFE, ..] => Encoding::Utf16Le,
        [0xFE, 0xFF, ..] => Encoding::Utf16Be,
        _ if std::str::from_utf8(bytes).is_ok() => Encoding::Utf8,
        _ => Encoding::Windows1252,
    }
}

/// Decode `bytes` as `encoding`, replacing anything invalid.
///
/// The byte-order mark is stripped when present.
pub fn decode(bytes: &[u8], encoding: Encoding) -> String {
    let body = bytes.strip_prefix(encoding.bom()).unwrap_or(bytes);
    match encoding {
        Encoding::Utf8 | Encoding::Utf8Bom => String::from_utf8_lossy(body).into_owned(),
        Encoding::Utf16Le => decode_utf16(body, u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(body, u16::from_be_bytes),
        Encoding::Windows1252 => bytes.iter().map(|&b| windows_1252(b)).collect(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    let mut text: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if bytes.len() % 2 == 1 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

// 0x80..=0x9F differ from Latin-1; the rest map straight to U+00XX.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž',
    '\u{8F}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}',
    'ž', 'Ÿ',
];

fn windows_1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
        _ => char::from(byte),
    }
}

/// Reads files as text, remembering the encoding detected for each path.
#[derive(Debug, Default)]
pub struct TextReader {
    detected: HashMap<PathBuf, Encoding>,
}

impl TextReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and decode `path`.
    ///
    /// A cached encoding is only reused while the file still carries its
    /// byte-order mark; otherwise the file is detected again.
    pub fn read(&mut self, path: &Path) -> Result<(String, Encoding)> {
        let bytes = fs::read(path).map_err(|e| CollectError::io(path, e))?;
        let encoding = match self.detected.get(path) {
            Some(&cached) if bytes.starts_with(cached.bom()) => cached,
            _ => {
                let found = detect(&bytes);
                self.detected.insert(path.to_path_buf(), found);
                found
            }
        };
        Ok((decode(&bytes, encoding), encoding))
    }
}
