//! ClrMamePro DAT parser.
//!
//! The format is brace-delimited key/value text:
//!
//! ```text
//! clrmamepro (
//!     name "System Name"
//!     version 20240101-000000
//! )
//!
//! game (
//!     name "Game Name (Region)"
//!     cloneof "Parent Name"
//!     rom ( name "Game Name (Region).ext" size 12345 crc AABBCCDD sha1 ... )
//! )
//! ```
//!
//! Whitespace between tokens is insignificant and blocks nest, so this is
//! a real token-stream parser rather than a line splitter. Quoted strings
//! use backslash escapes. Input is consumed byte-by-byte from a buffered
//! reader, so memory stays bounded.

use std::io::BufRead;

use rom_steward_core::EntryStatus;

use crate::error::DatError;
use crate::model::{normalize_hash, DatFile, DatGame, DatRom, ProgressFn, PROGRESS_CHUNK};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// An unquoted atom (identifier, number, bare hash).
    Atom(String),
    /// A quoted string, escapes resolved.
    Quoted(String),
    Open,
    Close,
}

impl Token {
    /// The scalar value of an Atom or Quoted token.
    fn into_value(self) -> Option<String> {
        match self {
            Token::Atom(s) | Token::Quoted(s) => Some(s),
            _ => None,
        }
    }
}

struct Lexer<R: BufRead> {
    bytes: std::io::Bytes<R>,
    peeked_byte: Option<u8>,
    peeked_token: Option<Token>,
}

impl<R: BufRead> Lexer<R> {
    fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            peeked_byte: None,
            peeked_token: None,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, DatError> {
        if let Some(b) = self.peeked_byte.take() {
            return Ok(Some(b));
        }
        match self.bytes.next() {
            Some(Ok(b)) => Ok(Some(b)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn push_back_byte(&mut self, b: u8) {
        self.peeked_byte = Some(b);
    }

    fn push_back_token(&mut self, t: Token) {
        self.peeked_token = Some(t);
    }

    fn next_token(&mut self) -> Result<Option<Token>, DatError> {
        if let Some(t) = self.peeked_token.take() {
            return Ok(Some(t));
        }

        // Skip whitespace
        let first = loop {
            match self.next_byte()? {
                Some(b) if b.is_ascii_whitespace() => continue,
                Some(b) => break b,
                None => return Ok(None),
            }
        };

        match first {
            b'(' => Ok(Some(Token::Open)),
            b')' => Ok(Some(Token::Close)),
            b'"' => {
                let mut out = Vec::new();
                loop {
                    match self.next_byte()? {
                        Some(b'"') => break,
                        Some(b'\\') => match self.next_byte()? {
                            Some(b) => out.push(b),
                            None => {
                                return Err(DatError::invalid_dat("Unterminated string escape"))
                            }
                        },
                        Some(b) => out.push(b),
                        None => return Err(DatError::invalid_dat("Unterminated quoted string")),
                    }
                }
                Ok(Some(Token::Quoted(
                    String::from_utf8_lossy(&out).to_string(),
                )))
            }
            _ => {
                let mut out = vec![first];
                loop {
                    match self.next_byte()? {
                        Some(b) if b.is_ascii_whitespace() => break,
                        Some(b @ (b'(' | b')')) => {
                            self.push_back_byte(b);
                            break;
                        }
                        Some(b) => out.push(b),
                        None => break,
                    }
                }
                Ok(Some(Token::Atom(String::from_utf8_lossy(&out).to_string())))
            }
        }
    }
}

pub fn parse_clrmamepro<R: BufRead>(
    reader: R,
    progress: Option<&ProgressFn<'_>>,
) -> Result<DatFile, DatError> {
    let mut lexer = Lexer::new(reader);
    let mut dat = DatFile::default();

    while let Some(token) = lexer.next_token()? {
        let block_name = match token {
            Token::Atom(name) => name.to_lowercase(),
            other => {
                return Err(DatError::invalid_dat(format!(
                    "Expected block name at top level, got {other:?}"
                )))
            }
        };

        match lexer.next_token()? {
            Some(Token::Open) => {}
            _ => {
                return Err(DatError::invalid_dat(format!(
                    "Expected '(' after '{block_name}'"
                )))
            }
        }

        match block_name.as_str() {
            "clrmamepro" | "doscenter" => parse_header_block(&mut lexer, &mut dat)?,
            "game" | "machine" | "resource" => {
                let game = parse_game_block(&mut lexer)?;
                dat.games.push(game);
                if dat.games.len().is_multiple_of(PROGRESS_CHUNK) {
                    if let Some(p) = progress {
                        p(dat.games.len());
                    }
                }
            }
            _ => skip_block(&mut lexer)?,
        }
    }

    if dat.header.name.is_empty() && dat.games.is_empty() {
        return Err(DatError::invalid_dat(
            "No header or games found in ClrMamePro DAT file",
        ));
    }

    if let Some(p) = progress {
        p(dat.games.len());
    }

    Ok(dat)
}

fn parse_header_block<R: BufRead>(
    lexer: &mut Lexer<R>,
    dat: &mut DatFile,
) -> Result<(), DatError> {
    loop {
        let key = match lexer.next_token()? {
            Some(Token::Close) => return Ok(()),
            Some(Token::Atom(k)) => k.to_lowercase(),
            Some(other) => {
                return Err(DatError::invalid_dat(format!(
                    "Unexpected token in header block: {other:?}"
                )))
            }
            None => return Err(DatError::invalid_dat("Unterminated header block")),
        };

        let value = match lexer.next_token()? {
            Some(Token::Open) => {
                skip_block(lexer)?;
                continue;
            }
            Some(Token::Close) => return Ok(()), // trailing key with no value
            Some(t) => t.into_value().unwrap_or_default(),
            None => return Err(DatError::invalid_dat("Unterminated header block")),
        };

        match key.as_str() {
            "name" => dat.header.name = value,
            "description" => dat.header.description = value,
            "version" => dat.header.version = value,
            "author" => dat.header.author = value,
            "homepage" | "url" => dat.header.url = value,
            "date" => dat.header.date = value,
            _ => {}
        }
    }
}

fn parse_game_block<R: BufRead>(lexer: &mut Lexer<R>) -> Result<DatGame, DatError> {
    let mut game = DatGame::default();

    loop {
        let key = match lexer.next_token()? {
            Some(Token::Close) => return Ok(game),
            Some(Token::Atom(k)) => k.to_lowercase(),
            Some(other) => {
                return Err(DatError::invalid_dat(format!(
                    "Unexpected token in game block: {other:?}"
                )))
            }
            None => return Err(DatError::invalid_dat("Unterminated game block")),
        };

        // A key's value is either a nested block or a scalar token.
        let next = match lexer.next_token()? {
            Some(t) => t,
            None => return Err(DatError::invalid_dat("Unterminated game block")),
        };

        match (key.as_str(), next) {
            ("rom" | "disk", Token::Open) => game.roms.push(parse_rom_block(lexer)?),
            (_, Token::Open) => skip_block(lexer)?,
            (_, Token::Close) => return Ok(game),
            (k, t) => {
                let value = t.into_value().unwrap_or_default();
                match k {
                    "name" => game.name = value,
                    "description" => game.description = value,
                    "year" => game.year = some_nonempty(value),
                    "manufacturer" | "publisher" => game.publisher = some_nonempty(value),
                    "region" => game.region = some_nonempty(value),
                    "languages" => game.languages = some_nonempty(value),
                    "category" => game.category = some_nonempty(value),
                    "cloneof" => game.clone_of = some_nonempty(value),
                    "romof" => game.rom_of = some_nonempty(value),
                    "sampleof" => game.sample_of = some_nonempty(value),
                    "isbios" => game.is_bios = value == "yes",
                    "isdevice" => game.is_device = value == "yes",
                    "ismechanical" => game.is_mechanical = value == "yes",
                    _ => {}
                }
            }
        }
    }
}

fn parse_rom_block<R: BufRead>(lexer: &mut Lexer<R>) -> Result<DatRom, DatError> {
    let mut rom = DatRom::default();

    loop {
        let key = match lexer.next_token()? {
            Some(Token::Close) => return Ok(rom),
            Some(Token::Atom(k)) => k.to_lowercase(),
            Some(Token::Quoted(_)) => continue, // stray value, skip
            Some(other) => {
                return Err(DatError::invalid_dat(format!(
                    "Unexpected token in rom block: {other:?}"
                )))
            }
            None => return Err(DatError::invalid_dat("Unterminated rom block")),
        };

        let value = match lexer.next_token()? {
            Some(Token::Open) => {
                skip_block(lexer)?;
                continue;
            }
            Some(Token::Close) => {
                // Key with no value at end of block (e.g. a bare flag)
                lexer.push_back_token(Token::Close);
                continue;
            }
            Some(t) => t.into_value().unwrap_or_default(),
            None => return Err(DatError::invalid_dat("Unterminated rom block")),
        };

        match key.as_str() {
            "name" => rom.name = value,
            "size" => rom.size = value.parse().unwrap_or(0),
            "crc" | "crc32" => rom.crc = normalize_hash(&value),
            "md5" => rom.md5 = normalize_hash(&value),
            "sha1" => rom.sha1 = normalize_hash(&value),
            "status" | "flags" => rom.status = EntryStatus::parse_str(&value),
            "serial" => rom.serial = some_nonempty(value),
            "merge" => rom.merge = some_nonempty(value),
            _ => {}
        }
    }
}

/// Consume a balanced block whose opening paren has already been read.
fn skip_block<R: BufRead>(lexer: &mut Lexer<R>) -> Result<(), DatError> {
    let mut depth = 1u32;
    while depth > 0 {
        match lexer.next_token()? {
            Some(Token::Open) => depth += 1,
            Some(Token::Close) => depth -= 1,
            Some(_) => {}
            None => return Err(DatError::invalid_dat("Unterminated block")),
        }
    }
    Ok(())
}

fn some_nonempty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
