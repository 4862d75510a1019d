//! Text KeyValues ("VDF"/"ACF") parser.
//!
//! Steam stores `libraryfolders.vdf` and `appmanifest_<id>.acf` as a nested
//! tree of quoted keys and values. Nesting is handled with an explicit stack,
//! so depth is bounded only by memory.

use std::fs;
use std::path::Path;

use crate::SteamError;

/// A node in a KeyValues tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    String(String),
    Object(VdfObject),
}

impl VdfValue {
    /// Returns the string payload, if this is a leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::String(s) => Some(s),
            VdfValue::Object(_) => None,
        }
    }

    /// Returns the object payload, if this is a subtree.
    pub fn as_object(&self) -> Option<&VdfObject> {
        match self {
            VdfValue::Object(obj) => Some(obj),
            VdfValue::String(_) => None,
        }
    }
}

/// An ordered list of key/value pairs. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VdfObject {
    entries: Vec<(String, VdfValue)>,
}

impl VdfObject {
    /// Returns the first value under `key`, compared ASCII case-insensitively
    /// (Steam itself is inconsistent about casing, e.g. `installdir`/`InstallDir`).
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns the string value under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(VdfValue::as_str)
    }

    /// Returns the subtree under `key`.
    pub fn get_object(&self, key: &str) -> Option<&VdfObject> {
        self.get(key).and_then(VdfValue::as_object)
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VdfValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, key: String, value: VdfValue) {
        self.entries.push((key, value));
    }
}

/// Reads and parses a text KeyValues file.
pub fn load_vdf(path: &Path) -> Result<VdfObject, SteamError> {
    let text = fs::read_to_string(path).map_err(|e| SteamError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_vdf(&text)
}

/// Parses KeyValues text into its root object.
pub fn parse_vdf(text: &str) -> Result<VdfObject, SteamError> {
    let mut lexer = Lexer::new(text);
    // Each frame is the key that opened the object and the object being filled.
    let mut stack: Vec<(String, VdfObject, usize)> = Vec::new();
    let mut current = VdfObject::default();

    loop {
        let Some(token) = lexer.next_token()? else {
            break;
        };

        match token {
            Token::Close => {
                let Some((key, mut parent, _)) = stack.pop() else {
                    return Err(SteamError::Vdf(format!(
                        "unexpected '}}' at line {}",
                        lexer.line
                    )));
                };
                parent.push(key, VdfValue::Object(current));
                current = parent;
            }
            Token::Open => {
                return Err(SteamError::Vdf(format!(
                    "'{{' without a key at line {}",
                    lexer.line
                )));
            }
            Token::Text(key) => {
                let key_line = lexer.line;
                match lexer.next_token()? {
                    Some(Token::Text(value)) => {
                        lexer.skip_condition();
                        current.push(key, VdfValue::String(value));
                    }
                    Some(Token::Open) => {
                        let parent = std::mem::take(&mut current);
                        stack.push((key, parent, key_line));
                    }
                    Some(Token::Close) | None => {
                        return Err(SteamError::Vdf(format!(
                            "key '{key}' at line {key_line} has no value"
                        )));
                    }
                }
            }
        }
    }

    if let Some((key, _, line)) = stack.last() {
        return Err(SteamError::Vdf(format!(
            "unclosed object '{key}' opened at line {line}"
        )));
    }

    Ok(current)
}

#[derive(Debug, PartialEq)]
enum Token {
    Text(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, SteamError> {
        self.skip_trivia();
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        match c {
            '{' => {
                self.chars.next();
                Ok(Some(Token::Open))
            }
            '}' => {
                self.chars.next();
                Ok(Some(Token::Close))
            }
            '"' => {
                self.chars.next();
                self.read_quoted().map(|s| Some(Token::Text(s)))
            }
            _ => Ok(Some(Token::Text(self.read_bare()))),
        }
    }

    /// Skips a platform conditional such as `[$WIN32]` trailing a value.
    fn skip_condition(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == ' ' || c == '\t' {
                self.chars.next();
            } else {
                break;
            }
        }
        if self.chars.peek() == Some(&'[') {
            for c in self.chars.by_ref() {
                if c == ']' {
                    break;
                }
                if c == '\n' {
                    self.line += 1;
                    break;
                }
            }
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                self.line += 1;
                self.chars.next();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.chars.next();
            } else if c == '/' {
                // `//` line comment; a lone slash starts a bare token.
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() != Some(&'/') {
                    return;
                }
                for c in self.chars.by_ref() {
                    if c == '\n' {
                        self.line += 1;
                        break;
                    }
                }
            } else {
                return;
            }
        }
    }

    fn read_quoted(&mut self) -> Result<String, SteamError> {
        let start_line = self.line;
        let mut out = String::new();
        while let Some(c) = self.chars.next() {
            match c {
                '"' => return Ok(out),
                '\\' => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                '\n' => {
                    self.line += 1;
                    out.push('\n');
                }
                _ => out.push(c),
            }
        }
        Err(SteamError::Vdf(format!(
            "unterminated string starting at line {start_line}"
        )))
    }

    fn read_bare(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '"' || c == '{' || c == '}' {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }
}
