//! Call-site location for registrations.
//!
//! When a registration callback runs, the glue author's call is the Lua frame
//! directly above it ([`CALLER_STACK_LEVEL`]). Its chunk name (`@<path>`) and
//! current line come from the interpreter's debug record.
//!
//! Lua keeps no column information, so columns come from a [`SourceIndex`]: a
//! lexical scan of each file for call-shaped uses of the DSL keywords. The
//! n-th registration of a keyword group on a line takes the n-th such call on
//! that line. A line with a single call maps every registration to it, so a
//! loop around one call stays exact. When a line with several calls runs
//! again, the calls are assumed to repeat in source order and the guess is
//! logged as a warning.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::consts::CALLER_STACK_LEVEL;
use crate::glue::Location;
use crate::lua::dsl::{Registration, all_keywords};
use crate::util::path::relative_to;

#[derive(Debug, Clone, Error)]
pub enum LocateError {
  #[error("no stack frame at level {level} above the registration callback")]
  MissingFrame { level: usize },

  #[error("glue keywords must be called directly from Lua code, not through a {what} function")]
  NotLuaCaller { what: String },

  #[error("glue keyword called from chunk '{chunk}', which is not a file")]
  NotAFile { chunk: String },

  #[error("no line information for glue keyword call in {path}")]
  NoLine { path: PathBuf },
}

/// The debug-record fields the locator needs.
struct CallerFrame {
  chunk: Option<String>,
  what: &'static str,
  line: Option<usize>,
}

/// Locate the glue declaration that invoked the running registration callback.
///
/// Must be called from inside the callback, before any other Lua call is made.
pub fn locate_caller(
  lua: &Lua,
  sources: &SourceIndex,
  registration: Registration,
  base_dir: &Path,
) -> Result<Location, LocateError> {
  let frame = lua
    .inspect_stack(CALLER_STACK_LEVEL, |debug| {
      let source = debug.source();
      CallerFrame {
        chunk: source.source.map(|s| s.into_owned()),
        what: source.what,
        line: debug.current_line(),
      }
    })
    .ok_or(LocateError::MissingFrame {
      level: CALLER_STACK_LEVEL,
    })?;

  if frame.what == "C" {
    return Err(LocateError::NotLuaCaller {
      what: frame.what.to_string(),
    });
  }

  let chunk = frame.chunk.unwrap_or_default();
  let path = match chunk.strip_prefix('@') {
    Some(path) => PathBuf::from(path),
    None => return Err(LocateError::NotAFile { chunk }),
  };
  let line = frame.line.ok_or_else(|| LocateError::NoLine { path: path.clone() })?;

  let column = match sources.column(&path, line, registration) {
    ColumnMatch::Call(column) => column,
    ColumnMatch::Repeated(column) => {
      warn!(
        path = %path.display(),
        line,
        column,
        keywords = ?registration.keywords(),
        "line with several keyword calls registered again; assuming the calls repeat in order"
      );
      column
    }
    ColumnMatch::Fallback(column) => {
      warn!(
        path = %path.display(),
        line,
        keywords = ?registration.keywords(),
        "no direct keyword call on this line; attributing to the start of the line"
      );
      column
    }
  };

  Ok(Location {
    path: relative_to(base_dir, &path),
    line,
    column,
  })
}

/// Outcome of a column lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMatch {
  /// Column of a call-shaped keyword on the line.
  Call(usize),
  /// No such call on the line; first non-blank column (or 1).
  Fallback(usize),
  /// The line ran again and has several candidate calls; the column assumes
  /// they repeat in source order.
  Repeated(usize),
}

/// A call-shaped keyword occurrence in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
  pub line: usize,
  pub column: usize,
  pub keyword: &'static str,
}

/// Keyword call sites per line of one file, plus how many of them each
/// registration group has consumed.
#[derive(Debug, Default)]
struct FileIndex {
  calls: HashMap<usize, Vec<CallSite>>,
  first_columns: Vec<usize>,
  consumed: HashMap<(usize, Registration), usize>,
}

impl FileIndex {
  fn build(source: &str) -> Self {
    let keywords: Vec<&'static str> = all_keywords().collect();
    let mut calls: HashMap<usize, Vec<CallSite>> = HashMap::new();
    for site in scan_call_sites(source, &keywords) {
      calls.entry(site.line).or_default().push(site);
    }
    let first_columns = source
      .lines()
      .map(|l| l.chars().take_while(|c| c.is_whitespace()).count() + 1)
      .collect();
    Self {
      calls,
      first_columns,
      consumed: HashMap::new(),
    }
  }

  fn column(&mut self, line: usize, registration: Registration) -> ColumnMatch {
    let keywords = registration.keywords();
    let candidates: Vec<usize> = self
      .calls
      .get(&line)
      .map(|sites| {
        sites
          .iter()
          .filter(|s| keywords.contains(&s.keyword))
          .map(|s| s.column)
          .collect()
      })
      .unwrap_or_default();

    if candidates.is_empty() {
      let column = self.first_columns.get(line.wrapping_sub(1)).copied().unwrap_or(1);
      return ColumnMatch::Fallback(column);
    }

    let consumed = self.consumed.entry((line, registration)).or_insert(0);
    let index = *consumed;
    *consumed += 1;
    match candidates.len() {
      1 => ColumnMatch::Call(candidates[0]),
      n if index < n => ColumnMatch::Call(candidates[index]),
      n => ColumnMatch::Repeated(candidates[index % n]),
    }
  }
}

/// Lazily built call-site indexes, one per source file, for one load.
#[derive(Debug, Default)]
pub struct SourceIndex {
  files: RefCell<HashMap<PathBuf, FileIndex>>,
}

impl SourceIndex {
  /// Column of the next `registration` call on `line` of `path`.
  ///
  /// Files are read on first use. An unreadable file indexes as empty, which
  /// yields a fallback column of 1.
  pub fn column(&self, path: &Path, line: usize, registration: Registration) -> ColumnMatch {
    let mut files = self.files.borrow_mut();
    let index = files.entry(path.to_path_buf()).or_insert_with(|| {
      let source = std::fs::read_to_string(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "cannot read glue source for column lookup");
        String::new()
      });
      FileIndex::build(&source)
    });
    index.column(line, registration)
  }
}

/// Character cursor that tracks 1-based line and column.
struct Cursor {
  chars: Vec<char>,
  pos: usize,
  line: usize,
  column: usize,
}

impl Cursor {
  fn new(source: &str) -> Self {
    Self {
      chars: source.chars().collect(),
      pos: 0,
      line: 1,
      column: 1,
    }
  }

  fn peek(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek(0)?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    Some(c)
  }

  /// Level of a long bracket (`[[`, `[==[`) starting at the cursor.
  fn long_bracket_level(&self) -> Option<usize> {
    if self.peek(0) != Some('[') {
      return None;
    }
    let mut level = 0;
    while self.peek(1 + level) == Some('=') {
      level += 1;
    }
    (self.peek(1 + level) == Some('[')).then_some(level)
  }

  /// Skip a long bracket of `level`, opening included.
  fn skip_long_bracket(&mut self, level: usize) {
    for _ in 0..level + 2 {
      self.bump();
    }
    while let Some(c) = self.bump() {
      if c == ']' {
        let mut equals = 0;
        while self.peek(equals) == Some('=') {
          equals += 1;
        }
        if equals == level && self.peek(equals) == Some(']') {
          for _ in 0..=equals {
            self.bump();
          }
          return;
        }
      }
    }
  }

  /// Skip a quoted string whose opening quote has been consumed.
  fn skip_quoted(&mut self, quote: char) {
    while let Some(c) = self.bump() {
      match c {
        '\\' => {
          self.bump();
        }
        '\n' => return,
        c if c == quote => return,
        _ => {}
      }
    }
  }

  fn skip_line(&mut self) {
    while let Some(c) = self.peek(0) {
      if c == '\n' {
        return;
      }
      self.bump();
    }
  }

  /// Whether the next token (on this line) starts call arguments.
  fn call_follows(&self) -> bool {
    let mut offset = 0;
    while matches!(self.peek(offset), Some(' ') | Some('\t')) {
      offset += 1;
    }
    match self.peek(offset) {
      Some('(') | Some('"') | Some('\'') | Some('{') => true,
      Some('[') => matches!(self.peek(offset + 1), Some('[') | Some('=')),
      _ => false,
    }
  }
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

/// Find every call-shaped occurrence of `keywords` in Lua `source`.
///
/// Comments and string literals are skipped. Field and method accesses
/// (`t.Given(`, `t:Given(`) and function declarations (`function Given(`) are
/// not calls of the global keyword and are ignored; `..` concatenation is not
/// mistaken for field access.
pub fn scan_call_sites(source: &str, keywords: &[&'static str]) -> Vec<CallSite> {
  let mut cur = Cursor::new(source);
  let mut sites = Vec::new();
  // Last two significant characters and the last identifier seen.
  let mut prev: [Option<char>; 2] = [None, None];
  let mut prev_word = String::new();

  while let Some(c) = cur.peek(0) {
    match c {
      '-' if cur.peek(1) == Some('-') => {
        cur.bump();
        cur.bump();
        match cur.long_bracket_level() {
          Some(level) => cur.skip_long_bracket(level),
          None => cur.skip_line(),
        }
      }
      '"' | '\'' => {
        cur.bump();
        cur.skip_quoted(c);
        prev = [prev[1], Some(c)];
        prev_word.clear();
      }
      '[' if cur.long_bracket_level().is_some() => {
        let level = cur.long_bracket_level().unwrap_or(0);
        cur.skip_long_bracket(level);
        prev = [prev[1], Some(']')];
        prev_word.clear();
      }
      c if is_ident_start(c) => {
        let (line, column) = (cur.line, cur.column);
        let mut word = String::new();
        while let Some(c) = cur.peek(0).filter(|c| is_ident_char(*c)) {
          word.push(c);
          cur.bump();
        }

        let field_access = match prev {
          [Some('.'), Some('.')] => false,
          [_, Some('.')] | [_, Some(':')] => true,
          _ => false,
        };
        if !field_access
          && prev_word != "function"
          && cur.call_follows()
          && let Some(keyword) = keywords.iter().find(|k| **k == word.as_str())
        {
          sites.push(CallSite {
            line,
            column,
            keyword: *keyword,
          });
        }

        prev = [prev[1], Some('a')];
        prev_word = word;
      }
      c if c.is_whitespace() => {
        cur.bump();
      }
      c if c.is_ascii_digit() => {
        // Numbers, including exponents and hex digits, are not identifiers.
        while cur.peek(0).is_some_and(|c| is_ident_char(c) || c == '.') {
          cur.bump();
        }
        prev = [prev[1], Some('0')];
        prev_word.clear();
      }
      _ => {
        cur.bump();
        prev = [prev[1], Some(c)];
        prev_word.clear();
      }
    }
  }

  sites
}
