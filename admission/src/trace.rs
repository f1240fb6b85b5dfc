//! Reading whitespace-delimited `seq id size cost` records.

use crate::error::{Error, Result};
use crate::request::Request;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Why a [`TraceReader`] stopped yielding requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceStop {
  /// The input ended on a record boundary.
  Exhausted,
  /// A token failed to parse, or the input ended inside a record.
  Malformed { line: usize, token: String },
  /// The underlying reader failed.
  Io(String),
}

/// Iterates the requests of a trace.
///
/// Fields are separated by any whitespace, so a record may span lines. The
/// first token that does not parse ends the iteration; [`TraceReader::stop_reason`]
/// tells the caller why.
#[derive(Debug)]
pub struct TraceReader<R> {
  reader: R,
  line: String,
  line_no: usize,
  tokens: Vec<String>,
  cursor: usize,
  partial: Partial,
  stop: Option<TraceStop>,
}

#[derive(Debug, Default)]
struct Partial {
  seq: Option<u64>,
  id: Option<u64>,
  size: Option<u64>,
}

impl TraceReader<BufReader<File>> {
  /// Opens a trace file.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::TraceIo {
      path: path.display().to_string(),
      source,
    })?;
    Ok(Self::new(BufReader::new(file)))
  }
}

impl<R: BufRead> TraceReader<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader,
      line: String::new(),
      line_no: 0,
      tokens: Vec::new(),
      cursor: 0,
      partial: Partial::default(),
      stop: None,
    }
  }

  /// `None` while the reader can still yield requests.
  pub fn stop_reason(&self) -> Option<&TraceStop> {
    self.stop.as_ref()
  }

  fn next_token(&mut self) -> Option<String> {
    while self.cursor >= self.tokens.len() {
      self.line.clear();
      match self.reader.read_line(&mut self.line) {
        Ok(0) => return None,
        Ok(_) => {
          self.line_no += 1;
          self.tokens = self.line.split_whitespace().map(str::to_string).collect();
          self.cursor = 0;
        }
        Err(e) => {
          self.stop = Some(TraceStop::Io(e.to_string()));
          return None;
        }
      }
    }
    let token = std::mem::take(&mut self.tokens[self.cursor]);
    self.cursor += 1;
    Some(token)
  }

  fn malformed(&mut self, token: String) {
    tracing::warn!(line = self.line_no, token = %token, "Malformed trace record, stopping ingestion");
    self.stop = Some(TraceStop::Malformed {
      line: self.line_no,
      token,
    });
  }
}

impl<R: BufRead> Iterator for TraceReader<R> {
  type Item = Request;

  fn next(&mut self) -> Option<Request> {
    if self.stop.is_some() {
      return None;
    }
    loop {
      let token = match self.next_token() {
        Some(token) => token,
        None => {
          if self.stop.is_none() {
            let mid_record = self.partial.seq.is_some();
            self.stop = Some(if mid_record {
              TraceStop::Malformed {
                line: self.line_no,
                token: String::new(),
              }
            } else {
              TraceStop::Exhausted
            });
            if mid_record {
              tracing::warn!(line = self.line_no, "Trace ended inside a record");
            }
          }
          return None;
        }
      };

      let parsed = if self.partial.seq.is_none() {
        token.parse().map(|v| self.partial.seq = Some(v)).is_ok()
      } else if self.partial.id.is_none() {
        token.parse().map(|v| self.partial.id = Some(v)).is_ok()
      } else if self.partial.size.is_none() {
        token.parse().map(|v| self.partial.size = Some(v)).is_ok()
      } else {
        match token.parse::<f64>() {
          Ok(cost) => {
            let partial = std::mem::take(&mut self.partial);
            if let (Some(seq), Some(id), Some(size)) = (partial.seq, partial.id, partial.size) {
              return Some(Request::new(seq, id, size, cost));
            }
            false
          }
          Err(_) => false,
        }
      };
      if !parsed {
        self.malformed(token);
        return None;
      }
    }
  }
}
