//! `@NAME@` template preprocessing.
//!
//! Bytes are copied verbatim until a `@` opens a variable name; the next `@`
//! closes it and the variable's value (or nothing, when unknown) is written
//! instead. Input ending inside a name is an error.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{PreprocessError, RitualError, RitualResult};

const DELIMITER: u8 = b'@';

enum State {
    Copying,
    Collecting(Vec<u8>),
}

/// Failure of [`render_stream`], telling input and output errors apart.
#[derive(Debug)]
pub enum StreamError {
    Read(io::Error),
    Write(io::Error),
    Unterminated(String),
}

/// Render `src` into `dst` (created or truncated).
pub fn render(src: &Path, dst: &Path, variables: &BTreeMap<String, String>) -> RitualResult<()> {
    let fault = |action: &'static str, path: &Path, source: io::Error| -> RitualError {
        PreprocessError::Io { action, path: path.to_path_buf(), source }.into()
    };

    let input = File::open(src).map_err(|e| fault("open", src, e))?;
    let output = File::create(dst).map_err(|e| fault("open", dst, e))?;
    let mut writer = BufWriter::new(output);

    render_stream(BufReader::new(input), &mut writer, variables).map_err(|e| match e {
        StreamError::Read(e) => fault("read", src, e),
        StreamError::Write(e) => fault("write", dst, e),
        StreamError::Unterminated(name) => {
            PreprocessError::Unterminated { path: src.to_path_buf(), name }.into()
        }
    })?;

    writer.flush().map_err(|e| fault("write", dst, e))
}

/// Core state machine over arbitrary byte streams.
pub fn render_stream<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    variables: &BTreeMap<String, String>,
) -> Result<(), StreamError> {
    let mut state = State::Copying;

    for byte in reader.bytes() {
        let byte = byte.map_err(StreamError::Read)?;
        state = match (state, byte) {
            (State::Copying, DELIMITER) => State::Collecting(Vec::new()),
            (State::Copying, b) => {
                writer.write_all(&[b]).map_err(StreamError::Write)?;
                State::Copying
            }
            (State::Collecting(name), DELIMITER) => {
                let name = String::from_utf8_lossy(&name);
                if let Some(value) = variables.get(name.as_ref()) {
                    writer.write_all(value.as_bytes()).map_err(StreamError::Write)?;
                }
                State::Copying
            }
            (State::Collecting(mut name), b) => {
                name.push(b);
                State::Collecting(name)
            }
        };
    }

    match state {
        State::Copying => Ok(()),
        State::Collecting(name) => {
            Err(StreamError::Unterminated(String::from_utf8_lossy(&name).into_owned()))
        }
    }
}

/// Expand `@NAME@` references inside a single argument or path.
///
/// Unlike [`render`], only identifiers (`[A-Za-z0-9_]+`) between two `@` are
/// references and `@@` is a literal `@`. Any other `@` is kept as is, so
/// `user@host` or `getty@tty1.service` pass through untouched.
pub fn expand(text: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('@') {
            Some(0) => {
                out.push('@');
                rest = &after[1..];
            }
            Some(end) if is_name(&after[..end]) => {
                if let Some(value) = variables.get(&after[..end]) {
                    out.push_str(value);
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('@');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_name(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
