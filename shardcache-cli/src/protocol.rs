//! Line protocol parsing.
//!
//! One request per input line, whitespace-tokenized, with a final
//! rest-of-line capture for the `content` field of `SET` (binary content
//! is the caller's responsibility to encode). Command verbs are
//! case-insensitive.

use std::fmt;

/// A parsed protocol request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Init {
        base_dir: String,
        max_size: u64,
        cap: f64,
    },
    Set {
        table: String,
        tenant: String,
        freshness: String,
        bind: String,
        content: String,
    },
    Get {
        table: String,
        tenant: String,
        freshness: String,
        bind: String,
    },
    Delete {
        table: String,
    },
    Close,
}

/// A parse failure, rendered verbatim after `ERROR: `.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split the next whitespace-delimited word off `input`.
///
/// Returns the word and the remainder with leading whitespace stripped.
fn take_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], input[end..].trim_start())),
        None => Some((input, "")),
    }
}

/// Collect exactly `count` words and reject trailing input.
fn take_exact<'a>(mut rest: &'a str, count: usize, usage: &str) -> Result<Vec<&'a str>, ParseError> {
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        match take_word(rest) {
            Some((word, remainder)) => {
                words.push(word);
                rest = remainder;
            }
            None => return Err(ParseError(usage.to_string())),
        }
    }
    if !rest.is_empty() {
        return Err(ParseError(usage.to_string()));
    }
    Ok(words)
}

/// Parse one request line.
///
/// # Errors
///
/// Returns a `ParseError` describing the malformed command; unknown
/// verbs produce `unknown command: <verb>`.
pub fn parse_line(line: &str) -> Result<Request, ParseError> {
    let (command, rest) =
        take_word(line).ok_or_else(|| ParseError("empty command".to_string()))?;

    match command.to_uppercase().as_str() {
        "INIT" => {
            let args = take_exact(rest, 3, "INIT requires 3 arguments: base_dir max_size cap")?;
            let max_size: u64 = args[1]
                .parse()
                .map_err(|_| ParseError("invalid number format".to_string()))?;
            let cap: f64 = args[2]
                .parse()
                .map_err(|_| ParseError("invalid number format".to_string()))?;
            Ok(Request::Init {
                base_dir: args[0].to_string(),
                max_size,
                cap,
            })
        }
        "SET" => {
            let usage =
                || ParseError("SET requires 5 arguments: table tenant freshness bind content".to_string());
            let (table, rest) = take_word(rest).ok_or_else(usage)?;
            let (tenant, rest) = take_word(rest).ok_or_else(usage)?;
            let (freshness, rest) = take_word(rest).ok_or_else(usage)?;
            let (bind, content) = take_word(rest).ok_or_else(usage)?;
            // Everything after the bind is content, spaces included.
            if content.is_empty() {
                return Err(usage());
            }
            Ok(Request::Set {
                table: table.to_string(),
                tenant: tenant.to_string(),
                freshness: freshness.to_string(),
                bind: bind.to_string(),
                content: content.to_string(),
            })
        }
        "GET" => {
            let args = take_exact(rest, 4, "GET requires 4 arguments: table tenant freshness bind")?;
            Ok(Request::Get {
                table: args[0].to_string(),
                tenant: args[1].to_string(),
                freshness: args[2].to_string(),
                bind: args[3].to_string(),
            })
        }
        "DELETE" => {
            let args = take_exact(rest, 1, "DELETE requires 1 argument: table")?;
            Ok(Request::Delete {
                table: args[0].to_string(),
            })
        }
        "CLOSE" => {
            if !rest.is_empty() {
                return Err(ParseError("CLOSE takes no arguments".to_string()));
            }
            Ok(Request::Close)
        }
        other => Err(ParseError(format!("unknown command: {}", other))),
    }
}
