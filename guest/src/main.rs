//! Regex engine guest.
//!
//! A WASI command: reads one JSON request from stdin, writes one JSON result
//! to stdout and exits 0. Matching errors are reported in the result; only
//! I/O failures make the process exit non-zero.

use std::io::{self, Read, Write};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Largest request read from stdin. Matches the host's input cap.
const MAX_INPUT_BYTES: u64 = 1024 * 1024;

#[derive(Deserialize)]
struct Request {
    pattern: String,
    text: String,
}

#[derive(Serialize)]
struct Response {
    is_match: bool,
    error: String,
}

impl Response {
    fn matched(is_match: bool) -> Self {
        Self {
            is_match,
            error: String::new(),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            is_match: false,
            error,
        }
    }
}

fn evaluate(input: &[u8]) -> Response {
    let request: Request = match serde_json::from_slice(input) {
        Ok(request) => request,
        Err(e) => return Response::failed(format!("unable to parse the input json: {e}")),
    };

    match Regex::new(&request.pattern) {
        Ok(re) => Response::matched(re.is_match(&request.text)),
        Err(e) => Response::failed(format!("invalid regular expression: {e}")),
    }
}

fn main() -> io::Result<()> {
    let mut input = Vec::new();
    io::stdin()
        .lock()
        .take(MAX_INPUT_BYTES)
        .read_to_end(&mut input)?;

    let response = evaluate(&input);

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    stdout.flush()
}
