// src/input.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Interactive size prompt.
//!
//! Generic over `BufRead`/`Write` so the CLI passes stdin/stdout and tests pass
//! byte slices.

use std::io::{BufRead, Write};
use tracing::debug;

use crate::constants::SIZE_PROMPT;
use crate::error::{Result, StompError};

/// Parse one input line as an unsigned number.
///
/// Only a non-empty run of ASCII digits counts; anything else, including a
/// value too large for `u64`, yields 0.
pub fn parse_number(line: &str) -> u64 {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    line.parse().unwrap_or(0)
}

/// Print `banner`, read one line and parse it with [`parse_number`].
///
/// End of input is an error so callers that loop on zero cannot spin forever.
pub fn read_number<R, W>(input: &mut R, output: &mut W, banner: &str) -> Result<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    write!(output, "{}\n> ", banner)
        .and_then(|_| output.flush())
        .map_err(|e| StompError::InvalidInput(format!("cannot write prompt: {}", e)))?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| StompError::InvalidInput(format!("cannot read input: {}", e)))?;
    if read == 0 {
        return Err(StompError::InvalidInput("end of input before a number was entered".into()));
    }

    let n = parse_number(&line);
    debug!(input = line.trim_end(), parsed = n, "read number");
    Ok(n)
}

/// Prompt until a non-zero size (in GB) is entered.
pub fn read_file_size<R, W>(input: &mut R, output: &mut W) -> Result<u64>
where
    R: BufRead + ?Sized,
    W: Write + ?Sized,
{
    loop {
        let n = read_number(input, output, SIZE_PROMPT)?;
        if n != 0 {
            return Ok(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), 42);
        assert_eq!(parse_number("42\n"), 42);
        assert_eq!(parse_number("42\r\n"), 42);
        assert_eq!(parse_number("007"), 7);
        assert_eq!(parse_number(""), 0);
        assert_eq!(parse_number("abc"), 0);
        assert_eq!(parse_number("4x2"), 0);
        assert_eq!(parse_number("-3"), 0);
        assert_eq!(parse_number(" 5"), 0);
        assert_eq!(parse_number("99999999999999999999999"), 0);
    }

    #[test]
    fn test_read_number_prints_banner() {
        let mut input: &[u8] = b"12\n";
        let mut output = Vec::new();
        assert_eq!(read_number(&mut input, &mut output, "How many?").unwrap(), 12);
        assert_eq!(String::from_utf8(output).unwrap(), "How many?\n> ");
    }

    #[test]
    fn test_read_file_size_reprompts_until_nonzero() {
        let mut input: &[u8] = b"abc\n0\n\n3\n";
        let mut output = Vec::new();
        assert_eq!(read_file_size(&mut input, &mut output).unwrap(), 3);

        let prompts = String::from_utf8(output).unwrap().matches(SIZE_PROMPT).count();
        assert_eq!(prompts, 4);
    }

    #[test]
    fn test_read_file_size_eof_is_error() {
        let mut input: &[u8] = b"0\nnope\n";
        let mut output = Vec::new();
        let err = read_file_size(&mut input, &mut output).unwrap_err();
        assert!(matches!(err, StompError::InvalidInput(_)));
    }
}
