use serde_json::Value;
use std::io::{self, Read};

/// Attempt to read JSON from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive).
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let Some(bytes) = read_stdin_bytes()? else {
        return Ok(None);
    };
    let value: Value = serde_json::from_slice(&bytes)?;
    Ok(Some(value))
}

/// Piped stdin as raw bytes; None for a TTY or empty input.
pub fn read_stdin_bytes() -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;

    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(buffer))
}
