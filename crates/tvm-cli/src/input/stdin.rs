use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialize a request piped on stdin, JSON or YAML.
/// `Ok(None)` when stdin is a terminal or the pipe is empty.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // JSON documents start with a brace; anything else is parsed as YAML
    let request = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed)
            .map_err(|e| format!("Failed to parse JSON from stdin: {}", e))?
    } else {
        serde_yaml::from_str(trimmed)
            .map_err(|e| format!("Failed to parse YAML from stdin: {}", e))?
    };
    Ok(Some(request))
}
