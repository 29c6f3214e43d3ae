pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Deserialize the request from `--input`, else from piped stdin.
/// `Ok(None)` means neither was supplied.
pub fn read_request<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Some(file::read_input(path)?));
    }
    stdin::read_stdin()
}
