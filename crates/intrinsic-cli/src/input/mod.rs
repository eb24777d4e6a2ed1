pub mod file;
pub mod forecast_csv;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Resolve a command's typed input from `--input <file>` or piped stdin.
///
/// Returns `None` when neither is present so the caller can fall back to
/// individual flags.
pub fn read_typed<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Some(file::read_input(path)?)),
        None => stdin::read_stdin(),
    }
}
