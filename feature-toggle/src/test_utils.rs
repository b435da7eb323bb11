use std::path::PathBuf;

use rand::{distributions::Alphanumeric, Rng};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// Writes `contents` to a fresh file in the temp directory and returns its
/// path. Callers remove the file when done.
pub async fn write_temp_json(contents: &str) -> Result<PathBuf, std::io::Error> {
    let path = std::env::temp_dir().join(format!("{}.json", random_string("flags_", 16)));
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}
