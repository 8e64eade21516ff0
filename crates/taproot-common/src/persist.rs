use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::Path;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, io::Error> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Write a value as pretty JSON via a temp file + rename, so a crash
/// mid-write never leaves a truncated state file behind.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::scratch_dir;

    #[test]
    fn read_json_invalid_returns_invalid_data() {
        let dir = scratch_dir("persist-invalid");
        let path = dir.join("bad.json");
        std::fs::write(&path, "{broken json").unwrap();

        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_json_if_exists_missing_returns_none() {
        let dir = scratch_dir("persist-missing");
        let value: Option<Vec<String>> = read_json_if_exists(&dir.join("missing.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn write_json_pretty_creates_parent_dir() {
        let path = scratch_dir("persist-write").join("nested").join("value.json");
        write_json_pretty(&path, &vec!["a", "b"]).unwrap();
        assert!(path.exists());

        let back: Vec<String> = read_json(&path).unwrap();
        assert_eq!(back, vec!["a", "b"]);
    }

    #[test]
    fn write_json_pretty_fails_on_directory_path() {
        let dir = scratch_dir("persist-dir");
        let result = write_json_pretty(&dir, &vec!["a"]);
        assert!(result.is_err());
    }
}
