//! Append-only audit log for rotation operations.
//!
//! Every applied transition, rollback, snapshot, and verification
//! verdict is logged with a timestamp and metadata. The log is
//! human-readable, append-only, and never consulted by control flow.

use std::path::Path;

use chrono::Utc;

/// Append an audit entry with the given event name and key=value fields.
///
/// Format: `2026-08-07T10:30:00Z | transition_applied | target=phase1 | anchors=2`
pub fn append_entry(path: &Path, event: &str, fields: &[(&str, &str)]) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let mut line = format!("{timestamp} | {event}");
    for (key, value) in fields {
        line.push_str(&format!(" | {key}={value}"));
    }
    line.push('\n');

    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;

    tracing::debug!(event, "Audit log entry written");
    Ok(())
}

/// Read the whole audit log; empty string if nothing was logged yet.
pub fn read_log(path: &Path) -> Result<String, std::io::Error> {
    if path.exists() {
        std::fs::read_to_string(path)
    } else {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taproot_common::test::scratch_dir;

    #[test]
    fn append_and_read_entries() {
        let path = scratch_dir("audit").join("audit.log");

        append_entry(
            &path,
            "transition_applied",
            &[("target", "phase1"), ("anchors", "2")],
        )
        .unwrap();
        append_entry(&path, "rollback_applied", &[("record", "mesh-ca-signing")]).unwrap();

        let content = read_log(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("transition_applied"));
        assert!(lines[0].contains("target=phase1"));
        assert!(lines[1].contains("rollback_applied"));
    }

    #[test]
    fn read_missing_log_is_empty() {
        let path = scratch_dir("audit-missing").join("audit.log");
        assert_eq!(read_log(&path).unwrap(), "");
    }
}
