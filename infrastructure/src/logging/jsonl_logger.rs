//! JSONL transcript writer.
//!
//! Each [`TranscriptEntry`] becomes one JSON line carrying `type`, `session`
//! and `timestamp` next to the entry's fields. The file is opened in append
//! mode so restarts extend the same transcript.

use relay_application::{TranscriptEntry, TranscriptLogger};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub struct JsonlTranscriptLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlTranscriptLogger {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// Returns `None` (after a warning) if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create transcript directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open transcript file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_line(entry: TranscriptEntry) -> Value {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let mut map = match entry.fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("data".to_string(), other)]),
    };
    map.insert("type".to_string(), Value::from(entry.event.as_str()));
    map.insert("session".to_string(), Value::from(entry.session.as_str()));
    map.insert("timestamp".to_string(), Value::String(timestamp));
    Value::Object(map)
}

impl TranscriptLogger for JsonlTranscriptLogger {
    fn record(&self, entry: TranscriptEntry) {
        let Ok(line) = serde_json::to_string(&to_line(entry)) else {
            return;
        };

        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One flush per line keeps the file readable while the relay runs.
        if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_err() {
            warn!("Failed to write transcript line to {}", self.path.display());
        }
    }
}

impl Drop for JsonlTranscriptLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_application::TranscriptEvent;
    use relay_domain::SessionKey;

    fn entry(event: TranscriptEvent, session: &str, fields: Value) -> TranscriptEntry {
        TranscriptEntry {
            event,
            session: SessionKey::new(session),
            fields,
        }
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_object_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let logger = JsonlTranscriptLogger::open(&path).unwrap();

        logger.record(entry(
            TranscriptEvent::RequestReceived,
            "device/1",
            serde_json::json!({ "text": "hello", "payload_bytes": 0 }),
        ));
        logger.record(entry(
            TranscriptEvent::ChatCompleted,
            "device/1",
            serde_json::json!({ "reply": "你好", "fragments": 2 }),
        ));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["session"], "device/1");
            assert!(line.get("timestamp").is_some());
        }
        assert_eq!(lines[0]["type"], "request_received");
        assert_eq!(lines[0]["text"], "hello");
        assert_eq!(lines[1]["type"], "chat_completed");
        assert_eq!(lines[1]["reply"], "你好");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("transcript.jsonl");

        for session in ["a", "b"] {
            let logger = JsonlTranscriptLogger::open(&path).unwrap();
            logger.record(entry(
                TranscriptEvent::RequestFailed,
                session,
                serde_json::json!({ "kind": "timeout" }),
            ));
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["session"], "a");
        assert_eq!(lines[1]["session"], "b");
        assert_eq!(lines[1]["type"], "request_failed");
    }

    #[test]
    fn test_non_object_fields_are_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.jsonl");
        let logger = JsonlTranscriptLogger::open(&path).unwrap();

        logger.record(entry(
            TranscriptEvent::AudioTranscribed,
            "t/1",
            serde_json::json!("画一只猫"),
        ));
        logger.record(entry(TranscriptEvent::RequestClassified, "t/1", Value::Null));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "audio_transcribed");
        assert_eq!(lines[0]["data"], "画一只猫");
        assert_eq!(lines[1]["type"], "request_classified");
        assert!(lines[1].get("data").is_none());
    }

    #[test]
    fn test_directory_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlTranscriptLogger::open(dir.path()).is_none());
    }
}
