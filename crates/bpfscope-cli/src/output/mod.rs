//! Rendering of records, entries and keys in plain or JSON form.
//!
//! Plain output follows bpftool's layout. Renderers return the text without
//! a trailing newline; an empty string means nothing to print.

mod json;
mod plain;

use bpfscope_core::{MapEntry, MapRecord, ProgramRecord};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Json,
    PrettyJson,
}

impl OutputMode {
    pub fn is_json(self) -> bool {
        !matches!(self, OutputMode::Plain)
    }
}

/// Renders results in one [`OutputMode`].
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    mode: OutputMode,
}

impl Renderer {
    pub fn new(mode: OutputMode) -> Self {
        Renderer { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn programs(&self, records: &[ProgramRecord]) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(plain::programs(records)),
            _ => self.encode(&json::programs(records)),
        }
    }

    pub fn maps(&self, records: &[MapRecord]) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(plain::maps(records)),
            _ => self.encode(&json::maps(records)),
        }
    }

    /// Output of `map dump`.
    pub fn entries(&self, entries: &[MapEntry]) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(plain::entries(entries)),
            _ => self.encode(&json::entries(entries)),
        }
    }

    /// Output of `map lookup`.
    pub fn entry(&self, key: &[u8], value: &[u8]) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(plain::entry(key, value)),
            _ => self.encode(&json::entry(key, value)),
        }
    }

    /// Output of `map getnext`. `key` is the cursor key, if one was given.
    pub fn next_key(&self, key: Option<&[u8]>, next: &[u8]) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(plain::next_key(key, next)),
            _ => self.encode(&json::next_key(key, next)),
        }
    }

    pub fn version(&self, version: &str) -> Result<String, serde_json::Error> {
        match self.mode {
            OutputMode::Plain => Ok(format!("bpfscope version {}", version)),
            _ => self.encode(&serde_json::json!({ "version": version })),
        }
    }

    /// A failure message in JSON form. Plain failures are formatted by
    /// [`report`](crate::report).
    pub fn error(&self, message: &str) -> Result<String, serde_json::Error> {
        self.encode(&json::error(message))
    }

    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        if self.mode == OutputMode::PrettyJson {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_json_is_indented() {
        let compact = Renderer::new(OutputMode::Json).entry(&[1], &[2]).unwrap();
        let pretty = Renderer::new(OutputMode::PrettyJson).entry(&[1], &[2]).unwrap();
        assert_eq!(compact, r#"{"key":["0x01"],"value":["0x02"]}"#);
        assert!(pretty.contains("\n  \"key\""));
    }

    #[test]
    fn version_line() {
        assert_eq!(
            Renderer::new(OutputMode::Plain).version("0.1.0").unwrap(),
            "bpfscope version 0.1.0"
        );
        assert_eq!(
            Renderer::new(OutputMode::Json).version("0.1.0").unwrap(),
            r#"{"version":"0.1.0"}"#
        );
    }
}
