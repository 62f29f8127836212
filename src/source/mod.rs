//! Outbound message sources
//!
//! The session writer asks its source for a payload on every tick.
//! - `Heartbeat`: a fixed payload, sent on every tick
//! - `FileTail`: whatever was appended to a log file since the last tick

mod file;

pub use file::*;

use async_trait::async_trait;

use crate::config::{SourceKind, SourceSettings};
use crate::error::{Error, Result};

/// Producer of outbound payloads, polled once per writer tick
#[async_trait]
pub trait MessageSource: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Payload to send on this tick, or `None` to skip it
    async fn produce(&mut self) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl MessageSource for Box<dyn MessageSource> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn produce(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).produce().await
    }
}

/// Fixed payload sent on every tick
#[derive(Debug, Clone)]
pub struct Heartbeat {
    payload: Vec<u8>,
}

impl Heartbeat {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self { payload: payload.into() }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new("Hello")
    }
}

#[async_trait]
impl MessageSource for Heartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    async fn produce(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.payload.clone()))
    }
}

/// Build the configured source
pub fn from_settings(settings: &SourceSettings) -> Result<Box<dyn MessageSource>> {
    match settings.kind {
        SourceKind::Heartbeat => Ok(Box::new(Heartbeat::new(settings.payload.as_bytes()))),
        SourceKind::File => {
            let path = settings
                .file
                .as_deref()
                .ok_or_else(|| Error::config_field_invalid("source.file", "file source requires a path"))?;
            let mut tail = FileTail::new(path);
            if let Some(ref lock) = settings.lock {
                tail = tail.with_lock(lock);
            }
            Ok(Box::new(tail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_always_produces_payload() {
        let mut source = Heartbeat::default();
        for _ in 0..3 {
            assert_eq!(source.produce().await.unwrap(), Some(b"Hello".to_vec()));
        }
    }

    #[test]
    fn test_from_settings_heartbeat() {
        let settings = SourceSettings::default();
        let source = from_settings(&settings).unwrap();
        assert_eq!(source.name(), "heartbeat");
    }

    #[test]
    fn test_from_settings_file_requires_path() {
        let settings = SourceSettings {
            kind: SourceKind::File,
            file: None,
            ..Default::default()
        };
        assert!(from_settings(&settings).is_err());
    }
}
