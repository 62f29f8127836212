//! Log file tailing source
//!
//! Ships the bytes appended to a file since the previous tick. The
//! process writing the file may hold a lock file while it rewrites or
//! rotates; ticks that see the lock skip without reading.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use super::MessageSource;
use crate::error::{Error, Result};

/// Largest chunk shipped in a single tick
pub const DEFAULT_MAX_CHUNK: usize = 64 * 1024;

/// Tails a file, yielding newly appended bytes on each call
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    lock: Option<PathBuf>,
    offset: u64,
    max_chunk: usize,
}

impl FileTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: None,
            offset: 0,
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }

    /// Skip ticks while `lock` exists
    pub fn with_lock(mut self, lock: impl Into<PathBuf>) -> Self {
        self.lock = Some(lock.into());
        self
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of the file already shipped
    pub fn offset(&self) -> u64 {
        self.offset
    }

    async fn is_locked(&self) -> bool {
        match self.lock {
            Some(ref lock) => tokio::fs::try_exists(lock).await.unwrap_or(false),
            None => false,
        }
    }

    fn read_error(&self, source: std::io::Error) -> Error {
        Error::IoRead {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl MessageSource for FileTail {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn produce(&mut self) -> Result<Option<Vec<u8>>> {
        if self.is_locked().await {
            debug!(path = %self.path.display(), "File locked, skipping tick");
            return Ok(None);
        }

        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "File not present yet");
                return Ok(None);
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let len = file.metadata().await.map_err(|e| self.read_error(e))?.len();
        if len < self.offset {
            info!(
                path = %self.path.display(),
                previous = self.offset,
                current = len,
                "File shrank, restarting from the beginning"
            );
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(None);
        }

        let want = (len - self.offset).min(self.max_chunk as u64) as usize;
        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(|e| self.read_error(e))?;

        let mut buf = Vec::with_capacity(want);
        let read = (&mut file)
            .take(want as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| self.read_error(e))?;

        self.offset += read as u64;
        debug!(path = %self.path.display(), bytes = read, offset = self.offset, "Read appended bytes");

        Ok(if buf.is_empty() { None } else { Some(buf) })
    }
}
