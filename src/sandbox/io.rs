//! Bounded capture of a child's stdout/stderr.

use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 8 * 1024;

/// Bytes read from one output stream, up to a cap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedOutput {
    /// Get the captured output as a string.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Captured text with surrounding whitespace removed.
    pub fn trimmed(&self) -> String {
        self.to_string_lossy().trim().to_string()
    }

    /// Whether the stream produced more than the cap allowed.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Get the length of captured data.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes.
///
/// Everything past the cap is still read and thrown away so the child never
/// blocks on a full pipe.
pub async fn read_capped<R>(mut reader: R, limit: usize) -> std::io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedOutput::default();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok(captured)
}

/// [`read_capped`] for an optional pipe; a missing pipe reads as empty.
pub async fn capture<R>(reader: Option<R>, limit: usize) -> std::io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => read_capped(reader, limit).await,
        None => Ok(CapturedOutput::default()),
    }
}
