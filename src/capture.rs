//! Per-invocation output capture
//!
//! Every invocation owns its child's stdout/stderr pipe handles, so one
//! snippet's writes can never bleed into another's capture. Streams are
//! drained concurrently into byte-capped buffers; past the cap the pipe
//! is still drained to end-of-stream so the child never blocks on a full
//! pipe, output is just discarded.

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Captured text from one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
    /// Captured text, lossily decoded, at most the configured cap
    pub text: String,
    /// True if the stream produced more bytes than the cap
    pub truncated: bool,
}

/// Drain a stream to end-of-stream, keeping at most `max_bytes` bytes.
pub async fn drain_capped<R>(mut reader: R, max_bytes: usize) -> CapturedStream
where
    R: AsyncRead + Unpin,
{
    let mut captured: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if captured.len() < max_bytes {
                    let take = n.min(max_bytes - captured.len());
                    captured.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            // A broken pipe means the writer is gone; treat as end-of-stream
            Err(_) => break,
        }
    }

    CapturedStream {
        text: String::from_utf8_lossy(&captured).to_string(),
        truncated,
    }
}
