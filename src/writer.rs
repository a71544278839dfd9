//! Dedicated writer task for the server's output stream.
//!
//! The server hands every decoded request to its own task, but all responses
//! funnel through one shared output stream. Concurrent writers to one stream
//! can interleave partial lines, so completed responses are routed through an
//! mpsc channel to a single task that exclusively owns the stream.
//!
//! ```text
//! Handler 1 ─┐
//! Handler 2 ─┼─► mpsc::Sender<Response> ─► Writer Task ─► output stream
//! Handler N ─┘
//! ```
//!
//! Each response is serialized to one JSON line and flushed before the next
//! is taken, so lines on the wire are never interleaved even though request
//! handling is concurrent.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::envelope::Response;
use crate::error::Result;

/// Default channel capacity for queued responses.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Spawn the writer task and return a sender for queueing responses.
///
/// The task exits cleanly once every sender is dropped and the queue is
/// drained. A write failure terminates the task with the error; queued
/// responses after that point are lost, matching a closed output pipe.
pub(crate) fn spawn_response_writer<W>(output: W) -> (mpsc::Sender<Response>, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let task = tokio::spawn(writer_loop(rx, output));
    (tx, task)
}

/// Main writer loop - receives responses and writes them as lines.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Response>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = response.encode()?;
        line.push(b'\n');

        output.write_all(&line).await?;
        output.flush().await?;
    }

    // All senders dropped, clean shutdown.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_writer_emits_one_line_per_response() {
        let (write_half, read_half) = duplex(4096);
        let (tx, task) = spawn_response_writer(write_half);

        tx.send(Response::success(Bytes::from_static(b"one")))
            .await
            .unwrap();
        tx.send(Response::failure("bad")).await.unwrap();
        drop(tx);
        task.await.unwrap().unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        let second = lines.next_line().await.unwrap().unwrap();
        assert!(lines.next_line().await.unwrap().is_none());

        let first = Response::decode(first.as_bytes()).unwrap();
        assert_eq!(&first.into_result().unwrap()[..], b"one");

        let second = Response::decode(second.as_bytes()).unwrap();
        assert_eq!(second.error.as_deref(), Some("bad"));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (write_half, _read_half) = duplex(4096);
        let (tx, task) = spawn_response_writer(write_half);

        drop(tx);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_senders_never_interleave_lines() {
        let (write_half, read_half) = duplex(64 * 1024);
        let (tx, task) = spawn_response_writer(write_half);

        let mut senders = Vec::new();
        for i in 0..16u32 {
            let tx = tx.clone();
            senders.push(tokio::spawn(async move {
                let payload = vec![b'a' + (i % 26) as u8; 512];
                tx.send(Response::success(payload)).await.unwrap();
            }));
        }
        for s in senders {
            s.await.unwrap();
        }
        drop(tx);
        task.await.unwrap().unwrap();

        let mut lines = BufReader::new(read_half).lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await.unwrap() {
            // Every line must decode as a complete envelope on its own.
            let resp = Response::decode(line.as_bytes()).unwrap();
            let bytes = resp.into_result().unwrap();
            assert_eq!(bytes.len(), 512);
            assert!(bytes.iter().all(|b| *b == bytes[0]));
            count += 1;
        }
        assert_eq!(count, 16);
    }
}
