//! Process pool - spawns and reuses one subprocess per driver program.
//!
//! The host side of the stdio protocol. [`CommandExecutor`] keeps one
//! long-lived subprocess per program name and performs the raw bytes-in /
//! bytes-out exchange: write one line to the process's stdin, read one line
//! from its stdout.
//!
//! Two locks are in play and they protect different things:
//!
//! - the pool lock guards the spawn-or-lookup step, so two callers racing to
//!   call a never-yet-seen driver cannot double-spawn it;
//! - each process record carries its own lock guarding the write/read
//!   exchange, so calls to different drivers proceed in parallel while calls
//!   to the same driver are strictly serialized.
//!
//! The serialization per record is load-bearing: the wire protocol carries no
//! request identifier, so overlapping calls to one process would make
//! responses unattributable.
//!
//! No failure is retried here - spawn, write and read errors all surface to
//! the caller, and retry policy stays with the caller.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::error::{DriverWireError, Result};
use crate::handler::BoxFuture;

/// Performs the raw line exchange with a driver program.
///
/// The process-backed implementation is [`CommandExecutor`];
/// [`CallbackExecutor`] routes calls to an in-process function instead.
pub trait Executor: Send + Sync {
    /// Send one request line to `program` and return its one response line.
    fn execute<'a>(&'a self, program: &'a str, input: &'a [u8]) -> BoxFuture<'a, Result<Bytes>>;

    /// Terminate every tracked process and release all resources. Idempotent.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// A running driver subprocess and its pipes.
///
/// Both pipe ends are owned exclusively; access goes through the record's
/// lock.
struct ManagedProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Process pool keyed by program name.
pub struct CommandExecutor {
    dir: PathBuf,
    processes: Mutex<HashMap<String, Arc<Mutex<ManagedProcess>>>>,
}

impl CommandExecutor {
    /// Create a pool resolving programs under the given drivers directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            processes: Mutex::new(HashMap::new()),
        }
    }

    fn spawn_process(&self, program: &str) -> Result<ManagedProcess> {
        let path = self.dir.join(program);

        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        // Both pipes were requested above; a missing handle means the spawn
        // is unusable, so tear the child down rather than leak it.
        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.start_kill();
                return Err(missing_pipe("stdin"));
            }
        };
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.start_kill();
                return Err(missing_pipe("stdout"));
            }
        };

        tracing::debug!(program, path = %path.display(), "spawned driver process");

        Ok(ManagedProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn execute_inner(&self, program: &str, input: &[u8]) -> Result<Bytes> {
        // Spawn-or-lookup happens entirely under the pool lock: a racing
        // caller either finds the freshly inserted record or performs the
        // spawn itself, never both.
        let record = {
            let mut pool = self.processes.lock().await;
            match pool.get(program) {
                Some(record) => Arc::clone(record),
                None => {
                    let record = Arc::new(Mutex::new(self.spawn_process(program)?));
                    pool.insert(program.to_string(), Arc::clone(&record));
                    record
                }
            }
        };

        // One in-flight call per process; the record lock is held across the
        // full write/read exchange.
        let mut process = record.lock().await;

        process.stdin.write_all(input).await?;
        process.stdin.write_all(b"\n").await?;
        process.stdin.flush().await?;

        let mut line = Vec::new();
        let n = process.stdout.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(DriverWireError::StreamClosed);
        }

        while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            line.pop();
        }

        Ok(Bytes::from(line))
    }

    async fn close_inner(&self) -> Result<()> {
        let mut pool = self.processes.lock().await;

        for (program, record) in pool.drain() {
            let mut process = record.lock().await;

            if let Err(err) = process.child.start_kill() {
                // InvalidInput means the child already exited.
                if err.kind() != io::ErrorKind::InvalidInput {
                    tracing::warn!(program, error = %err, "failed to kill driver process");
                }
            }
            let _ = process.child.wait().await;

            tracing::debug!(program, "terminated driver process");
        }

        Ok(())
    }
}

impl Executor for CommandExecutor {
    fn execute<'a>(&'a self, program: &'a str, input: &'a [u8]) -> BoxFuture<'a, Result<Bytes>> {
        Box::pin(self.execute_inner(program, input))
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.close_inner())
    }
}

fn missing_pipe(name: &str) -> DriverWireError {
    DriverWireError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("driver process {name} pipe was not captured"),
    ))
}

/// Executor that routes calls to an in-process function.
///
/// Stands in for a driver process when embedding a driver in the host or
/// exercising the client without subprocesses.
pub struct CallbackExecutor<F> {
    handler: F,
}

impl<F, Fut> CallbackExecutor<F>
where
    F: Fn(String, Bytes) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Bytes>> + Send + 'static,
{
    /// Create an executor backed by the given function.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> Executor for CallbackExecutor<F>
where
    F: Fn(String, Bytes) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Bytes>> + Send + 'static,
{
    fn execute<'a>(&'a self, program: &'a str, input: &'a [u8]) -> BoxFuture<'a, Result<Bytes>> {
        let fut = (self.handler)(program.to_string(), Bytes::copy_from_slice(input));
        Box::pin(fut)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
