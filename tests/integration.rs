//! Integration tests for driverwire.
//!
//! Covers the full stack two ways: an in-process driver (the server loop on
//! in-memory streams, bridged to the client by a callback executor) and real
//! `example_tool` subprocesses driven through the process pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use driverwire::controller::{DemoTool, ReadPointsRequest};
use driverwire::envelope::{METHOD_INSTRUCTION, METHOD_READ_POINTS, METHOD_SCHEMA};
use driverwire::{
    CallbackExecutor, CommandExecutor, DriverServer, DriverWireError, Executor, PointValue,
    Result, ServerConfig, StdioClient,
};

const READ_POINTS_REQUEST: &[u8] = br#"{
    "points": [
        {"name": "temperature", "value": 1200},
        {"name": "pressure", "value": 150},
        {"name": "humidity", "value": 75.5},
        {"name": "status", "value": "Running"}
    ]
}"#;

/// An in-process driver: the server loop running on in-memory streams.
struct InProcessDriver {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
}

/// Start `server` on in-memory streams and return a client wired to it
/// through a callback executor, plus the shutdown token and server task.
fn start_in_process(
    server: DriverServer,
) -> (StdioClient, CancellationToken, JoinHandle<Result<()>>) {
    let (input_tx, input_rx) = duplex(64 * 1024);
    let (output_tx, output_rx) = duplex(64 * 1024);

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(server.listen(input_rx, output_tx, shutdown.clone()));

    let driver = Arc::new(tokio::sync::Mutex::new(InProcessDriver {
        input: input_tx,
        output: BufReader::new(output_rx).lines(),
    }));

    let executor = CallbackExecutor::new(move |_program: String, input: Bytes| {
        let driver = Arc::clone(&driver);
        async move {
            let mut driver = driver.lock().await;

            driver.input.write_all(&input).await?;
            driver.input.write_all(b"\n").await?;
            driver.input.flush().await?;

            let line = driver
                .output
                .next_line()
                .await?
                .ok_or(DriverWireError::StreamClosed)?;
            Ok(Bytes::from(line.into_bytes()))
        }
    });

    (
        StdioClient::new(Arc::new(executor)),
        shutdown,
        task,
    )
}

/// The demo server as the `example_tool` binary wires it.
fn demo_server(config: ServerConfig) -> DriverServer {
    let tool = Arc::new(DemoTool::new());
    let mut server = DriverServer::with_config(config);

    {
        let tool = Arc::clone(&tool);
        server
            .add_handler(METHOD_SCHEMA, move |_data: Bytes| {
                let tool = Arc::clone(&tool);
                async move { tool.schema() }
            })
            .unwrap();
    }
    {
        let tool = Arc::clone(&tool);
        server
            .add_handler(METHOD_INSTRUCTION, move |_data: Bytes| {
                let tool = Arc::clone(&tool);
                async move { Ok(Bytes::from(tool.instruction())) }
            })
            .unwrap();
    }
    {
        let tool = Arc::clone(&tool);
        server
            .add_handler(METHOD_READ_POINTS, move |data: Bytes| {
                let tool = Arc::clone(&tool);
                async move {
                    let request: ReadPointsRequest = serde_json::from_slice(&data)?;
                    let values = tool.read_points(&request)?;
                    Ok(Bytes::from(serde_json::to_vec(&values)?))
                }
            })
            .unwrap();
    }

    server
}

#[tokio::test]
async fn test_read_points_through_full_stack() {
    let (client, shutdown, task) = start_in_process(demo_server(ServerConfig::default()));

    let points = client
        .read_points("example", READ_POINTS_REQUEST)
        .await
        .unwrap();

    assert_eq!(
        points,
        vec![
            PointValue::Int(1200),
            PointValue::Int(150),
            PointValue::Float(75.5),
            PointValue::Text("Running".to_string()),
        ]
    );

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_schema_and_instruction_through_full_stack() {
    let (client, shutdown, task) = start_in_process(demo_server(ServerConfig::default()));

    let schema = client.schema("example").await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&schema).unwrap();
    assert_eq!(value["title"], "Example Tool Schema");

    let instruction = client.instruction("example").await.unwrap();
    assert!(instruction.contains("TEMP"));

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_schema_call_without_schema_handler_is_method_not_found() {
    // A driver that only answers read-points.
    let tool = Arc::new(DemoTool::new());
    let mut server = DriverServer::new();
    server
        .add_handler(METHOD_READ_POINTS, move |data: Bytes| {
            let tool = Arc::clone(&tool);
            async move {
                let request: ReadPointsRequest = serde_json::from_slice(&data)?;
                let values = tool.read_points(&request)?;
                Ok(Bytes::from(serde_json::to_vec(&values)?))
            }
        })
        .unwrap();

    let (client, shutdown, task) = start_in_process(server);

    let err = client.schema("example").await.unwrap_err();
    assert!(err.to_string().contains("method not found"));

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handler_exceeding_deadline_fails_the_call() {
    let mut server = DriverServer::with_config(ServerConfig {
        request_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    });
    server
        .add_handler(METHOD_SCHEMA, |_data: Bytes| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Bytes::from_static(b"{}"))
        })
        .unwrap();

    let (client, shutdown, task) = start_in_process(server);

    let err = tokio::time::timeout(Duration::from_secs(2), client.schema("example"))
        .await
        .expect("caller must not hang on a stuck handler")
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_duplicate_handler_registration_rejected() {
    let mut server = DriverServer::new();
    server
        .add_handler(METHOD_SCHEMA, |_data: Bytes| async move {
            Ok(Bytes::from_static(b"first"))
        })
        .unwrap();

    let err = server
        .add_handler(METHOD_SCHEMA, |_data: Bytes| async move {
            Ok(Bytes::from_static(b"second"))
        })
        .unwrap_err();
    assert!(matches!(err, DriverWireError::HandlerExists));

    // The first handler still answers.
    let (client, shutdown, task) = start_in_process(server);
    assert_eq!(&client.schema("example").await.unwrap()[..], b"first");

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Real subprocess tests against the example_tool binary.
// ---------------------------------------------------------------------------

fn example_tool_dir() -> PathBuf {
    Path::new(env!("CARGO_BIN_EXE_example_tool"))
        .parent()
        .expect("binary has a parent directory")
        .to_path_buf()
}

#[tokio::test]
async fn test_subprocess_schema_and_read_points() {
    let executor = Arc::new(CommandExecutor::new(example_tool_dir()));
    let client = StdioClient::new(executor.clone());

    let schema = client.schema("example").await.unwrap();
    assert!(!schema.is_empty());

    let points = client
        .read_points("example", READ_POINTS_REQUEST)
        .await
        .unwrap();
    assert_eq!(points.len(), 4);
    assert_eq!(points[3], PointValue::Text("Running".to_string()));

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_subprocess_driver_error_is_reported_not_fatal() {
    let executor = Arc::new(CommandExecutor::new(example_tool_dir()));
    let client = StdioClient::new(executor.clone());

    let err = client
        .read_points("example", br#"{"bogus": true}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, DriverWireError::Driver(_)));

    // The process is still serving after the failed call.
    let points = client
        .read_points("example", READ_POINTS_REQUEST)
        .await
        .unwrap();
    assert_eq!(points.len(), 4);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_same_driver_calls_never_cross_attribute() {
    let executor = Arc::new(CommandExecutor::new(example_tool_dir()));
    let client = Arc::new(StdioClient::new(executor.clone()));

    let mut calls = Vec::new();
    for i in 0..8i64 {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(async move {
            let request = format!(
                r#"{{"points": [{{"name": "point", "value": {i}}}]}}"#
            );
            let points = client.read_points("example", request.as_bytes()).await?;
            Ok::<_, DriverWireError>((i, points))
        }));
    }

    for call in calls {
        let (i, points) = call.await.unwrap().unwrap();
        // Each response must carry exactly its own request's value.
        assert_eq!(points, vec![PointValue::Int(i)]);
    }

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_different_drivers_run_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let bin = env!("CARGO_BIN_EXE_example_tool");
    std::fs::copy(bin, dir.path().join("alpha_tool")).unwrap();
    std::fs::copy(bin, dir.path().join("beta_tool")).unwrap();

    let executor = Arc::new(CommandExecutor::new(dir.path()));
    let client = StdioClient::new(executor.clone());

    let (alpha, beta) = tokio::join!(client.schema("alpha"), client.schema("beta"));
    assert!(!alpha.unwrap().is_empty());
    assert!(!beta.unwrap().is_empty());

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_close_terminates_and_next_call_respawns() {
    let executor = Arc::new(CommandExecutor::new(example_tool_dir()));
    let client = StdioClient::new(executor.clone());

    client.schema("example").await.unwrap();

    executor.close().await.unwrap();

    // A fresh process answers the next call for the same driver name.
    let schema = client.schema("example").await.unwrap();
    assert!(!schema.is_empty());

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_envelope_round_trip_through_executor_boundary() {
    // The executor sees opaque lines; payload bytes must survive untouched,
    // including number formatting a JSON re-serialization would normalize.
    let raw = br#"{"points": [{"name": "temperature", "value": 22.50}]}"#;

    let executor = Arc::new(CallbackExecutor::new(|_program: String, input: Bytes| {
        async move {
            let request = driverwire::envelope::Request::decode(&input)?;
            let data = request.data.ok_or(DriverWireError::MethodNotFound)?;
            assert_eq!(
                &data[..],
                &br#"{"points": [{"name": "temperature", "value": 22.50}]}"#[..]
            );

            let response =
                driverwire::envelope::Response::success(Bytes::from_static(b"[22.5]"));
            Ok(Bytes::from(response.encode()?))
        }
    }));

    let client = StdioClient::new(executor);
    let points = client.read_points("example", raw).await.unwrap();
    assert_eq!(points, vec![PointValue::Float(22.5)]);
}
