use std::net::SocketAddr;
use std::time::Duration;

use rax_transfer_server::config::DEFAULT_MAX_MESSAGE_BYTES;
use rax_transfer_server::protocol::{Code, Frame, read_frame, write_frame};
use rax_transfer_server::transfer::UPLOAD_SUCCESS_MESSAGE;
use rax_transfer_server::{FileClient, Server, ServerConfig};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: SocketAddr,
    dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    fn client(&self) -> FileClient {
        FileClient::new(self.addr.to_string())
    }

    fn storage(&self) -> std::path::PathBuf {
        self.dir.path().join("storage")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// Start a server on an OS-assigned port with a private storage root
async fn start_test_server(tweak: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let dir = TempDir::new().unwrap();
    let mut config = ServerConfig {
        port: 0,
        storage_root: dir.path().join("storage").to_string_lossy().to_string(),
        ..ServerConfig::default()
    };
    tweak(&mut config);

    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.run());

    TestServer {
        addr,
        dir,
        shutdown,
    }
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let server = start_test_server(|_| {}).await;
    let client = server.client();

    let message = client
        .upload("a.txt", vec![b"hel".to_vec(), b"lo".to_vec()])
        .await
        .unwrap();
    assert_eq!(message, UPLOAD_SUCCESS_MESSAGE);
    assert_eq!(std::fs::read(server.storage().join("a.txt")).unwrap(), b"hello");

    let chunks = client.download("a.txt").await.unwrap();
    assert_eq!(chunks.concat(), b"hello");
}

#[tokio::test]
async fn test_large_download_is_split_by_read_buffer() {
    let server = start_test_server(|_| {}).await;
    let client = server.client();

    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let parts: Vec<Vec<u8>> = payload.chunks(700).map(<[u8]>::to_vec).collect();
    client.upload("blob.bin", parts).await.unwrap();

    let chunks = client.download("blob.bin").await.unwrap();
    assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 1024));
    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks.concat(), payload);
}

#[tokio::test]
async fn test_upload_overwrites_existing_file() {
    let server = start_test_server(|_| {}).await;
    let client = server.client();

    client
        .upload("notes.txt", vec![b"a much longer first version".to_vec()])
        .await
        .unwrap();
    client.upload("notes.txt", vec![b"v2".to_vec()]).await.unwrap();

    assert_eq!(client.download("notes.txt").await.unwrap().concat(), b"v2");
}

#[tokio::test]
async fn test_path_traversal_upload_is_rejected() {
    let server = start_test_server(|_| {}).await;
    let client = server.client();

    let err = client
        .upload("../escape", vec![b"payload".to_vec()])
        .await
        .unwrap_err();
    assert_eq!(err.status().unwrap().code, Code::InvalidArgument);

    assert_eq!(std::fs::read_dir(server.storage()).unwrap().count(), 0);
    assert!(!server.dir.path().join("escape").exists());
}

#[tokio::test]
async fn test_download_missing_file_is_not_found() {
    let server = start_test_server(|_| {}).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    write_frame(
        &mut stream,
        &Frame::DownloadRequest {
            filename: "nope.txt".into(),
        },
    )
    .await
    .unwrap();

    // The very first frame is the status: zero chunks were sent
    match read_frame(&mut stream, 1024).await.unwrap().unwrap() {
        Frame::Status(status) => assert_eq!(status.code, Code::NotFound),
        other => panic!("expected status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_download_invalid_name_is_invalid_argument() {
    let server = start_test_server(|_| {}).await;

    let err = server.client().download("a/b").await.unwrap_err();
    assert_eq!(err.status().unwrap().code, Code::InvalidArgument);
}

#[tokio::test]
async fn test_list_empty_then_populated() {
    let server = start_test_server(|_| {}).await;
    let client = server.client();

    assert!(client.list().await.unwrap().is_empty());

    client.upload("b.txt", vec![b"2".to_vec()]).await.unwrap();
    client.upload("a.txt", vec![b"1".to_vec()]).await.unwrap();

    let files = client.list().await.unwrap();
    let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.txt"]);
    for file in &files {
        assert_eq!(file.created_at, file.updated_at);
        assert!(chrono::DateTime::parse_from_rfc3339(&file.created_at).is_ok());
    }
}

#[tokio::test]
async fn test_interrupted_upload_leaves_partial_file_and_frees_slot() {
    let server = start_test_server(|config| config.max_concurrent_uploads = 1).await;

    for _ in 0..3 {
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        write_frame(
            &mut stream,
            &Frame::UploadChunk {
                filename: "partial.bin".into(),
                chunk: b"abc".to_vec(),
            },
        )
        .await
        .unwrap();
        // Hang up without UploadEnd
        drop(stream);
    }

    // The single slot must still be usable after the failures
    let message = tokio::time::timeout(
        Duration::from_secs(5),
        server.client().upload("whole.bin", vec![b"xyz".to_vec()]),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(message, UPLOAD_SUCCESS_MESSAGE);
    assert_eq!(std::fs::read(server.storage().join("whole.bin")).unwrap(), b"xyz");
}

#[tokio::test]
async fn test_concurrent_downloads_all_complete() {
    let server = start_test_server(|config| config.max_concurrent_downloads = 2).await;
    let client = server.client();
    client
        .upload("shared.bin", vec![vec![42u8; 10_000]])
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = server.client();
        tasks.push(tokio::spawn(async move { client.download("shared.bin").await }));
    }
    for task in tasks {
        let chunks = task.await.unwrap().unwrap();
        assert_eq!(chunks.concat(), vec![42u8; 10_000]);
    }
}

#[tokio::test]
async fn test_empty_upload_creates_no_file() {
    let server = start_test_server(|_| {}).await;

    let message = server.client().upload("ghost.txt", Vec::new()).await.unwrap();
    assert_eq!(message, UPLOAD_SUCCESS_MESSAGE);
    assert!(!server.storage().join("ghost.txt").exists());
}

#[tokio::test]
async fn test_half_closed_requests_are_still_served() {
    let server = start_test_server(|_| {}).await;
    let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
    server
        .client()
        .upload("big.bin", payload.chunks(64 * 1024).map(<[u8]>::to_vec))
        .await
        .unwrap();

    // Download: request, then close the write side before reading
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    write_frame(
        &mut stream,
        &Frame::DownloadRequest {
            filename: "big.bin".into(),
        },
    )
    .await
    .unwrap();
    stream.shutdown().await.unwrap();

    let mut received = Vec::new();
    loop {
        match read_frame(&mut stream, DEFAULT_MAX_MESSAGE_BYTES)
            .await
            .unwrap()
            .unwrap()
        {
            Frame::DownloadChunk { chunk } => received.extend_from_slice(&chunk),
            Frame::Status(status) => {
                assert!(status.is_ok(), "download failed: {status}");
                break;
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
    assert_eq!(received, payload);

    // List behaves the same way
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    write_frame(&mut stream, &Frame::ListRequest).await.unwrap();
    stream.shutdown().await.unwrap();

    match read_frame(&mut stream, DEFAULT_MAX_MESSAGE_BYTES)
        .await
        .unwrap()
        .unwrap()
    {
        Frame::ListReply { files } => assert_eq!(files.len(), 1),
        other => panic!("unexpected frame {other:?}"),
    }
}
