use log::{debug, error, info, warn};
use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::handlers::error_to_status;
use crate::error::TransferError;
use crate::middleware::{AdmissionTicket, OperationClass};
use crate::middleware::logging::{log_call, log_connection, log_outcome};
use crate::protocol::{Code, Frame, FrameSink, FrameSource, Status, read_frame, write_frame};
use crate::transfer::TransferService;

/// How long unread input is drained after the final status
const LINGER: Duration = Duration::from_secs(2);

/// Upload bytes buffered per call while it waits for a slot
const ADMISSION_READ_AHEAD: usize = 64 * 1024;

pub struct Server {
    listener: TcpListener,
    service: Arc<TransferService>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
}

impl Server {
    /// Provision the storage root, build the shared limiters and bind.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let root = config.storage_root_path();
        if let Err(e) = tokio::fs::create_dir_all(&root).await {
            error!("Failed to create storage root {}: {}", root.display(), e);
            return Err(e);
        }
        info!("Storage root directory: {}", root.display());

        let socket = config.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e);
            }
        };
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            service: Arc::new(TransferService::from_config(&config)),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> Arc<TransferService> {
        Arc::clone(&self.service)
    }

    /// Cancelling this token stops the accept loop and cancels every call.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) {
        info!(
            "Starting RAX transfer server (uploads {}, downloads {}, lists {})",
            self.config.max_concurrent_uploads,
            self.config.max_concurrent_downloads,
            self.config.max_list_requests
        );

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let service = Arc::clone(&self.service);
                    let config = Arc::clone(&self.config);
                    let cancel = self.shutdown.child_token();

                    // One task per call so the accept loop never blocks
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, service, config, cancel).await
                        {
                            warn!("Failed to serve client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Aborts the deadline timer once the call is over
struct DeadlineGuard(JoinHandle<()>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn arm_deadline(cancel: CancellationToken, after: Duration) -> DeadlineGuard {
    DeadlineGuard(tokio::spawn(async move {
        tokio::time::sleep(after).await;
        debug!("Call deadline of {:?} expired", after);
        cancel.cancel();
    }))
}

/// Cancel the call when the client's connection fails.
///
/// A half-close only means the client has nothing more to send, so the call
/// keeps running. A peer that is really gone shows up on the next write.
fn watch_disconnect<R>(mut reader: R, cancel: CancellationToken, addr: SocketAddr) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut scratch = [0u8; 64];
        loop {
            match reader.read(&mut scratch).await {
                Ok(0) => {
                    debug!("Client {} finished sending", addr);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!("Client {} connection failed, cancelling call: {}", addr, e);
                    cancel.cancel();
                    break;
                }
            }
        }
    })
}

/// Whether an upload stream opened by `first` is finished within `rest`.
async fn upload_is_complete(first: &Frame, mut rest: &[u8], max_body: usize) -> bool {
    if matches!(first, Frame::UploadEnd) {
        return true;
    }
    while let Ok(Some(frame)) = read_frame(&mut rest, max_body).await {
        if matches!(frame, Frame::UploadEnd) {
            return true;
        }
    }
    false
}

/// Wait for an upload ticket while reading ahead what the client sends.
///
/// Bytes received during the wait are returned for the upload to consume,
/// up to [`ADMISSION_READ_AHEAD`]. Past that the client is left to
/// back-pressure and the connection is no longer watched. A client that
/// hangs up before `UploadEnd`, or whose connection fails, cancels the call
/// so it leaves the queue without taking a slot.
async fn admit_upload(
    service: &TransferService,
    reader: &mut OwnedReadHalf,
    first: &Frame,
    max_body: usize,
    cancel: &CancellationToken,
    addr: SocketAddr,
) -> (Result<AdmissionTicket, TransferError>, Vec<u8>) {
    let mut buffered = Vec::new();
    let mut scratch = [0u8; 8192];
    let mut watching = true;

    let acquire = service.limits().upload.acquire(cancel);
    tokio::pin!(acquire);

    loop {
        tokio::select! {
            biased;
            ticket = &mut acquire => return (ticket.map_err(TransferError::from), buffered),
            read = reader.read(&mut scratch), if watching => match read {
                Ok(0) => {
                    watching = false;
                    if !upload_is_complete(first, &buffered, max_body).await {
                        debug!("Client {} hung up while waiting for an upload slot", addr);
                        cancel.cancel();
                    }
                }
                Ok(n) => {
                    buffered.extend_from_slice(&scratch[..n]);
                    watching = buffered.len() < ADMISSION_READ_AHEAD;
                }
                Err(e) => {
                    debug!("Client {} connection failed while queued: {}", addr, e);
                    watching = false;
                    cancel.cancel();
                }
            },
        }
    }
}

/// Discard unread input for a while so closing does not reset the
/// connection before the client reads its status.
async fn drain_before_close<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let _ = timeout(LINGER, tokio::io::copy(reader, &mut tokio::io::sink())).await;
}

async fn finish_with_status<W>(writer: &mut W, status: Status) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &Frame::Status(status)).await?;
    writer.shutdown().await
}

/// Serves exactly one call: routes on the first frame, runs the call, and
/// sends the status trailer.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    service: Arc<TransferService>,
    config: Arc<ServerConfig>,
    cancel: CancellationToken,
) -> io::Result<()> {
    log_connection(&addr);
    let (mut reader, mut writer) = stream.into_split();

    let first = match read_frame(&mut reader, config.max_message_bytes).await {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            debug!("Client {} closed without a request", addr);
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!("Client {} sent an unreadable request: {}", addr, e);
            let status = Status::new(Code::InvalidArgument, e.to_string());
            finish_with_status(&mut writer, status).await?;
            drain_before_close(&mut reader).await;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let _deadline = config
        .call_timeout()
        .map(|after| arm_deadline(cancel.clone(), after));

    match first {
        Frame::UploadChunk { .. } | Frame::UploadEnd => {
            log_call(&addr, OperationClass::Upload);
            let max_body = config.max_message_bytes;
            let (admitted, buffered) =
                admit_upload(&service, &mut reader, &first, max_body, &cancel, addr).await;

            let reader = Cursor::new(buffered).chain(reader);
            let mut source = FrameSource::new(reader, Some(first), max_body);
            let result = match admitted {
                Ok(ticket) => service.upload_admitted(ticket, &mut source, &cancel).await,
                Err(e) => Err(e),
            };
            log_outcome(&addr, OperationClass::Upload, &result);

            let status = match result {
                Ok(reply) => {
                    write_frame(
                        &mut writer,
                        &Frame::UploadReply {
                            message: reply.message,
                        },
                    )
                    .await?;
                    Status::ok()
                }
                Err(e) => error_to_status(&e),
            };
            finish_with_status(&mut writer, status).await?;

            drain_before_close(&mut source.into_inner()).await;
        }
        Frame::ListRequest => {
            log_call(&addr, OperationClass::List);
            let watcher = watch_disconnect(reader, cancel.clone(), addr);
            let result = service.list(&cancel).await;
            watcher.abort();
            log_outcome(&addr, OperationClass::List, &result);

            let status = match result {
                Ok(files) => {
                    write_frame(&mut writer, &Frame::ListReply { files }).await?;
                    Status::ok()
                }
                Err(e) => error_to_status(&e),
            };
            finish_with_status(&mut writer, status).await?;
        }
        Frame::DownloadRequest { filename } => {
            log_call(&addr, OperationClass::Download);
            let watcher = watch_disconnect(reader, cancel.clone(), addr);
            let mut sink = FrameSink::new(writer);
            let result = service.download(&filename, &mut sink, &cancel).await;
            watcher.abort();
            log_outcome(&addr, OperationClass::Download, &result);

            let status = match result {
                Ok(_) => Status::ok(),
                Err(e) => error_to_status(&e),
            };
            finish_with_status(sink.get_mut(), status).await?;
        }
        other => {
            warn!("Client {} opened with a {} frame", addr, other.kind());
            let status = Status::new(
                Code::InvalidArgument,
                format!("unexpected {} frame", other.kind()),
            );
            finish_with_status(&mut writer, status).await?;
        }
    }

    Ok(())
}
