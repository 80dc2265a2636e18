//! Live tail of a single file as a byte stream

use bytes::{Bytes, BytesMut};
use cslogs_core::{Error, Result, TailConfig};
use futures::Stream;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{TailEnd, TailError};
use crate::state::{Effect, TailState};
use crate::watch::{ChangeWatch, Notification};

/// A file to be streamed from the start and then followed as it grows.
///
/// Construction only checks that the path exists. Nothing is opened until the
/// resulting [`TailStream`] is first polled.
#[derive(Debug, Clone)]
pub struct FileTailSource {
    path: PathBuf,
    config: TailConfig,
}

impl FileTailSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(path, TailConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: TailConfig) -> Result<Self> {
        let path = path.into();
        config.validate()?;

        if !path.exists() {
            return Err(Error::FileNotFound(path));
        }
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> TailConfig {
        self.config
    }

    pub fn into_stream(self) -> TailStream {
        let (tx, rx) = mpsc::channel(self.config.buffer_chunks);
        let (end_tx, end_rx) = oneshot::channel();

        TailStream {
            pending: Some((TailDriver::new(self.path, self.config, tx), end_tx)),
            rx,
            end_rx,
            end: None,
        }
    }
}

/// Byte chunks of a tailed file, in file order.
///
/// The first poll spawns the task that watches and reads the file, so it must
/// happen inside a tokio runtime. Dropping the stream stops that task and
/// releases the watch and any open reader.
pub struct TailStream {
    pending: Option<(TailDriver, oneshot::Sender<TailEnd>)>,
    rx: mpsc::Receiver<Bytes>,
    end_rx: oneshot::Receiver<TailEnd>,
    end: Option<TailEnd>,
}

impl TailStream {
    /// Why the stream ended, once it has returned `None`
    pub fn end_reason(&mut self) -> Option<&TailEnd> {
        if self.end.is_none() {
            self.end = self.end_rx.try_recv().ok();
        }
        self.end.as_ref()
    }
}

impl Stream for TailStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = self.get_mut();

        if let Some((mut driver, end_tx)) = this.pending.take() {
            let span = info_span!("tail", path = %driver.path.display());
            tokio::spawn(
                async move {
                    let end = driver.run().await;
                    let _ = end_tx.send(end);
                }
                .instrument(span),
            );
        }

        this.rx.poll_recv(cx)
    }
}

/// Owns everything one tailed stream touches: the watch, the reader and the
/// sending half of the consumer's buffer.
pub(crate) struct TailDriver {
    path: PathBuf,
    config: TailConfig,
    state: TailState,
    watch: Option<ChangeWatch>,
    reader: Option<File>,
    tx: mpsc::Sender<Bytes>,
    /// Existence and size checks run so far
    change_passes: u64,
}

impl TailDriver {
    pub(crate) fn new(path: PathBuf, config: TailConfig, tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            path,
            config,
            state: TailState::new(),
            watch: None,
            reader: None,
            tx,
            change_passes: 0,
        }
    }

    /// Drive the stream until it terminates.
    ///
    /// Called on the consumer's first pull, which counts as the first demand.
    pub(crate) async fn run(&mut self) -> TailEnd {
        let mut effect = self.state.request_more();

        loop {
            if let Some(end) = self.apply(effect).await {
                return end;
            }

            effect = tokio::select! {
                biased;

                _ = self.tx.closed() => self.state.consumer_closed(),

                read = read_chunk(&mut self.reader, self.config.chunk_size),
                    if self.state.wants_read() => self.on_read(read),

                notification = next_notification(&mut self.watch) => {
                    self.on_notification(notification).await
                }

                open = demand(&self.tx), if !self.state.has_demand() => {
                    if open {
                        self.state.request_more()
                    } else {
                        self.state.consumer_closed()
                    }
                }
            };
        }
    }

    /// Carry out an effect and any follow-up it produces. Returns the end
    /// reason once the stream has terminated.
    async fn apply(&mut self, mut effect: Effect) -> Option<TailEnd> {
        loop {
            effect = match effect {
                Effect::None | Effect::Resume => return None,
                Effect::StartWatch => match ChangeWatch::new(&self.path) {
                    Ok(watch) => {
                        self.watch = Some(watch);
                        // Synthetic first change catches up on existing content
                        self.on_change().await
                    }
                    Err(e) if is_not_found(&e) => self.state.source_removed(),
                    Err(e) => self.state.fail(e),
                },
                Effect::OpenReader { offset } => match open_at(&self.path, offset).await {
                    Ok(file) => {
                        self.reader = Some(file);
                        return None;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        self.state.source_removed()
                    }
                    Err(e) => self.state.fail(e),
                },
                Effect::CloseReader => {
                    self.reader = None;
                    return None;
                }
                Effect::Terminate(end) => {
                    self.shutdown(&end);
                    return Some(end);
                }
            };
        }
    }

    async fn on_notification(&mut self, notification: Notification) -> Effect {
        match notification {
            Notification::Changed => self.on_change().await,
            Notification::Ignored => Effect::None,
            Notification::Error(e) => {
                error!("Watch error, closing stream: {}", e);
                self.state.fail(e)
            }
            Notification::Unknown(kind) => {
                warn!("Unknown event type {:?}, closing stream", kind);
                self.state.fail(TailError::UnknownEvent(format!("{:?}", kind)))
            }
        }
    }

    async fn on_change(&mut self) -> Effect {
        // Replaced by a reader at the right offset below
        self.reader = None;
        self.change_passes += 1;

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => self.state.on_change(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.state.on_change(None),
            Err(e) => self.state.fail(e),
        }
    }

    fn on_read(&mut self, read: std::io::Result<Bytes>) -> Effect {
        let chunk = match read {
            Ok(chunk) if chunk.is_empty() => return self.state.on_drained(),
            Ok(chunk) => chunk,
            Err(e) => return self.state.fail(e),
        };

        let len = chunk.len() as u64;
        match self.tx.try_send(chunk) {
            Ok(()) => {
                let effect = self.state.on_delivered(len);
                if self.tx.capacity() == 0 {
                    self.state.on_saturated()
                } else {
                    effect
                }
            }
            // Chunk dropped without advancing the offset; the next reader
            // starts from the same position.
            Err(mpsc::error::TrySendError::Full(_)) => self.state.on_saturated(),
            Err(mpsc::error::TrySendError::Closed(_)) => self.state.consumer_closed(),
        }
    }

    fn shutdown(&mut self, end: &TailEnd) {
        self.reader = None;
        if let Some(watch) = self.watch.take() {
            watch.close();
        }

        let offset = self.state.offset();
        let passes = self.change_passes;
        match end {
            TailEnd::SourceRemoved => {
                info!(offset, passes, "File was deleted or moved, ending stream")
            }
            TailEnd::ConsumerClosed => debug!(offset, passes, "Consumer went away, ending stream"),
            TailEnd::Failed(e) => error!(offset, passes, "Tail failed, ending stream: {}", e),
        }
    }
}

async fn open_at(path: &Path, offset: u64) -> std::io::Result<File> {
    let mut file = File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    Ok(file)
}

async fn read_chunk(reader: &mut Option<File>, chunk_size: usize) -> std::io::Result<Bytes> {
    let Some(file) = reader.as_mut() else {
        return std::future::pending().await;
    };

    let mut buf = BytesMut::zeroed(chunk_size);
    let n = file.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf.freeze())
}

/// Resolves once the consumer has room for another chunk; `false` if it is gone
async fn demand(tx: &mpsc::Sender<Bytes>) -> bool {
    // The permit is released immediately; the slot is claimed by the next send
    tx.reserve().await.is_ok()
}

async fn next_notification(watch: &mut Option<ChangeWatch>) -> Notification {
    match watch.as_mut() {
        Some(watch) => watch.recv().await,
        None => std::future::pending().await,
    }
}

fn is_not_found(err: &TailError) -> bool {
    match err {
        TailError::Watch(e) => match &e.kind {
            notify::ErrorKind::PathNotFound => true,
            notify::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        },
        TailError::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        TailError::UnknownEvent(_) => false,
    }
}
