//! Socket-backed [`Transport`] to the daemon.
//!
//! The daemon listens on loopback TCP. Commands are written as [`WireCommand`]
//! JSON frames; a background reader task decodes [`WireEvent`] frames into
//! envelopes and publishes them on the link's [`EventBus`].

use crate::config::LinkConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::TransportError;
use crate::event::{Envelope, EventKind, WireCommand};
use crate::transport::framing::{Frame, LineFrameCodec};
use crate::transport::{EventBus, EventHandler, Transport, Unsubscribe};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use backoff::{ExponentialBackoff, backoff::Backoff};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::spawn as TokioSpawn;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;
use tokio_util::codec::{FramedRead, FramedWrite};

pub struct DaemonLink {
    writer: Mutex<FramedWrite<OwnedWriteHalf, LineFrameCodec>>,
    bus: EventBus,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl DaemonLink {
    /// Connect to the daemon, retrying with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if no connection could be made
    /// within `config.connect_max_elapsed()`.
    pub async fn connect(config: &LinkConfig, diagnostics: Diagnostics) -> Result<Self, TransportError> {
        let address = config.address();
        let mut backoff = ExponentialBackoff {
            initial_interval: config.connect_initial_delay(),
            current_interval: config.connect_initial_delay(),
            max_elapsed_time: Some(config.connect_max_elapsed()),
            ..Default::default()
        };

        debug!("Connecting to daemon at {address}");

        loop {
            match TcpStream::connect(address.as_str()).await {
                Ok(stream) => {
                    info!("Connected to daemon at {address}");
                    return Ok(Self::from_stream(stream, config.max_frame_length, diagnostics));
                }
                Err(e) => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("Daemon not reachable ({e}), retrying after {duration:?}");
                        TokioSleep(duration).await;
                    }
                    None => {
                        return Err(TransportError::Connect {
                            message: format!(
                                "Daemon at {address} unreachable after {:?}: {e}",
                                config.connect_max_elapsed()
                            ),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                },
            }
        }
    }

    /// Wrap an already connected stream and start the reader task.
    pub fn from_stream(stream: TcpStream, max_frame_length: usize, diagnostics: Diagnostics) -> Self {
        let (read_half, write_half) = stream.into_split();
        let bus = EventBus::new();
        let closed = Arc::new(AtomicBool::new(false));

        let reader = FramedRead::new(read_half, LineFrameCodec::with_max_length(max_frame_length));
        let reader = TokioSpawn(read_loop(reader, bus.clone(), diagnostics, Arc::clone(&closed)));

        Self {
            writer: Mutex::new(FramedWrite::new(
                write_half,
                LineFrameCodec::with_max_length(max_frame_length),
            )),
            bus,
            closed,
            reader,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop reading; later sends fail with [`TransportError::Closed`].
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Shutting down daemon link");
        }
        self.reader.abort();
    }
}

impl Drop for DaemonLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Transport for DaemonLink {
    async fn send(&self, command: &str, params: Option<Value>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::closed());
        }

        let line = serde_json::to_string(&WireCommand {
            command: command.to_string(),
            params,
        })?;

        trace!("Sending command '{command}'");
        let mut writer = self.writer.lock().await;
        writer
            .send(line)
            .await
            .map_err(|e| TransportError::send(format!("Failed to send '{command}': {e}")))
    }

    fn subscribe(&self, event: &str, handler: EventHandler) -> Unsubscribe {
        self.bus.subscribe(event, handler)
    }
}

async fn read_loop(
    mut reader: FramedRead<OwnedReadHalf, LineFrameCodec>,
    bus: EventBus,
    diagnostics: Diagnostics,
    closed: Arc<AtomicBool>,
) {
    debug!("Daemon reader started");

    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Frame::Text(line)) => match Envelope::parse(&line) {
                Ok(envelope) => {
                    if envelope.kind == EventKind::Pong {
                        trace!("Pong from daemon");
                    }
                    let delivered = bus.publish(&envelope);
                    trace!("Delivered {} to {delivered} handlers", envelope.kind);
                }
                Err(e) => diagnostics.report(Diagnostic::UndecodableEvent {
                    reason: e.to_string(),
                }),
            },
            Ok(Frame::Dropped { reason }) => {
                diagnostics.report(Diagnostic::UndecodableEvent { reason });
            }
            Err(e) => {
                warn!("Daemon link read failed: {e}");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    warn!("Daemon link closed");
}
