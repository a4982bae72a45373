//! Per-session framing over a byte stream
//!
//! A `Connection` owns two tasks: a read task that accumulates socket bytes,
//! parses frames, and publishes them onto the session's inbound SPSC queue;
//! and a write task that drains the outbound SPSC queue into batched socket
//! writes. All notifications to the owner go through a constructor-provided
//! [`SessionSink`], so there is no assigned-late callback state.

use super::messages::{InboundMessage, OutboundMessage};
use crate::constants::{INBOUND_QUEUE_CAP, OUTBOUND_QUEUE_CAP, READ_BUFFER_SIZE, WRITE_BATCH_SIZE};
use crate::protocol::{
    put_frame, put_payload_frame, MessageType, Payload, MAX_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE_BUFFER,
    WIRE_HEADER_SIZE,
};
use crate::types::ConnectionId;
use bus::SpscQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::sync::Notify;

/// Owner-side notifications from a session's I/O tasks.
///
/// Implementations must be cheap and non-blocking; they run on the I/O tasks.
pub trait SessionSink: Send + Sync + 'static {
    /// The session is gone (error, EOF, protocol violation, or local close).
    /// Fires exactly once.
    fn disconnected(&self, id: ConnectionId);

    /// A frame too large for the queue envelope arrived (snapshot path).
    fn large_frame(&self, id: ConnectionId, message_type: u8, payload: Vec<u8>);

    /// Coalesced new-inbound-data signal; at most one pending until the
    /// consumer acknowledges. Polling consumers may ignore it.
    fn inbound_ready(&self, id: ConnectionId) {
        let _ = id;
    }
}

enum WriteCommand {
    /// A pre-framed large message (header already included).
    Bulk(Vec<u8>),
    /// Flush nothing further; shut the socket down.
    Close,
}

struct Shared {
    id: ConnectionId,
    sink: Arc<dyn SessionSink>,
    disconnect_notified: AtomicBool,
    inbound_ready_pending: AtomicBool,
    close_notify: Notify,
    cmd_tx: mpsc::UnboundedSender<WriteCommand>,
}

impl Shared {
    fn notify_disconnect_once(&self, reason: &str) {
        if self.disconnect_notified.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(conn = self.id, reason, "session disconnected");
        let _ = self.cmd_tx.send(WriteCommand::Close);
        // notify_one stores a permit, so the read task sees the close even
        // if it was parsing rather than awaiting when this fired
        self.close_notify.notify_one();
        self.sink.disconnected(self.id);
    }

    fn notify_inbound_ready(&self) {
        if !self.inbound_ready_pending.swap(true, Ordering::AcqRel) {
            self.sink.inbound_ready(self.id);
        }
    }
}

/// Handle to one framed session.
///
/// The consumer side pops [`InboundMessage`]s and pushes replies with
/// [`Connection::send_payload`]; the I/O side is fully owned by the spawned
/// tasks.
pub struct Connection {
    id: ConnectionId,
    inbound: Arc<SpscQueue<InboundMessage>>,
    outbound: Arc<SpscQueue<OutboundMessage>>,
    writer_wake: Arc<Notify>,
    write_wakeup_pending: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Split `stream` and spawn the session's read and write tasks.
    pub fn spawn<S>(stream: S, id: ConnectionId, sink: Arc<dyn SessionSink>) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let inbound = Arc::new(SpscQueue::with_capacity(INBOUND_QUEUE_CAP));
        let outbound = Arc::new(SpscQueue::with_capacity(OUTBOUND_QUEUE_CAP));
        let writer_wake = Arc::new(Notify::new());
        let write_wakeup_pending = Arc::new(AtomicBool::new(false));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            id,
            sink,
            disconnect_notified: AtomicBool::new(false),
            inbound_ready_pending: AtomicBool::new(false),
            close_notify: Notify::new(),
            cmd_tx,
        });

        tokio::spawn(read_task(reader, Arc::clone(&inbound), Arc::clone(&shared)));
        tokio::spawn(write_task(
            writer,
            Arc::clone(&outbound),
            Arc::clone(&writer_wake),
            Arc::clone(&write_wakeup_pending),
            cmd_rx,
            Arc::clone(&shared),
        ));

        Arc::new(Self {
            id,
            inbound,
            outbound,
            writer_wake,
            write_wakeup_pending,
            shared,
        })
    }

    /// The session's connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Pop the next inbound frame, if any. Single-consumer only.
    #[must_use]
    pub fn try_pop_inbound(&self) -> Option<InboundMessage> {
        self.inbound.try_pop()
    }

    /// Re-arm the coalesced inbound-ready notification after a drain.
    pub fn acknowledge_inbound(&self) {
        self.shared
            .inbound_ready_pending
            .store(false, Ordering::Release);
    }

    /// Queue a small frame for batched writing. Returns `false` when the
    /// outbound queue is full (the frame is dropped) or the payload does not
    /// fit the inline envelope.
    pub fn send_message(&self, message_type: MessageType, payload: &[u8]) -> bool {
        if payload.len() > MAX_PAYLOAD_SIZE_BUFFER {
            return false;
        }
        let msg = OutboundMessage::new(self.id, message_type.as_u8(), payload);
        if !self.outbound.try_push(msg) {
            tracing::debug!(
                conn = self.id,
                message_type = message_type.as_u8(),
                "outbound queue full, frame dropped"
            );
            return false;
        }
        if !self.write_wakeup_pending.swap(true, Ordering::AcqRel) {
            self.writer_wake.notify_one();
        }
        true
    }

    /// Encode and queue a typed payload for batched writing. Payloads that
    /// exceed the inline envelope must use [`Connection::send_unbuffered`].
    pub fn send_payload<P: Payload>(&self, payload: &P) -> bool {
        if P::SIZE > MAX_PAYLOAD_SIZE_BUFFER {
            return false;
        }
        let mut buf = [0u8; MAX_PAYLOAD_SIZE_BUFFER];
        let mut cursor = &mut buf[..];
        payload.encode(&mut cursor);
        self.send_message(P::TYPE, &buf[..P::SIZE])
    }

    /// Send a frame too large for the queue envelope (snapshot path).
    ///
    /// The frame is heap-allocated and handed to the write task directly,
    /// bypassing the outbound queue.
    pub fn send_unbuffered<P: Payload>(&self, payload: &P) {
        let mut frame = Vec::with_capacity(WIRE_HEADER_SIZE + P::SIZE);
        put_payload_frame(&mut frame, payload);
        let _ = self.shared.cmd_tx.send(WriteCommand::Bulk(frame));
    }

    /// Tear the session down. The sink's `disconnected` fires exactly once
    /// across all shutdown causes.
    pub fn close(&self) {
        self.shared.notify_disconnect_once("close requested");
    }

    /// Whether the session has been torn down.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.shared.disconnect_notified.load(Ordering::Acquire)
    }
}

async fn read_task<S>(
    mut reader: ReadHalf<S>,
    inbound: Arc<SpscQueue<InboundMessage>>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut read_buf = vec![0u8; READ_BUFFER_SIZE];
    let mut accum: Vec<u8> = Vec::with_capacity(READ_BUFFER_SIZE * 2);

    loop {
        if shared.disconnect_notified.load(Ordering::Acquire) {
            return;
        }
        let n = tokio::select! {
            biased;
            () = shared.close_notify.notified() => return,
            result = reader.read(&mut read_buf) => match result {
                Ok(0) => {
                    shared.notify_disconnect_once("remote closed");
                    return;
                }
                Ok(n) => n,
                Err(error) => {
                    tracing::debug!(conn = shared.id, %error, "read error");
                    shared.notify_disconnect_once("read error");
                    return;
                }
            },
        };

        accum.extend_from_slice(&read_buf[..n]);

        let mut offset = 0;
        while accum.len() - offset >= WIRE_HEADER_SIZE {
            let type_byte = accum[offset];
            let payload_size =
                usize::from(u16::from_be_bytes([accum[offset + 1], accum[offset + 2]]));

            if payload_size > MAX_PAYLOAD_SIZE {
                tracing::debug!(
                    conn = shared.id,
                    type_byte,
                    payload_size,
                    "protocol violation: oversize payload"
                );
                shared.notify_disconnect_once("protocol violation");
                return;
            }

            let frame_size = WIRE_HEADER_SIZE + payload_size;
            if accum.len() - offset < frame_size {
                break; // partial frame, wait for more bytes
            }

            let payload = &accum[offset + WIRE_HEADER_SIZE..offset + frame_size];
            if payload_size <= MAX_PAYLOAD_SIZE_BUFFER {
                let msg = InboundMessage::new(shared.id, type_byte, payload);
                if !inbound.try_push(msg) {
                    tracing::debug!(
                        conn = shared.id,
                        type_byte,
                        "inbound queue full, disconnecting"
                    );
                    shared.notify_disconnect_once("no buffer space");
                    return;
                }
                shared.notify_inbound_ready();
            } else {
                shared.sink.large_frame(shared.id, type_byte, payload.to_vec());
            }
            offset += frame_size;
        }

        if offset > 0 {
            accum.drain(..offset);
        }
    }
}

async fn write_task<S>(
    mut writer: WriteHalf<S>,
    outbound: Arc<SpscQueue<OutboundMessage>>,
    writer_wake: Arc<Notify>,
    write_wakeup_pending: Arc<AtomicBool>,
    mut cmd_rx: mpsc::UnboundedReceiver<WriteCommand>,
    shared: Arc<Shared>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut batch: Vec<u8> = Vec::with_capacity(WRITE_BATCH_SIZE);

    loop {
        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => match cmd {
                Some(WriteCommand::Bulk(frame)) => {
                    if let Err(error) = writer.write_all(&frame).await {
                        tracing::debug!(conn = shared.id, %error, "bulk write error");
                        shared.notify_disconnect_once("write error");
                        return;
                    }
                }
                Some(WriteCommand::Close) | None => {
                    let _ = writer.shutdown().await;
                    return;
                }
            },
            () = writer_wake.notified() => {
                write_wakeup_pending.store(false, Ordering::Release);
                if !drain_outbound(&mut writer, &outbound, &mut batch, &shared).await {
                    return;
                }
            }
        }
    }
}

/// Pack queued frames into batches and write them until the queue is empty.
/// Returns `false` on write failure.
async fn drain_outbound<S>(
    writer: &mut WriteHalf<S>,
    outbound: &SpscQueue<OutboundMessage>,
    batch: &mut Vec<u8>,
    shared: &Shared,
) -> bool
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    loop {
        batch.clear();
        while let Some(msg) = outbound.peek() {
            let frame_size = WIRE_HEADER_SIZE + usize::from(msg.payload_size);
            if batch.len() + frame_size > WRITE_BATCH_SIZE {
                break;
            }
            put_frame(batch, msg.message_type, msg.payload());
            outbound.consume_one();
        }
        if batch.is_empty() {
            return true;
        }
        if let Err(error) = writer.write_all(batch).await {
            tracing::debug!(conn = shared.id, %error, "batched write error");
            shared.notify_disconnect_once("write error");
            return false;
        }
    }
}
