//! Binary event sink
//!
//! Appends market-data payloads, payload-only with no per-record header, to
//! one file per message type named `<dir>/<YYYYmmdd_HHMMSS>_<kind>.bin`.
//! Records cross to a dedicated writer thread over a bounded channel; when
//! the channel is full the record is dropped rather than stalling the engine.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use services_common::protocol::{MessageType, Payload, MAX_PAYLOAD_SIZE_BUFFER};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;

const CHANNEL_CAP: usize = 8_192;
const FLUSH_IDLE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy)]
struct Record {
    message_type: MessageType,
    len: u16,
    payload: [u8; MAX_PAYLOAD_SIZE_BUFFER],
}

/// Handle to the event sink; cheap to share by reference from the engine.
pub struct EventLog {
    tx: Option<Sender<Record>>,
    writer: Option<JoinHandle<()>>,
}

fn kind_suffix(message_type: MessageType) -> Option<&'static str> {
    match message_type {
        MessageType::PriceLevelUpdate => Some("price_level_update"),
        MessageType::TradeEvent => Some("trade"),
        MessageType::OrderInsertedEvent => Some("insert_order"),
        MessageType::OrderCancelledEvent => Some("cancel_order"),
        MessageType::OrderAmendedEvent => Some("amend_order"),
        _ => None,
    }
}

struct Sinks {
    price_level_update: BufWriter<File>,
    trade: BufWriter<File>,
    insert: BufWriter<File>,
    cancel: BufWriter<File>,
    amend: BufWriter<File>,
}

impl Sinks {
    fn open(dir: &Path, base: &str) -> Result<Self> {
        let open = |kind: &str| -> Result<BufWriter<File>> {
            let path = dir.join(format!("{base}_{kind}.bin"));
            let file = File::create(&path)
                .with_context(|| format!("creating event log {}", path.display()))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self {
            price_level_update: open("price_level_update")?,
            trade: open("trade")?,
            insert: open("insert_order")?,
            cancel: open("cancel_order")?,
            amend: open("amend_order")?,
        })
    }

    fn writer_for(&mut self, message_type: MessageType) -> Option<&mut BufWriter<File>> {
        match message_type {
            MessageType::PriceLevelUpdate => Some(&mut self.price_level_update),
            MessageType::TradeEvent => Some(&mut self.trade),
            MessageType::OrderInsertedEvent => Some(&mut self.insert),
            MessageType::OrderCancelledEvent => Some(&mut self.cancel),
            MessageType::OrderAmendedEvent => Some(&mut self.amend),
            _ => None,
        }
    }

    fn flush_all(&mut self) {
        for writer in [
            &mut self.price_level_update,
            &mut self.trade,
            &mut self.insert,
            &mut self.cancel,
            &mut self.amend,
        ] {
            if let Err(error) = writer.flush() {
                tracing::warn!(%error, "event log flush failed");
            }
        }
    }
}

impl EventLog {
    /// Open the per-type files and start the writer thread.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating event log dir {}", dir.display()))?;
        let base = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut sinks = Sinks::open(dir, &base)?;

        let (tx, rx): (Sender<Record>, Receiver<Record>) = bounded(CHANNEL_CAP);
        let writer = std::thread::Builder::new()
            .name("event-log".to_string())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(FLUSH_IDLE) {
                        Ok(record) => {
                            if let Some(out) = sinks.writer_for(record.message_type) {
                                let bytes = &record.payload[..usize::from(record.len)];
                                if let Err(error) = out.write_all(bytes) {
                                    tracing::warn!(%error, "event log write failed");
                                }
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => sinks.flush_all(),
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                sinks.flush_all();
            })
            .context("spawning event log writer thread")?;

        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    /// Queue one market-data payload for appending. Non-logged types and
    /// channel overflow are silently skipped.
    pub fn record<P: Payload>(&self, payload: &P) {
        if kind_suffix(P::TYPE).is_none() {
            return;
        }
        let Some(tx) = &self.tx else { return };
        let mut record = Record {
            message_type: P::TYPE,
            #[allow(clippy::cast_possible_truncation)]
            len: P::SIZE as u16,
            payload: [0u8; MAX_PAYLOAD_SIZE_BUFFER],
        };
        let mut cursor = &mut record.payload[..];
        payload.encode(&mut cursor);
        let _ = tx.try_send(record);
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit.
        self.tx.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}
