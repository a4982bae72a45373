//! TCP accept loop and engine-thread lifecycle

use crate::config::ExchangeConfig;
use crate::engine::{Engine, EngineControl};
use crate::sink::EventLog;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use services_common::session::{Connection, SessionSink};
use services_common::ConnectionId;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::net::TcpListener;

/// Forwards session-task notifications onto the engine's control channel.
///
/// A socket drop becomes a `Disconnected` control message so the engine can
/// drain the session's remaining frames in order before dropping it; clients
/// have no business sending large frames, so those are ignored.
struct EngineSessionSink {
    control: Sender<EngineControl>,
}

impl SessionSink for EngineSessionSink {
    fn disconnected(&self, id: ConnectionId) {
        let _ = self.control.send(EngineControl::Disconnected(id));
    }

    fn large_frame(&self, id: ConnectionId, message_type: u8, _payload: Vec<u8>) {
        tracing::debug!(conn = id, message_type, "ignoring large inbound frame");
    }
}

/// A bound exchange: listener plus a running engine thread.
pub struct ExchangeServer {
    listener: TcpListener,
    control_tx: Sender<EngineControl>,
    engine_thread: Option<JoinHandle<()>>,
    next_connection_id: ConnectionId,
}

impl ExchangeServer {
    /// Bind the listener, open the optional event sink, and start the engine
    /// thread.
    pub async fn bind(config: &ExchangeConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("binding {}:{}", config.host, config.port))?;

        let event_log = match &config.event_log_dir {
            Some(dir) => Some(EventLog::create(dir)?),
            None => None,
        };

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let engine = Engine::new(control_rx, event_log);
        let engine_thread = std::thread::Builder::new()
            .name("engine".to_string())
            .spawn(move || engine.run())
            .context("spawning engine thread")?;

        Ok(Self {
            listener,
            control_tx,
            engine_thread: Some(engine_thread),
            next_connection_id: 0,
        })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept sessions until `shutdown` resolves, then stop the engine.
    pub async fn serve_with_shutdown<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.accept_session(stream, peer),
                        Err(error) => {
                            tracing::warn!(%error, "accept failed");
                        }
                    }
                }
            }
        }

        tracing::info!("stopping exchange");
        let _ = self.control_tx.send(EngineControl::Shutdown);
        if let Some(handle) = self.engine_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn accept_session(&mut self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        if let Err(error) = stream.set_nodelay(true) {
            tracing::debug!(%error, "set_nodelay failed");
        }
        let id = self.next_connection_id;
        self.next_connection_id = self.next_connection_id.wrapping_add(1);
        tracing::info!(conn = id, %peer, "session accepted");

        let sink = Arc::new(EngineSessionSink {
            control: self.control_tx.clone(),
        });
        let conn = Connection::spawn(stream, id, sink);
        let _ = self.control_tx.send(EngineControl::Register { conn });
    }
}
