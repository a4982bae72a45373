//! Matching engine thread
//!
//! The engine owns the book, the session table, and the subscriber list;
//! nothing else touches them. Sessions register over a control channel,
//! inbound frames arrive on per-session SPSC queues which the engine sweeps
//! round-robin, and replies go straight onto per-session outbound queues —
//! no locks anywhere on the dispatch path.

use crate::sink::EventLog;
use crossbeam_channel::Receiver;
use lob::{BookError, BookSink, OrderBook, OrderInfo, TradeExecution};
use rustc_hash::FxHashMap;
use services_common::clock::utc_now_ns;
use services_common::protocol::{
    ConfirmConnected, ConfirmOrderAmended, ConfirmOrderCancelled, ConfirmOrderInserted, ErrorMsg,
    Message, OrderAmendedEvent, OrderBookSnapshot, OrderCancelledEvent, OrderInsertedEvent,
    OrderStatus, Payload, PartialFill, PriceLevelUpdate, TradeEvent,
};
use services_common::session::{Connection, InboundMessage};
use services_common::{
    ConnectionId, OrderId, Price, RequestId, SeqNum, Side, Ts, Volume, MESSAGES_PER_DRAIN,
};
use std::sync::Arc;
use std::time::Duration;

/// Idle back-off between empty sweeps.
const IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// Control-plane messages from the accept loop and the I/O tasks.
pub enum EngineControl {
    /// A freshly accepted session; the engine takes ownership.
    Register {
        /// Session handle whose queues the engine will drive.
        conn: Arc<Connection>,
    },
    /// A session's socket died; drain its remaining frames and drop it.
    Disconnected(ConnectionId),
    /// Stop the engine thread.
    Shutdown,
}

/// The single-writer matching engine.
pub struct Engine {
    book: OrderBook,
    sessions: FxHashMap<ConnectionId, Arc<Connection>>,
    subscribers: Vec<ConnectionId>,
    sequence_number: SeqNum,
    next_trade_id: OrderId,
    control_rx: Receiver<EngineControl>,
    event_log: Option<EventLog>,
    /// Session-id scratch rebuilt each sweep so dispatch can mutate freely.
    scan_scratch: Vec<ConnectionId>,
}

impl Engine {
    /// Build an engine around its control channel.
    #[must_use]
    pub fn new(control_rx: Receiver<EngineControl>, event_log: Option<EventLog>) -> Self {
        Self {
            book: OrderBook::new(),
            sessions: FxHashMap::default(),
            subscribers: Vec::new(),
            sequence_number: 0,
            next_trade_id: 0,
            control_rx,
            event_log,
            scan_scratch: Vec::new(),
        }
    }

    /// Run until `Shutdown` arrives. Intended for a dedicated thread.
    pub fn run(mut self) {
        tracing::info!("engine thread running");
        loop {
            let mut did_work = false;

            while let Ok(control) = self.control_rx.try_recv() {
                did_work = true;
                match control {
                    EngineControl::Register { conn } => self.register(conn),
                    EngineControl::Disconnected(id) => self.handle_disconnected(id),
                    EngineControl::Shutdown => {
                        self.shutdown();
                        return;
                    }
                }
            }

            if self.sweep_sessions() {
                did_work = true;
            }

            if !did_work {
                std::thread::sleep(IDLE_BACKOFF);
            }
        }
    }

    fn register(&mut self, conn: Arc<Connection>) {
        let id = conn.id();
        tracing::info!(conn = id, "session registered");
        self.sessions.insert(id, conn);
    }

    /// Drain whatever the dead session still had queued, then drop it.
    fn handle_disconnected(&mut self, id: ConnectionId) {
        if let Some(conn) = self.sessions.get(&id).cloned() {
            while let Some(msg) = conn.try_pop_inbound() {
                self.dispatch(&msg);
                if !self.sessions.contains_key(&id) {
                    break;
                }
            }
        }
        self.remove_session(id);
    }

    fn shutdown(&mut self) {
        tracing::info!("engine shutting down");
        let ids: Vec<ConnectionId> = self.sessions.keys().copied().collect();
        for id in ids {
            self.remove_session(id);
        }
    }

    /// Round-robin over session inboxes, bounded per session per sweep.
    fn sweep_sessions(&mut self) -> bool {
        self.scan_scratch.clear();
        self.scan_scratch.extend(self.sessions.keys().copied());

        let mut did_work = false;
        for i in 0..self.scan_scratch.len() {
            let id = self.scan_scratch[i];
            let Some(conn) = self.sessions.get(&id).cloned() else {
                continue;
            };
            for _ in 0..MESSAGES_PER_DRAIN {
                let Some(msg) = conn.try_pop_inbound() else {
                    break;
                };
                did_work = true;
                self.dispatch(&msg);
                if !self.sessions.contains_key(&id) {
                    break;
                }
            }
        }
        did_work
    }

    fn dispatch(&mut self, msg: &InboundMessage) {
        let conn_id = msg.connection_id;
        let now = utc_now_ns();

        let message = match Message::decode(msg.message_type, msg.payload()) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(conn = conn_id, %error, "protocol violation, dropping session");
                self.remove_session(conn_id);
                return;
            }
        };

        match message {
            Message::Connect(_) => {
                self.send_to(
                    conn_id,
                    &ConfirmConnected {
                        connection_id: conn_id,
                        timestamp: now,
                    },
                );
            }
            Message::InsertOrder(m) => {
                let (book, mut sink) = self.split_book_sink();
                book.submit_order(
                    conn_id,
                    m.client_request_id,
                    m.side,
                    m.price,
                    m.quantity,
                    m.lifespan,
                    now,
                    &mut sink,
                );
            }
            Message::CancelOrder(m) => {
                let (book, mut sink) = self.split_book_sink();
                book.cancel_order(conn_id, m.client_request_id, m.exchange_order_id, now, &mut sink);
            }
            Message::AmendOrder(m) => {
                let (book, mut sink) = self.split_book_sink();
                book.amend_order(
                    conn_id,
                    m.client_request_id,
                    m.exchange_order_id,
                    m.new_total_quantity,
                    now,
                    &mut sink,
                );
            }
            Message::Subscribe(_) => self.subscribe(conn_id),
            Message::Unsubscribe(_) => self.unsubscribe(conn_id),
            Message::OrderStatusRequest(m) => {
                self.order_status(conn_id, m.client_request_id, m.exchange_order_id, now);
            }
            Message::Disconnect(_) => self.remove_session(conn_id),
            other => {
                tracing::warn!(
                    conn = conn_id,
                    message_type = other.message_type().as_u8(),
                    "unexpected message from client, dropping session"
                );
                self.remove_session(conn_id);
            }
        }
    }

    fn split_book_sink(&mut self) -> (&mut OrderBook, EngineSink<'_>) {
        let Self {
            book,
            sessions,
            subscribers,
            sequence_number,
            next_trade_id,
            event_log,
            ..
        } = self;
        (
            book,
            EngineSink {
                sessions,
                subscribers,
                sequence_number,
                next_trade_id,
                event_log: event_log.as_ref(),
            },
        )
    }

    fn subscribe(&mut self, conn_id: ConnectionId) {
        if !self.subscribers.contains(&conn_id) {
            self.subscribers.push(conn_id);
        }
        tracing::debug!(conn = conn_id, "market-data subscription added");

        // Snapshot shares the current sequence number without consuming one;
        // the subscriber aligns incremental updates after it.
        let snapshot = self.book.build_snapshot();
        let frame = OrderBookSnapshot {
            ask_prices: snapshot.ask_prices,
            ask_volumes: snapshot.ask_volumes,
            bid_prices: snapshot.bid_prices,
            bid_volumes: snapshot.bid_volumes,
            sequence_number: self.sequence_number,
        };
        if let Some(conn) = self.sessions.get(&conn_id) {
            conn.send_unbuffered(&frame);
        }
    }

    fn unsubscribe(&mut self, conn_id: ConnectionId) {
        if let Some(pos) = self.subscribers.iter().position(|&id| id == conn_id) {
            self.subscribers.swap_remove(pos);
            tracing::debug!(conn = conn_id, "market-data subscription removed");
        }
    }

    fn order_status(
        &mut self,
        conn_id: ConnectionId,
        client_request_id: RequestId,
        order_id: OrderId,
        now: Ts,
    ) {
        match self.book.order_status(conn_id, order_id) {
            Ok(status) => {
                self.send_to(
                    conn_id,
                    &OrderStatus {
                        client_request_id,
                        exchange_order_id: status.info.order_id,
                        side: status.info.side,
                        limit_price: status.info.price,
                        last_price: status.last_fill_price,
                        total_quantity: status.info.total_quantity,
                        filled_quantity: status.info.cumulative_quantity,
                        leaves_quantity: status.info.remaining_quantity,
                        timestamp: now,
                    },
                );
            }
            Err(error) => {
                self.send_to(
                    conn_id,
                    &ErrorMsg::new(client_request_id, error.code(), &error.to_string(), now),
                );
            }
        }
    }

    fn remove_session(&mut self, conn_id: ConnectionId) {
        self.unsubscribe(conn_id);
        if let Some(conn) = self.sessions.remove(&conn_id) {
            conn.close();
            tracing::info!(conn = conn_id, "session removed");
        }
    }

    fn send_to<P: Payload>(&self, conn_id: ConnectionId, payload: &P) {
        if let Some(conn) = self.sessions.get(&conn_id) {
            conn.send_payload(payload);
        }
    }
}

/// The engine's [`BookSink`]: turns book callbacks into wire frames.
struct EngineSink<'a> {
    sessions: &'a FxHashMap<ConnectionId, Arc<Connection>>,
    subscribers: &'a [ConnectionId],
    sequence_number: &'a mut SeqNum,
    next_trade_id: &'a mut OrderId,
    event_log: Option<&'a EventLog>,
}

impl EngineSink<'_> {
    fn next_sequence(&mut self) -> SeqNum {
        let seq = *self.sequence_number;
        *self.sequence_number = self.sequence_number.wrapping_add(1);
        seq
    }

    fn send_to<P: Payload>(&self, conn_id: ConnectionId, payload: &P) {
        if let Some(conn) = self.sessions.get(&conn_id) {
            conn.send_payload(payload);
        }
    }

    fn broadcast<P: Payload>(&self, payload: &P) {
        for id in self.subscribers {
            if let Some(conn) = self.sessions.get(id) {
                if !conn.is_disconnected() {
                    conn.send_payload(payload);
                }
            }
        }
        if let Some(log) = self.event_log {
            log.record(payload);
        }
    }
}

impl BookSink for EngineSink<'_> {
    fn on_trade(&mut self, trade: &TradeExecution, now: Ts) {
        let trade_id = *self.next_trade_id;
        *self.next_trade_id = self.next_trade_id.wrapping_add(1);
        let sequence_number = self.next_sequence();

        self.send_to(
            trade.maker_client_id,
            &PartialFill {
                exchange_order_id: trade.maker_order_id,
                trade_id,
                last_price: trade.price,
                last_quantity: trade.quantity,
                leaves_quantity: trade.maker_remaining,
                cumulative_quantity: trade.maker_cumulative,
                timestamp: now,
            },
        );
        self.send_to(
            trade.taker_client_id,
            &PartialFill {
                exchange_order_id: trade.taker_order_id,
                trade_id,
                last_price: trade.price,
                last_quantity: trade.quantity,
                leaves_quantity: trade.taker_leaves,
                cumulative_quantity: trade.taker_cumulative,
                timestamp: now,
            },
        );
        self.broadcast(&TradeEvent {
            sequence_number,
            trade_id,
            price: trade.price,
            quantity: trade.quantity,
            taker_side: trade.maker_side.opposite(),
            timestamp: now,
        });
    }

    fn on_level_update(&mut self, side: Side, price: Price, total_quantity: Volume, now: Ts) {
        let sequence_number = self.next_sequence();
        self.broadcast(&PriceLevelUpdate {
            sequence_number,
            side,
            price,
            total_volume: total_quantity,
            timestamp: now,
        });
    }

    fn on_order_inserted(&mut self, client_request_id: RequestId, order: &OrderInfo, now: Ts) {
        self.send_to(
            order.client_id,
            &ConfirmOrderInserted {
                client_request_id,
                exchange_order_id: order.order_id,
                side: order.side,
                price: order.price,
                total_quantity: order.total_quantity,
                leaves_quantity: order.remaining_quantity,
                timestamp: now,
            },
        );

        // A dropped fill-and-kill residual confirms with zero leaves but is
        // not a book event: nothing rested.
        if order.remaining_quantity > 0 {
            let sequence_number = self.next_sequence();
            self.broadcast(&OrderInsertedEvent {
                sequence_number,
                order_id: order.order_id,
                side: order.side,
                price: order.price,
                quantity: order.remaining_quantity,
                timestamp: now,
            });
        }
    }

    fn on_order_cancelled(&mut self, client_request_id: RequestId, order: &OrderInfo, now: Ts) {
        self.send_to(
            order.client_id,
            &ConfirmOrderCancelled {
                client_request_id,
                exchange_order_id: order.order_id,
                leaves_quantity: order.remaining_quantity,
                price: order.price,
                side: order.side,
                timestamp: now,
            },
        );
        let sequence_number = self.next_sequence();
        self.broadcast(&OrderCancelledEvent {
            sequence_number,
            order_id: order.order_id,
            remaining_quantity: order.remaining_quantity,
            timestamp: now,
        });
    }

    fn on_order_amended(
        &mut self,
        client_request_id: RequestId,
        old_total_quantity: Volume,
        order: &OrderInfo,
        now: Ts,
    ) {
        self.send_to(
            order.client_id,
            &ConfirmOrderAmended {
                client_request_id,
                exchange_order_id: order.order_id,
                old_total_quantity,
                new_total_quantity: order.total_quantity,
                leaves_quantity: order.remaining_quantity,
                timestamp: now,
            },
        );
        let sequence_number = self.next_sequence();
        self.broadcast(&OrderAmendedEvent {
            sequence_number,
            order_id: order.order_id,
            quantity_new: order.total_quantity,
            quantity_old: old_total_quantity,
            timestamp: now,
        });
    }

    fn on_error(
        &mut self,
        client_id: ConnectionId,
        client_request_id: RequestId,
        error: BookError,
        now: Ts,
    ) {
        self.send_to(
            client_id,
            &ErrorMsg::new(client_request_id, error.code(), &error.to_string(), now),
        );
    }
}
