//! Tick-driven simulator loop
//!
//! Every tick (≈1 ms): drain the feed, advance the aggregates and the
//! cumulative hazard, fire due cancellations, refresh the intensities, and
//! emit a Poisson burst of synthetic inserts.

use crate::config::SimulatorConfig;
use crate::dynamics::{InsertDecision, LatentState, MarketDynamics};
use crate::order_manager::OrderManager;
use crate::rng::SimRng;
use crate::shadow_book::ShadowOrderBook;
use crate::state::MarketState;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use services_common::protocol::{CancelOrder, InsertOrder, Message, Subscribe};
use services_common::session::{Connection, SessionSink};
use services_common::{
    ConnectionId, Lifespan, OrderId, Price, RequestId, Side, MESSAGES_PER_DRAIN,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, MissedTickBehavior};

/// Number of cumulative liquidity buckets tracked by the aggregator.
const LIQUIDITY_BUCKETS: usize = 3;

/// Bucket distance bounds in ticks.
const BUCKET_BOUNDS: [Price; LIQUIDITY_BUCKETS] = [1, 5, 10];

/// Hazard mass given to the seeded book so it churns early on.
const SEED_HAZARD_MASS: f64 = 10.0;

type LargeFrameQueue = Arc<Mutex<VecDeque<(u8, Vec<u8>)>>>;

/// Routes session notifications into the tick loop's shared state.
struct SimSessionSink {
    running: Arc<AtomicBool>,
    large_frames: LargeFrameQueue,
}

impl SessionSink for SimSessionSink {
    fn disconnected(&self, id: ConnectionId) {
        tracing::info!(conn = id, "exchange connection lost");
        self.running.store(false, Ordering::Release);
    }

    fn large_frame(&self, _id: ConnectionId, message_type: u8, payload: Vec<u8>) {
        self.large_frames.lock().push_back((message_type, payload));
    }
}

/// The liquidity simulator: one exchange session plus the flow model.
pub struct MarketSimulator {
    config: SimulatorConfig,
    conn: Arc<Connection>,
    rng: SimRng,
    shadow: ShadowOrderBook,
    state: MarketState<LIQUIDITY_BUCKETS>,
    latent: LatentState,
    dynamics: MarketDynamics,
    orders: OrderManager,
    lambda_insert: f64,
    lambda_cancel: f64,
    cumulative_hazard: f64,
    next_request_id: RequestId,
    running: Arc<AtomicBool>,
    large_frames: LargeFrameQueue,
    due_cancels: Vec<OrderId>,
}

impl MarketSimulator {
    /// Connect to the exchange and assemble the model.
    pub async fn connect(config: SimulatorConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("connecting to {}:{}", config.host, config.port))?;
        stream.set_nodelay(true).ok();
        Ok(Self::from_stream(stream, config))
    }

    /// Assemble around an established stream (tests drive this directly).
    pub fn from_stream<S>(stream: S, config: SimulatorConfig) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let large_frames: LargeFrameQueue = Arc::new(Mutex::new(VecDeque::new()));
        let conn = Connection::spawn(
            stream,
            0,
            Arc::new(SimSessionSink {
                running: Arc::clone(&running),
                large_frames: Arc::clone(&large_frames),
            }),
        );

        let dynamics = MarketDynamics::default();
        let lambda_insert = dynamics.lambda_insert_base;
        let lambda_cancel = dynamics.lambda_cancel_base;
        #[allow(clippy::cast_precision_loss)]
        let latent = LatentState::new(config.initial_mid as f64);

        Self {
            rng: SimRng::new(config.seed, config.stream),
            conn,
            shadow: ShadowOrderBook::new(),
            state: MarketState::new(BUCKET_BOUNDS),
            latent,
            dynamics,
            orders: OrderManager::new(),
            lambda_insert,
            lambda_cancel,
            cumulative_hazard: 0.0,
            next_request_id: 0,
            running,
            large_frames,
            due_cancels: Vec::new(),
            config,
        }
    }

    /// Subscribe, seed the book, then tick until `shutdown` resolves or the
    /// session drops.
    pub async fn run_with_shutdown<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let request_id = self.next_request();
        self.conn.send_payload(&Subscribe {
            client_request_id: request_id,
        });
        self.seed_book();

        let mut ticker = tokio::time::interval(Duration::from_micros(self.config.tick_interval_us));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        tokio::pin!(shutdown);
        while self.running.load(Ordering::Acquire) {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = (now - last_tick).as_secs_f64().max(1e-6);
                    last_tick = now;
                    self.on_tick(dt);
                }
            }
        }

        tracing::info!(
            open_orders = self.orders.open_order_count(),
            sim_time = self.state.time_state().sim_time,
            "simulator stopping"
        );
        self.conn.close();
        Ok(())
    }

    /// One simulation step. `dt` is wall-clock seconds since the last step.
    fn on_tick(&mut self, dt: f64) {
        self.drain_feed();

        self.state.sync_with_book(&self.shadow, dt);
        #[allow(clippy::cast_precision_loss)]
        let mid = self.shadow.mid_price().map(|price| price as f64);
        let vol_short = self.state.volatility().realised_vol_short();
        self.latent.advance(dt, mid, vol_short, &mut self.rng);

        // Advance the shared hazard clock and fire whatever it crossed.
        self.cumulative_hazard += self.lambda_cancel * dt;
        let mut due = std::mem::take(&mut self.due_cancels);
        due.clear();
        self.orders.collect_due(self.cumulative_hazard, &mut due);
        for order_id in &due {
            self.send_cancel(*order_id);
        }
        self.due_cancels = due;

        self.dynamics.update_intensity(
            &self.state,
            self.orders.open_order_count(),
            &mut self.lambda_insert,
            &mut self.lambda_cancel,
        );

        let inserts = self.rng.poisson(self.lambda_insert * dt);
        for _ in 0..inserts {
            self.generate_insert();
        }
    }

    /// Apply queued snapshots, then up to `MESSAGES_PER_DRAIN` small frames.
    fn drain_feed(&mut self) {
        loop {
            let frame = self.large_frames.lock().pop_front();
            let Some((type_byte, payload)) = frame else {
                break;
            };
            match Message::decode(type_byte, &payload) {
                Ok(Message::OrderBookSnapshot(snapshot)) => self.shadow.on_snapshot(&snapshot),
                Ok(other) => {
                    tracing::debug!(message_type = type_byte, ?other, "unexpected large frame");
                }
                Err(error) => tracing::warn!(%error, "undecodable large frame"),
            }
        }

        for _ in 0..MESSAGES_PER_DRAIN {
            let Some(msg) = self.conn.try_pop_inbound() else {
                break;
            };
            match Message::decode(msg.message_type, msg.payload()) {
                Ok(message) => self.handle_frame(&message),
                Err(error) => tracing::warn!(%error, "undecodable feed frame"),
            }
        }
        self.conn.acknowledge_inbound();
    }

    fn handle_frame(&mut self, message: &Message) {
        match message {
            Message::PriceLevelUpdate(update) => self.shadow.on_level_update(update),
            Message::TradeEvent(trade) => self.state.on_trade(trade),
            Message::ConfirmOrderInserted(confirm) => {
                if confirm.leaves_quantity == 0 {
                    // Fully filled on entry or a dropped FAK residual;
                    // nothing rests to cancel later.
                    self.orders.on_insert_rejected(confirm.client_request_id);
                } else {
                    self.orders
                        .on_insert_acknowledged(confirm.client_request_id, confirm.exchange_order_id);
                }
            }
            Message::PartialFill(fill) => {
                self.orders
                    .on_partial_fill(fill.exchange_order_id, fill.leaves_quantity);
            }
            Message::ConfirmOrderCancelled(confirm) => {
                self.orders.on_order_cancelled(confirm.exchange_order_id);
            }
            Message::ErrorMsg(error) => {
                tracing::warn!(
                    request = error.client_request_id,
                    code = error.code,
                    text = error.text(),
                    "exchange rejected a request"
                );
                self.orders.on_insert_rejected(error.client_request_id);
            }
            // Public lifecycle events are redundant with the level feed, and
            // our own amends/status are not part of this flow model.
            _ => {}
        }
    }

    /// Rest a symmetric starter book around the configured mid.
    fn seed_book(&mut self) {
        let best_bid = self.config.initial_mid - self.config.initial_spread / 2;
        let best_ask = self.config.initial_mid + self.config.initial_spread / 2;

        for depth in 0..self.config.initial_depth {
            #[allow(clippy::cast_possible_truncation)]
            let quantity =
                self.config.seed_base_quantity * (self.config.initial_depth - depth) as u32;
            #[allow(clippy::cast_possible_wrap)]
            let offset = depth as Price;

            self.send_insert(Side::Buy, best_bid - offset, quantity, Lifespan::GoodForDay);
            self.send_insert(Side::Sell, best_ask + offset, quantity, Lifespan::GoodForDay);
        }
    }

    fn generate_insert(&mut self) {
        let decision: InsertDecision =
            self.dynamics
                .decide_insert(&self.state, &self.latent, &mut self.rng);
        let request_id = self.next_request();
        self.orders
            .register_pending_insert(request_id, self.cumulative_hazard + decision.hazard_mass);
        self.conn.send_payload(&InsertOrder {
            client_request_id: request_id,
            side: decision.side,
            price: decision.price,
            quantity: decision.quantity,
            lifespan: decision.lifespan,
        });
        tracing::trace!(
            request = request_id,
            side = %decision.side,
            price = decision.price,
            quantity = decision.quantity,
            "insert"
        );
    }

    fn send_insert(&mut self, side: Side, price: Price, quantity: u32, lifespan: Lifespan) {
        let request_id = self.next_request();
        self.orders
            .register_pending_insert(request_id, self.cumulative_hazard + SEED_HAZARD_MASS);
        self.conn.send_payload(&InsertOrder {
            client_request_id: request_id,
            side,
            price,
            quantity,
            lifespan,
        });
    }

    fn send_cancel(&mut self, order_id: OrderId) {
        let request_id = self.next_request();
        self.conn.send_payload(&CancelOrder {
            client_request_id: request_id,
            exchange_order_id: order_id,
        });
        tracing::trace!(request = request_id, order = order_id, "cancel");
    }

    fn next_request(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}
