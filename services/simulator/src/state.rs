//! Rolling market-state aggregates
//!
//! Derived from the trade and price-level feeds. Every EWMA uses
//! `α = 1 − exp(−dt/τ)` against the effective inter-event dt, so the
//! estimates are invariant to sampling rate.

use crate::shadow_book::ShadowOrderBook;
use services_common::protocol::TradeEvent;
use services_common::{Price, Side, Ts};

// Decay horizons in seconds.
const TAU_SHORT: f64 = 1.0;
const TAU_LONG: f64 = 30.0;
const TAU_JUMP: f64 = 10.0;
const TAU_FLOW: f64 = 2.0;
const TAU_RATE: f64 = 5.0;
const TAU_SURPRISE: f64 = 10.0;

const VOL_MIN: f64 = 1e-6;
const EPS: f64 = 1e-8;

/// Normalised return above which a move counts as a jump.
const JUMP_SCORE_THRESHOLD: f64 = 5.0;

/// Simulated time bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeState {
    /// Seconds since the simulator started.
    pub sim_time: f64,
    /// Seconds since the previous tick.
    pub time_since_event: f64,
}

/// Touch prices and the last trade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceState {
    /// Best bid, if the bid side exists.
    pub best_bid: Option<Price>,
    /// Best ask, if the ask side exists.
    pub best_ask: Option<Price>,
    /// Ask minus bid, when both sides exist.
    pub spread: Option<Price>,
    /// Price of the most recent trade (zero before the first).
    pub last_trade_price: Price,
}

impl PriceState {
    /// Midpoint of the touch, when both sides exist.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2),
            _ => None,
        }
    }
}

/// Bucketed depth metrics by distance from the touch. Buckets are
/// cumulative: bucket `i` covers distances `≤ bucket_bounds[i]`.
#[derive(Debug, Clone, Copy)]
pub struct LiquidityState<const N: usize> {
    /// Upper distance bound of each bucket, in ticks.
    pub bucket_bounds: [Price; N],
    /// Total bid volume within each bucket.
    pub bid_volumes: [u64; N],
    /// Total ask volume within each bucket.
    pub ask_volumes: [u64; N],
    /// `(V_bid − V_ask)/(V_bid + V_ask + ε)` per bucket.
    pub imbalances: [f64; N],
    /// Volume-weighted mean distance from the touch, bid side.
    pub bid_mean_distances: [f64; N],
    /// Volume-weighted distance variance, bid side.
    pub bid_variances: [f64; N],
    /// Volume-weighted distance skew, bid side.
    pub bid_skews: [f64; N],
    /// Volume-weighted mean distance from the touch, ask side.
    pub ask_mean_distances: [f64; N],
    /// Volume-weighted distance variance, ask side.
    pub ask_variances: [f64; N],
    /// Volume-weighted distance skew, ask side.
    pub ask_skews: [f64; N],
    /// Whether any bid level exists.
    pub has_bid_side: bool,
    /// Whether any ask level exists.
    pub has_ask_side: bool,
}

impl<const N: usize> LiquidityState<N> {
    fn new(bucket_bounds: [Price; N]) -> Self {
        Self {
            bucket_bounds,
            bid_volumes: [0; N],
            ask_volumes: [0; N],
            imbalances: [0.0; N],
            bid_mean_distances: [0.0; N],
            bid_variances: [0.0; N],
            bid_skews: [0.0; N],
            ask_mean_distances: [0.0; N],
            ask_variances: [0.0; N],
            ask_skews: [0.0; N],
            has_bid_side: false,
            has_ask_side: false,
        }
    }
}

/// EWMA realised-variance estimates over two horizons plus jump tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityState {
    /// Short-horizon realised variance (τ = 1 s).
    pub realised_variance_short: f64,
    /// Long-horizon realised variance (τ = 30 s).
    pub realised_variance_long: f64,
    /// Upside semivariance.
    pub realised_variance_up: f64,
    /// Downside semivariance.
    pub realised_variance_down: f64,
    /// EWMA of squared changes in short-horizon vol.
    pub vol_of_vol: f64,
    /// Decaying jump indicator (impulse 1.0 on |r|/(σ√dt) > 5, τ = 10 s).
    pub jump_intensity: f64,
}

impl VolatilityState {
    /// Short-horizon realised volatility.
    #[must_use]
    pub fn realised_vol_short(&self) -> f64 {
        self.realised_variance_short.sqrt()
    }

    /// Long-horizon realised volatility.
    #[must_use]
    pub fn realised_vol_long(&self) -> f64 {
        self.realised_variance_long.sqrt()
    }

    /// Upside semivolatility.
    #[must_use]
    pub fn realised_vol_up(&self) -> f64 {
        self.realised_variance_up.sqrt()
    }

    /// Downside semivolatility.
    #[must_use]
    pub fn realised_vol_down(&self) -> f64 {
        self.realised_variance_down.sqrt()
    }
}

/// Order-flow EWMAs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowState {
    /// EWMA of absolute trade volume.
    pub abs_volume_ewma: f64,
    /// EWMA of the instantaneous trade rate (1/dt).
    pub trade_rate_ewma: f64,
    /// EWMA of buyer-initiated volume.
    pub buy_volume_ewma: f64,
    /// EWMA of seller-initiated volume.
    pub sell_volume_ewma: f64,
    /// EWMA of relative volume surprise.
    pub volume_surprise: f64,
    /// EWMA of signed volume (buys positive).
    pub signed_volume_ewma: f64,
    /// `signed / (abs + ε)`, clamped to [−1, 1].
    pub flow_imbalance: f64,
}

/// Mean, variance, and skew from raw weighted power sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMoments {
    /// Weighted mean.
    pub mean: f64,
    /// Weighted variance, floored at zero.
    pub variance: f64,
    /// Weighted skew, zero when variance is.
    pub skew: f64,
}

/// Compute moments from `Σw`, `Σwx`, `Σwx²`, `Σwx³`.
#[must_use]
pub fn compute_weighted_moments(w_sum: f64, x_sum: f64, x2_sum: f64, x3_sum: f64) -> WeightedMoments {
    let mut moments = WeightedMoments::default();
    if w_sum <= 0.0 {
        return moments;
    }
    moments.mean = x_sum / w_sum;
    moments.variance = (x2_sum / w_sum - moments.mean * moments.mean).max(0.0);
    if moments.variance > 0.0 {
        let std = moments.variance.sqrt();
        moments.skew = (x3_sum / w_sum
            - 3.0 * moments.mean * moments.variance
            - moments.mean * moments.mean * moments.mean)
            / (std * std * std);
    }
    moments
}

/// All rolling aggregates the flow model reads.
pub struct MarketState<const N: usize> {
    time: TimeState,
    price: PriceState,
    liquidity: LiquidityState<N>,
    volatility: VolatilityState,
    flow: FlowState,
    last_trade_price: Price,
    last_trade_timestamp: Ts,
}

impl<const N: usize> MarketState<N> {
    /// Aggregator with the given cumulative bucket bounds.
    #[must_use]
    pub fn new(bucket_bounds: [Price; N]) -> Self {
        Self {
            time: TimeState::default(),
            price: PriceState::default(),
            liquidity: LiquidityState::new(bucket_bounds),
            volatility: VolatilityState::default(),
            flow: FlowState::default(),
            last_trade_price: 0,
            last_trade_timestamp: Ts::default(),
        }
    }

    /// Refresh the book-derived aggregates and advance simulated time.
    pub fn sync_with_book(&mut self, book: &ShadowOrderBook, dt: f64) {
        self.update_price_state(book);
        self.update_liquidity_state(book);
        self.time.sim_time += dt;
        self.time.time_since_event = dt;
    }

    /// Fold one trade print into the volatility and flow aggregates.
    pub fn on_trade(&mut self, trade: &TradeEvent) {
        if self.last_trade_timestamp.as_nanos() == 0 {
            // First print only seeds the baseline.
            self.last_trade_price = trade.price;
            self.last_trade_timestamp = trade.timestamp;
            self.price.last_trade_price = trade.price;
            return;
        }
        let dt = (trade
            .timestamp
            .as_nanos()
            .saturating_sub(self.last_trade_timestamp.as_nanos()) as f64
            * 1e-9)
            .max(1e-6);
        self.update_volatility(trade, dt);
        self.update_flow(trade, dt);
        self.last_trade_price = trade.price;
        self.last_trade_timestamp = trade.timestamp;
        self.price.last_trade_price = trade.price;
    }

    /// Time bookkeeping.
    #[must_use]
    pub fn time_state(&self) -> &TimeState {
        &self.time
    }

    /// Touch prices.
    #[must_use]
    pub fn price_state(&self) -> &PriceState {
        &self.price
    }

    /// Depth buckets.
    #[must_use]
    pub fn liquidity(&self) -> &LiquidityState<N> {
        &self.liquidity
    }

    /// Volatility aggregates.
    #[must_use]
    pub fn volatility(&self) -> &VolatilityState {
        &self.volatility
    }

    /// Flow aggregates.
    #[must_use]
    pub fn flow(&self) -> &FlowState {
        &self.flow
    }

    fn update_price_state(&mut self, book: &ShadowOrderBook) {
        self.price.best_bid = book.best_bid();
        self.price.best_ask = book.best_ask();
        self.price.spread = book.spread();
        self.price.last_trade_price = self.last_trade_price;
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_liquidity_state(&mut self, book: &ShadowOrderBook) {
        let liq = &mut self.liquidity;
        let best_bid = book.best_bid();
        let best_ask = book.best_ask();
        liq.has_bid_side = best_bid.is_some();
        liq.has_ask_side = best_ask.is_some();

        liq.bid_volumes = [0; N];
        liq.ask_volumes = [0; N];
        let mut bid_w = [0.0f64; N];
        let mut bid_x = [0.0f64; N];
        let mut bid_x2 = [0.0f64; N];
        let mut bid_x3 = [0.0f64; N];
        let mut ask_w = [0.0f64; N];
        let mut ask_x = [0.0f64; N];
        let mut ask_x2 = [0.0f64; N];
        let mut ask_x3 = [0.0f64; N];

        if let Some(best) = best_bid {
            for (&price, &volume) in book.bids() {
                let dist = (best - price) as f64;
                if dist < 0.0 {
                    continue;
                }
                for i in 0..N {
                    if dist <= liq.bucket_bounds[i] as f64 {
                        liq.bid_volumes[i] += u64::from(volume);
                        let w = f64::from(volume);
                        bid_w[i] += w;
                        bid_x[i] += w * dist;
                        bid_x2[i] += w * dist * dist;
                        bid_x3[i] += w * dist * dist * dist;
                    }
                }
            }
        }
        if let Some(best) = best_ask {
            for (&price, &volume) in book.asks() {
                let dist = (price - best) as f64;
                if dist < 0.0 {
                    continue;
                }
                for i in 0..N {
                    if dist <= liq.bucket_bounds[i] as f64 {
                        liq.ask_volumes[i] += u64::from(volume);
                        let w = f64::from(volume);
                        ask_w[i] += w;
                        ask_x[i] += w * dist;
                        ask_x2[i] += w * dist * dist;
                        ask_x3[i] += w * dist * dist * dist;
                    }
                }
            }
        }

        for i in 0..N {
            let bid_moments = compute_weighted_moments(bid_w[i], bid_x[i], bid_x2[i], bid_x3[i]);
            let ask_moments = compute_weighted_moments(ask_w[i], ask_x[i], ask_x2[i], ask_x3[i]);
            liq.bid_mean_distances[i] = bid_moments.mean;
            liq.bid_variances[i] = bid_moments.variance;
            liq.bid_skews[i] = bid_moments.skew;
            liq.ask_mean_distances[i] = ask_moments.mean;
            liq.ask_variances[i] = ask_moments.variance;
            liq.ask_skews[i] = ask_moments.skew;

            let bid_volume = liq.bid_volumes[i] as f64;
            let ask_volume = liq.ask_volumes[i] as f64;
            liq.imbalances[i] = (bid_volume - ask_volume) / (bid_volume + ask_volume + EPS);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_volatility(&mut self, trade: &TradeEvent, dt: f64) {
        let p0 = self.last_trade_price as f64;
        let p1 = trade.price as f64;
        if p0 <= 0.0 || p1 <= 0.0 {
            return;
        }
        let r = (p1 / p0).ln();
        let r2 = r * r;

        let vs = &mut self.volatility;
        let vol_prev = vs.realised_variance_short.sqrt();

        let a_short = 1.0 - (-dt / TAU_SHORT).exp();
        let a_long = 1.0 - (-dt / TAU_LONG).exp();

        vs.realised_variance_short = (1.0 - a_short) * vs.realised_variance_short + a_short * r2;
        vs.realised_variance_long = (1.0 - a_long) * vs.realised_variance_long + a_long * r2;

        if r > 0.0 {
            vs.realised_variance_up = (1.0 - a_short) * vs.realised_variance_up + a_short * r2;
            vs.realised_variance_down *= 1.0 - a_short;
        } else if r < 0.0 {
            vs.realised_variance_down = (1.0 - a_short) * vs.realised_variance_down + a_short * r2;
            vs.realised_variance_up *= 1.0 - a_short;
        } else {
            vs.realised_variance_up *= 1.0 - a_short;
            vs.realised_variance_down *= 1.0 - a_short;
        }

        let vol_now = vs.realised_variance_short.sqrt();
        let dvol = vol_now - vol_prev;
        vs.vol_of_vol = (1.0 - a_short) * vs.vol_of_vol + a_short * dvol * dvol;

        if vol_now > VOL_MIN {
            let jump_score = r.abs() / (vol_now * dt.sqrt() + EPS);
            let a_jump = 1.0 - (-dt / TAU_JUMP).exp();
            if jump_score > JUMP_SCORE_THRESHOLD {
                vs.jump_intensity = (1.0 - a_jump) * vs.jump_intensity + a_jump;
            } else {
                vs.jump_intensity *= 1.0 - a_jump;
            }
        }
    }

    fn update_flow(&mut self, trade: &TradeEvent, dt: f64) {
        let fs = &mut self.flow;
        let volume = f64::from(trade.quantity);

        let a_flow = 1.0 - (-dt / TAU_FLOW).exp();
        let a_rate = 1.0 - (-dt / TAU_RATE).exp();
        let a_surprise = 1.0 - (-dt / TAU_SURPRISE).exp();

        fs.abs_volume_ewma = (1.0 - a_flow) * fs.abs_volume_ewma + a_flow * volume;

        let instantaneous_rate = 1.0 / dt;
        fs.trade_rate_ewma = (1.0 - a_rate) * fs.trade_rate_ewma + a_rate * instantaneous_rate;

        if trade.taker_side == Side::Buy {
            fs.buy_volume_ewma = (1.0 - a_flow) * fs.buy_volume_ewma + a_flow * volume;
            fs.sell_volume_ewma *= 1.0 - a_flow;
        } else {
            fs.sell_volume_ewma = (1.0 - a_flow) * fs.sell_volume_ewma + a_flow * volume;
            fs.buy_volume_ewma *= 1.0 - a_flow;
        }

        let signed_volume = if trade.taker_side == Side::Buy {
            volume
        } else {
            -volume
        };
        fs.signed_volume_ewma = (1.0 - a_flow) * fs.signed_volume_ewma + a_flow * signed_volume;
        fs.flow_imbalance =
            (fs.signed_volume_ewma / (fs.abs_volume_ewma + EPS)).clamp(-1.0, 1.0);

        let expected_volume = fs.abs_volume_ewma.max(EPS);
        let surprise = (volume - expected_volume) / expected_volume;
        fs.volume_surprise = (1.0 - a_surprise) * fs.volume_surprise + a_surprise * surprise;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_common::protocol::PriceLevelUpdate;

    fn trade(price: Price, quantity: u32, taker_side: Side, at_nanos: u64) -> TradeEvent {
        TradeEvent {
            sequence_number: 0,
            trade_id: 0,
            price,
            quantity,
            taker_side,
            timestamp: Ts::from_nanos(at_nanos),
        }
    }

    fn level(side: Side, price: Price, volume: u32) -> PriceLevelUpdate {
        PriceLevelUpdate {
            sequence_number: 0,
            side,
            price,
            total_volume: volume,
            timestamp: Ts::from_nanos(0),
        }
    }

    #[test]
    fn test_weighted_moments_two_point_mass() {
        // Weights 1 at x=0 and 1 at x=2: mean 1, variance 1, zero skew.
        let moments = compute_weighted_moments(2.0, 2.0, 4.0, 8.0);
        assert!((moments.mean - 1.0).abs() < 1e-12);
        assert!((moments.variance - 1.0).abs() < 1e-12);
        assert!(moments.skew.abs() < 1e-12);
    }

    #[test]
    fn test_weighted_moments_empty() {
        assert_eq!(
            compute_weighted_moments(0.0, 0.0, 0.0, 0.0),
            WeightedMoments::default()
        );
    }

    #[test]
    fn test_first_trade_only_seeds_baseline() {
        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.on_trade(&trade(1_000, 10, Side::Buy, 1_000_000_000));
        assert_eq!(state.flow().abs_volume_ewma, 0.0);
        assert_eq!(state.price_state().last_trade_price, 1_000);
    }

    #[test]
    fn test_flow_ewma_matches_hand_computation() {
        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.on_trade(&trade(1_000, 10, Side::Buy, 1_000_000_000));
        // Second trade 0.5 s later, buyer-initiated, 8 lots.
        state.on_trade(&trade(1_001, 8, Side::Buy, 1_500_000_000));

        let a_flow = 1.0 - (-0.5f64 / 2.0).exp();
        let expected_abs = a_flow * 8.0;
        assert!((state.flow().abs_volume_ewma - expected_abs).abs() < 1e-12);
        assert!((state.flow().buy_volume_ewma - expected_abs).abs() < 1e-12);
        assert_eq!(state.flow().sell_volume_ewma, 0.0);
        // All volume buyer-initiated: imbalance saturates at 1.
        assert!((state.flow().flow_imbalance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flow_imbalance_flips_with_sellers() {
        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.on_trade(&trade(1_000, 10, Side::Sell, 1_000_000_000));
        for i in 1..20 {
            state.on_trade(&trade(
                1_000,
                10,
                Side::Sell,
                1_000_000_000 + i * 100_000_000,
            ));
        }
        assert!(state.flow().flow_imbalance < -0.9);
        assert!(state.flow().sell_volume_ewma > 0.0);
        assert_eq!(state.flow().buy_volume_ewma, 0.0);
    }

    #[test]
    fn test_volatility_semivariance_sides() {
        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.on_trade(&trade(1_000, 1, Side::Buy, 1_000_000_000));
        state.on_trade(&trade(1_010, 1, Side::Buy, 2_000_000_000));
        assert!(state.volatility().realised_variance_up > 0.0);
        assert_eq!(state.volatility().realised_variance_down, 0.0);

        state.on_trade(&trade(990, 1, Side::Sell, 3_000_000_000));
        assert!(state.volatility().realised_variance_down > 0.0);
        assert!(state.volatility().realised_variance_short > 0.0);
        assert!(state.volatility().realised_vol_short() > 0.0);
    }

    #[test]
    fn test_liquidity_buckets_are_cumulative() {
        let mut book = ShadowOrderBook::new();
        book.on_level_update(&level(Side::Buy, 1_000, 10)); // dist 0
        book.on_level_update(&level(Side::Buy, 997, 20)); // dist 3
        book.on_level_update(&level(Side::Buy, 992, 30)); // dist 8
        book.on_level_update(&level(Side::Sell, 1_002, 40)); // dist 0

        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.sync_with_book(&book, 0.001);

        let liq = state.liquidity();
        assert!(liq.has_bid_side && liq.has_ask_side);
        assert_eq!(liq.bid_volumes, [10, 30, 60]);
        assert_eq!(liq.ask_volumes, [40, 40, 40]);
        // Near touch: 10 bid vs 40 ask.
        assert!(liq.imbalances[0] < 0.0);
        // Bucket 1 mean distance: (10*0 + 20*3) / 30 = 2.
        assert!((liq.bid_mean_distances[1] - 2.0).abs() < 1e-9);
        assert_eq!(liq.ask_mean_distances[0], 0.0);
    }

    #[test]
    fn test_sim_time_accumulates() {
        let book = ShadowOrderBook::new();
        let mut state: MarketState<3> = MarketState::new([1, 5, 10]);
        state.sync_with_book(&book, 0.001);
        state.sync_with_book(&book, 0.002);
        assert!((state.time_state().sim_time - 0.003).abs() < 1e-12);
        assert!((state.time_state().time_since_event - 0.002).abs() < 1e-12);
    }
}
