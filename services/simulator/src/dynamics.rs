//! Order-flow decision model
//!
//! Maps the rolling market state to insert/cancel intensities and, per
//! insert, to a side, archetype, pricing regime, size, and cancellation
//! hazard mass. All factors are bounded so a degenerate state cannot run the
//! intensities away.

use crate::rng::SimRng;
use crate::state::MarketState;
use services_common::{Lifespan, Price, Side, Volume, MAX_ASK, MIN_BID};

const EPS: f64 = 1e-8;

/// Who this synthetic order is pretending to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Archetype {
    /// Quotes near the touch, cancels quickly.
    MarketMaker,
    /// Crosses the spread.
    Taker,
    /// Rests far from the touch for a long time.
    Deep,
    /// Uninformed background flow.
    Noise,
}

/// Where the order prices relative to the touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    /// Crosses the opposite touch.
    Marketable,
    /// Steps one tick inside the spread.
    Improve,
    /// Rests at an exponential distance behind the touch.
    Passive,
}

/// A fully specified synthetic insert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertDecision {
    /// Buy or sell.
    pub side: Side,
    /// Limit price, clamped into the book range.
    pub price: Price,
    /// Order quantity.
    pub quantity: Volume,
    /// Marketable flow is sometimes fill-and-kill; everything else rests.
    pub lifespan: Lifespan,
    /// Hazard mass `m`: the order's cancel threshold is `H_cum + m`.
    pub hazard_mass: f64,
}

/// Latent fair value: a mean-reverting walk around the observed mid that
/// anchors passive pricing.
#[derive(Debug, Clone, Copy)]
pub struct LatentState {
    /// Current fair-value estimate, in (fractional) ticks.
    pub fair_value: f64,
}

impl LatentState {
    /// Start the walk at an initial fair value.
    #[must_use]
    pub fn new(initial: f64) -> Self {
        Self {
            fair_value: initial,
        }
    }

    /// Advance one tick: pull toward the mid, diffuse with the realised vol.
    pub fn advance(&mut self, dt: f64, mid: Option<f64>, vol_short: f64, rng: &mut SimRng) {
        const REVERSION_RATE: f64 = 0.5;
        const MIN_DIFFUSION: f64 = 0.05;

        let target = mid.unwrap_or(self.fair_value);
        let diffusion = (vol_short * target).max(MIN_DIFFUSION);
        self.fair_value += REVERSION_RATE * (target - self.fair_value) * dt
            + diffusion * dt.sqrt() * rng.standard_normal();
        #[allow(clippy::cast_precision_loss)]
        {
            self.fair_value = self.fair_value.clamp(MIN_BID as f64, MAX_ASK as f64);
        }
    }
}

/// Tunable parameters of the flow model.
#[derive(Debug, Clone)]
pub struct MarketDynamics {
    /// Baseline insert intensity, events per second.
    pub lambda_insert_base: f64,
    /// Bounds on the insert intensity.
    pub lambda_insert_range: (f64, f64),
    /// Baseline cancel intensity, hazard per second.
    pub lambda_cancel_base: f64,
    /// Bounds on the cancel intensity.
    pub lambda_cancel_range: (f64, f64),
    /// Open-order count the cancel intensity is calibrated for.
    pub target_open_orders: f64,
    /// Flow-imbalance weight in the side score.
    pub flow_side_weight: f64,
    /// Near-touch-imbalance weight in the side score.
    pub depth_side_weight: f64,
    /// Base archetype weights: market-maker, taker, deep, noise.
    pub archetype_weights: [f64; 4],
    /// Convex-blend weight on the own-side quote vs the latent fair value.
    pub anchor_blend: f64,
    /// Median order size before modulation.
    pub base_order_size: f64,
    /// Lognormal scale (of the log) for order sizes.
    pub size_sigma: f64,
    /// Probability of scaling a child order up into a large one.
    pub large_child_prob: f64,
    /// Multiplier applied to large child orders.
    pub large_child_mult: u32,
    /// Hard cap on generated order size.
    pub max_order_size: u32,
    /// Near-touch volume that halves the thinness factor.
    pub thin_scale: f64,
    /// Distance in ticks that doubles the hazard mass.
    pub hazard_dist_scale: f64,
    /// Bounds on a single hazard mass draw.
    pub hazard_mass_range: (f64, f64),
}

impl Default for MarketDynamics {
    fn default() -> Self {
        Self {
            lambda_insert_base: 150.0,
            lambda_insert_range: (10.0, 2_000.0),
            lambda_cancel_base: 75.0,
            lambda_cancel_range: (5.0, 1_000.0),
            target_open_orders: 60.0,
            flow_side_weight: 1.2,
            depth_side_weight: 0.8,
            archetype_weights: [0.40, 0.15, 0.25, 0.20],
            anchor_blend: 0.65,
            base_order_size: 12.0,
            size_sigma: 0.6,
            large_child_prob: 0.03,
            large_child_mult: 8,
            max_order_size: 5_000,
            thin_scale: 40.0,
            hazard_dist_scale: 8.0,
            hazard_mass_range: (0.02, 50.0),
        }
    }
}

impl MarketDynamics {
    /// Recompute both intensities as bounded multiplicative responses to
    /// volatility regime, near-touch thinness, volume surprise, and load.
    pub fn update_intensity<const N: usize>(
        &self,
        state: &MarketState<N>,
        open_orders: usize,
        lambda_insert: &mut f64,
        lambda_cancel: &mut f64,
    ) {
        let flow = state.flow();
        let vol = state.volatility();
        let liq = state.liquidity();

        let vol_ratio = vol.realised_vol_short() / (vol.realised_vol_long() + EPS);
        let vol_factor = vol_ratio.clamp(0.5, 2.0);

        #[allow(clippy::cast_precision_loss)]
        let near_touch_volume = (liq.bid_volumes[0] + liq.ask_volumes[0]) as f64;
        let thinness = 1.0 / (1.0 + near_touch_volume / self.thin_scale);
        let thin_factor = (1.0 + thinness).clamp(1.0, 2.0);

        let surprise_factor = (1.0 + 0.5 * flow.volume_surprise.max(0.0)).clamp(1.0, 2.0);

        *lambda_insert = (self.lambda_insert_base * vol_factor * thin_factor * surprise_factor)
            .clamp(self.lambda_insert_range.0, self.lambda_insert_range.1);

        #[allow(clippy::cast_precision_loss)]
        let load_factor = (open_orders as f64 / self.target_open_orders).clamp(0.25, 4.0);
        *lambda_cancel = (self.lambda_cancel_base * vol_factor * load_factor)
            .clamp(self.lambda_cancel_range.0, self.lambda_cancel_range.1);
    }

    /// Draw one synthetic insert from the current state.
    pub fn decide_insert<const N: usize>(
        &self,
        state: &MarketState<N>,
        latent: &LatentState,
        rng: &mut SimRng,
    ) -> InsertDecision {
        let price_state = state.price_state();
        let flow = state.flow();
        let vol = state.volatility();
        let liq = state.liquidity();

        // Side: momentum-biased coin weighted by flow and book imbalance.
        let side_score =
            self.flow_side_weight * flow.flow_imbalance + self.depth_side_weight * liq.imbalances[0];
        let buy_probability = 0.5 + 0.35 * side_score.tanh();
        let side = if rng.bernoulli(buy_probability) {
            Side::Buy
        } else {
            Side::Sell
        };

        // Urgency rises with a hot short-horizon vol regime, jumps, and
        // volume surprise.
        let vol_ratio = vol.realised_vol_short() / (vol.realised_vol_long() + EPS);
        let urgency = (0.4 * (vol_ratio - 1.0).max(0.0)
            + 0.4 * vol.jump_intensity
            + 0.2 * flow.volume_surprise.max(0.0))
        .clamp(0.0, 1.0);

        let archetype = self.sample_archetype(urgency, rng);

        let (own_best, opposite_best) = match side {
            Side::Buy => (price_state.best_bid, price_state.best_ask),
            Side::Sell => (price_state.best_ask, price_state.best_bid),
        };
        #[allow(clippy::cast_precision_loss)]
        let mid_f = price_state
            .mid_price()
            .map_or(latent.fair_value, |mid| mid as f64);
        #[allow(clippy::cast_precision_loss)]
        let spread_ticks = price_state.spread.unwrap_or(1).max(1) as f64;

        let mut regime = self.sample_regime(archetype, urgency, spread_ticks, rng);
        if regime == Regime::Marketable && opposite_best.is_none() {
            // Nothing to cross; rest instead.
            regime = Regime::Passive;
        }

        let price = self
            .choose_price(
                side,
                regime,
                own_best,
                opposite_best,
                mid_f,
                spread_ticks,
                vol_ratio,
                vol.jump_intensity,
                latent,
                urgency,
                rng,
            )
            .clamp(MIN_BID, MAX_ASK);

        let quantity = self.sample_quantity(side, liq.bid_volumes[0], liq.ask_volumes[0], urgency, rng);

        let lifespan = if regime == Regime::Marketable && rng.bernoulli(0.5) {
            Lifespan::FillAndKill
        } else {
            Lifespan::GoodForDay
        };

        let hazard_mass =
            self.sample_hazard_mass(archetype, side, price, own_best, vol_ratio, vol.jump_intensity, rng);

        InsertDecision {
            side,
            price,
            quantity,
            lifespan,
            hazard_mass,
        }
    }

    fn sample_archetype(&self, urgency: f64, rng: &mut SimRng) -> Archetype {
        let [w_mm, w_taker, w_deep, w_noise] = self.archetype_weights;
        let w_mm = w_mm * (1.0 - 0.5 * urgency);
        let w_taker = w_taker * (1.0 + 2.0 * urgency);
        let total = w_mm + w_taker + w_deep + w_noise;
        let cumulative = [
            w_mm / total,
            (w_mm + w_taker) / total,
            (w_mm + w_taker + w_deep) / total,
            1.0,
        ];
        match rng.categorical(&cumulative) {
            0 => Archetype::MarketMaker,
            1 => Archetype::Taker,
            2 => Archetype::Deep,
            _ => Archetype::Noise,
        }
    }

    fn sample_regime(
        &self,
        archetype: Archetype,
        urgency: f64,
        spread_ticks: f64,
        rng: &mut SimRng,
    ) -> Regime {
        match archetype {
            Archetype::Taker => {
                if rng.bernoulli((0.65 + 0.3 * urgency).min(0.95)) {
                    Regime::Marketable
                } else {
                    Regime::Improve
                }
            }
            Archetype::MarketMaker => {
                // Wide spreads invite improving; tight ones, joining behind.
                if spread_ticks > 1.5 && rng.bernoulli(0.6) {
                    Regime::Improve
                } else {
                    Regime::Passive
                }
            }
            Archetype::Deep => Regime::Passive,
            Archetype::Noise => {
                let draw = rng.standard_uniform();
                if draw < 0.15 {
                    Regime::Marketable
                } else if draw < 0.35 {
                    Regime::Improve
                } else {
                    Regime::Passive
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
    fn choose_price(
        &self,
        side: Side,
        regime: Regime,
        own_best: Option<Price>,
        opposite_best: Option<Price>,
        mid_f: f64,
        spread_ticks: f64,
        vol_ratio: f64,
        jump_intensity: f64,
        latent: &LatentState,
        urgency: f64,
        rng: &mut SimRng,
    ) -> Price {
        match regime {
            Regime::Marketable => {
                // Cross the touch; urgent flow occasionally sweeps deeper.
                let touch = opposite_best.unwrap_or_else(|| rng.round_stochastic(mid_f));
                let sweep = if rng.bernoulli(0.2 * urgency) { 2 } else { 0 };
                match side {
                    Side::Buy => touch + sweep,
                    Side::Sell => touch - sweep,
                }
            }
            Regime::Improve => {
                let base = own_best.unwrap_or_else(|| rng.round_stochastic(mid_f));
                match (side, opposite_best) {
                    // Step inside the spread without crossing it.
                    (Side::Buy, Some(ask)) => (base + 1).min(ask - 1),
                    (Side::Sell, Some(bid)) => (base - 1).max(bid + 1),
                    (Side::Buy, None) => base + 1,
                    (Side::Sell, None) => base - 1,
                }
            }
            Regime::Passive => {
                // Anchor blends the own-side quote with the latent fair
                // value, then rests an exponential distance behind it.
                let quote = own_best.map_or(mid_f, |p| p as f64);
                let anchor_f =
                    self.anchor_blend * quote + (1.0 - self.anchor_blend) * latent.fair_value;
                let anchor = rng.round_stochastic(anchor_f);

                let depth_mean = (1.0 + 0.5 * spread_ticks)
                    * (1.0 + 0.75 * (vol_ratio - 1.0).max(0.0))
                    * (1.0 + 1.5 * jump_intensity);
                #[allow(clippy::cast_possible_truncation)]
                let distance = 1 + rng.exponential(1.0 / depth_mean).round() as i64;
                match side {
                    Side::Buy => anchor - distance,
                    Side::Sell => anchor + distance,
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sample_quantity(
        &self,
        side: Side,
        near_bid_volume: u64,
        near_ask_volume: u64,
        urgency: f64,
        rng: &mut SimRng,
    ) -> Volume {
        // Thin opposite-side depth scales sizes down toward what the touch
        // can absorb; urgency scales them up.
        let facing = match side {
            Side::Buy => near_ask_volume,
            Side::Sell => near_bid_volume,
        } as f64;
        let depth_factor = 0.5 + 1.0 / (1.0 + facing / self.thin_scale);
        let scale = self.base_order_size * depth_factor * (1.0 + 0.5 * urgency);

        let drawn = rng.lognormal(scale.max(1.0).ln(), self.size_sigma);
        let mut quantity = drawn.round().max(1.0) as Volume;
        if rng.bernoulli(self.large_child_prob) {
            quantity = quantity.saturating_mul(self.large_child_mult);
        }
        quantity.min(self.max_order_size)
    }

    #[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
    fn sample_hazard_mass(
        &self,
        archetype: Archetype,
        side: Side,
        price: Price,
        own_best: Option<Price>,
        vol_ratio: f64,
        jump_intensity: f64,
        rng: &mut SimRng,
    ) -> f64 {
        // Distance behind the touch extends expected lifetime.
        let distance = own_best.map_or(0.0, |best| {
            let behind = match side {
                Side::Buy => best - price,
                Side::Sell => price - best,
            };
            behind.max(0) as f64
        });
        let dist_mult = 1.0 + distance / self.hazard_dist_scale;

        let type_mult = match archetype {
            Archetype::MarketMaker => 0.4,
            Archetype::Taker => 0.6,
            Archetype::Noise => 1.0,
            Archetype::Deep => 2.5,
        };

        // Adverse regimes (jumpy, hot vol) shorten lifetimes.
        let adverse_mult =
            1.0 / (1.0 + 1.5 * jump_intensity + 0.5 * (vol_ratio - 1.0).max(0.0));

        let u = rng.open_uniform();
        (-u.ln() * dist_mult * type_mult * adverse_mult)
            .clamp(self.hazard_mass_range.0, self.hazard_mass_range.1)
    }
}
