use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tokio::time::{Duration, Instant, advance};

use bybit_scalp_adapter::{BybitError, Category, OrderbookTop, Side};

use crate::book::{BuyOrder, TpOrder};
use crate::config::{CredentialsConfig, ScalpConfig};
use crate::exchange::{Exchange, ExchangeFuture, OrderSnapshot, OrderState};

use super::waiting::{PendingMarketSell, WaitState};
use super::{EngineCommand, EngineState, ScalpEngine};

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal")
}

fn test_config() -> ScalpConfig {
    ScalpConfig {
        credentials: CredentialsConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        },
        symbol: "BTCUSDT".to_string(),
        category: Category::Linear,
        tick_size: dec("0.01"),
        order_qty: dec("1"),
        max_buy_orders: 1,
        offset_ticks: 2,
        layer_step_ticks: 1,
        buy_ttl_secs: 60,
        reprice_ticks: 5,
        tp_ticks: 5,
        max_tp_orders: 3,
        loop_interval_ms: 100,
        wait_after_buy_fill_ms: 0,
        sell_all_on_stop: false,
        base_url: None,
    }
}

#[derive(Debug, Clone)]
struct PlacedLimit {
    order_id: String,
    side: Side,
    price: Decimal,
    qty: Decimal,
}

#[derive(Debug, Clone)]
struct PlacedMarket {
    order_id: String,
    side: Side,
    qty: Decimal,
}

#[derive(Debug, Default)]
struct MockState {
    top: Option<OrderbookTop>,
    statuses: HashMap<String, Option<OrderSnapshot>>,
    limits: Vec<PlacedLimit>,
    markets: Vec<PlacedMarket>,
    canceled: Vec<String>,
    fail_market_sells: bool,
    fail_limit_sells: bool,
    next_id: u64,
}

/// Scripted exchange: orders are acknowledged with sequential ids and sit in
/// `New` until a test dictates otherwise.
#[derive(Debug, Default)]
struct MockExchange {
    state: tokio::sync::Mutex<MockState>,
}

impl MockExchange {
    async fn set_top(&self, bid: &str, ask: &str) {
        self.state.lock().await.top = Some(OrderbookTop::new(dec(bid), dec(ask)).unwrap());
    }

    async fn set_status(&self, order_id: &str, state: OrderState, cum_exec_qty: &str) {
        self.state.lock().await.statuses.insert(
            order_id.to_string(),
            Some(OrderSnapshot {
                state,
                cum_exec_qty: dec(cum_exec_qty),
            }),
        );
    }

    async fn set_unknown(&self, order_id: &str) {
        self.state
            .lock()
            .await
            .statuses
            .insert(order_id.to_string(), None);
    }

    async fn fail_market_sells(&self, fail: bool) {
        self.state.lock().await.fail_market_sells = fail;
    }

    async fn fail_limit_sells(&self, fail: bool) {
        self.state.lock().await.fail_limit_sells = fail;
    }

    async fn limits(&self) -> Vec<PlacedLimit> {
        self.state.lock().await.limits.clone()
    }

    async fn markets(&self) -> Vec<PlacedMarket> {
        self.state.lock().await.markets.clone()
    }

    async fn canceled(&self) -> Vec<String> {
        self.state.lock().await.canceled.clone()
    }
}

fn rejection() -> BybitError {
    BybitError::Api {
        code: 10001,
        message: "params error".to_string(),
    }
}

impl Exchange for MockExchange {
    fn place_limit(&self, side: Side, price: Decimal, qty: Decimal) -> ExchangeFuture<'_, String> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.fail_limit_sells && side == Side::Sell {
                return Err(rejection());
            }
            state.next_id += 1;
            let order_id = format!("ord-{}", state.next_id);
            state.limits.push(PlacedLimit {
                order_id: order_id.clone(),
                side,
                price,
                qty,
            });
            Ok(order_id)
        })
    }

    fn place_market(&self, side: Side, qty: Decimal) -> ExchangeFuture<'_, String> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.fail_market_sells && side == Side::Sell {
                return Err(rejection());
            }
            state.next_id += 1;
            let order_id = format!("ord-{}", state.next_id);
            state.markets.push(PlacedMarket {
                order_id: order_id.clone(),
                side,
                qty,
            });
            Ok(order_id)
        })
    }

    fn cancel<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, ()> {
        Box::pin(async move {
            self.state.lock().await.canceled.push(order_id.to_string());
            Ok(())
        })
    }

    fn status<'a>(&'a self, order_id: &'a str) -> ExchangeFuture<'a, Option<OrderSnapshot>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(match state.statuses.get(order_id) {
                Some(entry) => entry.clone(),
                None => Some(OrderSnapshot {
                    state: OrderState::New,
                    cum_exec_qty: Decimal::ZERO,
                }),
            })
        })
    }

    fn orderbook_top(&self) -> ExchangeFuture<'_, OrderbookTop> {
        Box::pin(async move {
            self.state
                .lock()
                .await
                .top
                .ok_or_else(|| BybitError::InvalidResponse("no book top scripted".to_string()))
        })
    }
}

async fn running_engine(config: ScalpConfig, exchange: &MockExchange) -> ScalpEngine {
    let mut engine = ScalpEngine::new(config).unwrap();
    engine.apply(exchange, EngineCommand::Start).await;
    engine
}

fn seed_tp(engine: &mut ScalpEngine, order_id: &str, sell: &str, buy: &str) {
    engine.book.push_tp(TpOrder {
        order_id: order_id.to_string(),
        sell_price: dec(sell),
        qty: Decimal::ONE,
        buy_price: dec(buy),
        placed_at: Instant::now(),
    });
    engine
        .stats
        .add_position(order_id.to_string(), dec(buy), Decimal::ONE);
}

fn seed_buy(engine: &mut ScalpEngine, order_id: &str, price: &str, layer: u32) {
    engine.book.push_buy(BuyOrder {
        order_id: order_id.to_string(),
        price: dec(price),
        qty: Decimal::ONE,
        filled_qty: Decimal::ZERO,
        layer,
        placed_at: Instant::now(),
    });
}

fn assert_layers_distinct(engine: &ScalpEngine) {
    let mut layers: Vec<u32> = engine.book.buys().iter().map(|buy| buy.layer).collect();
    layers.sort_unstable();
    layers.dedup();
    assert_eq!(layers.len(), engine.book.buy_count(), "duplicate layer index");
}

#[tokio::test(start_paused = true)]
async fn fill_to_tp_realizes_the_spread() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.tick(&exchange).await;
    let limits = exchange.limits().await;
    assert_eq!(limits.len(), 1);
    assert_eq!(limits[0].side, Side::Buy);
    assert_eq!(limits[0].price, dec("99.98"));
    let buy_id = limits[0].order_id.clone();

    exchange.set_status(&buy_id, OrderState::Filled, "1").await;
    engine.tick(&exchange).await;

    let tp = exchange
        .limits()
        .await
        .into_iter()
        .find(|order| order.side == Side::Sell)
        .expect("take-profit placed");
    assert_eq!(tp.price, dec("100.03"));
    assert_eq!(engine.stats.positions().len(), 1);

    exchange.set_status(&tp.order_id, OrderState::Filled, "1").await;
    engine.tick(&exchange).await;

    assert_eq!(engine.stats.buys_filled, 1);
    assert_eq!(engine.stats.sells_filled, 1);
    assert_eq!(engine.stats.realized_pnl, dec("0.05"));
    assert!(engine.stats.positions().is_empty());
    assert_eq!(engine.snapshot().estimated_profit, dec("0.05"));
}

#[tokio::test(start_paused = true)]
async fn ttl_expiry_cancels_without_a_tp() {
    let mut config = test_config();
    config.buy_ttl_secs = 2;
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(config, &exchange).await;

    engine.tick(&exchange).await;
    let buy_id = exchange.limits().await[0].order_id.clone();

    advance(Duration::from_millis(1900)).await;
    engine.tick(&exchange).await;
    assert!(exchange.canceled().await.is_empty(), "not yet expired");

    advance(Duration::from_millis(200)).await;
    engine.tick(&exchange).await;

    assert_eq!(exchange.canceled().await, vec![buy_id]);
    assert_eq!(engine.stats.buys_canceled, 1);
    assert_eq!(engine.stats.sells_created, 0, "no TP for an empty fill");
    // The ladder refills on the same tick.
    assert_eq!(engine.book.buy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ttl_expiry_hands_the_partial_to_the_tp_manager() {
    let mut config = test_config();
    config.buy_ttl_secs = 2;
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(config, &exchange).await;

    engine.tick(&exchange).await;
    let buy_id = exchange.limits().await[0].order_id.clone();
    exchange
        .set_status(&buy_id, OrderState::PartiallyFilled, "0.4")
        .await;

    advance(Duration::from_millis(2100)).await;
    engine.tick(&exchange).await;

    let tp = exchange
        .limits()
        .await
        .into_iter()
        .find(|order| order.side == Side::Sell)
        .expect("partial fill exits through a TP");
    assert_eq!(tp.qty, dec("0.4"));
    assert_eq!(tp.price, dec("100.03"));
    assert_eq!(engine.stats.buys_canceled, 1);
}

#[tokio::test(start_paused = true)]
async fn drift_reprices_the_ladder() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.tick(&exchange).await;
    let stale_id = exchange.limits().await[0].order_id.clone();

    // Five ticks of drift between the resting price and the new bid.
    exchange.set_top("100.03", "100.08").await;
    engine.tick(&exchange).await;

    assert_eq!(exchange.canceled().await, vec![stale_id]);
    assert_eq!(engine.stats.buys_canceled, 1);
    assert_eq!(engine.book.buy_count(), 1);
    assert_eq!(engine.book.buys()[0].price, dec("100.01"));
    assert_layers_distinct(&engine);
}

#[tokio::test(start_paused = true)]
async fn overflow_evicts_the_highest_tp_and_market_sells() {
    let mut config = test_config();
    config.max_tp_orders = 2;
    let exchange = MockExchange::default();
    exchange.set_top("101.40", "101.45").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_tp(&mut engine, "tp-a", "101.00", "100.95");
    seed_tp(&mut engine, "tp-b", "101.50", "101.45");
    seed_buy(&mut engine, "buy-1", "100.90", 0);
    exchange.set_status("buy-1", OrderState::Filled, "1").await;

    engine.tick(&exchange).await;

    // The furthest-from-market TP went, not the closer one.
    assert_eq!(exchange.canceled().await, vec!["tp-b".to_string()]);
    let markets = exchange.markets().await;
    assert_eq!(markets.len(), 1);
    assert_eq!(markets[0].side, Side::Sell);
    assert_eq!(markets[0].qty, dec("1"));

    let snapshot = engine.snapshot();
    assert!(snapshot.waiting_for_market_sell);
    let pending = snapshot.pending_new_tp.expect("fill is held");
    assert_eq!(pending.buy_price, dec("100.90"));
    // The held TP does not jump the queue while the sell is in flight.
    assert_eq!(engine.book.tp_count(), 1);
    assert_eq!(engine.stats.positions().len(), 1);

    // Market sell prints; P/L is estimated at the bid.
    exchange
        .set_status(&markets[0].order_id, OrderState::Filled, "1")
        .await;
    engine.tick(&exchange).await;

    assert_eq!(engine.stats.realized_pnl, dec("-0.05"));
    assert_eq!(engine.stats.sells_filled, 1);
    assert!(!engine.snapshot().waiting_for_market_sell);
    let held_tp = exchange
        .limits()
        .await
        .into_iter()
        .find(|order| order.side == Side::Sell)
        .expect("held TP materialized");
    assert_eq!(held_tp.price, dec("100.95"));
}

#[tokio::test(start_paused = true)]
async fn stuck_market_sell_falls_back_to_a_limit_and_chases_the_bid() {
    let exchange = MockExchange::default();
    exchange.set_top("101.00", "101.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.waiting = Some(WaitState {
        sell: PendingMarketSell {
            order_id: "mkt-1".to_string(),
            qty: Decimal::ONE,
            buy_price: dec("101.45"),
            placed_at: Instant::now(),
            limit_fallback: None,
        },
        pending_tp: None,
    });

    advance(Duration::from_secs(31)).await;
    engine.tick(&exchange).await;

    assert!(exchange.canceled().await.contains(&"mkt-1".to_string()));
    let fallback = exchange
        .limits()
        .await
        .into_iter()
        .find(|order| order.side == Side::Sell)
        .expect("fallback limit placed");
    assert_eq!(fallback.price, dec("101.00"));
    let wait = engine.waiting.as_ref().expect("still waiting");
    assert_eq!(wait.sell.limit_fallback, Some(dec("101.00")));
    let fallback_id = wait.sell.order_id.clone();

    // Two ticks of drift is not enough to chase.
    advance(Duration::from_secs(11)).await;
    exchange.set_top("101.02", "101.07").await;
    engine.tick(&exchange).await;
    assert_eq!(
        engine.waiting.as_ref().unwrap().sell.order_id,
        fallback_id,
        "within two ticks the limit rests"
    );

    // Three ticks is.
    exchange.set_top("101.03", "101.08").await;
    engine.tick(&exchange).await;

    assert!(exchange.canceled().await.contains(&fallback_id));
    let wait = engine.waiting.as_ref().expect("still waiting");
    assert_eq!(wait.sell.limit_fallback, Some(dec("101.03")));
    assert_ne!(wait.sell.order_id, fallback_id);
}

#[tokio::test(start_paused = true)]
async fn failed_market_sell_falls_back_to_a_normal_tp() {
    let mut config = test_config();
    config.max_tp_orders = 1;
    let exchange = MockExchange::default();
    exchange.set_top("101.40", "101.45").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_tp(&mut engine, "tp-a", "101.50", "101.45");
    seed_buy(&mut engine, "buy-1", "100.90", 0);
    exchange.set_status("buy-1", OrderState::Filled, "1").await;
    exchange.fail_market_sells(true).await;

    engine.tick(&exchange).await;

    assert!(!engine.snapshot().waiting_for_market_sell);
    assert_eq!(engine.book.tp_count(), 1);
    assert_eq!(engine.book.tps()[0].sell_price, dec("100.95"));
    assert!(exchange.canceled().await.contains(&"tp-a".to_string()));
}

#[tokio::test(start_paused = true)]
async fn held_tp_materializes_when_another_tp_frees_a_slot() {
    let mut config = test_config();
    config.max_tp_orders = 2;
    let exchange = MockExchange::default();
    exchange.set_top("101.00", "101.05").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_tp(&mut engine, "tp-a", "101.00", "100.95");
    engine.waiting = Some(WaitState {
        sell: PendingMarketSell {
            order_id: "mkt-1".to_string(),
            qty: Decimal::ONE,
            buy_price: dec("101.45"),
            placed_at: Instant::now(),
            limit_fallback: None,
        },
        pending_tp: Some(super::waiting::PendingNewTp {
            buy_price: dec("100.90"),
            qty: Decimal::ONE,
        }),
    });

    // Nothing frees up: the held TP stays held.
    engine.tick(&exchange).await;
    assert!(engine.snapshot().pending_new_tp.is_some());

    // An existing TP fills; the held one takes its slot, the wait stays.
    exchange.set_status("tp-a", OrderState::Filled, "1").await;
    engine.tick(&exchange).await;

    let snapshot = engine.snapshot();
    assert!(snapshot.waiting_for_market_sell, "wait exits only via the sell");
    assert!(snapshot.pending_new_tp.is_none());
    assert_eq!(engine.book.tp_count(), 1);
    assert_eq!(engine.book.tps()[0].sell_price, dec("100.95"));
}

#[tokio::test(start_paused = true)]
async fn waiting_stands_the_ladder_down() {
    let mut config = test_config();
    config.max_buy_orders = 2;
    let exchange = MockExchange::default();
    exchange.set_top("101.00", "101.05").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_buy(&mut engine, "buy-1", "100.98", 0);
    seed_buy(&mut engine, "buy-2", "100.97", 1);
    engine.waiting = Some(WaitState {
        sell: PendingMarketSell {
            order_id: "mkt-1".to_string(),
            qty: Decimal::ONE,
            buy_price: dec("101.45"),
            placed_at: Instant::now(),
            limit_fallback: None,
        },
        pending_tp: None,
    });

    engine.tick(&exchange).await;

    assert_eq!(engine.book.buy_count(), 0);
    assert_eq!(engine.stats.buys_canceled, 2);
    assert!(exchange.limits().await.is_empty(), "no top-up while waiting");
}

#[tokio::test(start_paused = true)]
async fn post_fill_cooldown_delays_the_top_up() {
    let mut config = test_config();
    config.wait_after_buy_fill_ms = 5_000;
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(config, &exchange).await;

    engine.tick(&exchange).await;
    let buy_id = exchange.limits().await[0].order_id.clone();
    exchange.set_status(&buy_id, OrderState::Filled, "1").await;

    engine.tick(&exchange).await;
    assert_eq!(engine.book.buy_count(), 0, "cooldown holds the ladder back");

    advance(Duration::from_millis(4_000)).await;
    engine.tick(&exchange).await;
    assert_eq!(engine.book.buy_count(), 0);

    advance(Duration::from_millis(1_100)).await;
    engine.tick(&exchange).await;
    assert_eq!(engine.book.buy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn layer_collision_reshuffles_toward_the_bid() {
    let mut config = test_config();
    config.max_buy_orders = 2;
    config.reprice_ticks = 50;
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(config, &exchange).await;

    // A leftover order resting exactly where layer 1 wants to go.
    seed_buy(&mut engine, "stale", "99.97", 0);
    engine.tick(&exchange).await;

    let placed = exchange.limits().await;
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].price, dec("99.98"), "bumped one step toward the bid");

    let bumped = engine.book.buy(&placed[0].order_id).unwrap();
    let stale = engine.book.buy("stale").unwrap();
    assert_eq!(bumped.layer, 0, "higher price takes the inner index");
    assert_eq!(stale.layer, 1, "displaced order moves outward");
    assert_layers_distinct(&engine);
}

#[tokio::test(start_paused = true)]
async fn double_collision_skips_the_layer() {
    let mut config = test_config();
    config.max_buy_orders = 3;
    config.reprice_ticks = 50;
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_buy(&mut engine, "stale-a", "99.97", 0);
    seed_buy(&mut engine, "stale-b", "99.98", 2);
    engine.tick(&exchange).await;

    assert!(exchange.limits().await.is_empty(), "no room for layer 1");
    assert_eq!(engine.book.buy_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_order_counts_as_not_filled() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.tick(&exchange).await;
    let buy_id = exchange.limits().await[0].order_id.clone();
    exchange.set_unknown(&buy_id).await;

    engine.tick(&exchange).await;

    assert_eq!(engine.book.buy_count(), 1);
    assert_eq!(engine.stats.buys_filled, 0);
    assert_eq!(engine.stats.sells_created, 0);
}

#[tokio::test(start_paused = true)]
async fn no_change_tick_is_a_noop_on_the_book() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.tick(&exchange).await;
    let before = exchange.limits().await.len();

    engine.tick(&exchange).await;
    engine.tick(&exchange).await;

    assert_eq!(exchange.limits().await.len(), before);
    assert!(exchange.canceled().await.is_empty());
    assert_eq!(engine.book.buy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_cancels_buys_and_keeps_tps_working() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    seed_buy(&mut engine, "buy-1", "99.98", 0);
    seed_tp(&mut engine, "tp-a", "100.03", "99.98");

    engine.apply(&exchange, EngineCommand::Pause).await;
    assert_eq!(engine.state(), EngineState::Paused);
    assert_eq!(engine.book.buy_count(), 0);
    assert_eq!(engine.book.tp_count(), 1);

    // Paused ticks still reconcile the TP set.
    exchange.set_status("tp-a", OrderState::Filled, "1").await;
    engine.tick(&exchange).await;
    assert_eq!(engine.stats.sells_filled, 1);
    assert_eq!(engine.stats.realized_pnl, dec("0.05"));

    // And never rebuild the ladder.
    assert!(exchange.limits().await.is_empty());

    engine.apply(&exchange, EngineCommand::Resume).await;
    engine.tick(&exchange).await;
    assert_eq!(engine.book.buy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_with_sell_all_flattens_at_the_ask() {
    let mut config = test_config();
    config.sell_all_on_stop = true;
    let exchange = MockExchange::default();
    exchange.set_top("101.40", "101.45").await;
    let mut engine = running_engine(config, &exchange).await;

    seed_buy(&mut engine, "buy-1", "101.38", 0);
    seed_tp(&mut engine, "tp-a", "101.00", "100.95");
    seed_tp(&mut engine, "tp-b", "101.50", "101.45");

    engine.apply(&exchange, EngineCommand::Stop).await;

    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.stats.buys_canceled, 1);
    assert_eq!(engine.stats.sells_canceled, 2);
    let markets = exchange.markets().await;
    assert_eq!(markets.len(), 2);
    assert!(markets.iter().all(|order| order.side == Side::Sell));
    // (101.45 - 100.95) + (101.45 - 101.45)
    assert_eq!(engine.stats.realized_pnl, dec("0.50"));
    assert!(engine.stats.positions().is_empty());
    assert_eq!(engine.book.tp_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_without_sell_all_cancels_only() {
    let exchange = MockExchange::default();
    exchange.set_top("101.40", "101.45").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    seed_tp(&mut engine, "tp-a", "101.00", "100.95");
    seed_tp(&mut engine, "tp-b", "101.50", "101.45");

    engine.apply(&exchange, EngineCommand::Stop).await;

    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.stats.sells_canceled, 2);
    assert!(exchange.markets().await.is_empty());
    assert_eq!(engine.stats.realized_pnl, Decimal::ZERO);
    assert!(engine.stats.positions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_then_start_resets_the_session() {
    let exchange = MockExchange::default();
    exchange.set_top("100.00", "100.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.tick(&exchange).await;
    let buy_id = exchange.limits().await[0].order_id.clone();
    exchange.set_status(&buy_id, OrderState::Filled, "1").await;
    engine.tick(&exchange).await;
    assert!(engine.stats.buys_filled > 0);

    engine.apply(&exchange, EngineCommand::Stop).await;
    engine.apply(&exchange, EngineCommand::Start).await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.state, EngineState::Running);
    assert!(snapshot.open_buys.is_empty());
    assert!(snapshot.open_tps.is_empty());
    assert_eq!(snapshot.stats.buys_filled, 0);
    assert_eq!(snapshot.stats.realized_pnl, Decimal::ZERO);
    assert_eq!(snapshot.average_buy_price, Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn commands_out_of_place_are_ignored() {
    let exchange = MockExchange::default();
    let mut engine = ScalpEngine::new(test_config()).unwrap();

    engine.apply(&exchange, EngineCommand::Pause).await;
    assert_eq!(engine.state(), EngineState::Stopped);

    engine.apply(&exchange, EngineCommand::Start).await;
    engine.apply(&exchange, EngineCommand::Resume).await;
    assert_eq!(engine.state(), EngineState::Running);

    engine.apply(&exchange, EngineCommand::Start).await;
    assert_eq!(engine.state(), EngineState::Running);
}

#[tokio::test(start_paused = true)]
async fn pause_is_refused_while_a_market_sell_is_pending() {
    let exchange = MockExchange::default();
    exchange.set_top("101.00", "101.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.waiting = Some(WaitState {
        sell: PendingMarketSell {
            order_id: "mkt-1".to_string(),
            qty: Decimal::ONE,
            buy_price: dec("101.45"),
            placed_at: Instant::now(),
            limit_fallback: None,
        },
        pending_tp: None,
    });

    engine.apply(&exchange, EngineCommand::Pause).await;
    assert_eq!(engine.state(), EngineState::Running);
}

#[tokio::test(start_paused = true)]
async fn failed_limit_fallback_abandons_the_evicted_position() {
    let exchange = MockExchange::default();
    exchange.set_top("101.00", "101.05").await;
    let mut engine = running_engine(test_config(), &exchange).await;

    engine.waiting = Some(WaitState {
        sell: PendingMarketSell {
            order_id: "mkt-1".to_string(),
            qty: Decimal::ONE,
            buy_price: dec("101.45"),
            placed_at: Instant::now(),
            limit_fallback: None,
        },
        pending_tp: Some(super::waiting::PendingNewTp {
            buy_price: dec("100.90"),
            qty: Decimal::ONE,
        }),
    });
    exchange.fail_limit_sells(true).await;

    advance(Duration::from_secs(31)).await;
    engine.tick(&exchange).await;

    assert!(engine.waiting.is_none(), "wait abandoned");
    // The held fill's TP was attempted too, and rejected with sells down.
    assert_eq!(engine.book.tp_count(), 0);
    assert_eq!(engine.stats.sells_filled, 0);
}
