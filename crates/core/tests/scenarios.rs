//! End-to-end coverage for the two lifecycles the unit tests don't exercise start-to-finish:
//! a cycle that ladders one safety order in and closes profitably, and a bot stopped mid-cycle
//! with an open position still on the books.

use gridforge_core::cycle::{CycleManager, CycleOutcome, CycleState};
use gridforge_core::event::{CycleEvent, ExecutionReportEvent};
use gridforge_core::supervisor::{BotNotification, BotSupervisor};
use gridforge_execution::{
    client::mock::MockExecutionClient,
    order::OrderKind,
    trade::{AssetFees, Trade, TradeId},
    AccountEvent,
};
use gridforge_instrument::{exchange::ExchangeId, instrument::InstrumentNameExchange, Direction, Side};
use gridforge_persistence::{
    bot_repository::BotRepository,
    cycle_repository::CycleRepository,
    models::{
        bot::{BotParams, BotStatus, TakeProfitMode},
        cycle::{CycleStatus, NewCycle},
        order::{OrderRole, OrderStatus},
    },
    order_repository::OrderRepository,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

fn martingale_params() -> BotParams {
    BotParams {
        base_order_amount: dec!(0.002),
        safety_order_amount: dec!(99.99),
        max_safety_orders: 1,
        active_safety_orders: 1,
        price_deviation_pct: dec!(1),
        price_deviation_multiplier: dec!(1),
        safety_order_size_multiplier: dec!(1),
        take_profit_pct: dec!(1),
        take_profit_mode: TakeProfitMode::Fixed,
        trailing_pct: None,
        cooldown_between_rounds_seconds: 60,
        lower_price_limit: None,
        upper_price_limit: None,
    }
}

fn filled_report(
    order: &gridforge_persistence::models::order::Order,
    filled_price: Decimal,
    filled_quantity: Decimal,
) -> ExecutionReportEvent {
    ExecutionReportEvent {
        bot: order.bot_id.clone(),
        client_order_id: order.client_order_id.clone(),
        exchange_order_id: order.exchange_order_id.clone(),
        status: OrderStatus::Filled,
        filled_price: Some(filled_price),
        filled_quantity,
        event_time: chrono::Utc::now(),
    }
}

/// One safety order ladders in, the take-profit re-prices against the new average entry, and
/// the cycle closes out profitably with the whole position cleared.
#[sqlx::test(migrations = "../persistence/migrations")]
async fn clean_one_safety_cycle_completes_profitably(pool: PgPool) {
    let bots = BotRepository::new(pool.clone());
    let orders = OrderRepository::new(pool.clone());
    let cycles = CycleRepository::new(pool.clone());

    let bot = bots
        .create_bot(
            "user-1",
            "acct-1",
            "scenario-a",
            "BTCUSDT",
            Direction::Long,
            &martingale_params(),
        )
        .await
        .unwrap();
    let cycle = cycles
        .start_cycle(NewCycle::new(bot.id.clone(), 1))
        .await
        .unwrap();

    let mut manager = CycleManager::new(
        MockExecutionClient::new(),
        orders.clone(),
        cycles,
        InstrumentNameExchange::new("BTCUSDT"),
        bot.id.clone(),
        Direction::Long,
        martingale_params(),
        cycle,
    );

    manager.start(None).await.unwrap();
    assert_eq!(manager.state(), CycleState::AwaitingBaseFill);

    let base_order = orders
        .list_by_cycle(manager.cycle().id)
        .await
        .unwrap()
        .into_iter()
        .find(|order| order.role == OrderRole::Base)
        .unwrap();
    assert_eq!(base_order.kind, OrderKind::Market);

    manager
        .handle_event(CycleEvent::ExecutionReport(filled_report(
            &base_order,
            dec!(50000),
            dec!(0.002),
        )))
        .await
        .unwrap();
    assert_eq!(manager.state(), CycleState::Holding);
    assert_eq!(manager.cycle().average_entry_price, Some(dec!(50000)));

    let safety_order = orders
        .list_by_cycle(manager.cycle().id)
        .await
        .unwrap()
        .into_iter()
        .find(|order| order.role == OrderRole::Safety)
        .unwrap();
    assert_eq!(safety_order.intended_price, Some(dec!(49500)));

    manager
        .handle_event(CycleEvent::ExecutionReport(filled_report(
            &safety_order,
            dec!(49500),
            dec!(0.00202),
        )))
        .await
        .unwrap();

    assert_eq!(manager.cycle().total_base_quantity, dec!(0.00402));
    assert!(manager.cycle().average_entry_price.unwrap() < dec!(50000));

    let take_profit = orders
        .list_by_cycle(manager.cycle().id)
        .await
        .unwrap()
        .into_iter()
        .find(|order| order.role == OrderRole::TakeProfit && order.status == OrderStatus::Open)
        .unwrap();

    let outcome = manager
        .handle_event(CycleEvent::ExecutionReport(filled_report(
            &take_profit,
            take_profit.intended_price.unwrap(),
            manager.cycle().total_base_quantity,
        )))
        .await
        .unwrap();

    let CycleOutcome::Completed { realized_profit } = outcome else {
        panic!("expected cycle to complete, got {outcome:?}");
    };
    assert!(realized_profit > Decimal::ZERO);
    assert_eq!(manager.state(), CycleState::Completed);
    assert_eq!(manager.cycle().status, CycleStatus::Completed);
    assert_eq!(manager.cycle().total_base_quantity, Decimal::ZERO);
    assert_eq!(manager.cycle().realized_profit, Some(realized_profit));
}

/// A bot is stopped while holding an open position and an unfilled safety order: the safety
/// order and take-profit are cancelled, the remaining base quantity is liquidated, and the
/// cycle is marked aborted with realized profit computed from what actually traded.
#[sqlx::test(migrations = "../persistence/migrations")]
async fn stop_bot_with_partial_position_cancels_and_liquidates(pool: PgPool) {
    let client = MockExecutionClient::new();
    let supervisor: std::sync::Arc<BotSupervisor<MockExecutionClient>> = BotSupervisor::new(
        client.clone(),
        BotRepository::new(pool.clone()),
        OrderRepository::new(pool.clone()),
        CycleRepository::new(pool.clone()),
    );

    let bot = supervisor
        .create_bot(
            "user-1",
            "acct-1",
            "scenario-d",
            "BTCUSDT",
            Direction::Long,
            martingale_params(),
        )
        .await
        .unwrap();

    supervisor.start_bot(&bot.id).await.unwrap();

    let orders = OrderRepository::new(pool.clone());
    let base_order = orders
        .list_by_bot(&bot.id)
        .await
        .unwrap()
        .into_iter()
        .find(|order| order.role == OrderRole::Base)
        .unwrap();

    let mut notifications = supervisor.subscribe();
    let run_handle = {
        let supervisor = supervisor.clone();
        let instrument = InstrumentNameExchange::new("BTCUSDT");
        tokio::spawn(async move {
            let _ = supervisor.run(&[], std::slice::from_ref(&instrument)).await;
        })
    };

    // Give the spawned run() loop a chance to subscribe to the account stream before
    // publishing - a broadcast send with no subscriber yet would otherwise be lost.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Base order fills, which ladders in a safety order and a take-profit - both still open
    // when the bot is stopped below.
    client.publish(AccountEvent::new(
        ExchangeId::Other,
        Trade::new(
            TradeId::new("trade-base"),
            InstrumentNameExchange::new("BTCUSDT"),
            base_order.exchange_order_id.clone().unwrap(),
            chrono::Utc::now(),
            Side::Buy,
            dec!(50000),
            dec!(0.002),
            AssetFees::default(),
        ),
    ));

    // `CycleUpdate` only fires once `handle_event` (and everything it persists - the safety
    // order, the re-priced take-profit) has already committed, unlike the earlier `OrderUpdate`
    // which is published before that work even starts.
    loop {
        match notifications.recv().await.unwrap() {
            BotNotification::CycleUpdate { .. } => break,
            _ => continue,
        }
    }
    run_handle.abort();

    let open_before_stop = orders
        .list_by_bot(&bot.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|order| order.status == OrderStatus::Open)
        .count();
    assert_eq!(open_before_stop, 2, "expected the safety order and take-profit still open");

    supervisor.stop_bot(&bot.id).await.unwrap();

    let bots = BotRepository::new(pool.clone());
    let refreshed = bots.find(&bot.id).await.unwrap();
    assert_eq!(refreshed.status, BotStatus::Inactive);

    let final_orders = orders.list_by_bot(&bot.id).await.unwrap();
    assert!(
        final_orders
            .iter()
            .filter(|order| order.role == OrderRole::Safety || order.role == OrderRole::TakeProfit)
            .all(|order| order.status == OrderStatus::Cancelled),
        "safety and take-profit orders should be cancelled on stop"
    );
    let liquidation = final_orders
        .iter()
        .find(|order| order.role == OrderRole::Liquidation)
        .expect("stop_bot should liquidate the remaining base quantity");
    assert_eq!(liquidation.intended_quantity, dec!(0.002));
}
