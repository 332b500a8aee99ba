use chrono::{DateTime, Utc};
use gridforge_execution::order::id::{BotId, ClientOrderId, OrderId};
use gridforge_persistence::models::order::OrderStatus;
use rust_decimal::Decimal;

/// A normalised execution report, translated from an [`gridforge_execution::AccountEventKind`] by
/// the supervisor's routing layer before it reaches a [`crate::cycle::CycleManager`]. Distinct
/// from [`gridforge_persistence::order_repository::ExecutionReport`] only in that it also carries
/// the `bot`/`event_time` needed for ordering and routing, which the repository-facing type does
/// not need once an order has already been matched to a cycle.
#[derive(Debug, Clone)]
pub struct ExecutionReportEvent {
    pub bot: BotId,
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<OrderId>,
    pub status: OrderStatus,
    pub filled_price: Option<Decimal>,
    pub filled_quantity: Decimal,
    pub event_time: DateTime<Utc>,
}

/// Input the supervisor feeds into a bot's [`crate::cycle::CycleManager`].
#[derive(Debug, Clone)]
pub enum CycleEvent {
    ExecutionReport(ExecutionReportEvent),
    PriceUpdate(Decimal),
    StreamGap,
}

/// Sort key used when several execution reports for the same cycle arrive in one batch (eg/
/// after a reconnect replays a backlog): strict `event_time` order; ties broken so a take-profit
/// fill is always processed before a safety fill at the same timestamp (closing the cycle takes
/// priority over laddering further into it); remaining ties broken by `client_order_id`.
pub fn ordering_key(
    event: &ExecutionReportEvent,
    is_take_profit: bool,
) -> (DateTime<Utc>, u8, String) {
    let role_rank = if is_take_profit { 0 } else { 1 };
    (event.event_time, role_rank, event.client_order_id.0.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(event_time: DateTime<Utc>, cid: &str) -> ExecutionReportEvent {
        ExecutionReportEvent {
            bot: BotId::new("bot-1"),
            client_order_id: ClientOrderId::new(cid),
            exchange_order_id: None,
            status: OrderStatus::Filled,
            filled_price: Some(Decimal::ONE),
            filled_quantity: Decimal::ONE,
            event_time,
        }
    }

    #[test]
    fn take_profit_sorts_before_safety_at_same_instant() {
        let t = Utc::now();
        let tp = report(t, "tp-order");
        let safety = report(t, "aa-order");

        let mut keys = vec![
            (ordering_key(&safety, false), "safety"),
            (ordering_key(&tp, true), "tp"),
        ];
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(keys[0].1, "tp");
    }

    #[test]
    fn equal_rank_breaks_tie_by_client_order_id() {
        let t = Utc::now();
        let a = report(t, "aaa");
        let b = report(t, "bbb");

        let mut keys = vec![ordering_key(&b, false), ordering_key(&a, false)];
        keys.sort();

        assert_eq!(keys[0].2, "aaa");
    }
}
