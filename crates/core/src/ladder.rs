use crate::validation::geometric_term;
use gridforge_persistence::models::bot::BotParams;
use rust_decimal::Decimal;

/// One rung of the safety-order ladder: how far below (or above, for a short) the base entry it
/// triggers, and how large the order is relative to `safety_order_amount`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyRung {
    pub index: u32,
    pub price_deviation_pct: Decimal,
    pub size_multiplier: Decimal,
}

/// Builds the full ladder from `params`, deepest rung last. Rung `n` (1-indexed) deviates by
/// `price_deviation_pct * price_deviation_multiplier^(n-1)` and sizes at
/// `safety_order_amount * safety_order_size_multiplier^(n-1)`.
pub fn compute_ladder(params: &BotParams) -> Vec<SafetyRung> {
    (1..=params.max_safety_orders)
        .map(|n| SafetyRung {
            index: n,
            price_deviation_pct: geometric_term(
                params.price_deviation_pct,
                params.price_deviation_multiplier,
                n,
            ),
            size_multiplier: geometric_term(
                Decimal::ONE,
                params.safety_order_size_multiplier,
                n,
            ),
        })
        .collect()
}

/// The limit price a rung triggers at, given `base_price` (the base order's fill price) and
/// `direction_sign` (`1` for long - price falls to trigger a safety buy; `-1` for short - price
/// rises to trigger a safety sell).
pub fn rung_trigger_price(base_price: Decimal, rung: &SafetyRung, direction_sign: Decimal) -> Decimal {
    let offset = base_price * rung.price_deviation_pct / Decimal::ONE_HUNDRED;
    base_price - direction_sign * offset
}

/// The quote amount to spend on a given rung's safety order.
pub fn rung_order_amount(params: &BotParams, rung: &SafetyRung) -> Decimal {
    params.safety_order_amount * rung.size_multiplier
}

/// Re-prices the take-profit order against the current `average_entry_price`, per the direction
/// of the cycle. Long cycles take profit above entry; short cycles take profit below it.
pub fn take_profit_price(
    average_entry_price: Decimal,
    take_profit_pct: Decimal,
    direction_sign: Decimal,
) -> Decimal {
    let offset = average_entry_price * take_profit_pct / Decimal::ONE_HUNDRED;
    average_entry_price + direction_sign * offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_persistence::models::bot::TakeProfitMode;
    use rust_decimal_macros::dec;

    fn params() -> BotParams {
        BotParams {
            base_order_amount: dec!(100),
            safety_order_amount: dec!(100),
            max_safety_orders: 3,
            active_safety_orders: 2,
            price_deviation_pct: dec!(2),
            price_deviation_multiplier: dec!(1.5),
            safety_order_size_multiplier: dec!(1.2),
            take_profit_pct: dec!(1),
            take_profit_mode: TakeProfitMode::Fixed,
            trailing_pct: None,
            cooldown_between_rounds_seconds: 60,
            lower_price_limit: None,
            upper_price_limit: None,
        }
    }

    #[test]
    fn ladder_deviations_compound_geometrically() {
        let ladder = compute_ladder(&params());
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder[0].price_deviation_pct, dec!(2));
        assert_eq!(ladder[1].price_deviation_pct, dec!(3.0));
        assert_eq!(ladder[2].price_deviation_pct, dec!(4.50));
    }

    #[test]
    fn long_rung_price_falls_below_base() {
        let ladder = compute_ladder(&params());
        let price = rung_trigger_price(dec!(100), &ladder[0], Decimal::ONE);
        assert_eq!(price, dec!(98));
    }

    #[test]
    fn short_rung_price_rises_above_base() {
        let ladder = compute_ladder(&params());
        let price = rung_trigger_price(dec!(100), &ladder[0], -Decimal::ONE);
        assert_eq!(price, dec!(102));
    }

    #[test]
    fn take_profit_above_entry_for_long() {
        let price = take_profit_price(dec!(100), dec!(1), Decimal::ONE);
        assert_eq!(price, dec!(101));
    }

    #[test]
    fn take_profit_below_entry_for_short() {
        let price = take_profit_price(dec!(100), dec!(1), -Decimal::ONE);
        assert_eq!(price, dec!(99));
    }
}
