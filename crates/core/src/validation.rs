use crate::error::CoreError;
use gridforge_persistence::models::bot::BotParams;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Deepest scheduled safety deviation cannot exceed this, not 100% - a deviation any closer to
/// 100% leaves too little room for `quantize_price` to round a safety rung to a positive price.
const MAX_DEEPEST_DEVIATION_PCT: Decimal = dec!(99.99);

/// Checks the `Bot.params` invariants before `create_bot` persists anything: `active_safety_orders
/// <= max_safety_orders - 1`, and that the deepest scheduled safety deviation stays at or below
/// [`MAX_DEEPEST_DEVIATION_PCT`].
pub fn validate_params(params: &BotParams) -> Result<(), CoreError> {
    if params.max_safety_orders == 0 {
        if params.active_safety_orders != 0 {
            return Err(CoreError::Validation(
                "active_safety_orders must be 0 when max_safety_orders is 0".into(),
            ));
        }
    } else if params.active_safety_orders > params.max_safety_orders - 1 {
        return Err(CoreError::Validation(format!(
            "active_safety_orders ({}) must be <= max_safety_orders - 1 ({})",
            params.active_safety_orders,
            params.max_safety_orders - 1
        )));
    }

    if params.max_safety_orders > 0 {
        let deepest_deviation = geometric_term(
            params.price_deviation_pct,
            params.price_deviation_multiplier,
            params.max_safety_orders,
        );

        if deepest_deviation > MAX_DEEPEST_DEVIATION_PCT {
            return Err(CoreError::Validation(format!(
                "deepest safety deviation {deepest_deviation}% exceeds {MAX_DEEPEST_DEVIATION_PCT}%"
            )));
        }
    }

    if params.take_profit_pct <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "take_profit_pct must be positive".into(),
        ));
    }

    if params.base_order_amount <= Decimal::ZERO || params.safety_order_amount <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "base_order_amount and safety_order_amount must be positive".into(),
        ));
    }

    Ok(())
}

/// `base * multiplier^(n-1)`, computed by repeated multiplication rather than a decimal `powi` -
/// `n` is bounded by `max_safety_orders`, which is never more than a few dozen in practice.
pub(crate) fn geometric_term(base: Decimal, multiplier: Decimal, n: u32) -> Decimal {
    let mut term = base;
    for _ in 1..n {
        term *= multiplier;
    }
    term
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_persistence::models::bot::TakeProfitMode;
    use rust_decimal_macros::dec;

    fn valid_params() -> BotParams {
        BotParams {
            base_order_amount: dec!(100),
            safety_order_amount: dec!(100),
            max_safety_orders: 5,
            active_safety_orders: 2,
            price_deviation_pct: dec!(1),
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
    fn accepts_well_formed_params() {
        assert!(validate_params(&valid_params()).is_ok());
    }

    #[test]
    fn rejects_active_exceeding_max_minus_one() {
        let mut params = valid_params();
        params.active_safety_orders = params.max_safety_orders;
        assert!(validate_params(&params).is_err());
    }

    #[test]
    fn zero_max_safety_orders_requires_zero_active() {
        let mut params = valid_params();
        params.max_safety_orders = 0;
        params.active_safety_orders = 0;
        assert!(validate_params(&params).is_ok());

        params.active_safety_orders = 1;
        assert!(validate_params(&params).is_err());
    }

    #[test]
    fn rejects_deviation_past_100_percent() {
        let mut params = valid_params();
        params.price_deviation_pct = dec!(40);
        params.price_deviation_multiplier = dec!(2);
        params.max_safety_orders = 3;
        // deepest = 40 * 2^2 = 160% >= 100%
        assert!(validate_params(&params).is_err());
    }

    #[test]
    fn accepts_deviation_at_exactly_the_cap() {
        let mut params = valid_params();
        params.price_deviation_pct = dec!(99.99);
        params.price_deviation_multiplier = dec!(1);
        params.max_safety_orders = 1;
        assert!(validate_params(&params).is_ok());
    }

    #[test]
    fn rejects_deviation_just_above_the_cap() {
        let mut params = valid_params();
        params.price_deviation_pct = dec!(99.995);
        params.price_deviation_multiplier = dec!(1);
        params.max_safety_orders = 1;
        assert!(validate_params(&params).is_err());
    }
}
