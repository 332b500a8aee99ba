use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An exchange's declared tick/step/min-notional rules for a single
/// instrument, cached by the Exchange Gateway and refreshed whenever
/// a placement attempt comes back rejected for violating a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstrumentSpec {
    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub min_notional: Decimal,
    pub price_decimals: u32,
    pub qty_decimals: u32,
}

impl InstrumentSpec {
    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        quantize_price(price, self.tick_size, self.price_decimals)
    }

    pub fn quantize_quantity(
        &self,
        price: Decimal,
        qty: Decimal,
    ) -> Result<Decimal, QuantizeError> {
        quantize_quantity(
            price,
            qty,
            self.step_size,
            self.qty_decimals,
            self.min_qty,
            self.min_notional,
        )
    }
}

/// A failure quantizing an order's price or quantity against an
/// [`InstrumentSpec`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("quantized notional {notional} is below min_notional {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },
    #[error("quantity did not converge after {0} passes")]
    DidNotConverge(u8),
}

/// Multi-pass guard - re-snapping a quantity against `step_size` can in rare
/// cases shift it across a decimal boundary that truncation then undoes.
/// Three passes is enough headroom for any filter combination an exchange is
/// likely to publish; a fourth failed attempt means the filters themselves
/// are inconsistent.
const MAX_PASSES: u8 = 3;

/// `round_half_to_even(price / tick_size) * tick_size`, truncated to
/// `price_decimals`.
pub fn quantize_price(price: Decimal, tick_size: Decimal, price_decimals: u32) -> Decimal {
    if tick_size.is_zero() {
        return price.trunc_with_scale(price_decimals);
    }

    let ticks = (price / tick_size)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    (ticks * tick_size).trunc_with_scale(price_decimals)
}

/// `floor(qty / step_size) * step_size`, truncated to `qty_decimals`, floored
/// up to `min_qty`, then checked against `min_notional`.
pub fn quantize_quantity(
    price: Decimal,
    qty: Decimal,
    step_size: Decimal,
    qty_decimals: u32,
    min_qty: Decimal,
    min_notional: Decimal,
) -> Result<Decimal, QuantizeError> {
    let mut candidate = qty;

    for _ in 0..MAX_PASSES {
        let snapped = snap_quantity(candidate, step_size, qty_decimals);
        let floored = if snapped < min_qty { min_qty } else { snapped };

        let notional = price * floored;
        if notional < min_notional {
            return Err(QuantizeError::BelowMinNotional {
                notional,
                min_notional,
            });
        }

        if snap_quantity(floored, step_size, qty_decimals) == floored {
            return Ok(floored);
        }
        candidate = floored;
    }

    Err(QuantizeError::DidNotConverge(MAX_PASSES))
}

fn snap_quantity(qty: Decimal, step_size: Decimal, qty_decimals: u32) -> Decimal {
    let snapped = if step_size.is_zero() {
        qty
    } else {
        (qty / step_size).floor() * step_size
    };
    snapped.trunc_with_scale(qty_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_usdt() -> InstrumentSpec {
        InstrumentSpec {
            tick_size: dec!(0.01),
            step_size: dec!(0.00001),
            min_qty: dec!(0.00001),
            min_notional: dec!(10),
            price_decimals: 2,
            qty_decimals: 5,
        }
    }

    #[test]
    fn price_snaps_to_tick_and_rounds_half_to_even() {
        let spec = btc_usdt();
        // 30000.005 / 0.01 = 3000000.5 ticks -> rounds to even (3000000) -> 30000.00
        assert_eq!(spec.quantize_price(dec!(30000.005)), dec!(30000.00));
        // 30000.015 / 0.01 = 3000001.5 ticks -> rounds to even (3000002) -> 30000.02
        assert_eq!(spec.quantize_price(dec!(30000.015)), dec!(30000.02));
    }

    #[test]
    fn quantity_floors_to_step_and_truncates() {
        let spec = btc_usdt();
        let qty = spec
            .quantize_quantity(dec!(30000), dec!(0.123456789))
            .unwrap();
        assert_eq!(qty, dec!(0.12345));
    }

    #[test]
    fn quantity_below_min_notional_fails() {
        let spec = btc_usdt();
        let err = spec.quantize_quantity(dec!(30000), dec!(0.00001)).unwrap_err();
        assert!(matches!(err, QuantizeError::BelowMinNotional { .. }));
    }

    #[test]
    fn quantity_floors_up_to_min_qty() {
        let mut spec = btc_usdt();
        spec.min_qty = dec!(0.001);
        spec.min_notional = dec!(1);
        let qty = spec.quantize_quantity(dec!(30000), dec!(0.0005)).unwrap();
        assert_eq!(qty, dec!(0.001));
    }

    #[test]
    fn quantize_quantity_is_idempotent() {
        let spec = btc_usdt();
        let once = spec.quantize_quantity(dec!(30000), dec!(0.123456789)).unwrap();
        let twice = spec.quantize_quantity(dec!(30000), once).unwrap();
        assert_eq!(once, twice);
    }
}
