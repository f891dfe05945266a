/*
[INPUT]:  Raw decimal prices, the instrument tick size, and ladder parameters
[OUTPUT]: Tick-aligned prices, layer offsets, TP targets, tick distances
[POS]:    Arithmetic layer - exact decimal price math
[UPDATE]: When ladder geometry or rounding rules change
*/

use rust_decimal::Decimal;

/// Round to the nearest multiple of the tick, rescaled to the tick's decimal
/// places so serialized prices never pick up stray digits.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    let steps = (price / tick).round();
    let mut aligned = steps * tick;
    aligned.rescale(tick.scale());
    aligned
}

/// Price of one BUY ladder layer below the best bid. Layer 0 is closest.
pub fn layer_price(
    best_bid: Decimal,
    layer: u32,
    offset_ticks: u32,
    layer_step_ticks: u32,
    tick: Decimal,
) -> Decimal {
    let ticks_below = Decimal::from(offset_ticks + layer * layer_step_ticks);
    round_to_tick(best_bid - ticks_below * tick, tick)
}

/// Take-profit target for a filled buy.
pub fn tp_price(buy_price: Decimal, tp_ticks: u32, tick: Decimal) -> Decimal {
    round_to_tick(buy_price + Decimal::from(tp_ticks) * tick, tick)
}

/// Distance between two prices expressed in ticks.
pub fn tick_distance(price: Decimal, reference: Decimal, tick: Decimal) -> Decimal {
    (price - reference).abs() / tick
}

/// Price equality on the tick grid: within half a tick.
pub fn same_price(a: Decimal, b: Decimal, tick: Decimal) -> bool {
    (a - b).abs() * Decimal::TWO < tick
}
