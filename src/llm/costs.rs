//! Per-token pricing table (USD).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Price per (input, output) token for a model, by name prefix.
/// Unknown models are treated as free rather than guessed.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let per_million = match model {
        m if m.starts_with("gemini-1.5-pro") => (dec!(1.25), dec!(5.00)),
        m if m.starts_with("gemini-1.5-flash") => (dec!(0.075), dec!(0.30)),
        m if m.starts_with("gemini-2.0-flash") => (dec!(0.10), dec!(0.40)),
        m if m.starts_with("gemini-2.5-pro") => (dec!(1.25), dec!(10.00)),
        m if m.starts_with("gemini-2.5-flash") => (dec!(0.30), dec!(2.50)),
        m if m.starts_with("claude-3-5-haiku") => (dec!(0.80), dec!(4.00)),
        m if m.starts_with("claude") => (dec!(3.00), dec!(15.00)),
        m if m.starts_with("gpt-4o-mini") => (dec!(0.15), dec!(0.60)),
        m if m.starts_with("gpt-4o") => (dec!(2.50), dec!(10.00)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

/// Estimated cost of one call.
pub fn estimate(costs: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    costs.0 * Decimal::from(input_tokens) + costs.1 * Decimal::from(output_tokens)
}
