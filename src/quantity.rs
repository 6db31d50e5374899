#[macro_use]
pub mod macros;

pub mod energy;
pub mod power;
pub mod ratios;

/// Round half to even, the way the host platform rounds displayed values.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
