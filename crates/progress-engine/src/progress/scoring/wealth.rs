use crate::config::WealthConfig;

/// Logarithmic balance curve; non-positive balances score zero.
pub fn score(balance: f64, config: &WealthConfig) -> f64 {
    if !balance.is_finite() || balance <= 0.0 {
        return 0.0;
    }
    let base = (balance.log10() / config.max_balance.log10() * 100.0).clamp(0.0, 100.0);
    (base + config.bonus_for(balance)).min(100.0)
}
