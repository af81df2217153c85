use crate::config::ExperienceConfig;

pub fn score(level: u32, config: &ExperienceConfig) -> f64 {
    if level == 0 {
        return 0.0;
    }
    let level_f = f64::from(level);
    let max = f64::from(config.max_level);

    let base = if config.diminishing_returns {
        (level_f + 1.0).ln() / (max + 1.0).ln() * 100.0
    } else {
        (level_f / max * 100.0).min(100.0)
    };

    let bonus = config
        .level_bonuses
        .range(..=level)
        .map(|(_, bonus)| *bonus)
        .fold(0.0, f64::max);

    (base + bonus).min(100.0)
}
