use std::time::Duration;

/// Runtime tunables of the roster fetching pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a manual reload is blocked after a fetch starts
    pub cooldown: Duration,
    /// Factor applied to the cooldown after a failed fetch
    pub error_cooldown_multiplier: u32,
    /// How old a tracked guild's roster may get before it is fetched again
    pub stale_after: Duration,
    /// Fixed wait before each background guild refresh
    pub refresh_delay: Duration,
}

impl Config {
    /// How long to wait before retrying a failed fetch
    pub fn error_cooldown(&self) -> Duration {
        self.cooldown * self.error_cooldown_multiplier
    }

    /// The staleness window as a chrono duration, for comparing against stored timestamps
    pub fn stale_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            error_cooldown_multiplier: 2,
            stale_after: Duration::from_secs(60 * 60),
            // Keeps background refreshes from bursting the lookup service
            refresh_delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Config;

    #[test]
    fn error_cooldown_scales_base_cooldown() {
        let config = Config::default();

        assert_eq!(config.error_cooldown(), Duration::from_secs(20));
        assert_eq!(config.stale_after_chrono(), chrono::Duration::hours(1));
    }
}
