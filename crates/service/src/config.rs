//! Service configuration loaded from environment variables.

use paceline_core::curve::DEFAULT_EXPONENT;

/// Tunables for the service layer.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Convexity exponent applied when a user picks the exponential
    /// progress curve. A product/tuning parameter, must exceed 1.
    pub curve_exponent: f64,
    /// Buffer capacity of the in-process event bus.
    pub event_bus_capacity: usize,
    /// Upper bound on the number of days a generated plan may span.
    pub max_plan_days: u32,
    /// Items per day when a plan request does not specify one.
    pub default_items_per_day: u32,
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `PROGRESS_CURVE_EXPONENT`| `2.0`   |
    /// | `EVENT_BUS_CAPACITY`     | `1024`  |
    /// | `MAX_PLAN_DAYS`          | `90`    |
    /// | `DEFAULT_ITEMS_PER_DAY`  | `3`     |
    pub fn from_env() -> Self {
        let curve_exponent = env_f64("PROGRESS_CURVE_EXPONENT", DEFAULT_EXPONENT);
        assert!(
            curve_exponent > 1.0,
            "PROGRESS_CURVE_EXPONENT must be greater than 1"
        );

        Self {
            curve_exponent,
            event_bus_capacity: env_usize("EVENT_BUS_CAPACITY", paceline_events::DEFAULT_CAPACITY),
            max_plan_days: env_u32("MAX_PLAN_DAYS", 90),
            default_items_per_day: env_u32("DEFAULT_ITEMS_PER_DAY", 3),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            curve_exponent: DEFAULT_EXPONENT,
            event_bus_capacity: paceline_events::DEFAULT_CAPACITY,
            max_plan_days: 90,
            default_items_per_day: 3,
        }
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid float")),
        Err(_) => default,
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u32")),
        Err(_) => default,
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid usize")),
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
