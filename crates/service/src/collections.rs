//! Document store collection names.

/// Behavior aggregates (goals, challenges, habits).
pub const BEHAVIORS: &str = "behaviors";

/// Plan aggregates.
pub const PLANS: &str = "plans";

/// Per-user plan materializations.
pub const USER_PLANS: &str = "user_plans";

/// Pending and responded shares.
pub const SHARES: &str = "shares";
