//! Engine configuration

use surveyor_planner::PlannerServiceConfig;

pub struct EngineConfig {
    /// Keep schema-violating artifacts on disk and in the store, flagged
    /// untrusted, instead of discarding them.
    pub retain_untrusted: bool,
    pub planner: PlannerServiceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retain_untrusted: true,
            planner: PlannerServiceConfig::default(),
        }
    }
}
