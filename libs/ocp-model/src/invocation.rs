//! The single entry point's parameters (spec.md §6 "Invocation").

use rust_decimal::Decimal;
use uuid::Uuid;

/// Which ratio drives cost attribution in C12 — spec.md §6
/// `cost.distribution`, default `Max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CostDistribution {
    Cpu,
    Memory,
    #[default]
    Max,
}

/// Parameters of a single pipeline invocation — spec.md §6. The host
/// workflow system (out of scope, §1) supplies one of these per run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub tenant_id: String,
    pub ocp_provider_id: Uuid,
    pub cloud_provider_id: Option<Uuid>,
    pub year: i32,
    pub month: u32,
    pub days: Option<Vec<u32>>,
    pub cluster_id: Option<String>,
    pub markup_rate: Option<Decimal>,
    pub cost_distribution: CostDistribution,
}

impl RunRequest {
    /// A container-on-cloud run requires both a cloud provider id and
    /// matches attribution-engine stages (C8–C13); without one, only the
    /// container-only engine (C3–C7) runs.
    pub fn is_container_on_cloud(&self) -> bool {
        self.cloud_provider_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_only_run_has_no_cloud_provider() {
        let req = RunRequest {
            tenant_id: "acme".into(),
            ocp_provider_id: Uuid::nil(),
            cloud_provider_id: None,
            year: 2026,
            month: 7,
            days: None,
            cluster_id: None,
            markup_rate: None,
            cost_distribution: CostDistribution::default(),
        };
        assert!(!req.is_container_on_cloud());
    }
}
