//! The small, read-only metadata tables of spec.md §3: the enabled-tag-key
//! allow-list, cost-category `LIKE` patterns, and node-role map. Loaded once
//! per run by `ocp-sink` and held as an `Arc<MetadataSnapshot>` — spec.md §5
//! "the (immutable after load) enabled-tag-key allow-list... node-role map".

use std::collections::HashMap;

/// `ocp_nodes.node_role` — spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum NodeRole {
    Master,
    Infra,
    Worker,
}

/// One row of `cost_category_namespace`: a SQL-`LIKE` pattern and the
/// category id it maps to. `namespace` keeps its original `LIKE` form;
/// compiling it into a prefix/suffix/contains predicate is
/// `ocp_container::labels::CostCategoryMatcher`'s job (spec.md §9 redesign
/// note on `LIKE` patterns).
#[derive(Debug, Clone)]
pub struct CostCategoryPattern {
    pub pattern: String,
    pub cost_category_id: i32,
}

/// Immutable, run-scoped snapshot of the three metadata tables plus the
/// derived allow-list (`vm_kubevirt_io_name` prepended to the alphabetically
/// sorted enabled keys — spec.md §4.3).
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    enabled_tag_keys: Vec<String>,
    cost_category_patterns: Vec<CostCategoryPattern>,
    node_roles: HashMap<String, NodeRole>,
    node_resource_ids: HashMap<String, String>,
}

/// Key that is always a member of the allow-list regardless of its `enabled`
/// flag in the metadata table — spec.md §4.3, and Open Question Q4 (resolved
/// in DESIGN.md: always included, matching "source always includes it
/// regardless").
pub const ALWAYS_ENABLED_TAG_KEY: &str = "vm_kubevirt_io_name";

impl MetadataSnapshot {
    /// `enabled_keys` must already be filtered to `enabled = true` rows and
    /// need not be sorted or deduplicated; this constructor does both and
    /// prepends `vm_kubevirt_io_name`.
    pub fn new(
        mut enabled_keys: Vec<String>,
        cost_category_patterns: Vec<CostCategoryPattern>,
        nodes: Vec<(String, String, Option<NodeRole>)>,
    ) -> Self {
        enabled_keys.sort();
        enabled_keys.dedup();
        enabled_keys.retain(|k| k != ALWAYS_ENABLED_TAG_KEY);

        let mut allow_list = Vec::with_capacity(enabled_keys.len() + 1);
        allow_list.push(ALWAYS_ENABLED_TAG_KEY.to_string());
        allow_list.extend(enabled_keys);

        let mut node_roles = HashMap::new();
        let mut node_resource_ids = HashMap::new();
        for (node, resource_id, role) in nodes {
            node_resource_ids.insert(node.clone(), resource_id);
            if let Some(role) = role {
                node_roles.insert(node, role);
            }
        }

        Self {
            enabled_tag_keys: allow_list,
            cost_category_patterns,
            node_roles,
            node_resource_ids,
        }
    }

    pub fn enabled_tag_keys(&self) -> &[String] {
        &self.enabled_tag_keys
    }

    pub fn is_tag_enabled(&self, key: &str) -> bool {
        self.enabled_tag_keys.iter().any(|k| k == key)
    }

    pub fn cost_category_patterns(&self) -> &[CostCategoryPattern] {
        &self.cost_category_patterns
    }

    pub fn node_role(&self, node: &str) -> Option<NodeRole> {
        self.node_roles.get(node).copied()
    }

    pub fn node_resource_id(&self, node: &str) -> Option<&str> {
        self.node_resource_ids.get(node).map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.node_resource_ids
            .iter()
            .map(|(node, resource_id)| (node.as_str(), resource_id.as_str()))
    }
}
