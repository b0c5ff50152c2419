//! Tag matcher (C9, spec.md §4.9): for cloud rows the resource matcher
//! couldn't place, falls back to matching resource tags against observed
//! container identifiers.

use std::collections::HashSet;

use ocp_container::LabelMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchedTarget {
    Cluster,
    Node,
    Namespace(String),
    Label { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub matched_tag: String,
    pub target: MatchedTarget,
}

/// The container-side identifiers C9 matches tag values against, collected
/// once per run from the pod/storage/node-label datasets already read for
/// C3-C7.
pub struct ObservedContainerKeys<'a> {
    pub cluster_ids: &'a HashSet<String>,
    pub cluster_aliases: &'a HashSet<String>,
    pub nodes: &'a HashSet<String>,
    pub namespaces: &'a HashSet<String>,
    /// Every `(label_key, label_value)` pair observed on pod or volume
    /// labels, for the generic "tag value matches a label" rule.
    pub label_pairs: &'a HashSet<(String, String)>,
}

const OPENSHIFT_CLUSTER: &str = "openshift_cluster";
const OPENSHIFT_NODE: &str = "openshift_node";
const OPENSHIFT_PROJECT: &str = "openshift_project";

/// `tags` must already be parsed and filtered to the enabled-key allow-set
/// (spec.md §4.9 "filtered to the enabled-key allow-set"). Returns the
/// first rule that fires, in tag-key order (the map's natural iteration
/// order, since `LabelMap` is a `BTreeMap`).
pub fn match_tags(tags: &LabelMap, observed: &ObservedContainerKeys) -> Option<TagMatch> {
    for (key, value) in tags {
        let target = match key.as_str() {
            OPENSHIFT_CLUSTER
                if observed.cluster_ids.contains(value) || observed.cluster_aliases.contains(value) =>
            {
                Some(MatchedTarget::Cluster)
            }
            OPENSHIFT_NODE if observed.nodes.contains(value) => Some(MatchedTarget::Node),
            OPENSHIFT_PROJECT if observed.namespaces.contains(value) => {
                Some(MatchedTarget::Namespace(value.clone()))
            }
            _ if observed.label_pairs.contains(&(key.clone(), value.clone())) => {
                Some(MatchedTarget::Label { key: key.clone(), value: value.clone() })
            }
            _ => None,
        };
        if let Some(target) = target {
            return Some(TagMatch { matched_tag: key.clone(), target });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn openshift_cluster_tag_matches_cluster_alias() {
        let mut tags = LabelMap::new();
        tags.insert(OPENSHIFT_CLUSTER.to_string(), "prod-alias".to_string());
        let cluster_ids = keys(&[]);
        let cluster_aliases = keys(&["prod-alias"]);
        let nodes = keys(&[]);
        let namespaces = keys(&[]);
        let label_pairs = HashSet::new();
        let observed = ObservedContainerKeys {
            cluster_ids: &cluster_ids,
            cluster_aliases: &cluster_aliases,
            nodes: &nodes,
            namespaces: &namespaces,
            label_pairs: &label_pairs,
        };
        let result = match_tags(&tags, &observed).unwrap();
        assert_eq!(result.target, MatchedTarget::Cluster);
        assert_eq!(result.matched_tag, OPENSHIFT_CLUSTER);
    }

    #[test]
    fn generic_rule_matches_on_label_key_value_pair() {
        let mut tags = LabelMap::new();
        tags.insert("team".to_string(), "payments".to_string());
        let empty = keys(&[]);
        let mut label_pairs = HashSet::new();
        label_pairs.insert(("team".to_string(), "payments".to_string()));
        let observed = ObservedContainerKeys {
            cluster_ids: &empty,
            cluster_aliases: &empty,
            nodes: &empty,
            namespaces: &empty,
            label_pairs: &label_pairs,
        };
        let result = match_tags(&tags, &observed).unwrap();
        assert_eq!(
            result.target,
            MatchedTarget::Label { key: "team".to_string(), value: "payments".to_string() }
        );
    }

    #[test]
    fn no_rule_firing_yields_none() {
        let mut tags = LabelMap::new();
        tags.insert("unrelated".to_string(), "value".to_string());
        let empty = keys(&[]);
        let label_pairs = HashSet::new();
        let observed = ObservedContainerKeys {
            cluster_ids: &empty,
            cluster_aliases: &empty,
            nodes: &empty,
            namespaces: &empty,
            label_pairs: &label_pairs,
        };
        assert!(match_tags(&tags, &observed).is_none());
    }
}
