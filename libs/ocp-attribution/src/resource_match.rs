//! Resource matcher (C8, spec.md §4.8): matches a cloud line-item's
//! `lineitem_resourceid` against container nodes (suffix match) and storage
//! volumes (substring match on CSI handle, then on PV name).
//!
//! **Open Question Q2 (already resolved by the spec's own text, restated in
//! DESIGN.md):** ties among multiple equally-valid suffix matches are broken
//! by longest match first, then lexicographically smallest match key.

use ocp_model::{AuditKind, AuditLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Node,
    CsiVolume,
    PvName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMatch {
    pub match_key: String,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone)]
pub struct NodeResource {
    pub node: String,
    pub resource_id: String,
}

#[derive(Debug, Clone)]
pub struct VolumeResource {
    pub persistentvolume: String,
    pub csi_volume_handle: Option<String>,
    pub persistentvolumeclaim: String,
    pub namespace: String,
}

pub struct ResourceMatcher<'a> {
    nodes: &'a [NodeResource],
    volumes: &'a [VolumeResource],
}

impl<'a> ResourceMatcher<'a> {
    pub fn new(nodes: &'a [NodeResource], volumes: &'a [VolumeResource]) -> Self {
        Self { nodes, volumes }
    }

    pub fn volumes(&self) -> &'a [VolumeResource] {
        self.volumes
    }

    pub fn nodes(&self) -> &'a [NodeResource] {
        self.nodes
    }

    /// `resource_id_matched = true` if at least one rule fires; the best
    /// node match and the best volume match (CSI handle takes priority over
    /// PV name when both would fire) are returned independently since they
    /// cover disjoint resource kinds.
    pub fn matches(&self, lineitem_resourceid: &str, audit: &mut AuditLog) -> Vec<ResourceMatch> {
        let mut out = Vec::new();
        if let Some(node_match) = self.best_node_match(lineitem_resourceid, audit) {
            out.push(node_match);
        }
        if let Some(volume_match) = self.best_volume_match(lineitem_resourceid, audit) {
            out.push(volume_match);
        }
        out
    }

    fn best_node_match(&self, lineitem_resourceid: &str, audit: &mut AuditLog) -> Option<ResourceMatch> {
        let candidates: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| !n.resource_id.is_empty() && lineitem_resourceid.ends_with(n.resource_id.as_str()))
            .map(|n| n.resource_id.as_str())
            .collect();
        pick_longest_then_lex_min(candidates, audit).map(|key| ResourceMatch { match_key: key, match_kind: MatchKind::Node })
    }

    fn best_volume_match(&self, lineitem_resourceid: &str, audit: &mut AuditLog) -> Option<ResourceMatch> {
        let csi_candidates: Vec<&str> = self
            .volumes
            .iter()
            .filter_map(|v| v.csi_volume_handle.as_deref())
            .filter(|handle| !handle.is_empty() && lineitem_resourceid.contains(handle))
            .collect();
        if let Some(key) = pick_longest_then_lex_min(csi_candidates, audit) {
            return Some(ResourceMatch { match_key: key, match_kind: MatchKind::CsiVolume });
        }

        let pv_candidates: Vec<&str> = self
            .volumes
            .iter()
            .map(|v| v.persistentvolume.as_str())
            .filter(|pv| !pv.is_empty() && lineitem_resourceid.contains(pv))
            .collect();
        pick_longest_then_lex_min(pv_candidates, audit)
            .map(|key| ResourceMatch { match_key: key, match_kind: MatchKind::PvName })
    }
}

/// Longest match wins; ties broken by lexicographically smallest key.
/// Records an audit entry whenever a tie actually had to be broken.
fn pick_longest_then_lex_min(mut candidates: Vec<&str>, audit: &mut AuditLog) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let winner = candidates[0];
    let tied = candidates.iter().filter(|c| c.len() == winner.len()).count();
    if tied > 1 {
        audit.push(
            AuditKind::AmbiguousResourceMatch,
            format!("{tied} equal-length candidates tied on resource match, picked '{winner}'"),
        );
    }
    Some(winner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_match_is_suffix_based() {
        let mut audit = AuditLog::new();
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let matches = matcher.matches("arn:aws:ec2:instance/i-0abc123", &mut audit);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_kind, MatchKind::Node);
        assert_eq!(matches[0].match_key, "i-0abc123");
    }

    #[test]
    fn csi_handle_takes_priority_over_pv_name() {
        let mut audit = AuditLog::new();
        let nodes = Vec::new();
        let volumes = vec![VolumeResource {
            persistentvolume: "pv-1".into(),
            csi_volume_handle: Some("vol-0abcdef".into()),
            persistentvolumeclaim: "pvc-1".into(),
            namespace: "ns".into(),
        }];
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let matches = matcher.matches("vol-0abcdef-pv-1", &mut audit);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_kind, MatchKind::CsiVolume);
    }

    #[test]
    fn longest_suffix_wins_ties() {
        let mut audit = AuditLog::new();
        let nodes = vec![
            NodeResource { node: "node-a".into(), resource_id: "bc123".into() },
            NodeResource { node: "node-b".into(), resource_id: "0abc123".into() },
        ];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let matches = matcher.matches("i-0abc123", &mut audit);
        assert_eq!(matches[0].match_key, "0abc123");
        assert!(audit.is_empty());
    }

    #[test]
    fn duplicate_resource_id_across_two_nodes_ties_and_audits() {
        // A genuine equal-length tie can only arise when two distinct nodes
        // share the same `resource_id` (a data-quality problem worth an
        // audit record, not a crash).
        let mut audit = AuditLog::new();
        let nodes = vec![
            NodeResource { node: "node-a".into(), resource_id: "i-0abc123".into() },
            NodeResource { node: "node-b".into(), resource_id: "i-0abc123".into() },
        ];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        let matches = matcher.matches("prefix-i-0abc123", &mut audit);
        assert_eq!(matches[0].match_key, "i-0abc123");
        assert_eq!(audit.count_kind(&AuditKind::AmbiguousResourceMatch), 1);
    }

    #[test]
    fn no_match_yields_empty_result() {
        let mut audit = AuditLog::new();
        let nodes = vec![NodeResource { node: "node-a".into(), resource_id: "i-1".into() }];
        let volumes = Vec::new();
        let matcher = ResourceMatcher::new(&nodes, &volumes);
        assert!(matcher.matches("completely-unrelated", &mut audit).is_empty());
    }
}
