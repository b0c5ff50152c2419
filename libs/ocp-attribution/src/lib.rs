//! Container-on-cloud attribution engine: resource matching, tag matching,
//! disk-capacity reconstruction, network classification, and the cost
//! attributor's state machine (C8-C12, spec.md §4.8-§4.12).

pub mod cost_attribution;
pub mod disk;
pub mod network;
pub mod resource_match;
pub mod tag_match;

pub use cost_attribution::{
    attribute_row, build_storage_indexes, compute_node_ratios, AttributionContext, NodeRatios,
    STORAGE_UNATTRIBUTED_NAMESPACE,
};
pub use disk::{compute_disk_capacity, DiskCapacityRow, MatchedStorageCost};
pub use network::{classify_direction, is_network_row, NETWORK_UNATTRIBUTED_NAMESPACE};
pub use resource_match::{MatchKind, NodeResource, ResourceMatch, ResourceMatcher, VolumeResource};
pub use tag_match::{match_tags, MatchedTarget, ObservedContainerKeys, TagMatch};
