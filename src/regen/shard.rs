//! Per-source-node sharding (spec §4.5.3): partitions the membership
//! subnetwork by link source, and computes each link's tightened time
//! window within its shard.

use std::collections::HashMap;

use crate::frame::Frame;
use crate::graph::{LinkId, NodeId};
use crate::regen::membership::MembershipNetwork;

/// One frame's time-window constraint on one link within a per-node shard
/// (spec §4.5.3) — this is what gets handed to the solver.
#[derive(Debug, Clone)]
pub struct FrameWindow {
    /// Index into the frame slice originally passed to
    /// [`crate::regen::membership::build`].
    pub original_frame_index: usize,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub period_ns: u64,
    pub size_bytes: u32,
    pub end_to_end_ns: u64,
    /// The member-local link this window constrains.
    pub link: LinkId,
    pub window_start_ns: u64,
    pub window_end_ns: u64,
}

/// A per-source-node subnetwork: exactly the member links whose source is
/// `node`, plus a time-window constraint for every frame touching any of
/// them.
#[derive(Debug, Clone)]
pub struct NodeShard {
    /// Member-local id of the source node all of this shard's links share.
    pub node: NodeId,
    pub links: Vec<LinkId>,
    pub windows: Vec<FrameWindow>,
}

/// `p/L` weighted slack offset, computed in integer arithmetic without
/// overflowing on large nanosecond values.
fn proportional(numerator: usize, denominator: usize, slack: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    ((numerator as u128 * slack as u128) / denominator as u128) as u64
}

/// Partition the membership subnetwork by link source and compute every
/// shard's frame windows (spec §4.5.3).
///
/// `original_frames` are the pre-failure network — needed to lazily
/// recompute an affected entry's member-level window against the
/// originally-failed link (see DESIGN.md: the membership network only
/// carries the `(0, 0)` sentinel for affected entries per spec §4.5.2, so
/// the real bounds are derived here, matching the original implementation's
/// use of the failed link as the reference point at sharding time rather
/// than any value stored earlier). `min_switch_residency_ns` is folded into
/// the recomputed window start the same way spec §4.5.2 folds it into an
/// already-scheduled frame's window start.
pub fn shard(
    membership: &MembershipNetwork,
    original_frames: &[Frame],
    min_switch_residency_ns: u64,
) -> Vec<NodeShard> {
    let mut by_source: HashMap<NodeId, Vec<LinkId>> = HashMap::new();
    for index in 0..membership.topology.num_links() {
        let link = LinkId(index as u32);
        if let Some(record) = membership.topology.link(link) {
            by_source.entry(record.source).or_default().push(link);
        }
    }

    let mut shards = Vec::with_capacity(by_source.len());
    for (node, links) in by_source {
        let mut windows = Vec::new();
        for entry in &membership.entries {
            let Some(position) = entry.path.iter().position(|l| links.contains(l)) else { continue };
            let link = entry.path[position];
            let length = entry.path.len();

            let (window_start_ns, window_end_ns) = if entry.affected {
                affected_window(membership, original_frames, entry, position, length, min_switch_residency_ns)
            } else {
                (entry.window_start_ns, entry.window_end_ns)
            };

            windows.push(FrameWindow {
                original_frame_index: entry.original_frame_index,
                sender: entry.sender,
                receiver: entry.receiver,
                period_ns: entry.period_ns,
                size_bytes: entry.size_bytes,
                end_to_end_ns: entry.end_to_end_ns,
                link,
                window_start_ns,
                window_end_ns,
            });
        }
        shards.push(NodeShard { node, links, windows });
    }
    shards
}

fn affected_window(
    membership: &MembershipNetwork,
    original_frames: &[Frame],
    entry: &crate::regen::membership::MembershipEntry,
    position: usize,
    length: usize,
    min_switch_residency_ns: u64,
) -> (u64, u64) {
    let frame = &original_frames[entry.original_frame_index];
    let Some(original_path) = frame.paths.first() else {
        return (entry.window_start_ns, entry.window_end_ns);
    };

    let window_start_member =
        frame.predecessor_receiving_time(original_path, membership.failed_link, 0) + min_switch_residency_ns;
    let window_end_member = frame.successor_transmission_time(original_path, membership.failed_link, 0);

    // instance 0, so the period boundary is ns 0; consumed_ns is just the
    // absolute offset predecessor_receiving_time already returns.
    let remaining_budget = frame.end_to_end_ns.saturating_sub(window_start_member);
    let raw_slack = window_end_member.saturating_sub(window_start_member);
    let slack = raw_slack.min(remaining_budget);

    let window_start = window_start_member + proportional(position, length, slack);
    let window_end = window_end_member.saturating_sub(proportional(length - 1 - position, length, slack));
    (window_start, window_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::graph::{LinkKind, Topology};
    use crate::routing::ProtocolParams;

    fn protocol() -> ProtocolParams {
        ProtocolParams { min_switch_residency_ns: 0, period_protocol_ns: 0, time_protocol_ns: 0, time_between_frames_ns: 1_000 }
    }

    #[test]
    fn shards_partition_links_disjointly_and_cover_membership() -> Result<()> {
        let mut t = Topology::new();
        let es0 = t.add_end_system();
        let es1 = t.add_end_system();
        let s2 = t.add_switch();
        let l0 = t.add_link(es0, es1, LinkKind::Wired, 100);
        let _l1 = t.add_link(es0, s2, LinkKind::Wired, 100);
        let _l2 = t.add_link(s2, es1, LinkKind::Wired, 100);

        let mut frame = Frame::with_attributes(es0, vec![es1], 1_000_000, 0, 100, 0, 1_000_000);
        frame.paths.push(vec![l0]);
        let frames = vec![frame];

        let membership = crate::regen::membership::build(&t, &frames, l0, &protocol(), 2)?;
        let shards = shard(&membership, &frames, protocol().min_switch_residency_ns);

        let mut all_links: Vec<LinkId> = shards.iter().flat_map(|s| s.links.clone()).collect();
        all_links.sort_by_key(|l| l.0);
        let mut expected: Vec<LinkId> = (0..membership.topology.num_links() as u32).map(LinkId).collect();
        expected.sort_by_key(|l| l.0);
        assert_eq!(all_links, expected);

        let mut seen = std::collections::HashSet::new();
        for s in &shards {
            for l in &s.links {
                assert!(seen.insert(*l), "link {l} appears in more than one shard");
            }
        }
        Ok(())
    }
}
