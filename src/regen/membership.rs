//! Impact analysis and membership subnetwork construction (spec §4.5.1,
//! §4.5.2).
//!
//! Precondition: every frame handed to [`build`] has at most one path (as
//! produced by [`crate::xml::schedule_xml::read`] — the Evaluator's input
//! is always an already-scheduled, single-path-per-frame network; a
//! freshly-generated, not-yet-scheduled multi-receiver network is never the
//! direct input to regeneration). Frames with zero paths are ignored; a
//! frame with more than one path uses only the first, by the same
//! convention the original implementation applies throughout its
//! regeneration pipeline.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::graph::{LinkId, NodeId, Topology};
use crate::routing::{self, ProtocolParams};

/// One frame's presence in the membership subnetwork (spec §4.5.2).
#[derive(Debug, Clone)]
pub struct MembershipEntry {
    /// Index into the frame slice passed to [`build`].
    pub original_frame_index: usize,
    /// Member-local sender.
    pub sender: NodeId,
    /// Member-local receiver.
    pub receiver: NodeId,
    pub period_ns: u64,
    pub size_bytes: u32,
    pub end_to_end_ns: u64,
    /// Member-local link sequence.
    pub path: Vec<LinkId>,
    /// Earliest this entry's path may start, in nanoseconds. `0` sentinel,
    /// tightened during sharding, if `affected`.
    pub window_start_ns: u64,
    /// Latest this entry's path must end, in nanoseconds. `0` sentinel,
    /// tightened during sharding, if `affected`.
    pub window_end_ns: u64,
    /// Whether this entry needs a brand new path (it traversed the failed
    /// link) as opposed to being an already-scheduled frame passing through
    /// the recovery region.
    pub affected: bool,
}

/// The derived recovery-region graph plus every frame entry relevant to it
/// (spec §4.5.2).
#[derive(Debug, Clone)]
pub struct MembershipNetwork {
    /// Fresh graph over only the nodes/links in the recovery region, all
    /// nodes modeled as end systems.
    pub topology: Topology,
    /// The link that failed (original index space).
    pub failed_link: LinkId,
    /// Member-local id of the failed link's original source.
    pub source: NodeId,
    /// Member-local id of the failed link's original destination.
    pub destination: NodeId,
    /// Original → member-local link id mapping.
    pub old_to_new_link: HashMap<LinkId, LinkId>,
    /// Member-local → original link id mapping.
    pub new_to_old_link: HashMap<LinkId, LinkId>,
    /// Every frame touching the recovery region.
    pub entries: Vec<MembershipEntry>,
}

/// Run impact analysis and build the membership subnetwork for the loss of
/// `failed_link` (spec §4.5.1, §4.5.2). `max_candidate_paths` is the `K` of
/// §4.5.1 (spec default 2).
pub fn build(
    topology: &Topology,
    frames: &[Frame],
    failed_link: LinkId,
    protocol: &ProtocolParams,
    max_candidate_paths: usize,
) -> Result<MembershipNetwork> {
    let (old_source, old_destination) = topology
        .link_endpoints(failed_link)
        .ok_or_else(|| Error::Unrecoverable(format!("link {failed_link} does not exist")))?;

    let mut working = topology.clone();
    working.remove_link(failed_link);
    let mut candidates = working.simple_paths(old_source, old_destination, &HashSet::new());
    candidates.sort_by_key(|p| p.len());
    candidates.truncate(max_candidate_paths.max(1));
    if candidates.is_empty() {
        return Err(Error::Unrecoverable(format!(
            "no alternate path exists between the endpoints of failed link {failed_link}"
        )));
    }

    let mut member_links = Vec::new();
    let mut link_seen = HashSet::new();
    for path in &candidates {
        for &link in path {
            if link_seen.insert(link) {
                member_links.push(link);
            }
        }
    }

    let mut member_nodes = Vec::new();
    let mut node_seen = HashSet::new();
    for &n in [old_source, old_destination].iter() {
        if node_seen.insert(n) {
            member_nodes.push(n);
        }
    }
    for &link in &member_links {
        if let Some((s, d)) = topology.link_endpoints(link) {
            for n in [s, d] {
                if node_seen.insert(n) {
                    member_nodes.push(n);
                }
            }
        }
    }

    let mut member_topology = Topology::new();
    let mut old_to_new_node = HashMap::new();
    for &old_node in &member_nodes {
        old_to_new_node.insert(old_node, member_topology.add_end_system());
    }

    let mut old_to_new_link = HashMap::new();
    let mut new_to_old_link = HashMap::new();
    for &old_link in &member_links {
        let record = topology.link(old_link).expect("member link must exist in the original topology");
        let new_source = old_to_new_node[&record.source];
        let new_destination = old_to_new_node[&record.destination];
        let new_link = member_topology.add_link(new_source, new_destination, record.kind, record.speed_mbps);
        old_to_new_link.insert(old_link, new_link);
        new_to_old_link.insert(new_link, old_link);
    }

    let member_source = old_to_new_node[&old_source];
    let member_destination = old_to_new_node[&old_destination];

    let mut entries = Vec::new();
    let mut affected_indices = Vec::new();

    for (frame_index, frame) in frames.iter().enumerate() {
        let Some(reference_path) = frame.paths.first() else { continue };
        if reference_path.contains(&failed_link) {
            affected_indices.push(frame_index);
            continue;
        }

        let mut current = Vec::new();
        let mut segments: Vec<Vec<LinkId>> = Vec::new();
        for &link in reference_path {
            if let Some(&new_link) = old_to_new_link.get(&link) {
                current.push(new_link);
            } else if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }

        let mut distinct: Vec<Vec<LinkId>> = Vec::new();
        for seg in segments {
            if !distinct.contains(&seg) {
                distinct.push(seg);
            }
        }
        if distinct.is_empty() {
            continue;
        }
        if distinct.len() > 1 {
            warn!(
                "frame {frame_index} has {} disjoint restricted paths through the recovery region; using the first",
                distinct.len()
            );
        }
        let restricted = distinct.into_iter().next().unwrap();

        let first_old = new_to_old_link[&restricted[0]];
        let last_old = new_to_old_link[restricted.last().unwrap()];
        let window_start_ns =
            frame.predecessor_receiving_time(reference_path, first_old, 0) + protocol.min_switch_residency_ns;
        let window_end_ns = frame.successor_transmission_time(reference_path, last_old, 0);

        let sender = old_to_new_node
            .get(&topology.link_endpoints(first_old).unwrap().0)
            .copied()
            .unwrap();
        let receiver = old_to_new_node
            .get(&topology.link_endpoints(last_old).unwrap().1)
            .copied()
            .unwrap();

        entries.push(MembershipEntry {
            original_frame_index: frame_index,
            sender,
            receiver,
            period_ns: frame.period_ns,
            size_bytes: frame.size_bytes,
            end_to_end_ns: frame.end_to_end_ns,
            path: restricted,
            window_start_ns,
            window_end_ns,
            affected: false,
        });
    }

    let mut affected_frames: Vec<Frame> = affected_indices
        .iter()
        .map(|&i| {
            let f = &frames[i];
            Frame::with_attributes(member_source, vec![member_destination], f.period_ns, f.deadline_ns, f.size_bytes, f.starting_ns, f.end_to_end_ns)
        })
        .collect();
    let routing_report = routing::route(&member_topology, &mut affected_frames, protocol);
    if !routing_report.unrouted.is_empty() {
        return Err(Error::Unrecoverable(format!(
            "{} affected frame(s) have no path across the recovery region",
            routing_report.unrouted.len()
        )));
    }

    for (&frame_index, rerouted) in affected_indices.iter().zip(affected_frames.iter()) {
        entries.push(MembershipEntry {
            original_frame_index: frame_index,
            sender: member_source,
            receiver: member_destination,
            period_ns: rerouted.period_ns,
            size_bytes: rerouted.size_bytes,
            end_to_end_ns: rerouted.end_to_end_ns,
            path: rerouted.paths[0].clone(),
            window_start_ns: 0,
            window_end_ns: 0,
            affected: true,
        });
    }

    Ok(MembershipNetwork {
        topology: member_topology,
        failed_link,
        source: member_source,
        destination: member_destination,
        old_to_new_link,
        new_to_old_link,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LinkKind;

    fn protocol() -> ProtocolParams {
        ProtocolParams { min_switch_residency_ns: 0, period_protocol_ns: 0, time_protocol_ns: 0, time_between_frames_ns: 10_000 }
    }

    #[test]
    fn s2_triangle_with_redundant_edge() {
        let mut t = Topology::new();
        let es0 = t.add_end_system();
        let es1 = t.add_end_system();
        let s2 = t.add_switch();
        let l0 = t.add_link(es0, es1, LinkKind::Wired, 100);
        let l1 = t.add_link(es0, s2, LinkKind::Wired, 100);
        let l2 = t.add_link(s2, es1, LinkKind::Wired, 100);

        let mut frame = Frame::with_attributes(es0, vec![es1], 1_000_000, 0, 100, 0, 1_000_000);
        frame.paths.push(vec![l0]);

        let membership = build(&t, &[frame], l0, &protocol(), 2).unwrap();
        assert_eq!(membership.entries.len(), 1);
        let entry = &membership.entries[0];
        assert!(entry.affected);
        let old_path: Vec<LinkId> = entry.path.iter().map(|l| membership.new_to_old_link[l]).collect();
        assert_eq!(old_path, vec![l1, l2]);
    }

    #[test]
    fn unrecoverable_when_no_alternate_path() {
        let mut t = Topology::new();
        let a = t.add_end_system();
        let b = t.add_end_system();
        let l0 = t.add_link(a, b, LinkKind::Wired, 100);
        let frames: Vec<Frame> = Vec::new();
        let err = build(&t, &frames, l0, &protocol(), 2).unwrap_err();
        assert!(matches!(err, Error::Unrecoverable(_)));
    }
}
