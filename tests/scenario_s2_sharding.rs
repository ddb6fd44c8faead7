//! S2 end-to-end through sharding: triangle with a redundant edge, fail the
//! direct link, and check the per-node subnetworks partition the recovered
//! link set the way spec §8 property 5(d) requires.

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use ttnet::frame::Frame;
use ttnet::graph::{LinkKind, Topology};
use ttnet::regen::membership;
use ttnet::regen::shard;
use ttnet::routing::ProtocolParams;

fn protocol() -> ProtocolParams {
    ProtocolParams { min_switch_residency_ns: 1_000, period_protocol_ns: 0, time_protocol_ns: 0, time_between_frames_ns: 10_000 }
}

#[test]
fn s2_shards_partition_disjointly_and_cover_membership() {
    let mut t = Topology::new();
    let es0 = t.add_end_system();
    let es1 = t.add_end_system();
    let s2 = t.add_switch();
    let l0 = t.add_link(es0, es1, LinkKind::Wired, 100);
    let l1 = t.add_link(es0, s2, LinkKind::Wired, 100);
    let l2 = t.add_link(s2, es1, LinkKind::Wired, 100);

    let mut frame = Frame::with_attributes(es0, vec![es1], 1_000_000, 0, 100, 0, 1_000_000);
    frame.paths.push(vec![l0]);
    let frames = vec![frame];

    let membership = membership::build(&t, &frames, l0, &protocol(), 2).unwrap();
    assert_eq!(membership.entries.len(), 1);
    assert!(membership.entries[0].affected);

    let shards = shard::shard(&membership, &frames, protocol().min_switch_residency_ns);

    let mut partitioned: Vec<_> = shards.iter().flat_map(|s| s.links.clone()).collect();
    partitioned.sort_by_key(|l| l.0);
    let mut expected: Vec<_> = (0..membership.topology.num_links() as u32).map(ttnet::graph::LinkId).collect();
    expected.sort_by_key(|l| l.0);
    assert_eq!(partitioned, expected, "shard links must union to exactly the membership link set");

    let mut seen = HashSet::new();
    for s in &shards {
        for l in &s.links {
            assert!(seen.insert(*l), "link {l} assigned to more than one shard");
        }
    }
    assert_eq!(shards.len(), 2, "one shard per distinct source node of l1 and l2");
}
