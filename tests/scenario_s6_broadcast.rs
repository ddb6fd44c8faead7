//! S6: one broadcast frame on a 5-end-system tree (one hub switch, five
//! end-system leaves). `paths[]` has 4 entries (one per receiver); every
//! path is sender-spoke then receiver-spoke, so the artifact's splits are
//! exactly the four receiver-side spokes where the broadcast diverges, not
//! the shared sender spoke they all start with.

use pretty_assertions::assert_eq;
use rand::SeedableRng;
use ttnet::generator::{FrameClassWeights, FrameTypeDescriptor};
use ttnet::network::{self, Config, Network, TrafficConfig};
use ttnet::routing::ProtocolParams;
use ttnet::topology::{LinkSpec, TopologyDescription};
use ttnet::xml::network_xml;

fn protocol() -> ProtocolParams {
    ProtocolParams { min_switch_residency_ns: 0, period_protocol_ns: 0, time_protocol_ns: 0, time_between_frames_ns: 0 }
}

fn config() -> Config {
    let tokens = vec![-5];
    let links: Vec<LinkSpec> = (0..5).map(|_| LinkSpec::parse("w100").unwrap()).collect();
    Config {
        topology: TopologyDescription::Tree { tokens, links },
        protocol: protocol(),
        traffic: TrafficConfig {
            num_frames: 1,
            class_weights: FrameClassWeights { broadcast: 1.0, single: 0.0, multiple: 0.0, local: 0.0 },
            frame_types: vec![FrameTypeDescriptor { period_ns: 1_000_000, deadline_ns: 0, size_bytes: 100, end_to_end_ns: 1_000_000, weight: 1.0 }],
        },
    }
}

fn build() -> Network {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    network::build(&config(), &mut rng).unwrap()
}

#[test]
fn broadcast_has_one_path_per_receiver() {
    let network = build();
    assert_eq!(network.topology.end_systems().len(), 5);
    assert_eq!(network.frames.len(), 1);
    assert_eq!(network.frames[0].receivers.len(), 4);
    assert_eq!(network.frames[0].paths.len(), 4);
    assert!(network.routing.is_schedulable());
}

#[test]
fn broadcast_splits_are_exactly_the_diverging_spokes() {
    let network = build();
    let artifact = network_xml::to_artifact(&network);
    let frame_artifact = &artifact.traffic_information.frames.frame[0];

    // Every path is sender-spoke then receiver-spoke through the hub
    // switch: the first link is the same sender spoke for all four
    // receivers, so the divergence frontier is their (distinct) last
    // links, not the first.
    let mut spokes: Vec<u32> = network.frames[0].paths.iter().map(|p| p.last().unwrap().0).collect();
    spokes.sort_unstable();

    assert_eq!(frame_artifact.splits.split.len(), 1, "one divergence frontier for a flat star");
    let mut split_links: Vec<u32> = frame_artifact.splits.split[0].split(';').map(|s| s.parse().unwrap()).collect();
    split_links.sort_unstable();
    assert_eq!(split_links, spokes);
}
