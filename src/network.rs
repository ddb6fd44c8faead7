//! Aggregate `Network`/`Config` types (spec §2 data flow): ties the
//! topology builder, frame generator, and routing planner into one
//! orchestration, mirroring the original `Network` class.

use log::{debug, info};
use rand::Rng;

use crate::error::Result;
use crate::frame::Frame;
use crate::generator::{self, FrameClassWeights, FrameTypeDescriptor};
use crate::graph::Topology;
use crate::routing::{self, ProtocolParams, RoutingReport};
use crate::topology::{self, TopologyDescription};

/// Parsed `Traffic/TrafficInformation` + `Traffic/FrameDescription` (spec §6).
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    /// Number of frames to generate.
    pub num_frames: u32,
    /// Receiver-selection class weights.
    pub class_weights: FrameClassWeights,
    /// Attribute classes, in declaration order (selection order matters).
    pub frame_types: Vec<FrameTypeDescriptor>,
}

/// Fully parsed input configuration (spec §6, configuration XML).
#[derive(Debug, Clone)]
pub struct Config {
    /// The topology description, tree or cyclic form.
    pub topology: TopologyDescription,
    /// Reserved protocol bandwidth parameters.
    pub protocol: ProtocolParams,
    /// Frame generation parameters.
    pub traffic: TrafficConfig,
}

/// A fully generated and routed network (spec §2): topology, frames with
/// assigned paths, and the routing report.
#[derive(Debug, Clone)]
pub struct Network {
    /// The physical topology.
    pub topology: Topology,
    /// Generated frames, each with a path assigned per receiver.
    pub frames: Vec<Frame>,
    /// Reserved protocol bandwidth parameters this network was routed under.
    pub protocol: ProtocolParams,
    /// Routing outcome: hyper-period, utilization, feasibility.
    pub routing: RoutingReport,
}

/// Build a network from `config`: topology → frame generation → routing
/// (spec §2's data-flow). Infeasibility is reported on `routing`, not
/// raised; the only failure mode here is a malformed topology description.
pub fn build(config: &Config, rng: &mut impl Rng) -> Result<Network> {
    info!("building topology");
    let topology = topology::build(&config.topology)?;
    debug!(
        "topology has {} nodes ({} switches, {} end systems) and {} links",
        topology.num_nodes(),
        topology.switches().len(),
        topology.end_systems().len(),
        topology.num_links()
    );

    info!("generating {} frames", config.traffic.num_frames);
    let mut frames = generator::generate(
        &topology,
        config.traffic.num_frames,
        &config.traffic.class_weights,
        &config.traffic.frame_types,
        rng,
    );
    debug!("generated {} frames", frames.len());

    info!("routing frames");
    let report = routing::route(&topology, &mut frames, &config.protocol);
    if report.is_schedulable() {
        info!("network is schedulable, hyper_period_ns={}", report.hyper_period_ns);
    } else {
        info!(
            "network is NOT schedulable: {} infeasible link(s), {} unrouted receiver(s)",
            report.infeasible_links.len(),
            report.unrouted.len()
        );
    }

    Ok(Network { topology, frames, protocol: config.protocol, routing: report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LinkKind;
    use crate::topology::LinkSpec;
    use rand::SeedableRng;

    #[test]
    fn builds_and_routes_a_small_star() {
        let config = Config {
            topology: TopologyDescription::Tree {
                tokens: vec![-3],
                links: vec![
                    LinkSpec::parse("w100").unwrap(),
                    LinkSpec::parse("w100").unwrap(),
                    LinkSpec::parse("w100").unwrap(),
                ],
            },
            protocol: ProtocolParams {
                min_switch_residency_ns: 1_000,
                period_protocol_ns: 0,
                time_protocol_ns: 0,
                time_between_frames_ns: 10_000,
            },
            traffic: TrafficConfig {
                num_frames: 5,
                class_weights: FrameClassWeights { broadcast: 1.0, single: 0.0, multiple: 0.0, local: 0.0 },
                frame_types: vec![FrameTypeDescriptor {
                    period_ns: 1_000_000,
                    deadline_ns: 0,
                    size_bytes: 100,
                    end_to_end_ns: 1_000_000,
                    weight: 1.0,
                }],
            },
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let network = build(&config, &mut rng).unwrap();
        assert_eq!(network.frames.len(), 5);
        assert_eq!(network.topology.switches().len(), 1);
        assert!(matches!(network.topology.node_kind(network.topology.switches()[0]).unwrap(), crate::graph::NodeKind::Switch));
        let _ = LinkKind::Wired;
    }
}
