//! Routing and utilization planner (spec §4.3): assigns one simple path per
//! (sender, receiver) pair, balancing load across links, and reports the
//! network's hyper-period and feasibility.

use std::collections::{HashMap, HashSet};

use crate::frame::Frame;
use crate::graph::{LinkId, NodeId, Topology};

/// Reserved protocol bandwidth parameters (spec §6,
/// `Topology/TopologyInformation`), already normalized to nanoseconds.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolParams {
    /// Mandated lower bound on how long a frame waits inside a switch.
    pub min_switch_residency_ns: u64,
    /// Period of the reserved protocol window, in nanoseconds.
    pub period_protocol_ns: u64,
    /// Duration of the reserved protocol window per period, in nanoseconds.
    pub time_protocol_ns: u64,
    /// Mandated inter-frame gap on any one link, in nanoseconds.
    pub time_between_frames_ns: u64,
}

/// A (frame, receiver) pair that could not be routed at all — no simple path
/// exists between sender and that receiver in the active topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnroutedReceiver {
    /// Index into the frame slice passed to [`route`].
    pub frame_index: usize,
    /// The receiver that could not be reached.
    pub receiver: NodeId,
}

/// Outcome of a routing pass (spec §4.3, §7 `Infeasible`). Infeasibility is
/// data here, never an `Err` — emission of the network artifact proceeds
/// regardless.
#[derive(Debug, Clone)]
pub struct RoutingReport {
    /// Least common multiple of all distinct frame periods.
    pub hyper_period_ns: u64,
    /// Accumulated per-link utilization, in nanoseconds occupied within one
    /// hyper-period (frame traffic plus protocol reservation).
    pub link_utilization_ns: HashMap<LinkId, u64>,
    /// Links whose accumulated utilization exceeds the hyper-period.
    pub infeasible_links: Vec<LinkId>,
    /// (frame, receiver) pairs with no simple path between sender and
    /// receiver at all.
    pub unrouted: Vec<UnroutedReceiver>,
}

impl RoutingReport {
    /// Whether every link's utilization fits within the hyper-period and
    /// every receiver was routed (spec §4.3's schedulability flag).
    pub fn is_schedulable(&self) -> bool {
        self.infeasible_links.is_empty() && self.unrouted.is_empty()
    }

    /// Utilization of a link normalized to `[0, 1]` (or beyond, if
    /// infeasible), `None` for a link with no recorded utilization at all.
    pub fn utilization_ratio(&self, link: LinkId) -> Option<f64> {
        if self.hyper_period_ns == 0 {
            return None;
        }
        self.link_utilization_ns
            .get(&link)
            .map(|&ns| ns as f64 / self.hyper_period_ns as f64)
    }

    /// Mean utilization ratio across every link with recorded utilization.
    pub fn average_utilization_ratio(&self) -> f64 {
        if self.link_utilization_ns.is_empty() || self.hyper_period_ns == 0 {
            return 0.0;
        }
        let sum: u64 = self.link_utilization_ns.values().sum();
        (sum as f64 / self.hyper_period_ns as f64) / self.link_utilization_ns.len() as f64
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}

/// Least common multiple of every distinct, positive period among `frames`.
/// `0` if no frame has a positive period.
pub fn hyper_period(frames: &[Frame]) -> u64 {
    let mut periods: Vec<u64> = frames.iter().map(|f| f.period_ns).filter(|&p| p > 0).collect();
    periods.sort_unstable();
    periods.dedup();
    if periods.is_empty() {
        return 0;
    }
    periods.into_iter().fold(1u64, lcm)
}

/// Marginal utilization a single instance-stream of `size_bytes` at
/// `speed_mbps` contributes to one link, in nanoseconds within one
/// hyper-period (spec §4.3 — floor, not the ceiling used for a single
/// instance's transmission time).
fn marginal_utilization_ns(size_bytes: u32, speed_mbps: u32, period_ns: u64, hyper_period_ns: u64) -> u64 {
    if period_ns == 0 || speed_mbps == 0 {
        return 0;
    }
    let per_instance = (size_bytes as u64 * 8_000) / speed_mbps as u64;
    per_instance * (hyper_period_ns / period_ns)
}

/// Route every frame's receivers over `topology`, mutating each frame's
/// `paths` in place, and report the resulting utilization (spec §4.3).
pub fn route(topology: &Topology, frames: &mut [Frame], protocol: &ProtocolParams) -> RoutingReport {
    let hyper_period_ns = hyper_period(frames);

    let mut utilization: HashMap<LinkId, u64> = HashMap::new();
    if protocol.period_protocol_ns > 0 {
        let reservation = (hyper_period_ns / protocol.period_protocol_ns) * protocol.time_protocol_ns;
        for index in 0..topology.num_links() {
            let link = LinkId(index as u32);
            if topology.is_active(link) {
                utilization.insert(link, reservation);
            }
        }
    }

    let mut unrouted = Vec::new();

    for (frame_index, frame) in frames.iter_mut().enumerate() {
        frame.clear_paths();
        let receivers = frame.receivers.clone();
        for &receiver in &receivers {
            let candidates = topology.simple_paths(frame.sender, receiver, &HashSet::new());
            if candidates.is_empty() {
                unrouted.push(UnroutedReceiver { frame_index, receiver });
                frame.paths.push(Vec::new());
                continue;
            }

            let mut best: Option<(u64, Vec<LinkId>)> = None;
            for path in candidates {
                let cost: u64 = path
                    .iter()
                    .map(|&link| {
                        let existing = utilization.get(&link).copied().unwrap_or(0);
                        if frame.link_in_path(link) {
                            existing
                        } else {
                            existing
                                + marginal_utilization_ns(
                                    frame.size_bytes,
                                    topology.link(link).map(|r| r.speed_mbps).unwrap_or(1),
                                    frame.period_ns,
                                    hyper_period_ns,
                                )
                        }
                    })
                    .sum();
                let better = match &best {
                    None => true,
                    Some((best_cost, best_path)) => {
                        (cost, path.len(), &path) < (*best_cost, best_path.len(), best_path)
                    }
                };
                if better {
                    best = Some((cost, path));
                }
            }

            let (_, chosen) = best.expect("candidates is non-empty");
            for &link in &chosen {
                if !frame.link_in_path(link) {
                    let speed = topology.link(link).map(|r| r.speed_mbps).unwrap_or(1);
                    let marginal = marginal_utilization_ns(frame.size_bytes, speed, frame.period_ns, hyper_period_ns);
                    *utilization.entry(link).or_insert(0) += marginal;
                }
            }
            frame.paths.push(chosen);
        }
    }

    let infeasible_links = utilization
        .iter()
        .filter(|(_, &ns)| ns > hyper_period_ns)
        .map(|(&link, _)| link)
        .collect();

    RoutingReport {
        hyper_period_ns,
        link_utilization_ns: utilization,
        infeasible_links,
        unrouted,
    }
}
