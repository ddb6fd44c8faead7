//! Frame generator and attribute assigner (spec §4.2).

use rand::seq::SliceRandom;
use rand::Rng;

use crate::frame::Frame;
use crate::graph::{NodeId, Topology};

/// Normalized-on-use weights for the four receiver-selection classes (spec
/// §4.2 step 2, `Traffic/TrafficInformation`).
#[derive(Debug, Clone, Copy)]
pub struct FrameClassWeights {
    /// Receivers = every other end system.
    pub broadcast: f64,
    /// Receivers = one other end system, chosen uniformly at random.
    pub single: f64,
    /// Receivers = a uniformly sized random subset of the other end systems.
    pub multiple: f64,
    /// Receivers = every end system tied at minimum hop distance from the
    /// sender.
    pub local: f64,
}

/// One frame-attribute class (spec §4.2 step 3, `Traffic/FrameDescription/FrameType`).
#[derive(Debug, Clone, Copy)]
pub struct FrameTypeDescriptor {
    /// Period in nanoseconds.
    pub period_ns: u64,
    /// Deadline in nanoseconds; `0` means "same as period".
    pub deadline_ns: u64,
    /// Frame size in bytes.
    pub size_bytes: u32,
    /// End-to-end budget in nanoseconds.
    pub end_to_end_ns: u64,
    /// Relative selection weight.
    pub weight: f64,
}

/// Pick the first item whose cumulative, normalized weight exceeds `draw`
/// (`draw` expected in `[0, 1)`). Falls back to the first item if all
/// weights are non-positive, and to the last item if floating-point
/// accumulation undershoots `draw` by rounding.
fn pick_cumulative<'a, T>(items: &'a [(T, f64)], draw: f64) -> &'a T {
    let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return &items[0].0;
    }
    let mut acc = 0.0;
    for (item, w) in items {
        acc += w.max(0.0) / total;
        if draw < acc {
            return item;
        }
    }
    &items.last().unwrap().0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiverClass {
    Broadcast,
    Single,
    Multiple,
    Local,
}

/// Choose receivers for one frame sent by `sender` (spec §4.2 step 2).
fn choose_receivers(
    topology: &Topology,
    sender: NodeId,
    weights: &FrameClassWeights,
    rng: &mut impl Rng,
) -> Vec<NodeId> {
    let others: Vec<NodeId> = topology
        .end_systems()
        .iter()
        .copied()
        .filter(|&n| n != sender)
        .collect();
    if others.is_empty() {
        return Vec::new();
    }

    let classes = [
        (ReceiverClass::Broadcast, weights.broadcast),
        (ReceiverClass::Single, weights.single),
        (ReceiverClass::Multiple, weights.multiple),
        (ReceiverClass::Local, weights.local),
    ];
    let class = *pick_cumulative(&classes, rng.gen::<f64>());

    match class {
        ReceiverClass::Broadcast => others,
        ReceiverClass::Single => {
            let index = rng.gen_range(0..others.len());
            vec![others[index]]
        }
        ReceiverClass::Multiple => {
            let size = rng.gen_range(1..=others.len());
            let mut pool = others.clone();
            pool.shuffle(rng);
            pool.truncate(size);
            pool
        }
        ReceiverClass::Local => {
            let distances = topology.hop_distances(sender);
            let min_distance = others
                .iter()
                .filter_map(|n| distances.get(n).copied())
                .min();
            match min_distance {
                Some(min) => others
                    .into_iter()
                    .filter(|n| distances.get(n).copied() == Some(min))
                    .collect(),
                None => Vec::new(),
            }
        }
    }
}

/// Assign (period, deadline, size, end_to_end) to `frame` by drawing an
/// attribute class from `frame_types` (spec §4.2 step 3).
fn assign_attributes(frame: &mut Frame, frame_types: &[FrameTypeDescriptor], rng: &mut impl Rng) {
    let items: Vec<(usize, f64)> = frame_types
        .iter()
        .enumerate()
        .map(|(i, t)| (i, t.weight))
        .collect();
    let chosen = *pick_cumulative(&items, rng.gen::<f64>());
    let descriptor = &frame_types[chosen];
    frame.period_ns = descriptor.period_ns;
    frame.size_bytes = descriptor.size_bytes;
    frame.end_to_end_ns = descriptor.end_to_end_ns;
    frame.set_deadline(descriptor.deadline_ns);
}

/// Generate `num_frames` frames over `topology` (spec §4.2). Senders and
/// receiver/attribute classes are drawn from `rng`, so callers needing
/// reproducible output should pass a seeded RNG.
pub fn generate(
    topology: &Topology,
    num_frames: u32,
    class_weights: &FrameClassWeights,
    frame_types: &[FrameTypeDescriptor],
    rng: &mut impl Rng,
) -> Vec<Frame> {
    let end_systems = topology.end_systems();
    if end_systems.is_empty() || frame_types.is_empty() {
        return Vec::new();
    }

    let mut frames = Vec::with_capacity(num_frames as usize);
    for _ in 0..num_frames {
        let sender = end_systems[rng.gen_range(0..end_systems.len())];
        let receivers = choose_receivers(topology, sender, class_weights, rng);
        if receivers.is_empty() {
            continue;
        }
        let mut frame = Frame::new(sender, receivers);
        assign_attributes(&mut frame, frame_types, rng);
        frames.push(frame);
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LinkKind;
    use rand::SeedableRng;

    fn star_topology(leaves: usize) -> Topology {
        let mut t = Topology::new();
        let hub = t.add_switch();
        for _ in 0..leaves {
            let es = t.add_end_system();
            t.add_link(hub, es, LinkKind::Wired, 100);
        }
        t
    }

    fn uniform_frame_type() -> FrameTypeDescriptor {
        FrameTypeDescriptor {
            period_ns: 1_000_000,
            deadline_ns: 0,
            size_bytes: 100,
            end_to_end_ns: 1_000_000,
            weight: 1.0,
        }
    }

    #[test]
    fn broadcast_weight_one_always_selects_all_other_end_systems() {
        let topo = star_topology(5);
        let weights = FrameClassWeights { broadcast: 1.0, single: 0.0, multiple: 0.0, local: 0.0 };
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let frames = generate(&topo, 10, &weights, &[uniform_frame_type()], &mut rng);
        assert_eq!(frames.len(), 10);
        for frame in &frames {
            assert_eq!(frame.receivers.len(), 4);
            assert!(!frame.receivers.contains(&frame.sender));
        }
    }

    #[test]
    fn local_class_is_tie_inclusive() {
        // Two switches each with two leaves hanging off a central link;
        // sender's nearest end systems are its own two siblings (distance 2),
        // tied, while the far side is distance 4.
        let mut t = Topology::new();
        let s1 = t.add_switch();
        let s2 = t.add_switch();
        t.add_link(s1, s2, LinkKind::Wired, 100);
        let es_a = t.add_end_system();
        let es_b = t.add_end_system();
        t.add_link(s1, es_a, LinkKind::Wired, 100);
        t.add_link(s1, es_b, LinkKind::Wired, 100);
        let es_c = t.add_end_system();
        t.add_link(s2, es_c, LinkKind::Wired, 100);

        let weights = FrameClassWeights { broadcast: 0.0, single: 0.0, multiple: 0.0, local: 1.0 };
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        // Force sender = es_a by generating many frames and checking the
        // invariant holds for whichever sender gets drawn.
        let frames = generate(&t, 50, &weights, &[uniform_frame_type()], &mut rng);
        for frame in &frames {
            let distances = t.hop_distances(frame.sender);
            let others: Vec<_> = t
                .end_systems()
                .iter()
                .copied()
                .filter(|&n| n != frame.sender)
                .collect();
            let min = others.iter().map(|n| distances[n]).min().unwrap();
            let expected: Vec<_> = others.into_iter().filter(|n| distances[n] == min).collect();
            let mut got = frame.receivers.clone();
            let mut exp = expected;
            got.sort();
            exp.sort();
            assert_eq!(got, exp);
        }
    }

    #[test]
    fn deadline_zero_resolves_to_period() {
        let topo = star_topology(2);
        let weights = FrameClassWeights { broadcast: 1.0, single: 0.0, multiple: 0.0, local: 0.0 };
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let frames = generate(&topo, 3, &weights, &[uniform_frame_type()], &mut rng);
        for f in frames {
            assert_eq!(f.deadline_ns, f.period_ns);
        }
    }
}
