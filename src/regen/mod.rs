//! The self-regenerating evaluator's recovery pipeline (spec §4.5, §4.6):
//! impact analysis, membership subnetwork construction, per-source-node
//! sharding, and solver invocation with degradation.

pub mod membership;
pub mod shard;
pub mod solver;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::frame::{Frame, Offset};
use crate::graph::{LinkId, Topology};
use crate::routing::ProtocolParams;
use crate::xml::network_xml::{LinkXml, LinksXml, NodeXml, NodesXml};
use crate::xml::schedule_xml;
use crate::xml::subnetwork_xml::{
    MembershipFrameXml, MembershipFramesXml, MembershipNetworkXml, NodeFrameXml, NodeFramesXml,
    NodeSubnetworkGeneralXml, NodeSubnetworkXml, WindowXml, WindowsXml,
};
use membership::MembershipNetwork;
use shard::NodeShard;
use solver::{DegradableParams, ProcessSolver, Solver};

/// State machine of a single regeneration invocation (spec §4.6). All
/// intermediate buffers are discarded on re-entry to `Idle`; this crate
/// models that by simply not retaining a `Regenerator` value across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenState {
    Idle,
    Analyzing,
    MembershipBuilt,
    Sharded,
    Solving { shard_index: usize, shard_count: usize },
    Done,
    Failed,
}

/// Everything needed to drive one regeneration (spec §4.5).
pub struct RegenRequest<'a> {
    pub topology: &'a Topology,
    pub frames: &'a [Frame],
    pub failed_link: LinkId,
    pub protocol: ProtocolParams,
    pub max_candidate_paths: usize,
    pub working_dir: PathBuf,
    pub solver_program: PathBuf,
}

/// Pre-clear regular files (leave subdirectories alone) from a working
/// directory, creating it first if absent (spec §5 "MUST remove any
/// regular files present from a prior run ... creation is idempotent").
fn prepare_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn node_category(topology: &Topology, index: u32) -> &'static str {
    use crate::graph::NodeKind;
    use petgraph::graph::NodeIndex;
    match topology.node_kind(NodeIndex::new(index as usize)) {
        Some(NodeKind::Switch) => "switch",
        _ => "end_system",
    }
}

fn link_category(kind: crate::graph::LinkKind) -> &'static str {
    match kind {
        crate::graph::LinkKind::Wired => "wired",
        crate::graph::LinkKind::Wireless => "wireless",
    }
}

fn nodes_and_links_xml(topology: &Topology) -> (NodesXml, LinksXml) {
    let mut nodes = Vec::new();
    for index in 0..topology.num_nodes() as u32 {
        nodes.push(NodeXml { category: node_category(topology, index).to_string(), id: index, connections: Default::default() });
    }
    let mut links = Vec::new();
    for index in 0..topology.num_links() as u32 {
        let link = LinkId(index);
        if let Some(record) = topology.link(link) {
            links.push(LinkXml {
                category: link_category(record.kind).to_string(),
                id: index,
                speed_mbps: record.speed_mbps,
                source: record.source.index() as u32,
                destination: record.destination.index() as u32,
            });
        }
    }
    (NodesXml { node: nodes }, LinksXml { link: links })
}

fn join_path(path: &[LinkId]) -> String {
    path.iter().map(|l| l.0.to_string()).collect::<Vec<_>>().join(";")
}

fn membership_artifact(membership: &MembershipNetwork) -> MembershipNetworkXml {
    let (nodes, links) = nodes_and_links_xml(&membership.topology);
    let frame = membership
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| MembershipFrameXml {
            id: i as u32,
            period_ns: e.period_ns,
            size_bytes: e.size_bytes,
            end_to_end_ns: e.end_to_end_ns,
            sender: e.sender.index() as u32,
            receiver: e.receiver.index() as u32,
            path: join_path(&e.path),
            window_start_ns: e.window_start_ns,
            window_end_ns: e.window_end_ns,
            affected: e.affected,
        })
        .collect();
    MembershipNetworkXml { nodes, links, frames: MembershipFramesXml { frame } }
}

fn node_subnetwork_artifact(
    membership: &MembershipNetwork,
    protocol: &ProtocolParams,
    shard: &NodeShard,
) -> NodeSubnetworkXml {
    let mut link_ids: Vec<LinkId> = shard.links.clone();
    link_ids.sort_by_key(|l| l.0);

    let mut node_ids: Vec<u32> = Vec::new();
    for &link in &link_ids {
        if let Some(record) = membership.topology.link(link) {
            node_ids.push(record.source.index() as u32);
            node_ids.push(record.destination.index() as u32);
        }
    }
    node_ids.sort_unstable();
    node_ids.dedup();

    let nodes = NodesXml {
        node: node_ids.iter().map(|&id| NodeXml { category: "end_system".to_string(), id, connections: Default::default() }).collect(),
    };
    let links = LinksXml {
        link: link_ids
            .iter()
            .filter_map(|&l| membership.topology.link(l).map(|r| LinkXml {
                category: link_category(r.kind).to_string(),
                id: l.0,
                speed_mbps: r.speed_mbps,
                source: r.source.index() as u32,
                destination: r.destination.index() as u32,
            }))
            .collect(),
    };

    let mut by_frame: HashMap<usize, Vec<&shard::FrameWindow>> = HashMap::new();
    for w in &shard.windows {
        by_frame.entry(w.original_frame_index).or_default().push(w);
    }
    let mut frame_indices: Vec<usize> = by_frame.keys().copied().collect();
    frame_indices.sort_unstable();

    let frame = frame_indices
        .into_iter()
        .map(|original_frame_index| {
            let windows = &by_frame[&original_frame_index];
            let first = windows[0];
            let mut window_xml: Vec<WindowXml> = windows
                .iter()
                .map(|w| WindowXml { link_id: w.link.0, window_start_ns: w.window_start_ns, window_end_ns: w.window_end_ns })
                .collect();
            window_xml.sort_by_key(|w| w.link_id);
            NodeFrameXml {
                id: original_frame_index as u32,
                period_ns: first.period_ns,
                size_bytes: first.size_bytes,
                end_to_end_ns: first.end_to_end_ns,
                sender: first.sender.index() as u32,
                receiver: first.receiver.index() as u32,
                windows: WindowsXml { window: window_xml },
            }
        })
        .collect();

    NodeSubnetworkXml {
        general: NodeSubnetworkGeneralXml {
            min_switch_residency_ns: protocol.min_switch_residency_ns,
            time_between_frames_ns: protocol.time_between_frames_ns,
        },
        nodes,
        links,
        frames: NodeFramesXml { frame },
    }
}

/// Rewrite a per-node subnetwork file's `GeneralInformation` to reflect
/// degraded protocol parameters, keeping everything else untouched.
fn rewrite_general_information(path: &Path, params: DegradableParams) -> Result<()> {
    let xml = fs::read_to_string(path)?;
    let mut artifact: NodeSubnetworkXml = quick_xml::de::from_str(&xml).map_err(|e| Error::bad_config("NodeSubnetwork", e.to_string()))?;
    artifact.general.min_switch_residency_ns = params.min_switch_residency_ns;
    artifact.general.time_between_frames_ns = params.time_between_frames_ns;
    let rewritten = crate::xml::subnetwork_xml::write_node_subnetwork(&artifact)?;
    fs::write(path, rewritten)?;
    Ok(())
}

/// Run one full regeneration (spec §4.5, §4.6). Returns the updated offsets
/// for every originally-affected and already-scheduled frame touched by the
/// recovery, keyed by original frame index.
pub fn regenerate(request: &RegenRequest) -> Result<HashMap<usize, Frame>> {
    log::info!("regeneration started for failed link {}", request.failed_link);
    let mut state = RegenState::Analyzing;
    log::trace!("state -> {state:?}");

    let membership_dir = request.working_dir.join("Membership");
    let node_dir = request.working_dir.join("Node");
    let schedules_dir = node_dir.join("Schedules");
    prepare_dir(&membership_dir)?;
    prepare_dir(&node_dir)?;
    prepare_dir(&schedules_dir)?;

    let membership = match membership::build(
        request.topology,
        request.frames,
        request.failed_link,
        &request.protocol,
        request.max_candidate_paths,
    ) {
        Ok(m) => m,
        Err(e) => {
            state = RegenState::Failed;
            log::error!("impact analysis failed: {e}");
            return Err(e);
        }
    };
    state = RegenState::MembershipBuilt;
    log::trace!("state -> {state:?}");

    let membership_xml = crate::xml::subnetwork_xml::write_membership(&membership_artifact(&membership))?;
    fs::write(membership_dir.join("membership_network.xml"), membership_xml)?;

    let shards = shard::shard(&membership, request.frames, request.protocol.min_switch_residency_ns);
    state = RegenState::Sharded;
    log::debug!("partitioned recovery region into {} per-node shard(s)", shards.len());
    log::trace!("state -> {state:?}");

    state = RegenState::Solving { shard_index: 0, shard_count: shards.len() };
    log::trace!("state -> {state:?}");
    let solved = solve_all_shards(request, &membership, &shards, &node_dir, &schedules_dir)?;

    let mut results: HashMap<usize, Frame> = HashMap::new();
    for (node_shard, scheduled_frames) in shards.iter().zip(solved.iter()) {
        merge_shard_results(node_shard, scheduled_frames, &mut results);
    }

    state = RegenState::Done;
    log::info!("regeneration finished: {} frame(s) updated, state {state:?}", results.len());
    Ok(results)
}

#[cfg(not(feature = "parallel-regen"))]
fn solve_all_shards(
    request: &RegenRequest,
    membership: &MembershipNetwork,
    shards: &[NodeShard],
    node_dir: &Path,
    schedules_dir: &Path,
) -> Result<Vec<Vec<Frame>>> {
    let solver = ProcessSolver::new(&request.solver_program);
    shards
        .iter()
        .enumerate()
        .map(|(shard_index, node_shard)| {
            solve_one_shard(request, membership, node_shard, shard_index, node_dir, schedules_dir, &solver)
        })
        .collect()
}

/// Mirrors the teacher's optional `cbc-parallel` feature: independent
/// per-node subnetworks have disjoint link sets by construction (spec
/// §5), so they can be solved on a thread pool; aggregation still happens
/// back in `regenerate`, indexed by shard position, so it stays
/// deterministic regardless of solve order.
#[cfg(feature = "parallel-regen")]
fn solve_all_shards(
    request: &RegenRequest,
    membership: &MembershipNetwork,
    shards: &[NodeShard],
    node_dir: &Path,
    schedules_dir: &Path,
) -> Result<Vec<Vec<Frame>>> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get().min(shards.len().max(1)))
        .build()
        .map_err(|e| Error::Unrecoverable(format!("failed to build solver thread pool: {e}")))?;

    pool.install(|| {
        shards
            .par_iter()
            .enumerate()
            .map(|(shard_index, node_shard)| {
                let solver = ProcessSolver::new(&request.solver_program);
                solve_one_shard(request, membership, node_shard, shard_index, node_dir, schedules_dir, &solver)
            })
            .collect()
    })
}

fn solve_one_shard(
    request: &RegenRequest,
    membership: &MembershipNetwork,
    node_shard: &NodeShard,
    shard_index: usize,
    node_dir: &Path,
    schedules_dir: &Path,
    solver: &ProcessSolver,
) -> Result<Vec<Frame>> {
    let input_path = node_dir.join(format!("node_network{shard_index}.xml"));
    let output_path = schedules_dir.join(format!("node_schedule{shard_index}.xml"));

    let artifact = node_subnetwork_artifact(membership, &request.protocol, node_shard);
    let xml = crate::xml::subnetwork_xml::write_node_subnetwork(&artifact)?;
    fs::write(&input_path, xml)?;

    let initial = DegradableParams {
        time_between_frames_ns: request.protocol.time_between_frames_ns,
        min_switch_residency_ns: request.protocol.min_switch_residency_ns,
    };
    solver::solve_with_degradation(solver as &dyn Solver, &input_path, &output_path, rewrite_general_information, initial)
        .map_err(|e| {
            log::error!("shard {shard_index} could not be scheduled: {e}");
            e
        })?;

    let schedule_xml = fs::read_to_string(&output_path)?;
    schedule_xml::read(&schedule_xml)
}

/// The schedule artifact has no frame identity beyond position, so a
/// per-node subnetwork's frame order (the same order used when writing
/// `node_subnetwork_artifact`) is relied on to map solved offsets back to
/// original frame indices.
fn merge_shard_results(node_shard: &NodeShard, scheduled: &[Frame], results: &mut HashMap<usize, Frame>) {
    let mut by_frame: HashMap<usize, Vec<&shard::FrameWindow>> = HashMap::new();
    for w in &node_shard.windows {
        by_frame.entry(w.original_frame_index).or_default().push(w);
    }
    let mut frame_indices: Vec<usize> = by_frame.keys().copied().collect();
    frame_indices.sort_unstable();

    for (position, &original_frame_index) in frame_indices.iter().enumerate() {
        let Some(solved) = scheduled.get(position) else { continue };
        let entry = results.entry(original_frame_index).or_insert_with(|| solved.clone());
        for (&link, offset) in &solved.offsets {
            entry.add_offset(Offset { link, starting: offset.starting.clone(), ending: offset.ending.clone() });
        }
    }
}
