//! Graph model (spec §3, Node / Link) and the low-level topology operations
//! (spec §4.1 relies on this for node/link creation; the routing planner and
//! the regeneration planner both reuse [`Topology::simple_paths`] and
//! [`Topology::hop_distances`]).
//!
//! Node and link identity are dense integer indices into authoritative
//! tables rather than pointers, per spec §9's re-architecture note. The
//! link table is the canonical source of link identity: `petgraph` edge
//! indices are not stable under removal (`remove_edge` swap-removes), so
//! link identity is tracked in `links` and the `petgraph` graph is kept only
//! to answer adjacency queries.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::{Error, Result};

/// Dense node identity, also the index into the underlying `petgraph` graph.
pub type NodeId = NodeIndex<u32>;

/// Dense, insertion-ordered, never-renumbered link identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub u32);

impl LinkId {
    /// Raw index into the link table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a node: a forwarding switch, or a traffic-generating end system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Forwards frames; never a frame sender or receiver.
    Switch,
    /// May send and receive frames.
    EndSystem,
}

/// Kind of physical medium a link represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// A wired link.
    Wired,
    /// A wireless link.
    Wireless,
}

/// Attributes of one entry in the canonical link table (spec §3, Link).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    /// Logical source endpoint.
    pub source: NodeId,
    /// Logical destination endpoint.
    pub destination: NodeId,
    /// Link speed in MB/s, always positive.
    pub speed_mbps: u32,
    /// Wired or wireless.
    pub kind: LinkKind,
}

impl LinkRecord {
    /// The minimum transmission time of a frame of `size_bytes` on this link, in
    /// nanoseconds, rounded up (spec §3, Offset invariant).
    pub fn transmission_time_ns(&self, size_bytes: u32) -> u64 {
        let numerator = size_bytes as u64 * 8_000;
        let speed = self.speed_mbps as u64;
        (numerator + speed - 1) / speed
    }
}

#[derive(Debug, Clone, Copy)]
enum LinkSlot {
    Active(LinkRecord),
    Removed(LinkRecord),
}

impl LinkSlot {
    fn record(&self) -> &LinkRecord {
        match self {
            LinkSlot::Active(r) | LinkSlot::Removed(r) => r,
        }
    }
}

/// The physical topology: nodes, the canonical link table, and a `petgraph`
/// adjacency structure kept only for traversal.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<NodeKind, LinkId, u32>,
    links: Vec<LinkSlot>,
    switches: Vec<NodeId>,
    end_systems: Vec<NodeId>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    /// An empty topology.
    pub fn new() -> Self {
        Topology {
            graph: UnGraph::default(),
            links: Vec::new(),
            switches: Vec::new(),
            end_systems: Vec::new(),
        }
    }

    /// Add a new switch node.
    pub fn add_switch(&mut self) -> NodeId {
        let id = self.graph.add_node(NodeKind::Switch);
        self.switches.push(id);
        id
    }

    /// Add a new end-system node.
    pub fn add_end_system(&mut self) -> NodeId {
        let id = self.graph.add_node(NodeKind::EndSystem);
        self.end_systems.push(id);
        id
    }

    /// Demote a switch to an end system. Valid exactly once per node, and only
    /// while the node is still a switch (spec §3, Node invariant).
    pub fn demote_to_end_system(&mut self, node: NodeId) -> Result<()> {
        match self.graph.node_weight(node) {
            Some(NodeKind::Switch) => {
                *self.graph.node_weight_mut(node).unwrap() = NodeKind::EndSystem;
                self.switches.retain(|&n| n != node);
                self.end_systems.push(node);
                Ok(())
            }
            Some(NodeKind::EndSystem) => Err(Error::BadTopology(format!(
                "node {node:?} is already an end system, cannot demote again"
            ))),
            None => Err(Error::BadTopology(format!("node {node:?} does not exist"))),
        }
    }

    /// Add an undirected physical link, returning its canonical [`LinkId`].
    pub fn add_link(
        &mut self,
        source: NodeId,
        destination: NodeId,
        kind: LinkKind,
        speed_mbps: u32,
    ) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        let record = LinkRecord {
            source,
            destination,
            speed_mbps,
            kind,
        };
        self.links.push(LinkSlot::Active(record));
        self.graph.add_edge(source, destination, id);
        id
    }

    /// Tombstone a link: it is no longer traversable, but its index remains
    /// valid and is never reused (spec §3, Link invariant).
    pub fn remove_link(&mut self, link: LinkId) {
        if let Some(slot) = self.links.get_mut(link.index()) {
            let record = *slot.record();
            let edge = self
                .graph
                .edge_indices()
                .find(|&e| self.graph.edge_weight(e) == Some(&link));
            if let Some(edge) = edge {
                self.graph.remove_edge(edge);
            }
            *slot = LinkSlot::Removed(record);
        }
    }

    /// Look up a link's attributes, `None` if out of range (tombstoned links
    /// still return their attributes — tombstoning affects traversal only).
    pub fn link(&self, link: LinkId) -> Option<&LinkRecord> {
        self.links.get(link.index()).map(|s| s.record())
    }

    /// Whether the link is still traversable.
    pub fn is_active(&self, link: LinkId) -> bool {
        matches!(self.links.get(link.index()), Some(LinkSlot::Active(_)))
    }

    /// Number of entries in the link table, including tombstoned ones.
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Number of nodes in the topology.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// All switch node ids, in creation order.
    pub fn switches(&self) -> &[NodeId] {
        &self.switches
    }

    /// All end-system node ids, in creation order.
    pub fn end_systems(&self) -> &[NodeId] {
        &self.end_systems
    }

    /// The kind of a node.
    pub fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.graph.node_weight(node).copied()
    }

    /// Nodes adjacent to `node` over active links, paired with the link used.
    fn active_neighbors(&self, node: NodeId) -> Vec<(NodeId, LinkId)> {
        self.graph
            .edges(node)
            .filter_map(|e| {
                let link = *e.weight();
                self.is_active(link).then(|| {
                    let other = if e.source() == node {
                        e.target()
                    } else {
                        e.source()
                    };
                    (other, link)
                })
            })
            .collect()
    }

    /// Enumerate every simple path (no repeated link) from `source` to
    /// `destination`, as sequences of [`LinkId`]. Tombstoned links and any
    /// link in `excluded` are never traversed. Deterministic order: a DFS in
    /// link-creation order at each step.
    pub fn simple_paths(
        &self,
        source: NodeId,
        destination: NodeId,
        excluded: &HashSet<LinkId>,
    ) -> Vec<Vec<LinkId>> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        visited.insert(source);
        self.simple_paths_dfs(source, destination, excluded, &mut visited, &mut path, &mut results);
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn simple_paths_dfs(
        &self,
        current: NodeId,
        destination: NodeId,
        excluded: &HashSet<LinkId>,
        visited: &mut HashSet<NodeId>,
        path: &mut Vec<LinkId>,
        results: &mut Vec<Vec<LinkId>>,
    ) {
        if current == destination {
            if !path.is_empty() {
                results.push(path.clone());
            }
            return;
        }
        let mut neighbors = self.active_neighbors(current);
        neighbors.sort_by_key(|(_, link)| *link);
        for (next, link) in neighbors {
            if excluded.contains(&link) || visited.contains(&next) {
                continue;
            }
            visited.insert(next);
            path.push(link);
            self.simple_paths_dfs(next, destination, excluded, visited, path, results);
            path.pop();
            visited.remove(&next);
        }
    }

    /// Hop-count distance from `source` to every reachable node over active
    /// links, via breadth-first search. Used by the "local" frame class (spec
    /// §4.2) to find end systems tied at minimum distance.
    pub fn hop_distances(&self, source: NodeId) -> HashMap<NodeId, usize> {
        let mut distances = HashMap::new();
        distances.insert(source, 0);
        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(node) = queue.pop_front() {
            let d = distances[&node];
            for (next, _) in self.active_neighbors(node) {
                if !distances.contains_key(&next) {
                    distances.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        distances
    }

    /// The source/destination endpoints of a link, in its recorded direction.
    pub fn link_endpoints(&self, link: LinkId) -> Option<(NodeId, NodeId)> {
        self.link(link).map(|r| (r.source, r.destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Topology, NodeId, NodeId, NodeId, NodeId, [LinkId; 3]) {
        let mut t = Topology::new();
        let es0 = t.add_end_system();
        let s1 = t.add_switch();
        let s2 = t.add_switch();
        let es3 = t.add_end_system();
        let l0 = t.add_link(es0, s1, LinkKind::Wired, 100);
        let l1 = t.add_link(s1, s2, LinkKind::Wired, 100);
        let l2 = t.add_link(s2, es3, LinkKind::Wired, 100);
        (t, es0, s1, s2, es3, [l0, l1, l2])
    }

    #[test]
    fn linear_chain_has_one_simple_path() {
        let (t, es0, _s1, _s2, es3, [l0, l1, l2]) = chain();
        let paths = t.simple_paths(es0, es3, &HashSet::new());
        assert_eq!(paths, vec![vec![l0, l1, l2]]);
    }

    #[test]
    fn tombstoned_link_is_not_traversed() {
        let (mut t, es0, _s1, _s2, es3, [l0, ..]) = chain();
        t.remove_link(l0);
        let paths = t.simple_paths(es0, es3, &HashSet::new());
        assert!(paths.is_empty());
        assert!(t.link(l0).is_some(), "tombstoned link keeps its attributes");
    }

    #[test]
    fn link_index_is_never_renumbered() {
        let (mut t, es0, s1, ..) = chain();
        let doomed = t.add_link(es0, s1, LinkKind::Wired, 10);
        t.remove_link(doomed);
        let after = t.add_link(es0, s1, LinkKind::Wired, 10);
        assert_eq!(doomed.0 + 1, after.0);
    }

    #[test]
    fn demote_switch_once_then_reject() {
        let mut t = Topology::new();
        let s = t.add_switch();
        assert!(t.demote_to_end_system(s).is_ok());
        assert_eq!(t.node_kind(s), Some(NodeKind::EndSystem));
        assert!(t.demote_to_end_system(s).is_err());
    }

    #[test]
    fn hop_distance_on_chain() {
        let (t, es0, s1, s2, es3, _) = chain();
        let d = t.hop_distances(es0);
        assert_eq!(d[&es0], 0);
        assert_eq!(d[&s1], 1);
        assert_eq!(d[&s2], 2);
        assert_eq!(d[&es3], 3);
    }
}
