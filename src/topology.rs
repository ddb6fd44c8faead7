//! Topology builder (spec §4.1): turns a parsed tree or cyclic description
//! into a populated [`Topology`].
//!
//! The tree-form recursion mirrors
//! `original_source/Network Generator/NetworkGenerator/Network.py`'s
//! `__recursive_create_network`, with one deliberate simplification: link
//! descriptors are consumed strictly in edge-creation (depth-first) order,
//! per spec.md §4.1's literal wording ("decorates each edge in creation
//! order"), rather than the original's `num_links`/`branch` index
//! remapping, which exists there only to thread a differently-ordered flat
//! array through the recursion and is not an observable invariant the spec
//! pins down (see DESIGN.md).

use crate::error::{Error, Result};
use crate::graph::{LinkKind, NodeKind, Topology};

/// One parsed link descriptor: `(w|x)<speed>` decoded to kind + MB/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpec {
    /// Wired or wireless.
    pub kind: LinkKind,
    /// Speed in MB/s.
    pub speed_mbps: u32,
}

impl LinkSpec {
    /// Parse a descriptor of the form `w100` or `x10`.
    pub fn parse(token: &str) -> Result<Self> {
        let mut chars = token.chars();
        let kind = match chars.next() {
            Some('w') => LinkKind::Wired,
            Some('x') => LinkKind::Wireless,
            _ => {
                return Err(Error::BadTopology(format!(
                    "unknown link category in descriptor `{token}`"
                )))
            }
        };
        let rest: String = chars.collect();
        let speed_mbps: u32 = rest
            .parse()
            .map_err(|_| Error::BadTopology(format!("bad link speed in descriptor `{token}`")))?;
        Ok(LinkSpec { kind, speed_mbps })
    }
}

/// One node's adjacency list in the cyclic description: peer index plus the
/// link connecting to it.
pub type CyclicConnection = (usize, LinkSpec);

/// A parsed topology description, either form (spec §4.1).
#[derive(Debug, Clone)]
pub enum TopologyDescription {
    /// Depth-first tree description: signed branch tokens plus a flat,
    /// creation-ordered sequence of link descriptors.
    Tree {
        /// Semicolon-separated signed integers, already parsed.
        tokens: Vec<i64>,
        /// Link descriptors, consumed in edge-creation order.
        links: Vec<LinkSpec>,
    },
    /// Explicit adjacency-list description.
    Cyclic {
        /// Kind of each node, by index.
        nodes: Vec<NodeKind>,
        /// Per-node connection list, same indexing as `nodes`.
        connections: Vec<Vec<CyclicConnection>>,
    },
}

/// Build a [`Topology`] from a parsed description (spec §4.1).
pub fn build(description: &TopologyDescription) -> Result<Topology> {
    match description {
        TopologyDescription::Tree { tokens, links } => build_tree(tokens, links),
        TopologyDescription::Cyclic { nodes, connections } => build_cyclic(nodes, connections),
    }
}

fn build_tree(tokens: &[i64], links: &[LinkSpec]) -> Result<Topology> {
    let mut topo = Topology::new();
    let root = topo.add_switch();
    let mut token_pos = 0usize;
    let mut link_pos = 0usize;
    build_tree_node(&mut topo, tokens, links, root, &mut token_pos, &mut link_pos)?;
    if token_pos != tokens.len() {
        return Err(Error::BadTopology(
            "topology description has extra elements".into(),
        ));
    }
    Ok(topo)
}

fn build_tree_node(
    topo: &mut Topology,
    tokens: &[i64],
    links: &[LinkSpec],
    parent: crate::graph::NodeId,
    token_pos: &mut usize,
    link_pos: &mut usize,
) -> Result<()> {
    let tok = *tokens.get(*token_pos).ok_or_else(|| {
        Error::BadTopology("topology description is wrongly formulated, there are open branches".into())
    })?;
    *token_pos += 1;

    if tok < 0 {
        let count = (-tok) as usize;
        for _ in 0..count {
            let leaf = topo.add_end_system();
            let link = next_link(links, link_pos)?;
            topo.add_link(parent, leaf, link.kind, link.speed_mbps);
        }
        Ok(())
    } else if tok == 0 {
        topo.demote_to_end_system(parent)
    } else {
        let count = tok as usize;
        for _ in 0..count {
            let child = topo.add_switch();
            let link = next_link(links, link_pos)?;
            topo.add_link(parent, child, link.kind, link.speed_mbps);
            build_tree_node(topo, tokens, links, child, token_pos, link_pos)?;
        }
        Ok(())
    }
}

fn next_link(links: &[LinkSpec], link_pos: &mut usize) -> Result<LinkSpec> {
    let link = *links.get(*link_pos).ok_or_else(|| {
        Error::BadTopology("not enough link descriptors for the topology description".into())
    })?;
    *link_pos += 1;
    Ok(link)
}

fn build_cyclic(nodes: &[NodeKind], connections: &[Vec<CyclicConnection>]) -> Result<Topology> {
    if nodes.len() != connections.len() {
        return Err(Error::BadTopology(
            "cyclic description node and connection list lengths differ".into(),
        ));
    }
    let mut topo = Topology::new();
    let ids: Vec<_> = nodes
        .iter()
        .map(|kind| match kind {
            NodeKind::Switch => topo.add_switch(),
            NodeKind::EndSystem => topo.add_end_system(),
        })
        .collect();

    for (node_idx, conns) in connections.iter().enumerate() {
        for &(peer_idx, link) in conns {
            if peer_idx == node_idx {
                return Err(Error::BadTopology(format!(
                    "node {node_idx} declares a self-loop"
                )));
            }
            if peer_idx >= nodes.len() {
                return Err(Error::BadTopology(format!(
                    "node {node_idx} connects to unknown peer {peer_idx}"
                )));
            }
            // The peer's adjacency list must declare the same edge back,
            // with matching attributes, regardless of which side has the
            // lower index (spec §4.1: `BadTopology` on "inconsistent
            // reciprocal edges").
            let reciprocal = connections[peer_idx].iter().find(|&&(p, _)| p == node_idx);
            match reciprocal {
                Some(&(_, other_link))
                    if other_link.kind == link.kind && other_link.speed_mbps == link.speed_mbps => {}
                Some(_) => {
                    return Err(Error::BadTopology(format!(
                        "inconsistent reciprocal edge between {node_idx} and {peer_idx}"
                    )))
                }
                None => {
                    return Err(Error::BadTopology(format!(
                        "node {peer_idx} does not declare a reciprocal edge back to {node_idx}"
                    )))
                }
            }
            if peer_idx < node_idx {
                // Already created when we visited `peer_idx`.
                continue;
            }
            topo.add_link(ids[node_idx], ids[peer_idx], link.kind, link.speed_mbps);
        }
    }
    Ok(topo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_link_spec() {
        let w = LinkSpec::parse("w100").unwrap();
        assert_eq!(w.kind, LinkKind::Wired);
        assert_eq!(w.speed_mbps, 100);
        let x = LinkSpec::parse("x10").unwrap();
        assert_eq!(x.kind, LinkKind::Wireless);
        assert_eq!(x.speed_mbps, 10);
        assert!(LinkSpec::parse("q5").is_err());
    }

    fn spec(s: &str) -> LinkSpec {
        LinkSpec::parse(s).unwrap()
    }

    #[test]
    fn linear_chain_tree() {
        // root switch -1 end system directly: "0" demotes root itself is not
        // this case; use "-1" to attach one end system to the (implicit) root,
        // then build the classic 4-node chain via two switches instead.
        let tokens = vec![1, -1];
        let links = vec![spec("w100"), spec("w100")];
        let desc = TopologyDescription::Tree { tokens, links };
        let topo = build(&desc).unwrap();
        // root(switch) -> child(switch) -> end system
        assert_eq!(topo.num_nodes(), 3);
        assert_eq!(topo.switches().len(), 2);
        assert_eq!(topo.end_systems().len(), 1);
        assert_eq!(topo.num_links(), 2);
    }

    #[test]
    fn broadcast_star_tree() {
        // root switch with 3 end systems directly attached.
        let tokens = vec![-3];
        let links = vec![spec("w100"), spec("w100"), spec("w100")];
        let desc = TopologyDescription::Tree { tokens, links };
        let topo = build(&desc).unwrap();
        assert_eq!(topo.switches().len(), 1);
        assert_eq!(topo.end_systems().len(), 3);
    }

    #[test]
    fn open_branch_is_bad_topology() {
        let tokens = vec![1];
        let links = vec![spec("w100")];
        let desc = TopologyDescription::Tree { tokens, links };
        assert!(matches!(build(&desc), Err(Error::BadTopology(_))));
    }

    #[test]
    fn extra_tokens_is_bad_topology() {
        let tokens = vec![-1, -1];
        let links = vec![spec("w100"), spec("w100")];
        let desc = TopologyDescription::Tree { tokens, links };
        assert!(matches!(build(&desc), Err(Error::BadTopology(_))));
    }

    #[test]
    fn cyclic_triangle() {
        let nodes = vec![NodeKind::EndSystem, NodeKind::EndSystem, NodeKind::EndSystem];
        let connections = vec![
            vec![(1, spec("w100")), (2, spec("w100"))],
            vec![(0, spec("w100")), (2, spec("w100"))],
            vec![(0, spec("w100")), (1, spec("w100"))],
        ];
        let desc = TopologyDescription::Cyclic { nodes, connections };
        let topo = build(&desc).unwrap();
        assert_eq!(topo.num_nodes(), 3);
        assert_eq!(topo.num_links(), 3);
    }

    #[test]
    fn cyclic_self_loop_rejected() {
        let nodes = vec![NodeKind::EndSystem, NodeKind::EndSystem];
        let connections = vec![vec![(0, spec("w100"))], vec![]];
        let desc = TopologyDescription::Cyclic { nodes, connections };
        assert!(matches!(build(&desc), Err(Error::BadTopology(_))));
    }
}
