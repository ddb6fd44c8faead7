//! Network artifact read/write (spec §6, "Network XML"): the generator's
//! output and the evaluator's input. Serialized with `quick-xml`'s serde
//! integration; attributes use the `@name` rename convention it recognizes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::graph::{LinkId, LinkKind, NodeId, NodeKind, Topology};
use crate::network::Network;

fn link_kind_category(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Wired => "wired",
        LinkKind::Wireless => "wireless",
    }
}

fn node_kind_category(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Switch => "switch",
        NodeKind::EndSystem => "end_system",
    }
}

fn join_links(links: &[LinkId]) -> String {
    links.iter().map(|l| l.0.to_string()).collect::<Vec<_>>().join(";")
}

fn parse_links(text: &str) -> Result<Vec<LinkId>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(';')
        .map(|t| {
            t.trim()
                .parse::<u32>()
                .map(LinkId)
                .map_err(|e| Error::bad_config("Path", format!("bad link index `{t}`: {e}")))
        })
        .collect()
}

/// Every link-index frontier where a frame's receiver paths diverge
/// (original `__calculate_splits`): a point where more than one receiver's
/// path continues with a different link after sharing a common prefix.
fn calculate_splits(paths: &[Vec<LinkId>]) -> Vec<LinkId> {
    fn recurse(paths: &[&[LinkId]], out: &mut Vec<LinkId>) {
        let mut groups: Vec<(LinkId, Vec<&[LinkId]>)> = Vec::new();
        for &p in paths {
            if p.is_empty() {
                continue;
            }
            let head = p[0];
            match groups.iter_mut().find(|(l, _)| *l == head) {
                Some(g) => g.1.push(&p[1..]),
                None => groups.push((head, vec![&p[1..]])),
            }
        }
        if groups.len() > 1 {
            out.extend(groups.iter().map(|(l, _)| *l));
        }
        for (_, rest) in &groups {
            if rest.iter().any(|r| !r.is_empty()) {
                recurse(rest, out);
            }
        }
    }
    let refs: Vec<&[LinkId]> = paths.iter().map(|p| p.as_slice()).collect();
    let mut out = Vec::new();
    recurse(&refs, &mut out);
    out.sort_unstable();
    out.dedup();
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "GeneralInformation")]
pub struct GeneralInformationXml {
    #[serde(rename = "NumberFrames")]
    pub number_frames: u32,
    #[serde(rename = "NumberLinks")]
    pub number_links: u32,
    #[serde(rename = "NumberNodes")]
    pub number_nodes: u32,
    #[serde(rename = "HyperPeriod")]
    pub hyper_period_ns: u64,
    #[serde(rename = "Schedulable")]
    pub schedulable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Link")]
pub struct LinkRefXml {
    #[serde(rename = "$text")]
    pub id: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Connections")]
pub struct ConnectionsXml {
    #[serde(default, rename = "Link")]
    pub link: Vec<LinkRefXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Node")]
pub struct NodeXml {
    #[serde(rename = "@category")]
    pub category: String,
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default, rename = "Connections")]
    pub connections: ConnectionsXml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Nodes")]
pub struct NodesXml {
    #[serde(default, rename = "Node")]
    pub node: Vec<NodeXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Link")]
pub struct LinkXml {
    #[serde(rename = "@category")]
    pub category: String,
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Speed")]
    pub speed_mbps: u32,
    #[serde(rename = "Source")]
    pub source: u32,
    #[serde(rename = "Destination")]
    pub destination: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Links")]
pub struct LinksXml {
    #[serde(default, rename = "Link")]
    pub link: Vec<LinkXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "NetworkDescription")]
pub struct NetworkDescriptionXml {
    #[serde(rename = "Nodes")]
    pub nodes: NodesXml,
    #[serde(rename = "Links")]
    pub links: LinksXml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Paths")]
pub struct PathsXml {
    #[serde(default, rename = "Path")]
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Splits")]
pub struct SplitsXml {
    #[serde(default, rename = "Split")]
    pub split: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Frame")]
pub struct FrameXml {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Period")]
    pub period_ns: u64,
    #[serde(rename = "Starting")]
    pub starting_ns: u64,
    #[serde(rename = "Deadline")]
    pub deadline_ns: u64,
    #[serde(rename = "Size")]
    pub size_bytes: u32,
    #[serde(rename = "EndToEnd")]
    pub end_to_end_ns: u64,
    #[serde(rename = "Paths")]
    pub paths: PathsXml,
    #[serde(default, rename = "Splits")]
    pub splits: SplitsXml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Frames")]
pub struct FramesXml {
    #[serde(default, rename = "Frame")]
    pub frame: Vec<FrameXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "TrafficInformation")]
pub struct TrafficInformationXml {
    #[serde(rename = "Frames")]
    pub frames: FramesXml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Network")]
pub struct NetworkXml {
    #[serde(rename = "GeneralInformation")]
    pub general_information: GeneralInformationXml,
    #[serde(rename = "NetworkDescription")]
    pub network_description: NetworkDescriptionXml,
    #[serde(rename = "TrafficInformation")]
    pub traffic_information: TrafficInformationXml,
}

/// Convert a generated [`Network`] into its artifact form.
pub fn to_artifact(network: &Network) -> NetworkXml {
    let topology = &network.topology;

    let mut node = Vec::new();
    for &n in topology.switches().iter().chain(topology.end_systems()) {
        let outgoing: Vec<LinkRefXml> = (0..topology.num_links())
            .map(|i| LinkId(i as u32))
            .filter(|&l| topology.is_active(l))
            .filter(|&l| topology.link_endpoints(l).map(|(s, _)| s == n).unwrap_or(false))
            .map(|l| LinkRefXml { id: l.0 })
            .collect();
        node.push(NodeXml {
            category: node_kind_category(topology.node_kind(n).unwrap()).to_string(),
            id: n.index() as u32,
            connections: ConnectionsXml { link: outgoing },
        });
    }

    let mut link = Vec::new();
    for i in 0..topology.num_links() {
        let id = LinkId(i as u32);
        if let Some(record) = topology.link(id) {
            link.push(LinkXml {
                category: link_kind_category(record.kind).to_string(),
                id: id.0,
                speed_mbps: record.speed_mbps,
                source: record.source.index() as u32,
                destination: record.destination.index() as u32,
            });
        }
    }

    let mut frame = Vec::new();
    for (i, f) in network.frames.iter().enumerate() {
        let splits = calculate_splits(&f.paths);
        frame.push(FrameXml {
            id: i as u32,
            period_ns: f.period_ns,
            starting_ns: f.starting_ns,
            deadline_ns: f.deadline_ns,
            size_bytes: f.size_bytes,
            end_to_end_ns: f.end_to_end_ns,
            paths: PathsXml { path: f.paths.iter().map(|p| join_links(p)).collect() },
            splits: if splits.is_empty() {
                SplitsXml::default()
            } else {
                SplitsXml { split: vec![join_links(&splits)] }
            },
        });
    }

    NetworkXml {
        general_information: GeneralInformationXml {
            number_frames: network.frames.len() as u32,
            number_links: topology.num_links() as u32,
            number_nodes: topology.num_nodes() as u32,
            hyper_period_ns: network.routing.hyper_period_ns,
            schedulable: network.routing.is_schedulable(),
        },
        network_description: NetworkDescriptionXml {
            nodes: NodesXml { node },
            links: LinksXml { link },
        },
        traffic_information: TrafficInformationXml { frames: FramesXml { frame } },
    }
}

/// Serialize a network to its XML artifact text, pretty-printed with a
/// 2-space indent.
pub fn write(network: &Network) -> Result<String> {
    let artifact = to_artifact(network);
    let mut buffer = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
    serializer.indent(' ', 2);
    artifact.serialize(serializer)?;
    Ok(buffer)
}

/// Parse a network artifact back into a topology and frame list (the
/// evaluator's input side). Sender/receivers are derived from each frame's
/// path endpoints, since the artifact does not store them directly.
pub fn read(xml: &str) -> Result<(Topology, Vec<Frame>)> {
    let artifact: NetworkXml = quick_xml::de::from_str(xml).map_err(|e| Error::bad_config("Network", e.to_string()))?;

    let mut topology = Topology::new();
    let mut by_id: std::collections::HashMap<u32, NodeId> = std::collections::HashMap::new();
    let mut sorted_nodes = artifact.network_description.nodes.node.clone();
    sorted_nodes.sort_by_key(|n| n.id);
    for node in &sorted_nodes {
        let kind = match node.category.as_str() {
            "switch" => NodeKind::Switch,
            "end_system" => NodeKind::EndSystem,
            other => return Err(Error::bad_config("Network/NetworkDescription/Nodes/Node", format!("unknown category `{other}`"))),
        };
        let id = match kind {
            NodeKind::Switch => topology.add_switch(),
            NodeKind::EndSystem => topology.add_end_system(),
        };
        by_id.insert(node.id, id);
    }

    let mut sorted_links = artifact.network_description.links.link.clone();
    sorted_links.sort_by_key(|l| l.id);
    for (expected_index, link) in sorted_links.iter().enumerate() {
        if link.id as usize != expected_index {
            return Err(Error::bad_config("Network/NetworkDescription/Links/Link", "link ids are not contiguous from 0"));
        }
        let kind = match link.category.as_str() {
            "wired" => LinkKind::Wired,
            "wireless" => LinkKind::Wireless,
            other => return Err(Error::bad_config("Network/NetworkDescription/Links/Link", format!("unknown category `{other}`"))),
        };
        let source = *by_id
            .get(&link.source)
            .ok_or_else(|| Error::bad_config("Network/NetworkDescription/Links/Link", "unknown source node"))?;
        let destination = *by_id
            .get(&link.destination)
            .ok_or_else(|| Error::bad_config("Network/NetworkDescription/Links/Link", "unknown destination node"))?;
        topology.add_link(source, destination, kind, link.speed_mbps);
    }

    let mut frames = Vec::with_capacity(artifact.traffic_information.frames.frame.len());
    for frame_xml in &artifact.traffic_information.frames.frame {
        let paths: Vec<Vec<LinkId>> = frame_xml
            .paths
            .path
            .iter()
            .map(|p| parse_links(p))
            .collect::<Result<_>>()?;
        let sender = paths
            .first()
            .and_then(|p| p.first())
            .and_then(|&l| topology.link_endpoints(l))
            .map(|(s, _)| s)
            .ok_or_else(|| Error::bad_config("Network/TrafficInformation/Frames/Frame", "frame has no paths"))?;
        let receivers = paths
            .iter()
            .map(|p| {
                p.last()
                    .and_then(|&l| topology.link_endpoints(l))
                    .map(|(_, d)| d)
                    .ok_or_else(|| Error::bad_config("Network/TrafficInformation/Frames/Frame", "empty path"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut frame = Frame::with_attributes(
            sender,
            receivers,
            frame_xml.period_ns,
            frame_xml.deadline_ns,
            frame_xml.size_bytes,
            frame_xml.starting_ns,
            frame_xml.end_to_end_ns,
        );
        frame.paths = paths;
        frames.push(frame);
    }

    Ok((topology, frames))
}
