//! Configuration XML reader (spec §6, "Configuration XML"). Normalizes every
//! time value to nanoseconds and every speed value to MB/s at parse time.

use roxmltree::Node;

use crate::error::{Error, Result};
use crate::generator::{FrameClassWeights, FrameTypeDescriptor};
use crate::graph::{LinkKind, NodeKind};
use crate::network::{Config, TrafficConfig};
use crate::routing::ProtocolParams;
use crate::topology::{CyclicConnection, LinkSpec, TopologyDescription};

fn child<'a, 'b>(node: Node<'a, 'b>, name: &str) -> Option<Node<'a, 'b>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == name)
}

fn require_child<'a, 'b>(node: Node<'a, 'b>, name: &str, path: &str) -> Result<Node<'a, 'b>> {
    child(node, name).ok_or_else(|| Error::bad_config(path, format!("missing <{name}>")))
}

fn text<'a>(node: Node<'a, '_>, path: &str) -> Result<&'a str> {
    node.text().map(str::trim).ok_or_else(|| Error::bad_config(path, "missing text content"))
}

fn parse_f64(node: Node, path: &str) -> Result<f64> {
    text(node, path)?
        .parse::<f64>()
        .map_err(|e| Error::bad_config(path, format!("not a number: {e}")))
}

fn parse_u32(node: Node, path: &str) -> Result<u32> {
    text(node, path)?
        .parse::<u32>()
        .map_err(|e| Error::bad_config(path, format!("not an integer: {e}")))
}

fn parse_i64(node: Node, path: &str) -> Result<i64> {
    text(node, path)?
        .parse::<i64>()
        .map_err(|e| Error::bad_config(path, format!("not an integer: {e}")))
}

/// Read a time value (any of `{ns, us, ms, s}`, in its `unit` attribute) and
/// normalize it to nanoseconds.
fn parse_time_ns(node: Node, path: &str) -> Result<u64> {
    let raw = parse_f64(node, path)?;
    let unit = node.attribute("unit").unwrap_or("ns");
    let ns = match unit {
        "ns" => raw,
        "us" => raw * 1_000.0,
        "ms" => raw * 1_000_000.0,
        "s" => raw * 1_000_000_000.0,
        other => return Err(Error::bad_config(path, format!("unknown time unit `{other}`"))),
    };
    Ok(ns.round() as u64)
}

/// Read a speed value (any of `{KB/s, MB/s, GB/s}`) and normalize it to MB/s.
fn parse_speed_mbps(node: Node, path: &str) -> Result<u32> {
    let raw = parse_f64(node, path)?;
    let unit = node.attribute("unit").unwrap_or("MB/s");
    let mbps = match unit {
        "MB/s" => raw,
        "KB/s" => raw / 1_000.0,
        "GB/s" => raw * 1_000.0,
        other => return Err(Error::bad_config(path, format!("unknown speed unit `{other}`"))),
    };
    Ok(mbps.round() as u32)
}

fn parse_link_kind(category: &str, path: &str) -> Result<LinkKind> {
    match category {
        "wired" => Ok(LinkKind::Wired),
        "wireless" => Ok(LinkKind::Wireless),
        other => Err(Error::bad_config(path, format!("unknown link category `{other}`"))),
    }
}

fn parse_link_element(node: Node, path: &str) -> Result<LinkSpec> {
    let category = node.attribute("category").unwrap_or("wired");
    let kind = parse_link_kind(category, path)?;
    let speed_node = require_child(node, "Speed", path)?;
    let speed_mbps = parse_speed_mbps(speed_node, path)?;
    Ok(LinkSpec { kind, speed_mbps })
}

/// Parse `Topology/TopologyInformation` into reserved protocol parameters.
fn parse_protocol(node: Node) -> Result<ProtocolParams> {
    let path = "Topology/TopologyInformation";
    let info = require_child(node, "TopologyInformation", path)?;
    Ok(ProtocolParams {
        min_switch_residency_ns: parse_time_ns(require_child(info, "MinTimeSwitch", path)?, path)?,
        period_protocol_ns: parse_time_ns(require_child(info, "PeriodProtocol", path)?, path)?,
        time_protocol_ns: parse_time_ns(require_child(info, "TimeProtocol", path)?, path)?,
        time_between_frames_ns: parse_time_ns(require_child(info, "TimeBetweenFrames", path)?, path)?,
    })
}

/// Parse `Topology/Description` into a [`TopologyDescription`], choosing the
/// tree or cyclic form by which child elements are present.
fn parse_topology_description(node: Node) -> Result<TopologyDescription> {
    let path = "Topology/Description";
    let description = require_child(node, "Description", path)?;
    let bifurcations: Vec<Node> = description
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "Bifurcation")
        .collect();
    let nodes: Vec<Node> = description
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "Node")
        .collect();

    if !bifurcations.is_empty() && !nodes.is_empty() {
        return Err(Error::bad_config(path, "both Bifurcation and Node children present"));
    }

    if !bifurcations.is_empty() {
        let mut tokens = Vec::with_capacity(bifurcations.len());
        let mut links = Vec::new();
        for bifurcation in bifurcations {
            let number_links = parse_i64(require_child(bifurcation, "NumberLinks", path)?, path)?;
            tokens.push(number_links);
            let link_children: Vec<Node> = bifurcation
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "Link")
                .collect();
            if !link_children.is_empty() && link_children.len() as i64 != number_links.abs() {
                return Err(Error::bad_config(
                    path,
                    format!(
                        "bifurcation declares {number_links} links but has {} Link children",
                        link_children.len()
                    ),
                ));
            }
            for link_node in link_children {
                links.push(parse_link_element(link_node, path)?);
            }
        }
        return Ok(TopologyDescription::Tree { tokens, links });
    }

    if !nodes.is_empty() {
        let mut kinds = Vec::with_capacity(nodes.len());
        let mut connections: Vec<Vec<CyclicConnection>> = Vec::with_capacity(nodes.len());
        for node_el in &nodes {
            let category = node_el.attribute("category").unwrap_or("end_system");
            let kind = match category {
                "switch" => NodeKind::Switch,
                "end_system" => NodeKind::EndSystem,
                other => return Err(Error::bad_config(path, format!("unknown node category `{other}`"))),
            };
            kinds.push(kind);
            let mut conns = Vec::new();
            for connection in node_el.children().filter(|c| c.is_element() && c.tag_name().name() == "Connection") {
                let peer = parse_u32(require_child(connection, "NodeID", path)?, path)? as usize;
                let link_node = require_child(connection, "Link", path)?;
                let link = parse_link_element(link_node, path)?;
                conns.push((peer, link));
            }
            connections.push(conns);
        }
        return Ok(TopologyDescription::Cyclic { nodes: kinds, connections });
    }

    Err(Error::bad_config(path, "neither Bifurcation nor Node children present"))
}

/// Parse `Traffic/TrafficInformation` and `Traffic/FrameDescription`.
fn parse_traffic(node: Node) -> Result<TrafficConfig> {
    let path = "Traffic";
    let traffic = require_child(node, "Traffic", path)?;
    let info = require_child(traffic, "TrafficInformation", path)?;
    let num_frames = parse_u32(require_child(info, "NumberFrames", path)?, path)?;
    let class_weights = FrameClassWeights {
        single: parse_f64(require_child(info, "Single", path)?, path)?,
        local: parse_f64(require_child(info, "Local", path)?, path)?,
        multiple: parse_f64(require_child(info, "Multiple", path)?, path)?,
        broadcast: parse_f64(require_child(info, "Broadcast", path)?, path)?,
    };

    let description = require_child(traffic, "FrameDescription", path)?;
    let mut frame_types = Vec::new();
    for frame_type in description.children().filter(|c| c.is_element() && c.tag_name().name() == "FrameType") {
        let period_ns = parse_time_ns(require_child(frame_type, "Period", path)?, path)?;
        let deadline_ns = match child(frame_type, "Deadline") {
            Some(n) => parse_time_ns(n, path)?,
            None => 0,
        };
        let end_to_end_ns = parse_time_ns(require_child(frame_type, "EndToEnd", path)?, path)?;
        let size_bytes = parse_u32(require_child(frame_type, "Size", path)?, path)?;
        let weight = parse_f64(require_child(frame_type, "Percentage", path)?, path)?;
        frame_types.push(FrameTypeDescriptor { period_ns, deadline_ns, size_bytes, end_to_end_ns, weight });
    }

    Ok(TrafficConfig { num_frames, class_weights, frame_types })
}

/// Parse a complete configuration document (spec §6).
pub fn parse(xml: &str) -> Result<Config> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let topology_el = require_child(root, "Topology", "Topology")?;

    Ok(Config {
        topology: parse_topology_description(topology_el)?,
        protocol: parse_protocol(topology_el)?,
        traffic: parse_traffic(root)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <Configuration>
      <Topology>
        <TopologyInformation>
          <MinTimeSwitch unit="us">1</MinTimeSwitch>
          <PeriodProtocol unit="ms">1</PeriodProtocol>
          <TimeProtocol unit="us">10</TimeProtocol>
          <TimeBetweenFrames unit="ns">100</TimeBetweenFrames>
        </TopologyInformation>
        <Description>
          <Bifurcation>
            <NumberLinks>-2</NumberLinks>
            <Link category="wired"><Speed unit="MB/s">100</Speed></Link>
            <Link category="wired"><Speed unit="KB/s">200000</Speed></Link>
          </Bifurcation>
        </Description>
      </Topology>
      <Traffic>
        <TrafficInformation>
          <NumberFrames>10</NumberFrames>
          <Single>1</Single>
          <Local>0</Local>
          <Multiple>0</Multiple>
          <Broadcast>0</Broadcast>
        </TrafficInformation>
        <FrameDescription>
          <FrameType>
            <Period unit="ms">1</Period>
            <EndToEnd unit="ms">1</EndToEnd>
            <Size>100</Size>
            <Percentage>100</Percentage>
          </FrameType>
        </FrameDescription>
      </Traffic>
    </Configuration>
    "#;

    #[test]
    fn parses_units_and_tree_topology() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.protocol.min_switch_residency_ns, 1_000);
        assert_eq!(config.protocol.period_protocol_ns, 1_000_000);
        assert_eq!(config.protocol.time_protocol_ns, 10_000);
        assert_eq!(config.protocol.time_between_frames_ns, 100);
        match &config.topology {
            TopologyDescription::Tree { tokens, links } => {
                assert_eq!(tokens, &vec![-2]);
                assert_eq!(links[0].speed_mbps, 100);
                assert_eq!(links[1].speed_mbps, 200);
            }
            _ => panic!("expected tree topology"),
        }
        assert_eq!(config.traffic.num_frames, 10);
        assert_eq!(config.traffic.frame_types.len(), 1);
        assert_eq!(config.traffic.frame_types[0].period_ns, 1_000_000);
        assert_eq!(config.traffic.frame_types[0].deadline_ns, 0);
    }

    #[test]
    fn mismatched_link_count_is_bad_config() {
        let bad = SAMPLE.replace("<NumberLinks>-2</NumberLinks>", "<NumberLinks>-3</NumberLinks>");
        assert!(matches!(parse(&bad), Err(Error::BadConfig { .. })));
    }
}
