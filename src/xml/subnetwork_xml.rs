//! Membership and per-node subnetwork artifact writers (spec §4.5.2,
//! §4.5.3, §6 working directories). The membership artifact is a diagnostic
//! snapshot of the recovery region; the per-node artifact is the actual
//! solver input contract (`./Scheduler <node_network<i>.xml> <node_schedule<i>.xml>`).

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::xml::network_xml::{LinksXml, NodesXml};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Frame")]
pub struct MembershipFrameXml {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Period")]
    pub period_ns: u64,
    #[serde(rename = "Size")]
    pub size_bytes: u32,
    #[serde(rename = "EndToEnd")]
    pub end_to_end_ns: u64,
    #[serde(rename = "Sender")]
    pub sender: u32,
    #[serde(rename = "Receiver")]
    pub receiver: u32,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "WindowStart")]
    pub window_start_ns: u64,
    #[serde(rename = "WindowEnd")]
    pub window_end_ns: u64,
    #[serde(rename = "@affected")]
    pub affected: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Frames")]
pub struct MembershipFramesXml {
    #[serde(default, rename = "Frame")]
    pub frame: Vec<MembershipFrameXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Membership")]
pub struct MembershipNetworkXml {
    #[serde(rename = "Nodes")]
    pub nodes: NodesXml,
    #[serde(rename = "Links")]
    pub links: LinksXml,
    #[serde(rename = "Frames")]
    pub frames: MembershipFramesXml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Window")]
pub struct WindowXml {
    #[serde(rename = "LinkID")]
    pub link_id: u32,
    #[serde(rename = "WindowStart")]
    pub window_start_ns: u64,
    #[serde(rename = "WindowEnd")]
    pub window_end_ns: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Windows")]
pub struct WindowsXml {
    #[serde(default, rename = "Window")]
    pub window: Vec<WindowXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Frame")]
pub struct NodeFrameXml {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Period")]
    pub period_ns: u64,
    #[serde(rename = "Size")]
    pub size_bytes: u32,
    #[serde(rename = "EndToEnd")]
    pub end_to_end_ns: u64,
    #[serde(rename = "Sender")]
    pub sender: u32,
    #[serde(rename = "Receiver")]
    pub receiver: u32,
    #[serde(rename = "Windows")]
    pub windows: WindowsXml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Frames")]
pub struct NodeFramesXml {
    #[serde(default, rename = "Frame")]
    pub frame: Vec<NodeFrameXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "GeneralInformation")]
pub struct NodeSubnetworkGeneralXml {
    #[serde(rename = "MinTimeSwitch")]
    pub min_switch_residency_ns: u64,
    #[serde(rename = "TimeBetweenFrames")]
    pub time_between_frames_ns: u64,
}

/// One per-source-node subnetwork, the literal file handed to the solver
/// (spec §4.5.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Network")]
pub struct NodeSubnetworkXml {
    #[serde(rename = "GeneralInformation")]
    pub general: NodeSubnetworkGeneralXml,
    #[serde(rename = "Nodes")]
    pub nodes: NodesXml,
    #[serde(rename = "Links")]
    pub links: LinksXml,
    #[serde(rename = "Frames")]
    pub frames: NodeFramesXml,
}

fn to_pretty_xml<T: Serialize>(value: &T) -> Result<String> {
    let mut buffer = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
    serializer.indent(' ', 2);
    value.serialize(serializer)?;
    Ok(buffer)
}

/// Serialize the membership network artifact (spec §4.5.2).
pub fn write_membership(network: &MembershipNetworkXml) -> Result<String> {
    to_pretty_xml(network)
}

/// Serialize one per-node subnetwork artifact (spec §4.5.3).
pub fn write_node_subnetwork(network: &NodeSubnetworkXml) -> Result<String> {
    to_pretty_xml(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::network_xml::{LinkXml, NodeXml};

    #[test]
    fn node_subnetwork_round_trips() {
        let original = NodeSubnetworkXml {
            general: NodeSubnetworkGeneralXml { min_switch_residency_ns: 1_000, time_between_frames_ns: 10_000 },
            nodes: NodesXml {
                node: vec![NodeXml {
                    category: "end_system".to_string(),
                    id: 0,
                    connections: Default::default(),
                }],
            },
            links: LinksXml {
                link: vec![LinkXml { category: "wired".to_string(), id: 0, speed_mbps: 100, source: 0, destination: 1 }],
            },
            frames: NodeFramesXml {
                frame: vec![NodeFrameXml {
                    id: 0,
                    period_ns: 1_000,
                    size_bytes: 100,
                    end_to_end_ns: 1_000,
                    sender: 0,
                    receiver: 1,
                    windows: WindowsXml { window: vec![WindowXml { link_id: 0, window_start_ns: 0, window_end_ns: 800 }] },
                }],
            },
        };
        let xml = write_node_subnetwork(&original).unwrap();
        let parsed: NodeSubnetworkXml = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed.general.min_switch_residency_ns, 1_000);
        assert_eq!(parsed.frames.frame[0].windows.window[0].window_end_ns, 800);
    }
}
