//! Schedule artifact reader (spec §4.4, §6 "Schedule XML"): the external
//! solver's output. Frames carry no sender/receiver in this artifact — the
//! ingester only needs per-link offsets, so placeholders are synthesized,
//! matching the original `__read_frames`' `FrameOffset(0, [0], ...)`.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::{Frame, Offset};
use crate::graph::{LinkId, Topology};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Instance")]
pub struct InstanceXml {
    #[serde(rename = "TransmissionTime")]
    pub transmission_time_ns: u64,
    #[serde(rename = "EndingTime")]
    pub ending_time_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Link")]
pub struct LinkScheduleXml {
    #[serde(rename = "LinkID")]
    pub link_id: u32,
    #[serde(default, rename = "Instance")]
    pub instance: Vec<InstanceXml>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "Path")]
pub struct PathScheduleXml {
    #[serde(default, rename = "Link")]
    pub link: Vec<LinkScheduleXml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Frame")]
pub struct FrameScheduleXml {
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
    #[serde(rename = "Path")]
    pub path: PathScheduleXml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "FramesTransmission")]
pub struct FramesTransmissionXml {
    #[serde(default, rename = "Frame")]
    pub frame: Vec<FrameScheduleXml>,
}

/// Placeholder node id used for the synthesized sender/receiver of every
/// frame read from a schedule artifact.
fn placeholder_node() -> NodeIndex<u32> {
    NodeIndex::new(0)
}

/// Parse a schedule artifact into frames with offsets populated (spec §4.4).
pub fn read(xml: &str) -> Result<Vec<Frame>> {
    let artifact: FramesTransmissionXml =
        quick_xml::de::from_str(xml).map_err(|e| Error::bad_config("Schedule", e.to_string()))?;

    let mut frames = Vec::with_capacity(artifact.frame.len());
    for frame_xml in &artifact.frame {
        let mut frame = Frame::with_attributes(
            placeholder_node(),
            vec![placeholder_node()],
            frame_xml.period_ns,
            frame_xml.deadline_ns,
            frame_xml.size_bytes,
            frame_xml.starting_ns,
            frame_xml.end_to_end_ns,
        );

        let mut path = Vec::with_capacity(frame_xml.path.link.len());
        for link_xml in &frame_xml.path.link {
            let link = LinkId(link_xml.link_id);
            path.push(link);
            let mut offset = Offset::empty(link);
            for instance in &link_xml.instance {
                offset.starting.push(instance.transmission_time_ns);
                offset.ending.push(instance.ending_time_ns);
            }
            frame.add_offset(offset);
        }
        frame.paths.push(path);
        frames.push(frame);
    }
    Ok(frames)
}

/// Validate that every (frame, link) pair on a frame's path has a complete
/// offset, and that each instance's duration matches the size/speed-derived
/// minimum transmission time (spec §4.4).
pub fn validate(frames: &[Frame], topology: &Topology) -> Result<()> {
    for (frame_index, frame) in frames.iter().enumerate() {
        for path in &frame.paths {
            for &link in path {
                let offset = frame.offsets.get(&link).ok_or_else(|| {
                    Error::bad_config("Schedule", format!("frame {frame_index} has no offset for link {link}"))
                })?;
                let record = topology
                    .link(link)
                    .ok_or_else(|| Error::bad_config("Schedule", format!("frame {frame_index} references unknown link {link}")))?;
                let expected = record.transmission_time_ns(frame.size_bytes);
                for k in 0..offset.num_instances() {
                    let duration = offset.ending[k].saturating_sub(offset.starting[k]);
                    if duration != expected {
                        return Err(Error::bad_config(
                            "Schedule",
                            format!(
                                "frame {frame_index} link {link} instance {k}: duration {duration}ns != expected {expected}ns"
                            ),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LinkKind;

    const SAMPLE: &str = r#"
    <FramesTransmission>
      <Frame>
        <Period>1000</Period>
        <Starting>0</Starting>
        <Deadline>1000</Deadline>
        <Size>100</Size>
        <EndToEnd>1000</EndToEnd>
        <Path>
          <Link>
            <LinkID>0</LinkID>
            <Instance><TransmissionTime>0</TransmissionTime><EndingTime>8</EndingTime></Instance>
          </Link>
        </Path>
      </Frame>
    </FramesTransmission>
    "#;

    #[test]
    fn reads_offsets_from_schedule() {
        let frames = read(SAMPLE).unwrap();
        assert_eq!(frames.len(), 1);
        let offset = frames[0].offsets.get(&LinkId(0)).unwrap();
        assert_eq!(offset.starting, vec![0]);
        assert_eq!(offset.ending, vec![8]);
    }

    #[test]
    fn validate_accepts_matching_duration() {
        let frames = read(SAMPLE).unwrap();
        let mut topo = Topology::new();
        let a = topo.add_end_system();
        let b = topo.add_end_system();
        topo.add_link(a, b, LinkKind::Wired, 100_000);
        assert!(validate(&frames, &topo).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_duration() {
        let frames = read(SAMPLE).unwrap();
        let mut topo = Topology::new();
        let a = topo.add_end_system();
        let b = topo.add_end_system();
        topo.add_link(a, b, LinkKind::Wired, 1);
        assert!(validate(&frames, &topo).is_err());
    }
}
