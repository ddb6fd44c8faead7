//! S5: the first solver invocation fails, the planner halves
//! `time_between_frames_ns` and retries, and the second invocation
//! succeeds. The degraded value must show up in the per-node subnetwork
//! artifact left on disk.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use pretty_assertions::assert_eq;
use ttnet::frame::Frame;
use ttnet::graph::{LinkKind, Topology};
use ttnet::regen::{self, RegenRequest};
use ttnet::routing::ProtocolParams;

/// A stand-in "scheduler" binary: fails (writes nothing) on its first
/// invocation for a given output path, succeeds on every later one. Tracks
/// invocation count per output file via a sibling `.attempts` file, so
/// distinct per-node subnetworks don't interfere with each other.
const FAKE_SOLVER: &str = r#"#!/bin/sh
set -e
counter="$2.attempts"
count=0
if [ -f "$counter" ]; then
  count=$(cat "$counter")
fi
count=$((count + 1))
echo "$count" > "$counter"
if [ "$count" -ge 2 ]; then
  printf '<FramesTransmission></FramesTransmission>' > "$2"
fi
exit 0
"#;

#[test]
fn degrades_once_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let solver_path = dir.path().join("fake_solver.sh");
    fs::write(&solver_path, FAKE_SOLVER).unwrap();
    let mut perms = fs::metadata(&solver_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&solver_path, perms).unwrap();

    let mut t = Topology::new();
    let es0 = t.add_end_system();
    let es1 = t.add_end_system();
    let s2 = t.add_switch();
    let l0 = t.add_link(es0, es1, LinkKind::Wired, 100);
    let _l1 = t.add_link(es0, s2, LinkKind::Wired, 100);
    let _l2 = t.add_link(s2, es1, LinkKind::Wired, 100);

    let mut frame = Frame::with_attributes(es0, vec![es1], 1_000_000, 0, 100, 0, 1_000_000);
    frame.paths.push(vec![l0]);
    let frames = vec![frame];

    let protocol = ProtocolParams { min_switch_residency_ns: 4_000, period_protocol_ns: 0, time_protocol_ns: 0, time_between_frames_ns: 8_000 };

    let request = RegenRequest {
        topology: &t,
        frames: &frames,
        failed_link: l0,
        protocol,
        max_candidate_paths: 2,
        working_dir: dir.path().to_path_buf(),
        solver_program: solver_path,
    };

    let result = regen::regenerate(&request);
    assert!(result.is_ok(), "regeneration should succeed once the solver accepts the degraded parameters: {result:?}");

    let node_network_xml = fs::read_to_string(dir.path().join("Node/node_network0.xml")).unwrap();
    assert!(
        node_network_xml.contains("<TimeBetweenFrames>4000</TimeBetweenFrames>"),
        "the artifact left on disk should reflect the halved time_between_frames, got:\n{node_network_xml}"
    );
}
