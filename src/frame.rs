//! Frame, Offset and FrameOffset (spec §3). Per §9's re-architecture note,
//! there is a single `Frame` struct with an (initially empty) offset map,
//! rather than an `Offset`-bearing subtype: the presence or absence of
//! entries in `offsets` is the only distinction that used to be carried by
//! a separate `FrameOffset` class.

use std::collections::HashMap;

use crate::graph::{LinkId, NodeId};

/// One frame's measured or planned transmission window on a single link,
/// replicated once per frame instance within the hyper-period (spec §3,
/// Offset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offset {
    /// The link this offset is attached to.
    pub link: LinkId,
    /// Transmission start time of every instance, in ns since the start of
    /// the hyper-period.
    pub starting: Vec<u64>,
    /// Transmission end time of every instance, in ns since the start of the
    /// hyper-period.
    pub ending: Vec<u64>,
}

impl Offset {
    /// An offset with no instances yet — the placeholder the solver fills in
    /// (spec §4.5.2).
    pub fn empty(link: LinkId) -> Self {
        Offset {
            link,
            starting: Vec::new(),
            ending: Vec::new(),
        }
    }

    /// Number of instances carried by this offset.
    pub fn num_instances(&self) -> usize {
        self.starting.len()
    }
}

/// A periodic, time-triggered traffic entity (spec §3, Frame).
#[derive(Debug, Clone)]
pub struct Frame {
    /// End-system sender.
    pub sender: NodeId,
    /// End-system receivers. Never includes `sender`.
    pub receivers: Vec<NodeId>,
    /// Period in nanoseconds, always positive.
    pub period_ns: u64,
    /// Deadline in nanoseconds, in `(0, period_ns]`.
    pub deadline_ns: u64,
    /// Frame size in bytes (recommended `[72, 1526]`).
    pub size_bytes: u32,
    /// Release phase within the period, in nanoseconds.
    pub starting_ns: u64,
    /// End-to-end budget in nanoseconds.
    pub end_to_end_ns: u64,
    /// One path per receiver, same order as `receivers`.
    pub paths: Vec<Vec<LinkId>>,
    /// At most one offset per link the frame traverses.
    pub offsets: HashMap<LinkId, Offset>,
}

impl Frame {
    /// Construct a frame with no period/deadline/size/end-to-end assigned yet
    /// (before the attribute assigner runs, spec §4.2 step 3) and no paths.
    pub fn new(sender: NodeId, receivers: Vec<NodeId>) -> Self {
        Frame {
            sender,
            receivers,
            period_ns: 0,
            deadline_ns: 0,
            size_bytes: 0,
            starting_ns: 0,
            end_to_end_ns: 0,
            paths: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    /// Construct a fully specified frame, e.g. one synthesized for a
    /// membership or per-node subnetwork (spec §4.5.2/§4.5.3), or read back
    /// from a schedule artifact (spec §4.4). `deadline_ns == 0` means "same
    /// as the period", matching the original frame format.
    #[allow(clippy::too_many_arguments)]
    pub fn with_attributes(
        sender: NodeId,
        receivers: Vec<NodeId>,
        period_ns: u64,
        deadline_ns: u64,
        size_bytes: u32,
        starting_ns: u64,
        end_to_end_ns: u64,
    ) -> Self {
        let deadline_ns = if deadline_ns == 0 { period_ns } else { deadline_ns };
        Frame {
            sender,
            receivers,
            period_ns,
            deadline_ns,
            size_bytes,
            starting_ns,
            end_to_end_ns,
            paths: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    /// Set the deadline, applying the "0 means same as period" rule.
    pub fn set_deadline(&mut self, deadline_ns: u64) {
        self.deadline_ns = if deadline_ns == 0 { self.period_ns } else { deadline_ns };
    }

    /// Discard all assigned paths (routing planner re-derives them from
    /// scratch on every run, spec §4.3).
    pub fn clear_paths(&mut self) {
        self.paths.clear();
    }

    /// Whether `link` appears in any of this frame's receiver paths.
    pub fn link_in_path(&self, link: LinkId) -> bool {
        self.paths.iter().any(|p| p.contains(&link))
    }

    /// The path assigned to one receiver, by position in `receivers`.
    pub fn path_for_receiver_index(&self, index: usize) -> Option<&[LinkId]> {
        self.paths.get(index).map(|p| p.as_slice())
    }

    /// Record a new offset for `link`, unless one is already present (spec
    /// §3: at most one offset per link).
    pub fn add_offset(&mut self, offset: Offset) {
        self.offsets.entry(offset.link).or_insert(offset);
    }

    /// Number of instances of this frame within a hyper-period.
    pub fn num_instances(&self, hyper_period_ns: u64) -> u64 {
        if self.period_ns == 0 {
            0
        } else {
            hyper_period_ns / self.period_ns
        }
    }

    /// The link immediately preceding `link` on `path`, `None` if `link` is
    /// the first link of `path` (or absent from it).
    pub fn predecessor_in_path(path: &[LinkId], link: LinkId) -> Option<LinkId> {
        path.iter().position(|&l| l == link).and_then(|pos| {
            if pos == 0 {
                None
            } else {
                Some(path[pos - 1])
            }
        })
    }

    /// The link immediately following `link` on `path`, `None` if `link` is
    /// the last link of `path` (or absent from it).
    pub fn successor_in_path(path: &[LinkId], link: LinkId) -> Option<LinkId> {
        path.iter().position(|&l| l == link).and_then(|pos| {
            if pos + 1 >= path.len() {
                None
            } else {
                Some(path[pos + 1])
            }
        })
    }

    /// The time at which the predecessor of `link` on `path` hands the frame
    /// off, for the given instance — i.e. the earliest this link could start
    /// transmitting. `period_ns * instance` if `link` has no predecessor on
    /// `path` (spec §4.5.2).
    pub fn predecessor_receiving_time(&self, path: &[LinkId], link: LinkId, instance: u64) -> u64 {
        match Self::predecessor_in_path(path, link) {
            None => self.period_ns * instance,
            Some(prev) => self
                .offsets
                .get(&prev)
                .and_then(|o| o.ending.get(instance as usize).copied())
                .unwrap_or(self.period_ns * instance),
        }
    }

    /// The time by which the successor of `link` on `path` must start
    /// transmitting, for the given instance — i.e. the latest this link's
    /// transmission may end. `period_ns * instance + deadline_ns` if `link`
    /// has no successor on `path` (spec §4.5.2).
    ///
    /// Pinned behavior (spec §9, Open Question 2): this is the successor's
    /// *starting* time, not reduced by this link's own transmission
    /// duration — the original implementation computes it this way, and we
    /// preserve the observable behavior rather than guess at intent.
    pub fn successor_transmission_time(&self, path: &[LinkId], link: LinkId, instance: u64) -> u64 {
        match Self::successor_in_path(path, link) {
            None => self.period_ns * instance + self.deadline_ns,
            Some(next) => self
                .offsets
                .get(&next)
                .and_then(|o| o.starting.get(instance as usize).copied())
                .unwrap_or(self.period_ns * instance + self.deadline_ns),
        }
    }
}
