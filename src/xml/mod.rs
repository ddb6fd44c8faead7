//! XML serialization boundary (spec §6): configuration reading, network and
//! schedule artifact read/write, and subnetwork artifact writing.

pub mod config;
pub mod network_xml;
pub mod schedule_xml;
pub mod subnetwork_xml;
