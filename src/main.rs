use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::SeedableRng;

use ttnet::regen::{self, RegenRequest};
use ttnet::xml::{config, network_xml, schedule_xml};
use ttnet::{graph::LinkId, Result};

/// Generate, ingest, or regenerate a time-triggered Ethernet schedule.
#[derive(Debug, Parser)]
#[command(name = "ttnet", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a network from a configuration XML and write the routed network artifact.
    Generate {
        /// Path to the configuration XML.
        config: PathBuf,
        /// Path the network artifact is written to.
        #[arg(long, default_value = "network.xml")]
        out: PathBuf,
        /// RNG seed; omit for a nondeterministic run.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Read a network artifact and a schedule artifact, and report feasibility.
    Ingest {
        /// Path to the network artifact.
        network: PathBuf,
        /// Path to the schedule artifact produced by the external solver.
        schedule: PathBuf,
    },
    /// Recover a schedule around a single link failure.
    Regenerate {
        /// Path to the network artifact.
        network: PathBuf,
        /// Path to the already-computed schedule artifact.
        schedule: PathBuf,
        /// Index of the link that failed.
        #[arg(long)]
        failed_link: u32,
        /// Working directory for `Membership/` and `Node/` artifacts.
        #[arg(long, default_value = ".")]
        working_dir: PathBuf,
        /// Path to the external solver binary.
        #[arg(long, default_value = "./Scheduler")]
        solver: PathBuf,
        /// Number of candidate alternate paths considered during impact analysis.
        #[arg(long, default_value_t = 2)]
        max_candidate_paths: usize,
        /// Minimum switch residency time, in nanoseconds.
        #[arg(long, default_value_t = 0)]
        min_switch_residency_ns: u64,
        /// Protocol frame period, in nanoseconds.
        #[arg(long, default_value_t = 0)]
        period_protocol_ns: u64,
        /// Protocol frame transmission time, in nanoseconds.
        #[arg(long, default_value_t = 0)]
        time_protocol_ns: u64,
        /// Minimum spacing between frame transmissions, in nanoseconds.
        #[arg(long, default_value_t = 1_000)]
        time_between_frames_ns: u64,
    },
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate { config: config_path, out, seed } => run_generate(&config_path, &out, seed)?,
        Command::Ingest { network, schedule } => run_ingest(&network, &schedule)?,
        Command::Regenerate {
            network,
            schedule,
            failed_link,
            working_dir,
            solver,
            max_candidate_paths,
            min_switch_residency_ns,
            period_protocol_ns,
            time_protocol_ns,
            time_between_frames_ns,
        } => run_regenerate(
            &network,
            &schedule,
            LinkId(failed_link),
            working_dir,
            solver,
            max_candidate_paths,
            ttnet::routing::ProtocolParams {
                min_switch_residency_ns,
                period_protocol_ns,
                time_protocol_ns,
                time_between_frames_ns,
            },
        )?,
    }

    Ok(())
}

fn run_generate(config_path: &std::path::Path, out: &std::path::Path, seed: Option<u64>) -> Result<()> {
    log::info!("loading configuration from {}", config_path.display());
    let xml = std::fs::read_to_string(config_path)?;
    let config = config::parse(&xml)?;

    let mut rng = match seed {
        Some(s) => rand::rngs::StdRng::seed_from_u64(s),
        None => rand::rngs::StdRng::from_entropy(),
    };
    let network = ttnet::network::build(&config, &mut rng)?;

    if !network.routing.is_schedulable() {
        log::warn!(
            "network is not fully schedulable: {} infeasible link(s), {} unrouted receiver(s)",
            network.routing.infeasible_links.len(),
            network.routing.unrouted.len()
        );
    }

    let artifact_xml = network_xml::write(&network)?;
    std::fs::write(out, artifact_xml)?;
    log::info!("wrote network artifact to {}", out.display());
    Ok(())
}

fn run_ingest(network_path: &std::path::Path, schedule_path: &std::path::Path) -> Result<()> {
    let network_xml_text = std::fs::read_to_string(network_path)?;
    let (topology, _frames) = network_xml::read(&network_xml_text)?;

    let schedule_xml_text = std::fs::read_to_string(schedule_path)?;
    let scheduled_frames = schedule_xml::read(&schedule_xml_text)?;

    schedule_xml::validate(&scheduled_frames, &topology)?;
    log::info!("schedule is consistent: {} frame(s) validated", scheduled_frames.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_regenerate(
    network_path: &std::path::Path,
    schedule_path: &std::path::Path,
    failed_link: LinkId,
    working_dir: PathBuf,
    solver_program: PathBuf,
    max_candidate_paths: usize,
    protocol: ttnet::routing::ProtocolParams,
) -> Result<()> {
    let network_xml_text = std::fs::read_to_string(network_path)?;
    let (topology, _frames) = network_xml::read(&network_xml_text)?;

    let schedule_xml_text = std::fs::read_to_string(schedule_path)?;
    let scheduled_frames = schedule_xml::read(&schedule_xml_text)?;

    let request = RegenRequest {
        topology: &topology,
        frames: &scheduled_frames,
        failed_link,
        protocol,
        max_candidate_paths,
        working_dir,
        solver_program,
    };
    let updated = regen::regenerate(&request)?;
    log::info!("regeneration succeeded, {} frame(s) updated", updated.len());
    Ok(())
}
