//! External solver invocation and degradation loop (spec §4.5.4).
//!
//! The solver is an out-of-process binary; this module only owns the
//! contract (`<solver> <node_network.xml> <node_schedule.xml>`, success =
//! the schedule file exists afterwards) and the retry policy applied when
//! it doesn't.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Anything that can attempt to schedule one per-node subnetwork file,
/// writing its result to `output` and reporting whether it succeeded.
pub trait Solver {
    fn solve(&self, input: &Path, output: &Path) -> Result<bool>;
}

/// Invokes an external executable following the `<program> <input> <output>`
/// contract; success is "the output file now exists", not the process exit
/// code (an infeasible subnetwork is expected to exit non-zero without
/// writing anything).
pub struct ProcessSolver {
    pub program: PathBuf,
}

impl ProcessSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Solver for ProcessSolver {
    fn solve(&self, input: &Path, output: &Path) -> Result<bool> {
        log::debug!("invoking solver {} {} {}", self.program.display(), input.display(), output.display());
        let _ = std::fs::remove_file(output);
        let status = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .status()
            .map_err(|e| Error::SolverFailure { program: self.program.clone(), reason: e.to_string() })?;
        if !status.success() {
            log::warn!("solver exited with {status}");
        }
        Ok(output.exists())
    }
}

/// Which parameter the degradation loop halves next (spec §4.5.4, Open
/// Question 3: alternate, and fail once both have reached zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DegradeNext {
    TimeBetweenFrames,
    MinSwitchResidency,
}

/// Degradable protocol parameters used while retrying a failed solve.
#[derive(Debug, Clone, Copy)]
pub struct DegradableParams {
    pub time_between_frames_ns: u64,
    pub min_switch_residency_ns: u64,
}

/// Halve `time_between_frames_ns` and `min_switch_residency_ns` in
/// alternation until the solver succeeds or both have bottomed out at zero
/// (spec §4.5.4). Returns the params that produced a success.
pub fn solve_with_degradation(
    solver: &dyn Solver,
    input: &Path,
    output: &Path,
    rewrite_input: impl Fn(&Path, DegradableParams) -> Result<()>,
    mut params: DegradableParams,
) -> Result<DegradableParams> {
    let mut next = DegradeNext::TimeBetweenFrames;
    loop {
        rewrite_input(input, params)?;
        if solver.solve(input, output)? {
            return Ok(params);
        }

        let degraded = match next {
            DegradeNext::TimeBetweenFrames if params.time_between_frames_ns > 0 => {
                next = DegradeNext::MinSwitchResidency;
                DegradableParams { time_between_frames_ns: params.time_between_frames_ns / 2, ..params }
            }
            DegradeNext::MinSwitchResidency if params.min_switch_residency_ns > 0 => {
                next = DegradeNext::TimeBetweenFrames;
                DegradableParams { min_switch_residency_ns: params.min_switch_residency_ns / 2, ..params }
            }
            _ if params.time_between_frames_ns > 0 => {
                DegradableParams { time_between_frames_ns: params.time_between_frames_ns / 2, ..params }
            }
            _ if params.min_switch_residency_ns > 0 => {
                DegradableParams { min_switch_residency_ns: params.min_switch_residency_ns / 2, ..params }
            }
            _ => {
                return Err(Error::Unrecoverable(
                    "solver failed even after degrading both time_between_frames and min_switch_residency to zero".to_string(),
                ));
            }
        };
        log::info!(
            "solver failed on {}, degrading to time_between_frames={}ns min_switch_residency={}ns",
            input.display(),
            degraded.time_between_frames_ns,
            degraded.min_switch_residency_ns
        );
        params = degraded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct StubSolver {
        /// Number of calls still required to return false before succeeding.
        remaining_failures: RefCell<u32>,
    }

    impl Solver for StubSolver {
        fn solve(&self, _input: &Path, output: &Path) -> Result<bool> {
            let mut remaining = self.remaining_failures.borrow_mut();
            if *remaining > 0 {
                *remaining -= 1;
                Ok(false)
            } else {
                std::fs::write(output, b"ok")?;
                Ok(true)
            }
        }
    }

    #[test]
    fn succeeds_immediately_when_solver_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        let solver = StubSolver { remaining_failures: RefCell::new(0) };
        let result = solve_with_degradation(
            &solver,
            &input,
            &output,
            |_, _| Ok(()),
            DegradableParams { time_between_frames_ns: 1_000, min_switch_residency_ns: 500 },
        )
        .unwrap();
        assert_eq!(result.time_between_frames_ns, 1_000);
    }

    #[test]
    fn degrades_until_solver_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        let solver = StubSolver { remaining_failures: RefCell::new(2) };
        let result = solve_with_degradation(
            &solver,
            &input,
            &output,
            |_, _| Ok(()),
            DegradableParams { time_between_frames_ns: 1_000, min_switch_residency_ns: 500 },
        )
        .unwrap();
        assert_eq!(result.time_between_frames_ns, 500);
        assert_eq!(result.min_switch_residency_ns, 250);
    }

    #[test]
    fn unrecoverable_once_both_params_bottom_out() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        let solver = StubSolver { remaining_failures: RefCell::new(u32::MAX) };
        let err = solve_with_degradation(
            &solver,
            &input,
            &output,
            |_, _| Ok(()),
            DegradableParams { time_between_frames_ns: 1, min_switch_residency_ns: 1 },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unrecoverable(_)));
    }
}
