//! End-to-end run: check, plan, persist, dispatch
//!
//! Everything up to [`dispatch`] is offline and needs no controller.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use stylus_core::command::{
    drawn_extent, reconstruct, CommandSynthesizer, CommandTable, PathExtent, TABLE_COLUMNS,
};
use stylus_core::config::{HandshakeConfig, RobotConfig};
use stylus_core::dispatch::{read_feedback, DispatchReport, Dispatcher};
use stylus_core::kinematics::check_point;
use stylus_core::trajectory::{TrajectoryBuilder, Waypoint};
use stylus_hal::{Clock, RegisterLink};

use crate::clock::StdClock;
use crate::config::PlotterFile;
use crate::error::{HostError, LinkError};
use crate::link::McLink;

/// Rows shown in the table preview
const PREVIEW_ROWS: usize = 5;

/// Output of the offline stages
pub struct Plan {
    pub synth: CommandSynthesizer,
    pub table: CommandTable,
    /// Waypoints that were unreachable or failed the precision check
    pub flagged_waypoints: usize,
}

/// Run the precision check on every waypoint
///
/// Problems are logged, not fatal: the synthesizer holds position over
/// unreachable samples. Returns the number of flagged waypoints.
pub fn check_waypoints(robot: &RobotConfig, waypoints: &[Waypoint]) -> Result<usize, HostError> {
    let arm = robot.geometry()?;
    let eps = robot.arm.reach_epsilon_mm;
    let mut flagged = 0;

    for (i, wp) in waypoints.iter().enumerate() {
        match check_point(&arm, wp.x, wp.y, eps) {
            Ok(report) => {
                if !report.grade.passed() {
                    warn!(
                        "Waypoint {} ({}, {}) misses by {:.3} mm",
                        i, wp.x, wp.y, report.error_mm
                    );
                    flagged += 1;
                } else if report.near_singular {
                    warn!(
                        "Waypoint {} ({}, {}) is near a singularity (det {:.2e})",
                        i, wp.x, wp.y, report.jacobian_det
                    );
                }
            }
            Err(e) => {
                warn!("Waypoint {}: {}", i, e);
                flagged += 1;
            }
        }
    }

    info!(
        "Precision check: {}/{} waypoints ok",
        waypoints.len() - flagged,
        waypoints.len()
    );
    Ok(flagged)
}

/// Build the trajectory and synthesize the command table
pub fn plan(file: &PlotterFile) -> Result<Plan, HostError> {
    let robot = &file.robot;
    let flagged_waypoints = check_waypoints(robot, &file.waypoints)?;

    let trajectory = TrajectoryBuilder::new(&robot.motion).build(&file.waypoints)?;
    let synth = CommandSynthesizer::new(robot)?;
    let table = synth.synthesize(trajectory.samples());

    info!(
        "Planned {} rows, {:.2} s, {} pen changes",
        table.len(),
        table.duration_s(),
        table.pen_changes()
    );
    if table.unreachable_samples() > 0 {
        warn!(
            "{} samples unreachable, position held",
            table.unreachable_samples()
        );
    }
    if table.singular_samples() > 0 {
        debug!("{} samples near a singularity", table.singular_samples());
    }
    log_preview(&table);

    Ok(Plan {
        synth,
        table,
        flagged_waypoints,
    })
}

/// Log the header and first rows of the table
fn log_preview(table: &CommandTable) {
    info!("{}", TABLE_COLUMNS.join("\t"));
    for row in table.iter().take(PREVIEW_ROWS) {
        info!(
            "{:.2}\t{}\t{}\t{}\t{:.1}\t{}\t{}\t{}\t{:.1}\t{:?}",
            row.t,
            row.j1_pos,
            row.j1_dir as u8,
            row.j1_delta,
            row.j1_hz,
            row.j2_pos,
            row.j2_dir as u8,
            row.j2_delta,
            row.j2_hz,
            row.pen
        );
    }
    if table.len() > PREVIEW_ROWS {
        info!("... {} more rows", table.len() - PREVIEW_ROWS);
    }
}

/// Bounding box of the pen-down path the table will actually draw
pub fn replay_extent(synth: &CommandSynthesizer, table: &CommandTable) -> Option<PathExtent> {
    let samples = reconstruct(synth, table);
    let extent = drawn_extent(&samples);
    match &extent {
        Some(e) => info!(
            "Drawn extent x {:.1}..{:.1} y {:.1}..{:.1} ({:.1} x {:.1} mm)",
            e.min_x,
            e.max_x,
            e.min_y,
            e.max_y,
            e.width(),
            e.height()
        ),
        None => info!("Table draws nothing"),
    }
    extent
}

/// Write a table as postcard
pub fn save_table(path: &Path, table: &CommandTable) -> Result<(), HostError> {
    let bytes = table.to_bytes()?;
    fs::write(path, &bytes).map_err(|source| HostError::File {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Saved {} rows to {} ({} bytes)", table.len(), path.display(), bytes.len());
    Ok(())
}

/// Read a table written by [`save_table`]
pub fn load_table(path: &Path) -> Result<CommandTable, HostError> {
    let bytes = fs::read(path).map_err(|source| HostError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let table = CommandTable::from_bytes(&bytes)?;
    info!("Loaded {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Stream a table over an existing link, then read the position block back
pub fn dispatch_with<L, C>(
    link: &mut L,
    clock: &mut C,
    handshake: &HandshakeConfig,
    table: &CommandTable,
    cancel: &AtomicBool,
) -> Result<DispatchReport, HostError>
where
    L: RegisterLink<Error = LinkError>,
    C: Clock,
{
    let mut dispatcher = Dispatcher::new(handshake.clone());
    let report = dispatcher.run(link, clock, table, cancel)?;
    info!(
        "Dispatch complete: {} rows, {} overruns, {} pen toggles",
        report.rows_sent, report.overruns, report.pen_toggles
    );

    match read_feedback(link, handshake) {
        Ok(fb) => info!(
            "Controller position J1 {} @ {} Hz, J2 {} @ {} Hz",
            fb.j1_pos, fb.j1_hz, fb.j2_pos, fb.j2_hz
        ),
        Err(e) => warn!("Position read-back failed: {}", e),
    }
    Ok(report)
}

/// Connect to the configured controller and stream a table
pub fn dispatch(
    file: &PlotterFile,
    table: &CommandTable,
    cancel: &AtomicBool,
) -> Result<DispatchReport, HostError> {
    info!("Connecting to controller at {}", file.link.address());
    let mut link = McLink::connect(&file.link)?;
    let mut clock = StdClock::new();
    dispatch_with(&mut link, &mut clock, &file.robot.handshake, table, cancel)
}

/// Raise `cancel` on Ctrl-C
///
/// Can only be installed once per process.
pub fn install_cancel_handler(cancel: Arc<AtomicBool>) -> Result<(), HostError> {
    ctrlc::set_handler(move || {
        request_stop(&cancel);
    })?;
    Ok(())
}

/// Raise the cancel flag, returning false if it was already raised
pub fn request_stop(cancel: &AtomicBool) -> bool {
    if cancel.swap(true, Ordering::AcqRel) {
        return false;
    }
    warn!("Stop requested, lifting pen");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;
    use stylus_core::motion::PenState;

    fn file_with(waypoints: &str) -> PlotterFile {
        parse(waypoints).unwrap()
    }

    #[test]
    fn test_check_flags_unreachable() {
        let file = file_with(
            "[[waypoint]]\nx = 400.0\ny = 0.0\n\n[[waypoint]]\nx = 0.0\ny = 250.0\npen = \"down\"\n",
        );
        assert_eq!(check_waypoints(&file.robot, &file.waypoints).unwrap(), 1);
    }

    #[test]
    fn test_plan_home_only() {
        let file = file_with("[[waypoint]]\nx = 0.0\ny = 309.5\n");
        let plan = plan(&file).unwrap();
        assert_eq!(plan.table.len(), 1);
        let row = plan.table.get(0).unwrap();
        assert_eq!((row.j1_delta, row.j2_delta), (0, 0));
        assert_eq!(row.pen, PenState::Up);
        assert!(replay_extent(&plan.synth, &plan.table).is_none());
    }

    #[test]
    fn test_plan_embedded_square() {
        let file = parse(crate::config::EMBEDDED_CONFIG).unwrap();
        let plan = plan(&file).unwrap();
        assert_eq!(plan.flagged_waypoints, 0);
        assert_eq!(plan.table.unreachable_samples(), 0);

        let extent = replay_extent(&plan.synth, &plan.table).unwrap();
        assert!((extent.width() - 40.0).abs() < 0.5);
        assert!((extent.height() - 40.0).abs() < 0.5);
    }

    #[test]
    fn test_request_stop_raises_once() {
        let cancel = AtomicBool::new(false);
        assert!(request_stop(&cancel));
        assert!(cancel.load(Ordering::Acquire));
        assert!(!request_stop(&cancel));
        assert!(cancel.load(Ordering::Acquire));
    }
}
