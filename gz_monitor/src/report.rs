//! Text and JSON rendering of namespace listings.

use gz_shm::{InterfaceInfo, SimulationStatus};
use serde::Serialize;
use std::fmt::Write;

/// One row per interface, aligned on the id column.
pub fn interface_table(interfaces: &[InterfaceInfo]) -> String {
    let width = interfaces
        .iter()
        .map(|info| info.id.len())
        .max()
        .unwrap_or(0)
        .max("ID".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:<10}  {:>5}  {:>8}  {:>10}  {:>8}  OWNER",
        "ID", "KIND", "OPENS", "POSTS", "TIME", "CREATOR"
    );
    for info in interfaces {
        let creator = if info.creator_alive {
            info.creator_pid.to_string()
        } else {
            format!("{}!", info.creator_pid)
        };
        let owner = if info.model_type.is_empty() {
            "-".to_string()
        } else {
            format!("{}#{}", info.model_type, info.model_id)
        };
        let _ = writeln!(
            out,
            "{:<width$}  {:<10}  {:>5}  {:>8}  {:>10.3}  {:>8}  {owner}",
            info.id, info.kind, info.open_count, info.post_count, info.time, creator
        );
    }
    out
}

/// Serialisable view of [`SimulationStatus`].
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Run state name.
    pub state: String,
    /// Simulated time (s).
    pub sim_time: f64,
    /// Paused time (s).
    pub pause_time: f64,
    /// Wall clock time (s).
    pub real_time: f64,
    /// Queued requests.
    pub pending_requests: u32,
}

impl From<SimulationStatus> for StatusReport {
    fn from(status: SimulationStatus) -> Self {
        Self {
            state: format!("{:?}", status.state),
            sim_time: status.times.sim,
            pause_time: status.times.pause,
            real_time: status.times.real,
            pending_requests: status.pending_requests,
        }
    }
}

/// Pretty JSON of any report.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gz_common::data::SimState;
    use gz_shm::SimTimes;

    fn info(id: &str, alive: bool) -> InterfaceInfo {
        InterfaceInfo {
            id: id.to_string(),
            kind: "position".to_string(),
            version: 0x72,
            open_count: 2,
            post_count: 10,
            time: 1.25,
            creator_pid: 4242,
            creator_alive: alive,
            model_type: "pioneer2dx".to_string(),
            model_id: 3,
            parent_model_id: -1,
            payload_size: 80,
        }
    }

    #[test]
    fn table_marks_dead_creators() {
        let table = interface_table(&[info("robot::position", true), info("old", false)]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID "));
        assert!(lines[1].contains("pioneer2dx#3"));
        assert!(lines[1].contains(" 4242 "));
        assert!(lines[2].contains("4242!"));
    }

    #[test]
    fn status_report_names_state() {
        let report = StatusReport::from(SimulationStatus {
            times: SimTimes {
                sim: 1.0,
                pause: 0.5,
                real: 1.5,
            },
            state: SimState::Paused,
            pending_requests: 3,
        });
        let json = to_json(&report).unwrap();
        assert!(json.contains("\"state\": \"Paused\""));
        assert!(json.contains("\"pending_requests\": 3"));
    }
}
