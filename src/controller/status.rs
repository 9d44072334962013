//! Status lines and aggregate result files.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::Result;

use crate::io::{write_results, PointResult};
use crate::sampling::{EngineMonitor, SimulationResult};

/// Number of distinct recent results kept per point.
pub const HISTORY_LENGTH: usize = 3;

/// Everything the controller knows about one point between polls.
#[derive(Debug, Clone)]
pub struct PointStatus {
    pub tag: String,
    pub temperature: u32,
    pub results_file: String,
    pub latest: SimulationResult,
    history: VecDeque<Vec<f64>>,
}

impl PointStatus {
    pub fn new(tag: String, temperature: u32, results_file: String) -> Self {
        Self {
            tag,
            temperature,
            results_file,
            latest: SimulationResult::default(),
            history: VecDeque::with_capacity(HISTORY_LENGTH),
        }
    }

    /// Take a new snapshot; its values enter the history only when they differ from the last.
    pub fn update(&mut self, snapshot: SimulationResult) {
        if !snapshot.values.is_empty() && self.history.back() != Some(&snapshot.values) {
            if self.history.len() == HISTORY_LENGTH {
                self.history.pop_front();
            }
            self.history.push_back(snapshot.values.clone());
        }
        self.latest = snapshot;
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Vec<f64>> {
        self.history.iter()
    }

    pub fn progress(&self) -> f64 {
        if self.latest.budget == 0 {
            100.0
        } else {
            100.0 * self.latest.step as f64 / self.latest.budget as f64
        }
    }

    /// `10000K/2.5E20  step 1200 (12.0%)  acc 0.412  [-1.2e-1] [-1.3e-1]  done`
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{:<16} step {} ({:.1}%)  acc {:.3} ",
            self.tag,
            self.latest.step,
            self.progress(),
            self.latest.acceptance
        );
        for values in &self.history {
            let formatted: Vec<String> = values.iter().map(|v| format!("{:.4e}", v)).collect();
            line.push_str(&format!(" [{}]", formatted.join(", ")));
        }
        if self.latest.failed {
            line.push_str("  FAILED");
        } else if self.latest.finished {
            line.push_str("  done");
        }
        line
    }

    fn point_result(&self) -> Option<PointResult> {
        self.history.back().map(|values| PointResult {
            tag: self.tag.clone(),
            values: values.clone(),
        })
    }
}

/// Statuses of all points, in submission order.
pub struct StatusBoard {
    entries: Vec<(Arc<EngineMonitor>, PointStatus)>,
}

impl StatusBoard {
    pub fn new(entries: Vec<(Arc<EngineMonitor>, PointStatus)>) -> Self {
        Self { entries }
    }

    /// Refresh every status from its monitor.
    pub fn poll(&mut self) {
        for (monitor, status) in &mut self.entries {
            status.update(monitor.snapshot());
        }
    }

    pub fn all_finished(&self) -> bool {
        self.entries.iter().all(|(monitor, _)| monitor.is_finished())
    }

    pub fn statuses(&self) -> impl Iterator<Item = &PointStatus> {
        self.entries.iter().map(|(_, status)| status)
    }

    pub fn monitors(&self) -> impl Iterator<Item = &Arc<EngineMonitor>> {
        self.entries.iter().map(|(monitor, _)| monitor)
    }

    /// Write one results file per temperature group under `root`.
    pub fn persist(&self, root: &Path) -> Result<()> {
        let mut groups: BTreeMap<&str, (u32, Vec<PointResult>)> = BTreeMap::new();
        for status in self.statuses() {
            let group = groups
                .entry(status.results_file.as_str())
                .or_insert_with(|| (status.temperature, Vec::new()));
            if let Some(result) = status.point_result() {
                group.1.push(result);
            }
        }
        for (file_name, (temperature, points)) in groups {
            if !points.is_empty() {
                write_results(root, file_name, temperature, &points)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: usize, values: Vec<f64>) -> SimulationResult {
        SimulationResult {
            step,
            budget: 1000,
            values,
            acceptance: 0.5,
            finished: false,
            failed: false,
        }
    }

    #[test]
    fn test_history_keeps_last_distinct_results() {
        let mut status = PointStatus::new("100K/1E20".into(), 100, "100K_2pa_d1_results.txt".into());
        status.update(snapshot(0, vec![]));
        assert_eq!(status.history().count(), 0);

        for (step, value) in [(10, -1.0), (20, -1.0), (30, -2.0), (40, -3.0), (50, -4.0)] {
            status.update(snapshot(step, vec![value]));
        }
        let history: Vec<f64> = status.history().map(|v| v[0]).collect();
        assert_eq!(history, vec![-2.0, -3.0, -4.0]);
        assert_eq!(status.latest.step, 50);
        assert_eq!(status.point_result().unwrap().values, vec![-4.0]);
    }

    #[test]
    fn test_status_line() {
        let mut status = PointStatus::new("100K/1E20".into(), 100, "f".into());
        status.update(snapshot(250, vec![-0.5]));
        let line = status.status_line();
        assert!(line.starts_with("100K/1E20"));
        assert!(line.contains("step 250 (25.0%)"));
        assert!(line.contains("[-5.0000e-1]"));
        assert!(!line.ends_with("done"));

        let mut finished = snapshot(1000, vec![-0.5]);
        finished.finished = true;
        status.update(finished);
        assert!(status.status_line().ends_with("done"));
        assert_eq!(status.history().count(), 1);
    }
}
