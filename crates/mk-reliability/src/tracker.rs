// tracker.rs — ReliabilityTracker: running success/helpfulness aggregates.
//
// Every tool invocation is scored (boolean success + helpfulness in [0,1])
// and folded into two running aggregates: one global per tool, one per
// (tool, goal) pair. Only the aggregates persist — memory cost is
// O(distinct tools × distinct goals), not O(invocations).
//
// The persisted document maps tool name to
//   { "global": {count, success_rate, helpfulness},
//     "per_goal": { "<goal_id>": {count, success_rate, helpfulness} } }

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::ReliabilityError;

/// Score returned for a tool with no recorded history.
pub const NEUTRAL_PRIOR: f64 = 0.5;

/// Per-goal sample count at which the per-goal mean carries equal weight
/// with the global mean (blend weight n / (n + SATURATION)).
const PER_GOAL_SATURATION: f64 = 5.0;

/// A running aggregate over invocations of one tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    /// Number of invocations folded in.
    pub count: u64,

    /// Running mean of the boolean success outcomes.
    pub success_rate: f64,

    /// Running mean of the helpfulness scores.
    pub helpfulness: f64,
}

impl ToolStats {
    /// Fold one invocation into the aggregate using an incremental mean.
    fn record(&mut self, success: bool, helpfulness: f64) {
        self.count += 1;
        let n = self.count as f64;
        let success = if success { 1.0 } else { 0.0 };
        self.success_rate += (success - self.success_rate) / n;
        self.helpfulness += (helpfulness - self.helpfulness) / n;
    }

    /// Scalar reliability mean: equal parts success rate and helpfulness.
    pub fn mean(&self) -> f64 {
        0.5 * self.success_rate + 0.5 * self.helpfulness
    }
}

/// Aggregates for one tool: global plus per-goal breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRecord {
    pub global: ToolStats,
    #[serde(default)]
    pub per_goal: BTreeMap<u64, ToolStats>,
}

/// Persistent tracker of tool reliability. Records are only ever
/// accumulated, never deleted.
pub struct ReliabilityTracker {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, ToolRecord>>,
}

impl ReliabilityTracker {
    /// Load the tracker from `path`, starting empty if the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReliabilityError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ReliabilityError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let records = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|source| ReliabilityError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&json)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    /// Record one invocation outcome. Helpfulness outside [0, 1] is
    /// rejected and the prior aggregates stay untouched.
    pub fn record(
        &self,
        tool_name: &str,
        goal_id: u64,
        success: bool,
        helpfulness: f64,
    ) -> Result<(), ReliabilityError> {
        if !(0.0..=1.0).contains(&helpfulness) {
            return Err(ReliabilityError::OutOfRange(helpfulness));
        }

        let mut records = self.lock();
        let record = records.entry(tool_name.to_string()).or_default();
        record.global.record(success, helpfulness);
        record
            .per_goal
            .entry(goal_id)
            .or_default()
            .record(success, helpfulness);

        tracing::debug!(
            tool = tool_name,
            goal_id,
            success,
            helpfulness,
            global_mean = record.global.mean(),
            "recorded tool invocation"
        );

        self.write(&records)
    }

    /// Combined reliability score in [0, 1].
    ///
    /// Blends the per-goal mean into the global mean with weight
    /// `n / (n + 5)` where `n` is the per-goal sample count, so a tool's
    /// track record on this specific goal dominates once enough samples
    /// exist. Falls back to the global mean with no per-goal data, and to
    /// a neutral 0.5 prior with no history at all.
    pub fn score(&self, tool_name: &str, goal_id: Option<u64>) -> f64 {
        let records = self.lock();
        let Some(record) = records.get(tool_name) else {
            return NEUTRAL_PRIOR;
        };
        if record.global.count == 0 {
            return NEUTRAL_PRIOR;
        }

        let global = record.global.mean();
        match goal_id.and_then(|id| record.per_goal.get(&id)) {
            Some(stats) if stats.count > 0 => {
                let n = stats.count as f64;
                let w = n / (n + PER_GOAL_SATURATION);
                w * stats.mean() + (1.0 - w) * global
            }
            _ => global,
        }
    }

    /// Tools whose global score has sunk below `threshold`. Consumed by
    /// planning to deprioritize, never to permanently disable.
    pub fn low_reliability(&self, threshold: f64) -> BTreeSet<String> {
        let records = self.lock();
        records
            .iter()
            .filter(|(_, r)| r.global.count > 0 && r.global.mean() < threshold)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Flush the aggregates to disk.
    pub fn persist(&self) -> Result<(), ReliabilityError> {
        let records = self.lock();
        self.write(&records)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ToolRecord>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, records: &BTreeMap<String, ToolRecord>) -> Result<(), ReliabilityError> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json).map_err(|source| ReliabilityError::IoError {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_tracker(dir: &Path) -> ReliabilityTracker {
        ReliabilityTracker::load(dir.join("tool-reliability.json")).unwrap()
    }

    #[test]
    fn no_history_scores_neutral_prior() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        assert_eq!(tracker.score("git_push", None), 0.5);
        assert_eq!(tracker.score("git_push", Some(1)), 0.5);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        for i in 0u64..20 {
            tracker
                .record("tool", i % 3, i % 2 == 0, (i % 10) as f64 / 10.0)
                .unwrap();
            for goal in [None, Some(0), Some(1), Some(7)] {
                let s = tracker.score("tool", goal);
                assert!((0.0..=1.0).contains(&s), "score {} out of range", s);
            }
        }
    }

    #[test]
    fn helpfulness_out_of_range_rejected() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        tracker.record("tool", 1, true, 1.0).unwrap();
        let before = tracker.score("tool", Some(1));

        assert!(matches!(
            tracker.record("tool", 1, true, 1.5),
            Err(ReliabilityError::OutOfRange(_))
        ));
        assert!(matches!(
            tracker.record("tool", 1, true, -0.1),
            Err(ReliabilityError::OutOfRange(_))
        ));
        assert!(matches!(
            tracker.record("tool", 1, true, f64::NAN),
            Err(ReliabilityError::OutOfRange(_))
        ));

        // Prior aggregate unchanged by the rejected records.
        assert_eq!(tracker.score("tool", Some(1)), before);
    }

    #[test]
    fn failures_drag_per_goal_score_down() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        for _ in 0..3 {
            tracker.record("git_push", 1, false, 0.0).unwrap();
        }
        tracker.record("git_push", 1, true, 0.8).unwrap();

        let scoped = tracker.score("git_push", Some(1));
        assert!(scoped < 0.5, "score {} should be below 0.5", scoped);

        // No calls were recorded under goal 2, so its view is the global
        // mean — untouched by any per-goal-2 data.
        let other = tracker.score("git_push", Some(2));
        assert_eq!(other, tracker.score("git_push", None));
    }

    #[test]
    fn per_goal_weight_grows_with_samples() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        // Build a strong global record under goal 1.
        for _ in 0..20 {
            tracker.record("tool", 1, true, 1.0).unwrap();
        }
        // One failure under goal 2 should pull its score below goal 1's,
        // but not all the way to the per-goal mean of 0.
        tracker.record("tool", 2, false, 0.0).unwrap();
        let g2 = tracker.score("tool", Some(2));
        assert!(g2 < tracker.score("tool", Some(1)));
        assert!(g2 > 0.5);
    }

    #[test]
    fn low_reliability_thresholding() {
        let dir = tempdir().unwrap();
        let tracker = open_tracker(dir.path());
        tracker.record("flaky", 1, false, 0.1).unwrap();
        tracker.record("solid", 1, true, 0.9).unwrap();
        tracker.record("unused_but_known", 1, true, 0.5).unwrap();

        let low = tracker.low_reliability(0.4);
        assert!(low.contains("flaky"));
        assert!(!low.contains("solid"));
        // Tools with no history never appear.
        assert!(!low.contains("never_called"));
    }

    #[test]
    fn aggregates_survive_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tool-reliability.json");
        {
            let tracker = ReliabilityTracker::load(&path).unwrap();
            tracker.record("git_push", 1, true, 0.9).unwrap();
            tracker.record("git_push", 1, false, 0.2).unwrap();
        }
        let tracker = ReliabilityTracker::load(&path).unwrap();
        let score = tracker.score("git_push", Some(1));
        assert!(score > 0.0 && score < 1.0);
        assert_ne!(score, NEUTRAL_PRIOR);
    }
}
