//! File-backed snapshot storage.
//!
//! Layout of one run directory:
//!
//! ```text
//! <root>/manifest.json
//! <root>/solution.jsonl            one SnapshotRecord per line
//! <root>/restart_t<time>.json      Checkpoint
//! <root>/debug/newton_solution.jsonl
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use pf_core::Real;
use pf_sim::{INVALID_TIME, SimResult, SnapshotSink};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{Checkpoint, RunManifest, SnapshotRecord};
use crate::{ResultsError, ResultsResult};

const MANIFEST_FILE: &str = "manifest.json";
const SOLUTION_FILE: &str = "solution.jsonl";
const DEBUG_DIR: &str = "debug";
const DEBUG_FILE: &str = "newton_solution.jsonl";

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    root_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn checkpoint_path(&self, time: Real) -> PathBuf {
        self.root_dir
            .join(format!("restart_t{}.json", time_label(time)))
    }

    pub fn append_solution<S: Serialize>(&self, state: &S, time: Real) -> ResultsResult<()> {
        append_line(&self.root_dir.join(SOLUTION_FILE), &SnapshotRecord { time, state })
    }

    pub fn append_debug<S: Serialize>(&self, state: &S) -> ResultsResult<()> {
        let dir = self.root_dir.join(DEBUG_DIR);
        fs::create_dir_all(&dir)?;
        append_line(
            &dir.join(DEBUG_FILE),
            &SnapshotRecord {
                time: INVALID_TIME,
                state,
            },
        )
    }

    /// Remove the solution and debug streams left by an earlier run.
    /// Checkpoints are kept so a run can restart from its own directory.
    pub fn clear_streams(&self) -> ResultsResult<()> {
        let solution = self.root_dir.join(SOLUTION_FILE);
        if solution.exists() {
            fs::remove_file(solution)?;
        }
        let debug = self.root_dir.join(DEBUG_DIR);
        if debug.exists() {
            fs::remove_dir_all(debug)?;
        }
        Ok(())
    }

    pub fn save_checkpoint<S: Serialize>(&self, state: &S, time: Real) -> ResultsResult<PathBuf> {
        let path = self.checkpoint_path(time);
        let json = serde_json::to_string(&Checkpoint { time, state })?;
        fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "wrote checkpoint");
        Ok(path)
    }

    pub fn load_checkpoint<S: DeserializeOwned>(path: &Path) -> ResultsResult<Checkpoint<S>> {
        if !path.exists() {
            return Err(ResultsError::CheckpointNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Checkpoints in this directory, sorted by the time stored in each.
    pub fn list_checkpoints(&self) -> ResultsResult<Vec<(Real, PathBuf)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root_dir)? {
            let path = entry?.path();
            let is_checkpoint = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("restart_t") && name.ends_with(".json"));
            if !is_checkpoint {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let stamp: CheckpointTime = serde_json::from_str(&content)?;
            found.push((stamp.time, path));
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found)
    }

    pub fn load_solutions<S: DeserializeOwned>(&self) -> ResultsResult<Vec<SnapshotRecord<S>>> {
        read_lines(&self.root_dir.join(SOLUTION_FILE))
    }

    pub fn load_debug<S: DeserializeOwned>(&self) -> ResultsResult<Vec<SnapshotRecord<S>>> {
        read_lines(&self.root_dir.join(DEBUG_DIR).join(DEBUG_FILE))
    }

    pub fn save_manifest(&self, manifest: &RunManifest) -> ResultsResult<()> {
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.root_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    pub fn load_manifest(&self) -> ResultsResult<RunManifest> {
        let path = self.root_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ResultsError::ManifestNotFound {
                dir: self.root_dir.display().to_string(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl<S: Serialize> SnapshotSink<S> for SnapshotStore {
    fn write_solution(&mut self, w: &S, time: Real) -> SimResult<()> {
        Ok(self.append_solution(w, time)?)
    }

    fn write_debug(&mut self, w: &S) -> SimResult<()> {
        Ok(self.append_debug(w)?)
    }

    fn write_checkpoint(&mut self, w: &S, time: Real) -> SimResult<()> {
        self.save_checkpoint(w, time)?;
        Ok(())
    }
}

/// Shortest decimal label that parses back to the same time, e.g. `0.02`
/// or `1`. Distinct times get distinct labels.
pub fn time_label(time: Real) -> String {
    format!("{time}")
}

#[derive(Deserialize)]
struct CheckpointTime {
    time: Real,
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> ResultsResult<()> {
    let line = serde_json::to_string(value)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> ResultsResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in content.lines() {
        if !line.trim().is_empty() {
            records.push(serde_json::from_str(line)?);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_labels() {
        assert_eq!(time_label(0.02), "0.02");
        assert_eq!(time_label(1.0), "1");
        assert_eq!(time_label(0.0), "0");
        assert_eq!(time_label(0.125), "0.125");
        assert_eq!(time_label(2e-7), "0.0000002");
    }

    #[test]
    fn labels_parse_back_to_the_same_time() {
        for t in [0.019999999999999997, 0.02, 2e-7, 4e-7, 1.0 / 3.0, 12.5] {
            assert_eq!(time_label(t).parse::<Real>().unwrap(), t);
        }
        assert_ne!(time_label(0.019999999999999997), time_label(0.02));
    }
}
