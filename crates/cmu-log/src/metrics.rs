//! Metric recording for pipeline steps.
//!
//! Public values go to a [`RunRecorder`]; private values are only written to
//! the log through a [`ConfidentialLogger`].

use crate::category::{ConfidentialLogger, DataCategory};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// One recorded call, as written to the offline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub log_method: String,
    pub log_args: Vec<Value>,
    pub log_kwargs: Map<String, Value>,
}

/// Offline experiment run.
///
/// Every call is kept in memory and, when an output file is set, appended
/// to it as one JSON line.
#[derive(Debug, Default)]
pub struct RunRecorder {
    output_file: Option<PathBuf>,
    records: Mutex<Vec<RunRecord>>,
}

impl RunRecorder {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_output_file(path: impl Into<PathBuf>) -> Self {
        Self {
            output_file: Some(path.into()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Record a single named value.
    pub fn log(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.record(RunRecord {
            log_method: "log".to_string(),
            log_args: vec![Value::from(key), value.into()],
            log_kwargs: Map::new(),
        })
    }

    /// Record a named row of fields.
    pub fn log_row(&self, key: &str, fields: Map<String, Value>) -> Result<()> {
        self.record(RunRecord {
            log_method: "log_row".to_string(),
            log_args: vec![Value::from(key)],
            log_kwargs: fields,
        })
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<RunRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record(&self, record: RunRecord) -> Result<()> {
        debug!(target: "cmu_log::run", method = %record.log_method, "run call recorded offline");

        if let Some(path) = &self.output_file {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }

        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(record);
        Ok(())
    }
}

/// Counts gathered by [`Metrics::log_directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub files: u64,
    pub dirs: u64,
    pub size: u64,
}

impl DirectoryStats {
    fn to_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("dirs".to_string(), self.dirs.into());
        fields.insert("files".to_string(), self.files.into());
        fields.insert("size".to_string(), self.size.into());
        fields
    }
}

/// Category-aware metric helpers.
#[derive(Debug, Clone)]
pub struct Metrics {
    recorder: Arc<RunRecorder>,
    logger: ConfidentialLogger,
}

impl Metrics {
    pub fn new(recorder: Arc<RunRecorder>, logger: ConfidentialLogger) -> Self {
        Self { recorder, logger }
    }

    pub fn recorder(&self) -> &RunRecorder {
        &self.recorder
    }

    pub fn logger(&self) -> &ConfidentialLogger {
        &self.logger
    }

    pub fn log_metric(&self, category: DataCategory, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match category {
            DataCategory::Public => self.recorder.log(key, value),
            DataCategory::Private => {
                self.logger
                    .info(category, &format!("Metric({}={})", key, value));
                Ok(())
            }
        }
    }

    pub fn log_row(&self, category: DataCategory, key: &str, fields: Map<String, Value>) -> Result<()> {
        match category {
            DataCategory::Public => self.recorder.log_row(key, fields),
            DataCategory::Private => {
                self.logger.info(
                    category,
                    &format!("MetricRow({}, {})", key, Value::Object(fields)),
                );
                Ok(())
            }
        }
    }

    /// Count files, subdirectories and bytes under `path`, record them as a
    /// row under `key`, and log a summary in `category`.
    ///
    /// With `verbose`, every file found is logged as well.
    pub fn log_directory(
        &self,
        category: DataCategory,
        key: &str,
        path: &Path,
        verbose: bool,
    ) -> Result<DirectoryStats> {
        let mut stats = DirectoryStats::default();
        self.scan(category, key, path, verbose, &mut stats)?;

        self.recorder.log_row(key, stats.to_fields())?;
        self.logger.info(
            category,
            &format!(
                "Scan {} -- path {} -- found {} files, {} dirs, total size {}",
                key,
                path.display(),
                stats.files,
                stats.dirs,
                stats.size
            ),
        );
        Ok(stats)
    }

    fn scan(
        &self,
        category: DataCategory,
        key: &str,
        dir: &Path,
        verbose: bool,
        stats: &mut DirectoryStats,
    ) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stats.dirs += 1;
                self.scan(category, key, &entry.path(), verbose, stats)?;
            } else {
                let size = entry.metadata()?.len();
                stats.files += 1;
                stats.size += size;
                if verbose {
                    self.logger.info(
                        category,
                        &format!(
                            "Scan {} -- found file: {} -- size {}",
                            key,
                            entry.path().display(),
                            size
                        ),
                    );
                }
            }
        }
        Ok(())
    }

    /// Time `f`, log the elapsed seconds publicly, and record
    /// `{name}.time`.
    pub fn time_function<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_secs_f64();

        self.logger.debug(
            DataCategory::Public,
            &format!("--- time elapsed: {} = {:.2} s", name, elapsed),
        );
        if let Err(e) = self.log_metric(DataCategory::Public, &format!("{}.time", name), elapsed) {
            warn!(target: "cmu_log::metrics", error = %e, "failed to record timing");
        }
        result
    }

    /// Timer recording into this run.
    pub fn time_block(&self, name: impl Into<String>) -> TimeBlock<'_> {
        TimeBlock::new(name).with_recorder(&self.recorder)
    }
}

/// Scoped timer. Starts on creation, stops on [`finish`](Self::finish) or
/// drop, whichever comes first.
pub struct TimeBlock<'a> {
    name: String,
    start: Instant,
    recorder: Option<&'a RunRecorder>,
    profile: Option<&'a mut HashMap<String, f64>>,
    tags: Option<Map<String, Value>>,
    print: bool,
    done: bool,
}

impl<'a> TimeBlock<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            recorder: None,
            profile: None,
            tags: None,
            print: false,
            done: false,
        }
    }

    pub fn with_recorder(mut self, recorder: &'a RunRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Store the elapsed seconds in `profile` under the block's name.
    pub fn with_profile(mut self, profile: &'a mut HashMap<String, f64>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Record as a row of `tags` plus the elapsed time instead of a single
    /// value.
    pub fn with_tags(mut self, tags: Map<String, Value>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_print(mut self, print: bool) -> Self {
        self.print = print;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the timer and return the elapsed seconds.
    pub fn finish(mut self) -> f64 {
        self.stop()
    }

    fn stop(&mut self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if self.done {
            return elapsed;
        }
        self.done = true;

        if self.print {
            println!("--- time elapsed: {} = {:.2} s", self.name, elapsed);
        }

        if let Some(recorder) = self.recorder {
            let recorded = match self.tags.take() {
                Some(mut tags) => {
                    tags.insert(self.name.clone(), elapsed.into());
                    recorder.log_row(&self.name, tags)
                }
                None => recorder.log(&self.name, elapsed),
            };
            if let Err(e) = recorded {
                warn!(target: "cmu_log::metrics", block = %self.name, error = %e, "failed to record timing");
            }
        }

        if let Some(profile) = self.profile.as_mut() {
            profile.insert(self.name.clone(), elapsed);
        }
        elapsed
    }
}

impl Drop for TimeBlock<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metrics() -> Metrics {
        Metrics::new(Arc::new(RunRecorder::offline()), ConfidentialLogger::default())
    }

    #[test]
    fn test_public_metric_is_recorded() {
        let m = metrics();
        m.log_metric(DataCategory::Public, "rows", 1200).unwrap();
        let records = m.recorder().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].log_method, "log");
        assert_eq!(records[0].log_args, vec![Value::from("rows"), Value::from(1200)]);
    }

    #[test]
    fn test_private_metric_is_not_recorded() {
        let m = metrics();
        m.log_metric(DataCategory::Private, "first_user", "alice").unwrap();
        let mut fields = Map::new();
        fields.insert("email".to_string(), "alice@example.com".into());
        m.log_row(DataCategory::Private, "users", fields).unwrap();
        assert!(m.recorder().records().is_empty());
    }

    #[test]
    fn test_public_row_keeps_fields() {
        let m = metrics();
        let mut fields = Map::new();
        fields.insert("precision".to_string(), 0.9.into());
        m.log_row(DataCategory::Public, "eval", fields.clone()).unwrap();
        let records = m.recorder().records();
        assert_eq!(records[0].log_method, "log_row");
        assert_eq!(records[0].log_kwargs, fields);
    }

    #[test]
    fn test_output_file_is_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let recorder = RunRecorder::with_output_file(&path);
        recorder.log("a", 1).unwrap();
        recorder.log("b", 2).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<RunRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].log_args[0], Value::from("b"));
    }

    #[test]
    fn test_log_directory_counts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b.txt"), b"123").unwrap();

        let m = metrics();
        let stats = m
            .log_directory(DataCategory::Public, "input", dir.path(), true)
            .unwrap();
        assert_eq!(
            stats,
            DirectoryStats {
                files: 2,
                dirs: 1,
                size: 8
            }
        );
        let records = m.recorder().records();
        assert_eq!(records[0].log_kwargs["files"], Value::from(2));
        assert_eq!(records[0].log_kwargs["dirs"], Value::from(1));
        assert_eq!(records[0].log_kwargs["size"], Value::from(8));
    }

    #[test]
    fn test_log_directory_missing_path_errors() {
        let dir = tempdir().unwrap();
        let m = metrics();
        assert!(m
            .log_directory(DataCategory::Public, "x", &dir.path().join("nope"), false)
            .is_err());
    }

    #[test]
    fn test_time_function_records() {
        let m = metrics();
        let value = m.time_function("load", || 5);
        assert_eq!(value, 5);
        let records = m.recorder().records();
        assert_eq!(records[0].log_args[0], Value::from("load.time"));
    }

    #[test]
    fn test_time_block_profile_and_drop() {
        let recorder = RunRecorder::offline();
        let mut profile = HashMap::new();
        {
            let _block = TimeBlock::new("step")
                .with_recorder(&recorder)
                .with_profile(&mut profile);
        }
        assert!(profile.contains_key("step"));
        assert_eq!(recorder.records().len(), 1);
    }

    #[test]
    fn test_time_block_finish_records_once() {
        let recorder = RunRecorder::offline();
        let elapsed = TimeBlock::new("once").with_recorder(&recorder).finish();
        assert!(elapsed >= 0.0);
        assert_eq!(recorder.records().len(), 1);
    }

    #[test]
    fn test_time_block_tags_make_a_row() {
        let recorder = RunRecorder::offline();
        let mut tags = Map::new();
        tags.insert("fold".to_string(), 3.into());
        TimeBlock::new("train")
            .with_recorder(&recorder)
            .with_tags(tags)
            .finish();
        let records = recorder.records();
        assert_eq!(records[0].log_method, "log_row");
        assert_eq!(records[0].log_kwargs["fold"], Value::from(3));
        assert!(records[0].log_kwargs.contains_key("train"));
    }
}
