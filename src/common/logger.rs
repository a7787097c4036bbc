use csv::Writer;
use plotters::prelude::*;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Logger for training and evaluation data
pub trait Logger {
    /// log a piece of data
    fn log(&mut self, data: LogItem);

    /// write out everything logged since the last dump
    fn dump(&mut self) -> Result<()>;

    /// check whether logging is possible. If `try_to_fix`, the
    /// logger will try to resolve the issue, e.g. by creating the dir
    fn check_can_log(&self, try_to_fix: bool) -> Result<()>;

    fn print_last(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogData {
    String(String),
    Float(f32),
    Int(i32),
}

impl std::fmt::Display for LogData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogData::String(s) => write!(f, "{s}"),
            LogData::Float(v) => write!(f, "{v}"),
            LogData::Int(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogItem {
    items: HashMap<String, LogData>,
}

impl LogItem {
    pub fn push(mut self, k: String, v: LogData) -> Self {
        self.items.insert(k, v);

        self
    }

    pub fn get(&self, k: &str) -> Option<&LogData> {
        self.items.get(k)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn combine(&mut self, other: LogItem) {
        other.items.into_iter().for_each(|(k, v)| {
            self.items.insert(k, v);
        });
    }
}

/// Picks the next numbered run directory, `{dir}/{prefix}_{n}`, where
/// `n` is one more than the highest id already present.
pub fn next_run_dir(dir: &Path, prefix: &str) -> PathBuf {
    let latest = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().into_string().ok()?;
                    let id = name.strip_prefix(prefix)?.strip_prefix('_')?;
                    id.parse::<usize>().ok()
                })
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    dir.join(format!("{prefix}_{}", latest + 1))
}

/// Points kept per plotted key. Older points are thinned out once the
/// series grows past this.
pub const MAX_PLOT_POINTS: usize = 2000;

/// A numeric series sampled every `stride`-th value
#[derive(Debug, Clone)]
pub struct PlotSeries {
    points: Vec<(f32, f32)>,
    stride: usize,
    seen: usize,
}

impl Default for PlotSeries {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            stride: 1,
            seen: 0,
        }
    }
}

impl PlotSeries {
    pub fn push(&mut self, x: f32, y: f32) {
        if self.seen % self.stride == 0 {
            self.points.push((x, y));
        }
        self.seen += 1;

        if self.points.len() > MAX_PLOT_POINTS {
            self.points = self.points.iter().copied().step_by(2).collect();
            self.stride *= 2;
        }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }
}

/// Appends rows to a CSV file on every dump and keeps only thinned
/// plot series in memory.
pub struct CsvLogger {
    overwrite: bool,
    dump_path: PathBuf,
    to_stdout: bool,
    keys: Vec<String>,
    /// columns in the header currently on disk
    written_keys: usize,
    pending: Vec<LogItem>,
    rows_logged: usize,
    series: HashMap<String, PlotSeries>,
    last: Option<LogItem>,
}

impl CsvLogger {
    pub fn new(dump_path: PathBuf, to_stdout: bool, overwrite: bool) -> Self {
        Self {
            dump_path,
            to_stdout,
            keys: Vec::new(),
            written_keys: 0,
            pending: Vec::new(),
            rows_logged: 0,
            series: HashMap::new(),
            last: None,
            overwrite,
        }
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Items logged since the last dump
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn series(&self, key: &str) -> Option<&PlotSeries> {
        self.series.get(key)
    }

    fn row(&self, record: &LogItem) -> Vec<String> {
        self.keys
            .iter()
            .map(|key| {
                record
                    .items
                    .get(key)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Rewrites the file on disk under the current header, padding rows
    /// written before new keys appeared.
    fn rewrite_with_header(&self) -> Result<()> {
        let mut old_rows = Vec::new();
        if self.written_keys > 0 {
            let mut rdr = csv::ReaderBuilder::new()
                .flexible(true)
                .from_path(&self.dump_path)?;
            for record in rdr.records() {
                let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
                row.resize(self.keys.len(), String::new());
                old_rows.push(row);
            }
        }

        let mut wtr = Writer::from_path(&self.dump_path)?;
        if !self.keys.is_empty() {
            wtr.write_record(&self.keys)?;
        }
        for row in old_rows {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;

        Ok(())
    }
}

impl Logger for CsvLogger {
    fn log(&mut self, data: LogItem) {
        if data.is_empty() {
            return;
        }

        if self.to_stdout {
            tracing::debug!("{:?}", data);
        }

        for (key, value) in &data.items {
            if !self.keys.contains(key) {
                self.keys.push(key.clone());
            }

            let y = match value {
                LogData::Float(y) => *y,
                LogData::Int(y) => *y as f32,
                LogData::String(_) => continue,
            };
            self.series
                .entry(key.clone())
                .or_default()
                .push(self.rows_logged as f32, y);
        }
        self.rows_logged += 1;

        self.last = Some(data.clone());
        self.pending.push(data);
    }

    fn dump(&mut self) -> Result<()> {
        tracing::info!(
            "Dumping logs to {:?}. {} items to dump",
            self.dump_path,
            self.pending.len()
        );

        // headers follow first-seen order so columns are stable across dumps
        if self.keys.len() != self.written_keys || !self.dump_path.exists() {
            self.rewrite_with_header()?;
            self.written_keys = self.keys.len();
        }

        let file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.dump_path)?;
        let mut wtr = Writer::from_writer(file);
        for record in &self.pending {
            wtr.write_record(self.row(record))?;
        }
        wtr.flush()?;
        self.pending.clear();

        if let Some(dir) = self.dump_path.parent() {
            let plots: Vec<(&str, &[(f32, f32)])> = self
                .keys
                .iter()
                .filter_map(|k| self.series.get(k).map(|s| (k.as_str(), s.points())))
                .collect();
            if let Err(e) = create_plots(&plots, dir) {
                tracing::warn!("could not draw training plots: {e}");
            }
        }

        Ok(())
    }

    fn check_can_log(&self, try_to_fix: bool) -> Result<()> {
        let parent = self
            .dump_path
            .parent()
            .ok_or_else(|| Error::Logger("logger dump path has no parent dir".to_string()))?;

        if self.dump_path.exists() && !self.overwrite {
            Err(Error::Logger("logger dump file already exists".to_string()))
        } else if self.dump_path.extension() != Some(OsStr::new("csv")) {
            Err(Error::Logger("logger dump path should be a csv".to_string()))
        } else if !parent.exists() {
            if try_to_fix {
                std::fs::create_dir_all(parent)?;
                Ok(())
            } else {
                Err(Error::Logger(
                    "logger dump path dir does not exist".to_string(),
                ))
            }
        } else {
            Ok(())
        }
    }

    fn print_last(&self) {
        if let Some(log) = &self.last {
            let mut keys: Vec<&String> = log.items.keys().collect();
            keys.sort();

            for key in keys {
                tracing::info!("\t{key}: {}", log.items[key]);
            }
        }
    }
}

/// Discards everything. Used by models that are only evaluated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&mut self, _data: LogItem) {}

    fn dump(&mut self) -> Result<()> {
        Ok(())
    }

    fn check_can_log(&self, _try_to_fix: bool) -> Result<()> {
        Ok(())
    }

    fn print_last(&self) {}
}

/// Draws one line plot per series into `dir/{key}.png`
pub fn create_plots(
    series: &[(&str, &[(f32, f32)])],
    dir: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    for (yvar, points) in series {
        if points.is_empty() {
            continue;
        }
        let path = dir.join(format!("{yvar}.png"));

        let (xmax, ymin, ymax) = points.iter().fold(
            (1.0f32, 0.0f32, f32::MIN),
            |(xmax, ymin, ymax), &(x, y)| (xmax.max(x), ymin.min(y), ymax.max(y)),
        );
        let ymax = if ymax <= ymin { ymin + 1.0 } else { ymax };

        let root_area = BitMapBackend::new(&path, (600, 400)).into_drawing_area();
        root_area.fill(&WHITE)?;

        let mut ctx = ChartBuilder::on(&root_area)
            .set_label_area_size(LabelAreaPosition::Left, 40)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .caption(*yvar, ("sans-serif", 40))
            .build_cartesian_2d(0.0..xmax, ymin..ymax)?;

        ctx.configure_mesh().draw()?;

        ctx.draw_series(LineSeries::new(points.iter().copied(), &GREEN))?;
        root_area.present()?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::{fs::OpenOptions, path::PathBuf};

    use super::{
        next_run_dir, CsvLogger, LogData, LogItem, Logger, NullLogger, PlotSeries, MAX_PLOT_POINTS,
    };

    #[test]
    fn null_logger_accepts_everything() {
        let mut logger = NullLogger;
        logger.log(LogItem::default().push("a".to_string(), LogData::Int(1)));

        assert!(logger.check_can_log(false).is_ok());
        assert!(logger.dump().is_ok());
    }

    #[test]
    fn test_should_log() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CsvLogger::new(dir.path().join("log.csv"), false, true);

        assert!(logger.check_can_log(false).is_ok());
    }

    #[test]
    fn test_shouldnt_log1() {
        let logger = CsvLogger::new(PathBuf::from("this/path/shouldnt/exist.csv"), false, true);
        let err = logger.check_can_log(false).unwrap_err();

        assert!(err.to_string().contains("dir does not exist"));
    }

    #[test]
    fn test_shouldnt_log2() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CsvLogger::new(dir.path().join("log.txt"), false, true);
        let err = logger.check_can_log(false).unwrap_err();

        assert!(err.to_string().contains("should be a csv"));
    }

    #[test]
    fn test_shouldnt_log3() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("__very_strange_name.csv");

        let _ = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&pth);

        let logger = CsvLogger::new(pth, false, false);
        let err = logger.check_can_log(false).unwrap_err();

        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_fix_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("nested").join("progress.csv");
        let logger = CsvLogger::new(pth.clone(), false, true);

        logger.check_can_log(true).unwrap();
        assert!(pth.parent().unwrap().is_dir());
    }

    #[test]
    fn test_dump_writes_union_of_keys() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("progress.csv");
        let mut logger = CsvLogger::new(pth.clone(), false, true);

        logger.log(LogItem::default().push("a".to_string(), LogData::Int(1)));
        logger.log(LogItem::default());
        logger.log(
            LogItem::default()
                .push("a".to_string(), LogData::Int(2))
                .push("b".to_string(), LogData::Float(0.5)),
        );
        assert_eq!(logger.len(), 2);

        logger.dump().unwrap();

        let contents = std::fs::read_to_string(pth).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["a,b", "1,", "2,0.5"]);
    }

    #[test]
    fn test_dump_appends_and_releases_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("progress.csv");
        let mut logger = CsvLogger::new(pth.clone(), false, true);

        for round in 0..3 {
            for i in 0..1000 {
                logger.log(LogItem::default().push("step".to_string(), LogData::Int(round * 1000 + i)));
            }
            logger.dump().unwrap();

            assert!(logger.is_empty());
            let rows = std::fs::read_to_string(&pth).unwrap().lines().count() - 1;
            assert_eq!(rows, (round as usize + 1) * 1000);
        }

        assert!(logger.series("step").unwrap().points().len() <= MAX_PLOT_POINTS);
    }

    #[test]
    fn test_new_keys_pad_earlier_rows() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("progress.csv");
        let mut logger = CsvLogger::new(pth.clone(), false, true);

        logger.log(LogItem::default().push("a".to_string(), LogData::Int(1)));
        logger.dump().unwrap();
        logger.log(
            LogItem::default()
                .push("a".to_string(), LogData::Int(2))
                .push("b".to_string(), LogData::String("x".to_string())),
        );
        logger.dump().unwrap();

        let contents = std::fs::read_to_string(pth).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["a,b", "1,", "2,x"]);
    }

    #[test]
    fn test_dump_without_logs() {
        let dir = tempfile::tempdir().unwrap();
        let pth = dir.path().join("progress.csv");
        let mut logger = CsvLogger::new(pth.clone(), false, true);

        logger.dump().unwrap();
        assert!(pth.is_file());
    }

    #[test]
    fn test_plot_series_is_thinned() {
        let mut series = PlotSeries::default();
        for i in 0..10 * MAX_PLOT_POINTS {
            series.push(i as f32, 1.0);
        }

        let points = series.points();
        assert!(points.len() <= MAX_PLOT_POINTS);
        assert!(points.len() > MAX_PLOT_POINTS / 4);
        assert_eq!(points[0].0, 0.0);
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_next_run_dir() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(next_run_dir(dir.path(), "PPO"), dir.path().join("PPO_1"));

        std::fs::create_dir(dir.path().join("PPO_1")).unwrap();
        std::fs::create_dir(dir.path().join("PPO_4")).unwrap();
        std::fs::create_dir(dir.path().join("SAC_9")).unwrap();

        assert_eq!(next_run_dir(dir.path(), "PPO"), dir.path().join("PPO_5"));
        assert_eq!(next_run_dir(dir.path(), "SAC"), dir.path().join("SAC_10"));
    }
}
