use crate::tools::ScheduleTimezone;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TOLERANCE_SECONDS: u64 = 3600;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_CONFIG_FILE: &str = "timelapse.json";

const fn default_tolerance_seconds() -> u64 {
    DEFAULT_TOLERANCE_SECONDS
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("videos")
}

/// 單一縮時影片的產生設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// 同時作為輸出檔名 `<name>.mp4`
    pub name: String,
    #[serde(alias = "interval")]
    pub interval_expression: String,
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: u64,
    #[serde(default)]
    pub watermark: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 只使用此群組的檔案
    #[serde(default)]
    pub group: Option<String>,
}

impl GenerationConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, interval_expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval_expression: interval_expression.into(),
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            watermark: false,
            batch_size: DEFAULT_BATCH_SIZE,
            group: None,
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> TimeDelta {
        let seconds = i64::try_from(self.tolerance_seconds).unwrap_or(i64::MAX);
        TimeDelta::seconds(seconds.min(i64::MAX / 1000))
    }

    #[must_use]
    pub fn output_file_name(&self) -> String {
        format!("{}.mp4", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 檔案紀錄中的相對路徑以此為根目錄
    pub images_dir: PathBuf,
    /// 檔案登錄 JSON；未設定時改為掃描 `images_dir`
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// 暫存目錄的上層目錄，預設為系統暫存目錄
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub timezone: ScheduleTimezone,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
    pub generations: Vec<GenerationConfig>,
}
