use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_media_type() -> String {
    "img".to_string()
}

/// 檔案登錄中的一筆拍攝紀錄
///
/// 產生影片期間視為唯讀資料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFile {
    pub id: i64,
    /// 相對於影像根目錄的路徑
    pub filename: PathBuf,
    /// 拍攝時間
    #[serde(alias = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(rename = "type", default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub uploaded: bool,
}

impl CapturedFile {
    #[must_use]
    pub fn new(id: i64, filename: impl Into<PathBuf>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: filename.into(),
            created_at,
            group: None,
            media_type: default_media_type(),
            uploaded: false,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn full_path(&self, images_dir: &Path) -> PathBuf {
        images_dir.join(&self.filename)
    }

    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.group.as_deref() == Some(group)
    }
}

/// 依拍攝時間遞增排序（同時間則依檔名，確保結果穩定）
pub fn sort_by_capture_time(files: &mut [CapturedFile]) {
    files.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });
}
