//! 檔案登錄查詢
//!
//! 核心流程只需要「依拍攝時間遞增取得所有紀錄」這一個查詢

use crate::error::{GenerationError, GenerationResult};
use crate::tools::captured_file::{CapturedFile, sort_by_capture_time};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// 拍照任務的檔名格式：`img_<unix 秒>.jpg`
static REGEX_CAPTURE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^img_(\d+)$").expect("Invalid regex"));

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

pub trait FileRegistry {
    /// 依拍攝時間遞增回傳所有檔案紀錄
    fn all_files(&self) -> GenerationResult<Vec<CapturedFile>>;
}

impl FileRegistry for Vec<CapturedFile> {
    fn all_files(&self) -> GenerationResult<Vec<CapturedFile>> {
        let mut files = self.clone();
        sort_by_capture_time(&mut files);
        Ok(files)
    }
}

/// 由 JSON 陣列檔案讀取的登錄
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileRegistry for JsonFileRegistry {
    fn all_files(&self) -> GenerationResult<Vec<CapturedFile>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            GenerationError::Registry(format!("無法讀取 {}: {e}", self.path.display()))
        })?;

        let mut files: Vec<CapturedFile> = serde_json::from_str(&content).map_err(|e| {
            GenerationError::Registry(format!("無法解析 {}: {e}", self.path.display()))
        })?;

        sort_by_capture_time(&mut files);
        debug!("從 {} 載入 {} 筆紀錄", self.path.display(), files.len());
        Ok(files)
    }
}

/// 掃描影像目錄產生的登錄
///
/// 拍攝時間優先取自檔名，否則使用檔案修改時間；
/// 群組為影像根目錄下的第一層資料夾名稱
pub struct DirectoryRegistry {
    images_dir: PathBuf,
}

impl DirectoryRegistry {
    #[must_use]
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    fn record_for(&self, path: &Path) -> Option<CapturedFile> {
        let relative = path.strip_prefix(&self.images_dir).ok()?.to_path_buf();

        let created_at = capture_time_from_name(path).or_else(|| {
            let modified = fs::metadata(path).and_then(|m| m.modified());
            match modified {
                Ok(time) => Some(DateTime::<Utc>::from(time)),
                Err(e) => {
                    warn!("無法取得檔案時間 {}: {e}", path.display());
                    None
                }
            }
        })?;

        let group = relative
            .parent()
            .and_then(|parent| parent.components().next())
            .map(|component| component.as_os_str().to_string_lossy().to_string());

        Some(CapturedFile {
            id: 0,
            filename: relative,
            created_at,
            group,
            media_type: "img".to_string(),
            uploaded: false,
        })
    }
}

impl FileRegistry for DirectoryRegistry {
    fn all_files(&self) -> GenerationResult<Vec<CapturedFile>> {
        if !self.images_dir.is_dir() {
            return Err(GenerationError::Registry(format!(
                "影像目錄不存在: {}",
                self.images_dir.display()
            )));
        }

        let mut files: Vec<CapturedFile> = WalkDir::new(&self.images_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_image_file(entry.path()))
            .filter_map(|entry| self.record_for(entry.path()))
            .collect();

        sort_by_capture_time(&mut files);
        for (id, file) in files.iter_mut().enumerate() {
            file.id = id as i64 + 1;
        }

        debug!(
            "掃描 {} 找到 {} 張影像",
            self.images_dir.display(),
            files.len()
        );
        Ok(files)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn capture_time_from_name(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_str()?;
    let seconds: i64 = REGEX_CAPTURE_NAME.captures(stem)?.get(1)?.as_str().parse().ok()?;
    DateTime::from_timestamp(seconds, 0)
}
