use crate::error::{GenerationError, GenerationResult};
use log::{info, warn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 暫存目錄名稱前綴
pub const WORKSPACE_PREFIX: &str = "timelapse-";

/// 影格檔名的編號位數
pub const FRAME_DIGITS: usize = 8;

/// 與 [`frame_file_name`] 對應的 ffmpeg 輸入樣式
pub const FRAME_PATTERN: &str = "image%08d.jpg";

#[must_use]
pub fn frame_file_name(frame_index: usize) -> String {
    format!("image{frame_index:0width$}.jpg", width = FRAME_DIGITS)
}

/// 單次產生專用的暫存目錄
///
/// `destroy()` 消耗自身，因此每個目錄只會被移除一次；
/// 若未呼叫（例如 panic），Drop 時仍會盡力清理
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// 在系統暫存目錄下建立
    pub fn create() -> GenerationResult<Self> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn create_in(root: &Path) -> GenerationResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        info!("建立暫存目錄: {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn frame_path(&self, frame_index: usize) -> PathBuf {
        self.path.join(frame_file_name(frame_index))
    }

    /// 移除暫存目錄，失敗只記錄不回報
    pub fn destroy(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        match dir.close() {
            Ok(()) => info!("已清理暫存目錄: {}", self.path.display()),
            Err(source) => {
                let err = GenerationError::Cleanup {
                    path: self.path.clone(),
                    source,
                };
                warn!("{err}");
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
