//! 縮時影片產生流程的錯誤類型

use std::path::PathBuf;
use thiserror::Error;

pub type GenerationResult<T> = Result<T, GenerationError>;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// 設定錯誤（空的檔案集合、空的或不合法的產生設定）
    #[error("設定錯誤: {0}")]
    Config(String),

    #[error("無法解析排程表達式 '{expression}': {message}")]
    ScheduleParse { expression: String, message: String },

    /// 單一影格處理失敗，只會被記錄並跳過
    #[error("影格處理失敗 {path}: {message}")]
    Transform { path: PathBuf, message: String },

    #[error("ffmpeg 編碼失敗: {message}")]
    Encode {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("無法清理暫存目錄 {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("沒有可用的影格: {0}")]
    NoFrames(String),

    #[error("檔案登錄查詢失敗: {0}")]
    Registry(String),

    #[error("IO 錯誤: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn transform(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Transform {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn encode(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Encode {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}
