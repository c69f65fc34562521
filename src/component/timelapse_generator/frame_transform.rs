//! 單一影格的前處理：直接複製，或加上時間浮水印

use crate::error::{GenerationError, GenerationResult};
use crate::tools::ScheduleTimezone;
use chrono::{DateTime, Utc};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 浮水印時間格式
pub const WATERMARK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// 影格處理任務
///
/// 輸出路徑在派送前就已由影格編號決定
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub target: DateTime<Utc>,
    pub frame_index: usize,
}

pub trait FrameTransform: Sync {
    fn apply(&self, job: &FrameJob) -> GenerationResult<()>;
}

/// 直接複製
pub struct CopyTransform;

impl FrameTransform for CopyTransform {
    fn apply(&self, job: &FrameJob) -> GenerationResult<()> {
        fs::copy(&job.source_path, &job.output_path)
            .map_err(|e| GenerationError::transform(&job.source_path, e.to_string()))?;

        debug!(
            "已複製 {} -> {}",
            job.source_path.display(),
            job.output_path.display()
        );
        Ok(())
    }
}

/// 使用 ffmpeg drawtext 在影格右下角加上目標時間
pub struct WatermarkTransform {
    font_file: Option<PathBuf>,
    timezone: ScheduleTimezone,
}

impl WatermarkTransform {
    #[must_use]
    pub const fn new(font_file: Option<PathBuf>, timezone: ScheduleTimezone) -> Self {
        Self {
            font_file,
            timezone,
        }
    }

    #[must_use]
    pub fn render_text(&self, target: DateTime<Utc>) -> String {
        self.timezone
            .localize(target)
            .format(WATERMARK_TIME_FORMAT)
            .to_string()
    }

    fn build_filter(&self, text: &str) -> String {
        let mut options = vec![format!("text={}", escape_filter_value(text))];

        if let Some(font_file) = &self.font_file {
            options.push(format!(
                "fontfile={}",
                escape_filter_value(&font_file.to_string_lossy())
            ));
        }

        options.extend([
            "expansion=none".to_string(),
            "fontsize=h/20".to_string(),
            "fontcolor=white".to_string(),
            "box=1".to_string(),
            "boxcolor=black@0.5".to_string(),
            "boxborderw=8".to_string(),
            "x=w-tw-24".to_string(),
            "y=h-th-24".to_string(),
        ]);

        format!("drawtext={}", options.join(":"))
    }

    #[must_use]
    pub fn build_command(&self, job: &FrameJob) -> Command {
        let filter = self.build_filter(&self.render_text(job.target));

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-i"])
            .arg(&job.source_path)
            .args(["-vf", &filter, "-frames:v", "1", "-q:v", "2", "-y"])
            .arg(&job.output_path);
        cmd
    }
}

impl FrameTransform for WatermarkTransform {
    fn apply(&self, job: &FrameJob) -> GenerationResult<()> {
        let output = self
            .build_command(job)
            .output()
            .map_err(|e| GenerationError::transform(&job.source_path, format!("無法執行 ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::transform(
                &job.source_path,
                format!("ffmpeg 浮水印失敗: {}", stderr.trim()),
            ));
        }

        if !job.output_path.exists() {
            return Err(GenerationError::transform(
                &job.source_path,
                format!("影格未建立: {}", job.output_path.display()),
            ));
        }

        Ok(())
    }
}

/// 跳脫 filtergraph 中 drawtext 選項值的特殊字元
///
/// 需經過 filtergraph 與選項兩層解析
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\\\\\"),
            '\'' => escaped.push_str("\\\\\\'"),
            ':' => escaped.push_str("\\\\:"),
            ',' | ';' | '[' | ']' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 是否有可用的來源檔
#[must_use]
pub fn source_exists(path: &Path) -> bool {
    path.is_file()
}
