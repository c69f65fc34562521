use super::workspace::FRAME_PATTERN;
use crate::error::{GenerationError, GenerationResult};
use log::info;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 輸出影片的影格率
pub const FRAME_RATE: u32 = 24;

/// 將暫存目錄中連續編號的影格編碼為 mp4
pub struct EncodeCommand {
    input_pattern: PathBuf,
    destination_path: PathBuf,
}

impl EncodeCommand {
    #[must_use]
    pub fn new(frames_dir: &Path, destination_path: &Path) -> Self {
        Self {
            input_pattern: frames_dir.join(FRAME_PATTERN),
            destination_path: destination_path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    #[must_use]
    pub fn build_command(&self) -> Command {
        let mut cmd = Command::new("ffmpeg");

        cmd.args([
            "-hide_banner",
            "-nostdin",
            "-loglevel", "error",
            "-y",
            "-r", &FRAME_RATE.to_string(),
            "-i",
        ]);
        cmd.arg(&self.input_pattern);
        cmd.args([
            "-vcodec", "libx264",
            "-pix_fmt", "yuv420p",
            "-q:v", "3",
        ]);
        cmd.arg(&self.destination_path);

        cmd
    }
}

pub trait VideoEncoder: Sync {
    fn encode(&self, frames_dir: &Path, destination_path: &Path) -> GenerationResult<()>;
}

/// 呼叫外部 ffmpeg
pub struct FfmpegEncoder;

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames_dir: &Path, destination_path: &Path) -> GenerationResult<()> {
        let command = EncodeCommand::new(frames_dir, destination_path);
        info!("開始編碼影片: {}", command.destination_path().display());

        let output = command
            .build_command()
            .output()
            .map_err(|e| GenerationError::encode(format!("無法執行 ffmpeg: {e}"), None, None))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GenerationError::encode(
                format!("ffmpeg 結束碼 {:?}: {stderr}", output.status.code()),
                Some(stderr),
                output.status.code(),
            ));
        }

        if !destination_path.exists() {
            return Err(GenerationError::encode(
                format!("影片未建立: {}", destination_path.display()),
                None,
                output.status.code(),
            ));
        }

        info!("影片建立完成: {}", destination_path.display());
        Ok(())
    }
}
