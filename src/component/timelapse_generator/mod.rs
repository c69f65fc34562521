//! 縮時影片產生元件
//!
//! 五階段流程：
//! A. 解析排程表達式
//! B. 建立暫存目錄
//! C. 依排程選取影格
//! D. 分批平行處理影格（複製或加上浮水印）
//! E. 以 ffmpeg 編碼為 mp4

mod batch_pipeline;
mod ffmpeg_command;
mod frame_selector;
mod frame_transform;
mod main;
mod workspace;

pub use batch_pipeline::{BatchPipeline, FrameOutcome, PipelineResult, create_frame_jobs};
pub use ffmpeg_command::{EncodeCommand, FRAME_RATE, FfmpegEncoder, VideoEncoder};
pub use frame_selector::{FrameMatch, Selection, assign_frame_indices, match_frames, select_frames};
pub use frame_transform::{
    CopyTransform, FrameJob, FrameTransform, WATERMARK_TIME_FORMAT, WatermarkTransform,
    source_exists,
};
pub use main::{
    GeneratedVideo, GenerationContext, GenerationOutcome, GenerationSummary, TimelapseGenerator,
    print_summary,
};
pub use workspace::{FRAME_DIGITS, FRAME_PATTERN, WORKSPACE_PREFIX, Workspace, frame_file_name};
