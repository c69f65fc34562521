use super::frame_selector::Selection;
use super::frame_transform::{FrameJob, FrameTransform, source_exists};
use super::workspace::Workspace;
use crate::error::{GenerationError, GenerationResult};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// 單一影格的處理結果
#[derive(Debug)]
pub struct FrameOutcome {
    pub frame_index: usize,
    pub output_path: PathBuf,
    pub success: bool,
}

/// 批次處理結果
#[derive(Debug)]
pub struct PipelineResult {
    /// 整理後連續編號的影格路徑
    pub frame_paths: Vec<PathBuf>,
    pub success_count: usize,
    pub skipped_count: usize,
}

/// 分批執行影格前處理
///
/// 每批最多 `batch_size` 個任務同時執行，批次之間嚴格依序：
/// 前一批全部結束後才開始下一批
pub struct BatchPipeline<'a> {
    batch_size: usize,
    images_dir: &'a Path,
    transform: &'a dyn FrameTransform,
}

impl<'a> BatchPipeline<'a> {
    #[must_use]
    pub fn new(batch_size: usize, images_dir: &'a Path, transform: &'a dyn FrameTransform) -> Self {
        Self {
            batch_size: batch_size.max(1),
            images_dir,
            transform,
        }
    }

    pub fn run(
        &self,
        selections: &[Selection],
        workspace: &Workspace,
    ) -> GenerationResult<PipelineResult> {
        let jobs = create_frame_jobs(selections, self.images_dir, workspace);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.batch_size)
            .thread_name(|i| format!("timelapse-frame-{i}"))
            .build()
            .map_err(|e| GenerationError::Io(std::io::Error::other(e)))?;

        let progress_bar = ProgressBar::new(jobs.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("處理影格中...");

        let mut outcomes = Vec::with_capacity(jobs.len());

        for (batch_index, batch) in jobs.chunks(self.batch_size).enumerate() {
            debug!("批次 {} 開始: {} 個影格", batch_index, batch.len());

            let batch_outcomes: Vec<FrameOutcome> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|job| process_frame(self.transform, job))
                    .collect()
            });

            progress_bar.inc(batch.len() as u64);
            outcomes.extend(batch_outcomes);
        }

        progress_bar.finish_and_clear();

        let frame_paths = compact_frames(&outcomes, workspace)?;
        let success_count = frame_paths.len();
        let skipped_count = outcomes.len() - success_count;

        info!("影格處理完成: 成功 {success_count}, 跳過 {skipped_count}");

        Ok(PipelineResult {
            frame_paths,
            success_count,
            skipped_count,
        })
    }
}

/// 建立影格任務，輸出檔名由影格編號決定
#[must_use]
pub fn create_frame_jobs(
    selections: &[Selection],
    images_dir: &Path,
    workspace: &Workspace,
) -> Vec<FrameJob> {
    selections
        .iter()
        .map(|selection| FrameJob {
            source_path: selection.file.full_path(images_dir),
            output_path: workspace.frame_path(selection.frame_index),
            target: selection.target,
            frame_index: selection.frame_index,
        })
        .collect()
}

/// 處理單一影格，任何失敗都轉為跳過
fn process_frame(transform: &dyn FrameTransform, job: &FrameJob) -> FrameOutcome {
    let result = if source_exists(&job.source_path) {
        transform.apply(job)
    } else {
        Err(GenerationError::transform(&job.source_path, "來源檔案不存在"))
    };

    match result {
        Ok(()) => FrameOutcome {
            frame_index: job.frame_index,
            output_path: job.output_path.clone(),
            success: true,
        },
        Err(e) => {
            warn!("影格 [{}] 排程點 {} 跳過: {e}", job.frame_index, job.target);
            // 避免殘留不完整的輸出被編碼
            if job.output_path.exists() {
                if let Err(remove_err) = fs::remove_file(&job.output_path) {
                    warn!(
                        "無法移除不完整的影格 {}: {remove_err}",
                        job.output_path.display()
                    );
                }
            }
            FrameOutcome {
                frame_index: job.frame_index,
                output_path: job.output_path.clone(),
                success: false,
            }
        }
    }
}

/// 依影格順序把成功的影格重新命名為連續編號
///
/// 所有批次結束後才執行，名稱只會往較小的編號移動
fn compact_frames(outcomes: &[FrameOutcome], workspace: &Workspace) -> GenerationResult<Vec<PathBuf>> {
    let mut ordered: Vec<&FrameOutcome> = outcomes.iter().filter(|o| o.success).collect();
    ordered.sort_by_key(|o| o.frame_index);

    let mut frame_paths = Vec::with_capacity(ordered.len());
    for (next_index, outcome) in ordered.into_iter().enumerate() {
        let target_path = workspace.frame_path(next_index);
        if outcome.output_path != target_path {
            fs::rename(&outcome.output_path, &target_path)?;
            debug!(
                "重新編號 {} -> {}",
                outcome.output_path.display(),
                target_path.display()
            );
        }
        frame_paths.push(target_path);
    }

    // 序列末端若殘留失敗影格，ffmpeg 會把它當成下一個影格
    let trailing = workspace.frame_path(frame_paths.len());
    if trailing.exists() {
        fs::remove_file(&trailing)?;
        warn!("已移除殘留的影格: {}", trailing.display());
    }

    Ok(frame_paths)
}
