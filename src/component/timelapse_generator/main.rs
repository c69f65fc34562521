use super::batch_pipeline::BatchPipeline;
use super::ffmpeg_command::{FfmpegEncoder, VideoEncoder};
use super::frame_selector::{assign_frame_indices, match_frames};
use super::frame_transform::{CopyTransform, FrameTransform, WatermarkTransform, source_exists};
use super::workspace::Workspace;
use crate::config::{Config, GenerationConfig, validate_generations};
use crate::error::{GenerationError, GenerationResult};
use crate::tools::{
    CapturedFile, FileRegistry, ScheduleIterator, ScheduleTimezone, ensure_directory_exists,
    sort_by_capture_time,
};
use console::style;
use log::{error, info};
use std::path::PathBuf;
use uuid::Uuid;

/// 產生流程共用的執行環境，啟動時建立一次
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workspace_root: Option<PathBuf>,
    pub timezone: ScheduleTimezone,
    pub font_file: Option<PathBuf>,
}

impl From<&Config> for GenerationContext {
    fn from(config: &Config) -> Self {
        Self {
            images_dir: config.images_dir.clone(),
            output_dir: config.output_dir.clone(),
            workspace_root: config.workspace_root.clone(),
            timezone: config.timezone,
            font_file: config.font_file.clone(),
        }
    }
}

/// 單一產生設定成功時的產出
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    pub output_path: PathBuf,
    pub frame_count: usize,
    pub skipped_count: usize,
}

/// 單一產生設定的執行結果
#[derive(Debug)]
pub struct GenerationOutcome {
    pub name: String,
    pub run_id: Uuid,
    pub result: GenerationResult<GeneratedVideo>,
}

impl GenerationOutcome {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// 整次執行的摘要
#[derive(Debug, Default)]
pub struct GenerationSummary {
    pub outcomes: Vec<GenerationOutcome>,
}

impl GenerationSummary {
    #[must_use]
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&GenerationOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// 縮時影片產生器
///
/// 對同一批檔案依序執行每個產生設定：
/// A. 解析排程
/// B. 建立暫存目錄
/// C. 選取影格並編號
/// D. 分批處理影格
/// E. 編碼影片
///
/// 每個設定各自擁有暫存目錄，失敗只影響該設定
pub struct TimelapseGenerator<'a> {
    context: GenerationContext,
    registry: &'a dyn FileRegistry,
    encoder: Box<dyn VideoEncoder>,
    watermark: Box<dyn FrameTransform>,
}

impl<'a> TimelapseGenerator<'a> {
    #[must_use]
    pub fn new(context: GenerationContext, registry: &'a dyn FileRegistry) -> Self {
        let watermark = WatermarkTransform::new(context.font_file.clone(), context.timezone);
        Self {
            context,
            registry,
            encoder: Box::new(FfmpegEncoder),
            watermark: Box::new(watermark),
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: Box<dyn VideoEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn with_watermark(mut self, transform: Box<dyn FrameTransform>) -> Self {
        self.watermark = transform;
        self
    }

    /// 執行所有產生設定
    ///
    /// 設定或檔案登錄有問題時在建立任何暫存目錄前回傳錯誤；
    /// 個別設定的失敗記錄在摘要中
    pub fn run(&self, generations: &[GenerationConfig]) -> GenerationResult<GenerationSummary> {
        validate_generations(generations)?;

        let mut files = self.registry.all_files()?;
        if files.is_empty() {
            return Err(GenerationError::config("檔案登錄沒有任何檔案"));
        }
        sort_by_capture_time(&mut files);

        ensure_directory_exists(&self.context.output_dir)?;

        info!(
            "開始產生縮時影片：{} 個檔案，{} 個產生設定",
            files.len(),
            generations.len()
        );

        let outcomes = generations
            .iter()
            .map(|generation| self.run_generation(generation, &files))
            .collect();

        Ok(GenerationSummary { outcomes })
    }

    fn run_generation(&self, generation: &GenerationConfig, files: &[CapturedFile]) -> GenerationOutcome {
        let run_id = Uuid::new_v4();
        info!("[{}] 開始產生 ({run_id})", generation.name);

        let result = self.generate(generation, files);

        match &result {
            Ok(video) => info!(
                "[{}] 完成 ({run_id}): {} 個影格, 跳過 {} -> {}",
                generation.name,
                video.frame_count,
                video.skipped_count,
                video.output_path.display()
            ),
            Err(e) => error!("[{}] 產生失敗 ({run_id}): {e}", generation.name),
        }

        GenerationOutcome {
            name: generation.name.clone(),
            run_id,
            result,
        }
    }

    /// 執行單一產生設定
    ///
    /// `files` 必須已依拍攝時間遞增排序
    pub fn generate(
        &self,
        generation: &GenerationConfig,
        files: &[CapturedFile],
    ) -> GenerationResult<GeneratedVideo> {
        let grouped: Vec<CapturedFile>;
        let candidates = match &generation.group {
            Some(group) => {
                grouped = files.iter().filter(|f| f.in_group(group)).cloned().collect();
                grouped.as_slice()
            }
            None => files,
        };

        let Some(first) = candidates.first() else {
            return Err(GenerationError::NoFrames(format!(
                "群組 {} 沒有任何檔案",
                generation.group.as_deref().unwrap_or_default()
            )));
        };

        // Stage A: 排程解析失敗時不會建立暫存目錄
        let mut schedule = ScheduleIterator::new(&generation.interval_expression, first.created_at)?
            .with_timezone(self.context.timezone);

        // Stage B
        let workspace = match &self.context.workspace_root {
            Some(root) => Workspace::create_in(root)?,
            None => Workspace::create()?,
        };

        let result = self.generate_in_workspace(generation, candidates, &mut schedule, &workspace);

        workspace.destroy();
        result
    }

    fn generate_in_workspace(
        &self,
        generation: &GenerationConfig,
        candidates: &[CapturedFile],
        schedule: &mut ScheduleIterator,
        workspace: &Workspace,
    ) -> GenerationResult<GeneratedVideo> {
        // Stage C: 完整的選取清單在任何並行處理前就已確定
        let matches = match_frames(candidates, schedule, generation.tolerance());
        let match_count = matches.len();
        let selections = assign_frame_indices(matches, |file| {
            source_exists(&file.full_path(&self.context.images_dir))
        });

        info!(
            "[{}] 排程 '{}' 對應 {} 個排程點，可用 {} 個",
            generation.name,
            schedule.expression(),
            match_count,
            selections.len()
        );

        if selections.is_empty() {
            return Err(GenerationError::NoFrames(format!(
                "{} 沒有任何可用的影格",
                generation.name
            )));
        }

        // Stage D
        let transform: &dyn FrameTransform = if generation.watermark {
            &*self.watermark
        } else {
            &CopyTransform
        };
        let pipeline = BatchPipeline::new(generation.batch_size, &self.context.images_dir, transform);
        let processed = pipeline.run(&selections, workspace)?;

        if processed.success_count == 0 {
            return Err(GenerationError::NoFrames(format!(
                "{} 的影格全部處理失敗",
                generation.name
            )));
        }

        // Stage E
        let output_path = self.context.output_dir.join(generation.output_file_name());
        self.encoder.encode(workspace.path(), &output_path)?;

        Ok(GeneratedVideo {
            output_path,
            frame_count: processed.success_count,
            skipped_count: processed.skipped_count + (match_count - selections.len()),
        })
    }
}

pub fn print_summary(summary: &GenerationSummary) {
    println!();
    println!("{}", style("=== 縮時影片產生摘要 ===").cyan().bold());

    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(video) => println!(
                "  {} {} ({} 個影格) -> {}",
                style("✓").green(),
                outcome.name,
                video.frame_count,
                video.output_path.display()
            ),
            Err(e) => println!("  {} {}: {}", style("✗").red(), outcome.name, e),
        }
    }

    println!("  成功: {} 個", style(summary.successful()).green());
    if summary.failed() > 0 {
        println!("  失敗: {} 個", style(summary.failed()).red());
    }

    info!(
        "縮時影片產生完成 - 成功: {}, 失敗: {}",
        summary.successful(),
        summary.failed()
    );
}
