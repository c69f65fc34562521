//! 影格選取
//!
//! 將遞增排序的拍攝檔案對應到排程的目標時間點。
//! 整個選取是對檔案序列的一次 fold，在任何並行處理開始前產生完整的選取清單。

use crate::tools::{CapturedFile, ScheduleIterator};
use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};

/// 目標時間點與被選中檔案的配對
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMatch {
    pub file: CapturedFile,
    pub target: DateTime<Utc>,
}

/// 已分配影格編號的選取結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub file: CapturedFile,
    pub target: DateTime<Utc>,
    /// 從 0 開始連續，依排程順序分配
    pub frame_index: usize,
}

struct SelectorState<'a> {
    /// `None` 表示排程已結束
    current: Option<DateTime<Utc>>,
    last_file: &'a CapturedFile,
    matches: Vec<FrameMatch>,
}

impl<'a> SelectorState<'a> {
    fn step(
        mut self,
        file: &'a CapturedFile,
        schedule: &mut ScheduleIterator,
        tolerance: TimeDelta,
    ) -> Self {
        let Some(current) = self.current else {
            return self;
        };

        // 尚未超過目前的排程點，先不做決定
        if file.created_at <= current {
            self.last_file = file;
            return self;
        }

        let file_distance = (file.created_at - current).abs();
        let last_distance = (self.last_file.created_at - current).abs();

        if file_distance > tolerance && last_distance > tolerance {
            self.current = catch_up(schedule, current, file.created_at);
            info!(
                "排程點 {current} 沒有 {} 秒內的檔案，跳至 {}",
                tolerance.num_seconds(),
                self.current
                    .map_or_else(|| "排程結束".to_string(), |next| next.to_string())
            );
        } else {
            // 距離相同時選較早的檔案
            let chosen = if file_distance < last_distance {
                file
            } else {
                self.last_file
            };

            info!(
                "排程點 {current} 選取 {} (拍攝於 {})",
                chosen.filename.display(),
                chosen.created_at
            );

            self.matches.push(FrameMatch {
                file: chosen.clone(),
                target: current,
            });
            self.current = schedule.next();
        }

        self.last_file = file;
        self
    }
}

/// 推進排程直到不再落後於 `until`
fn catch_up(
    schedule: &mut ScheduleIterator,
    mut current: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    while current < until {
        current = schedule.next()?;
    }
    Some(current)
}

/// 依排程為每個可對應的目標時間點選出最接近的檔案
///
/// `files` 必須已依拍攝時間遞增排序。檔案用盡即結束，
/// 之後的排程點不會產生任何選取。
#[must_use]
pub fn match_frames(
    files: &[CapturedFile],
    schedule: &mut ScheduleIterator,
    tolerance: TimeDelta,
) -> Vec<FrameMatch> {
    let Some(first) = files.first() else {
        return Vec::new();
    };

    let initial = SelectorState {
        current: schedule.next(),
        last_file: first,
        matches: Vec::new(),
    };

    files
        .iter()
        .fold(initial, |state, file| state.step(file, schedule, tolerance))
        .matches
}

/// 分配連續的影格編號
///
/// 來源檔案不存在的配對不佔用編號
pub fn assign_frame_indices<F>(matches: Vec<FrameMatch>, is_available: F) -> Vec<Selection>
where
    F: Fn(&CapturedFile) -> bool,
{
    matches
        .into_iter()
        .filter(|m| {
            let available = is_available(&m.file);
            if !available {
                warn!(
                    "排程點 {} 的檔案不存在，跳過: {}",
                    m.target,
                    m.file.filename.display()
                );
            }
            available
        })
        .enumerate()
        .map(|(frame_index, m)| Selection {
            file: m.file,
            target: m.target,
            frame_index,
        })
        .collect()
}

/// 選取並編號，供批次處理使用
pub fn select_frames<F>(
    files: &[CapturedFile],
    schedule: &mut ScheduleIterator,
    tolerance: TimeDelta,
    is_available: F,
) -> Vec<Selection>
where
    F: Fn(&CapturedFile) -> bool,
{
    assign_frame_indices(match_frames(files, schedule, tolerance), is_available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn file(id: i64, h: u32, m: u32) -> CapturedFile {
        CapturedFile::new(id, format!("img_{id}.jpg"), at(h, m))
    }

    fn hourly() -> ScheduleIterator {
        ScheduleIterator::new("0 * * * *", at(0, 0)).unwrap()
    }

    fn scenario_files() -> Vec<CapturedFile> {
        vec![file(1, 0, 0), file(2, 0, 45), file(3, 1, 30)]
    }

    #[test]
    fn test_scenario_nearest_file_wins() {
        let matches = match_frames(&scenario_files(), &mut hourly(), TimeDelta::seconds(3600));

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].target, at(0, 0));
        assert_eq!(matches[0].file.id, 1);
        assert_eq!(matches[1].target, at(1, 0));
        assert_eq!(matches[1].file.id, 2);
    }

    #[test]
    fn test_scenario_gap_skips_target() {
        let mut schedule = hourly();
        let matches = match_frames(&scenario_files(), &mut schedule, TimeDelta::seconds(600));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].target, at(0, 0));
        // 01:00 被跳過，排程停在 02:00，下一個點為 03:00
        assert_eq!(schedule.next(), Some(at(3, 0)));
    }

    #[test]
    fn test_tie_prefers_earlier_file() {
        let files = vec![file(1, 0, 30), file(2, 1, 30), file(3, 2, 50)];
        let mut schedule = ScheduleIterator::new("0 * * * *", at(1, 0)).unwrap();
        let matches = match_frames(&files, &mut schedule, TimeDelta::seconds(3600));

        assert_eq!(matches[0].target, at(1, 0));
        assert_eq!(matches[0].file.id, 1);
    }

    #[test]
    fn test_long_gap_catches_up_multiple_steps() {
        let files = vec![
            file(1, 0, 0),
            file(2, 0, 50),
            file(3, 6, 10),
            file(4, 7, 0),
            file(5, 7, 20),
        ];
        let matches = match_frames(&files, &mut hourly(), TimeDelta::seconds(900));

        let targets: Vec<_> = matches.iter().map(|m| m.target).collect();
        // 01:00 由 00:50 的檔案對應；之後長時間中斷，排程直接追到 07:00
        assert_eq!(targets, vec![at(0, 0), at(1, 0), at(7, 0)]);
        assert_eq!(matches[2].file.id, 4);
    }

    #[test]
    fn test_targets_strictly_increasing_and_unique() {
        let files: Vec<_> = (0..38)
            .map(|i| file(i, (i * 37 / 60) as u32 % 24, (i * 37 % 60) as u32))
            .collect();
        let matches = match_frames(&files, &mut hourly(), TimeDelta::seconds(1800));

        for pair in matches.windows(2) {
            assert!(pair[1].target > pair[0].target);
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let files = scenario_files();
        let mut schedule = hourly();
        let first = select_frames(&files, &mut schedule, TimeDelta::seconds(3600), |_| true);
        schedule.restart();
        let second = select_frames(&files, &mut schedule, TimeDelta::seconds(3600), |_| true);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_files_do_not_consume_index() {
        let files = vec![
            file(1, 0, 0),
            file(2, 1, 0),
            file(3, 2, 0),
            file(4, 3, 0),
            file(5, 4, 0),
        ];
        let missing = PathBuf::from("img_3.jpg");
        let selections = select_frames(&files, &mut hourly(), TimeDelta::seconds(3600), |f| {
            f.filename != missing
        });

        let indices: Vec<_> = selections.iter().map(|s| s.frame_index).collect();
        assert_eq!(indices, (0..selections.len()).collect::<Vec<_>>());
        assert!(selections.iter().all(|s| s.file.id != 3));
    }

    #[test]
    fn test_empty_files() {
        assert!(match_frames(&[], &mut hourly(), TimeDelta::seconds(3600)).is_empty());
    }
}
