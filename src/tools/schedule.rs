//! 排程時間點產生器
//!
//! 依 cron 風格的表達式，從起始時間開始產生嚴格遞增的目標時間點

use crate::error::{GenerationError, GenerationResult};
use chrono::{DateTime, FixedOffset, Local, Offset, SubsecRound, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 排程表達式的計算時區
///
/// 設定檔中為 `"local"`、`"utc"` 或 IANA 時區名稱（例如 `"Asia/Taipei"`）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleTimezone {
    #[default]
    Local,
    Utc,
    Named(Tz),
}

impl ScheduleTimezone {
    /// 該時間點在此時區的 UTC 偏移
    #[must_use]
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        let naive = instant.naive_utc();
        match self {
            Self::Local => Local.offset_from_utc_datetime(&naive).fix(),
            Self::Utc => Utc.offset_from_utc_datetime(&naive).fix(),
            Self::Named(tz) => tz.offset_from_utc_datetime(&naive).fix(),
        }
    }

    /// 轉為此時區的當地時間
    #[must_use]
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset_at(instant))
    }
}

impl FromStr for ScheduleTimezone {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if value.eq_ignore_ascii_case("utc") {
            return Ok(Self::Utc);
        }

        value
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|e| GenerationError::config(format!("未知的時區 '{value}': {e}")))
    }
}

impl TryFrom<String> for ScheduleTimezone {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTimezone> for String {
    fn from(timezone: ScheduleTimezone) -> Self {
        match timezone {
            ScheduleTimezone::Local => "local".to_string(),
            ScheduleTimezone::Utc => "utc".to_string(),
            ScheduleTimezone::Named(tz) => tz.name().to_string(),
        }
    }
}

/// 目標時間點序列
///
/// 可由相同的表達式與起始時間重新推導，`restart()` 會回到起點
#[derive(Debug, Clone)]
pub struct ScheduleIterator {
    expression: String,
    schedule: Schedule,
    timezone: ScheduleTimezone,
    origin: DateTime<Utc>,
    cursor: DateTime<Utc>,
}

impl ScheduleIterator {
    /// 建立排程（UTC）
    ///
    /// 第一個目標時間點為起始時間當下或之後的第一個排程點（秒精度）
    pub fn new(expression: &str, start: DateTime<Utc>) -> GenerationResult<Self> {
        let normalized = normalize_expression(expression);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| GenerationError::ScheduleParse {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;

        let origin = start.trunc_subsecs(0) - TimeDelta::seconds(1);

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            timezone: ScheduleTimezone::Utc,
            origin,
            cursor: origin,
        })
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: ScheduleTimezone) -> Self {
        self.timezone = timezone;
        self.cursor = self.origin;
        self
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn restart(&mut self) {
        self.cursor = self.origin;
    }
}

impl Iterator for ScheduleIterator {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = next_after(&self.schedule, self.timezone, self.cursor)?;
        self.cursor = next;
        Some(next)
    }
}

/// `cursor` 之後的第一個排程點
///
/// 以 `cursor` 當下的固定偏移計算當地時間；若結果落在偏移改變之後，
/// 就從變更點以新的偏移重新計算。重複的當地時間各自產生一次，
/// 不存在的當地時間（日光節約跳過的時段）不會產生。
fn next_after(
    schedule: &Schedule,
    timezone: ScheduleTimezone,
    cursor: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    // anchor 的實際偏移恆為 offset
    let mut anchor = cursor;
    let mut from = cursor;
    let mut offset = timezone.offset_at(cursor);

    loop {
        let candidate = schedule
            .after(&from.with_timezone(&offset))
            .next()?
            .with_timezone(&Utc);

        if timezone.offset_at(candidate) == offset {
            return Some(candidate);
        }

        let transition = first_offset_change(timezone, anchor, candidate, offset);
        anchor = transition;
        from = transition - TimeDelta::seconds(1);
        offset = timezone.offset_at(transition);
    }
}

/// 在 `(lo, hi]` 中找出偏移不再是 `offset` 的最早時間點（秒精度）
fn first_offset_change(
    timezone: ScheduleTimezone,
    mut lo: DateTime<Utc>,
    mut hi: DateTime<Utc>,
    offset: FixedOffset,
) -> DateTime<Utc> {
    while (hi - lo).num_seconds() > 1 {
        let mid = lo + TimeDelta::seconds((hi - lo).num_seconds() / 2);
        if timezone.offset_at(mid) == offset {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// 五欄位（分鐘精度）的表達式補上秒欄位
fn normalize_expression(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return trimmed.to_string();
    }

    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(normalize_expression("0 * * * *"), "0 0 * * * *");
        assert_eq!(normalize_expression(" 0 0 6 * * * "), "0 0 6 * * *");
        assert_eq!(normalize_expression("@hourly"), "@hourly");
    }

    #[test]
    fn test_hourly_starts_at_start_instant() {
        let schedule = ScheduleIterator::new("0 * * * *", at(0, 0, 0)).unwrap();
        let targets: Vec<_> = schedule.take(3).collect();
        assert_eq!(targets, vec![at(0, 0, 0), at(1, 0, 0), at(2, 0, 0)]);
    }

    #[test]
    fn test_start_between_points() {
        let mut schedule = ScheduleIterator::new("0 * * * *", at(0, 20, 0)).unwrap();
        assert_eq!(schedule.next(), Some(at(1, 0, 0)));
    }

    #[test]
    fn test_daily_at_six() {
        let schedule = ScheduleIterator::new("0 6 * * *", at(7, 0, 0)).unwrap();
        let targets: Vec<_> = schedule.take(2).collect();
        assert_eq!(targets[0], Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap());
        assert_eq!(targets[1], Utc.with_ymd_and_hms(2024, 5, 3, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_strictly_increasing() {
        let schedule = ScheduleIterator::new("*/7 * * * *", at(0, 3, 0)).unwrap();
        let targets: Vec<_> = schedule.take(50).collect();
        for pair in targets.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_restart_reproduces_sequence() {
        let mut schedule = ScheduleIterator::new("@hourly", at(0, 30, 0)).unwrap();
        let first: Vec<_> = schedule.by_ref().take(5).collect();
        schedule.restart();
        let second: Vec<_> = schedule.take(5).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_expression() {
        let result = ScheduleIterator::new("every blue moon", at(0, 0, 0));
        assert!(matches!(
            result,
            Err(GenerationError::ScheduleParse { ref expression, .. }) if expression == "every blue moon"
        ));
    }

    fn quarter_hours(start: DateTime<Utc>, count: i64) -> Vec<DateTime<Utc>> {
        (0..count)
            .map(|i| start + TimeDelta::minutes(15 * i))
            .collect()
    }

    #[test]
    fn test_fall_back_keeps_every_instant() {
        // 2024-11-03 02:00 EDT 撥回 01:00 EST（06:00Z）
        let start = Utc.with_ymd_and_hms(2024, 11, 3, 4, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 11, 3, 7, 15, 0).unwrap();
        let schedule = ScheduleIterator::new("*/15 * * * *", start)
            .unwrap()
            .with_timezone(ScheduleTimezone::Named(New_York));

        let targets: Vec<_> = schedule.take_while(|t| *t <= end).collect();
        assert_eq!(targets, quarter_hours(start, 14));
    }

    #[test]
    fn test_spring_forward_continues_after_gap() {
        // 2024-03-10 02:00 EST 跳至 03:00 EDT（07:00Z）
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 6, 0, 0).unwrap();
        let timezone = ScheduleTimezone::Named(New_York);
        let targets: Vec<_> = ScheduleIterator::new("*/15 * * * *", start)
            .unwrap()
            .with_timezone(timezone)
            .take(6)
            .collect();

        assert_eq!(targets, quarter_hours(start, 6));
        assert_eq!(timezone.localize(targets[4]).format("%H:%M").to_string(), "03:00");
    }

    #[test]
    fn test_repeated_local_time_fires_twice() {
        let start = Utc.with_ymd_and_hms(2024, 11, 2, 12, 0, 0).unwrap();
        let targets: Vec<_> = ScheduleIterator::new("30 1 * * *", start)
            .unwrap()
            .with_timezone(ScheduleTimezone::Named(New_York))
            .take(3)
            .collect();

        assert_eq!(
            targets,
            vec![
                Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 11, 3, 6, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 11, 4, 6, 30, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_skipped_local_time_is_not_produced() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let targets: Vec<_> = ScheduleIterator::new("30 2 * * *", start)
            .unwrap()
            .with_timezone(ScheduleTimezone::Named(New_York))
            .take(2)
            .collect();

        // 03-10 02:30 不存在
        assert_eq!(
            targets,
            vec![
                Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 11, 6, 30, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_local_timezone_is_evenly_spaced() {
        // 主機時區的偏移皆為 15 分鐘的倍數，跨越日光節約也不會漏掉時間點
        let start = at(0, 0, 0);
        let targets: Vec<_> = ScheduleIterator::new("*/15 * * * *", start)
            .unwrap()
            .with_timezone(ScheduleTimezone::Local)
            .take(96 * 3)
            .collect();

        assert_eq!(targets, quarter_hours(start, 96 * 3));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!("local".parse::<ScheduleTimezone>().unwrap(), ScheduleTimezone::Local);
        assert_eq!("UTC".parse::<ScheduleTimezone>().unwrap(), ScheduleTimezone::Utc);
        assert_eq!(
            "America/New_York".parse::<ScheduleTimezone>().unwrap(),
            ScheduleTimezone::Named(New_York)
        );
        assert!(matches!(
            "Mars/Olympus".parse::<ScheduleTimezone>(),
            Err(GenerationError::Config(_))
        ));

        let json = serde_json::to_string(&ScheduleTimezone::Named(New_York)).unwrap();
        assert_eq!(json, "\"America/New_York\"");
        let parsed: ScheduleTimezone = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ScheduleTimezone::Named(New_York));
    }
}
