//! Chinese relative date/time expressions ("明天下午3点", "下周三 9:30", "3/15 晚上8点半").

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

use super::format_instant;

static RELATIVE_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{1,2})\s*天(后|前)").unwrap());
static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(下周|下星期|本周|这周|本星期|周|星期)([一二三四五六日天])").unwrap()
});
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{1,2})[/-]([0-9]{1,2})").unwrap());
static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(凌晨|早上|上午|中午|下午|晚上)?\s*([0-9]{1,2})(?:点|:)(?:([0-9]{1,2})分?)?")
        .unwrap()
});

// Checked in order; 大后天 must win over its suffix 后天.
const DAY_KEYWORDS: &[(&str, i64)] = &[
    ("今天", 0),
    ("明天", 1),
    ("大后天", 3),
    ("后天", 2),
    ("昨天", -1),
    ("前天", -2),
];

fn weekday_index(ch: &str) -> Option<i64> {
    match ch {
        "一" => Some(0),
        "二" => Some(1),
        "三" => Some(2),
        "四" => Some(3),
        "五" => Some(4),
        "六" => Some(5),
        "日" | "天" => Some(6),
        _ => None,
    }
}

/// Resolve `text` against the current instant in `tz`.
pub fn resolve(text: &str, tz: Tz) -> Option<String> {
    resolve_at(text, &Utc::now().with_timezone(&tz))
}

/// Resolve `text` relative to `now`. `None` means "could not resolve", never "now".
pub fn resolve_at(text: &str, now: &DateTime<Tz>) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let tz = now.timezone();
    let today = now.date_naive();

    let mut day_delta = DAY_KEYWORDS
        .iter()
        .find(|(kw, _)| text.contains(kw))
        .map(|(_, d)| *d);

    if let Some(caps) = RELATIVE_DAYS.captures(text) {
        let days: i64 = caps[1].parse().ok()?;
        day_delta = Some(if &caps[2] == "后" { days } else { -days });
    }

    if let Some(caps) = WEEKDAY.captures(text) {
        let target = weekday_index(&caps[2])?;
        let current = today.weekday().num_days_from_monday() as i64;
        let delta = (target - current).rem_euclid(7);
        day_delta = Some(match &caps[1] {
            "下周" | "下星期" => delta + 7,
            "本周" | "这周" | "本星期" => delta,
            _ if delta == 0 => 7,
            _ => delta,
        });
    }

    if let Some(caps) = MONTH_DAY.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let mut date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if date < today {
            date = NaiveDate::from_ymd_opt(today.year() + 1, month, day)?;
        }
        return at_time_of_day(date, text, tz);
    }

    let date = today.checked_add_signed(Duration::days(day_delta?))?;
    at_time_of_day(date, text, tz)
}

fn at_time_of_day(date: NaiveDate, text: &str, tz: Tz) -> Option<String> {
    let caps = TIME_OF_DAY.captures(text)?;
    let period = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let mut hour: u32 = caps[2].parse().ok()?;
    let minute: u32 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None if text.contains('半') => 30,
        None => 0,
    };

    match period {
        "下午" | "晚上" if hour < 12 => hour += 12,
        "中午" if hour < 11 => hour += 12,
        "凌晨" if hour == 12 => hour = 0,
        _ => {}
    }

    let naive = date.and_hms_opt(hour, minute, 0)?;
    let local = tz.from_local_datetime(&naive).earliest()?;
    Some(format_instant(&local.fixed_offset()))
}
