use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Months,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "drawdays-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DRAWDAYS_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DRAWDAYS_TIME_CONFIG";

/// Route-style key for a plan day, e.g. `20240917`.
pub const DAY_KEY_FORMAT: &str =
  "%Y%m%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

/// Calendar date of `now` in the
/// project timezone. This is the only
/// place the wall clock turns into the
/// `today` fed to the plan calendar.
#[must_use]
pub fn today_in_project_tz(
  now: DateTime<Utc>
) -> NaiveDate {
  now
    .with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn day_key(
  date: NaiveDate
) -> String {
  date
    .format(DAY_KEY_FORMAT)
    .to_string()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return tz;
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "resolved project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

pub fn parse_week_start(
  raw: &str
) -> anyhow::Result<Weekday> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "sunday" | "sun" => {
      Ok(Weekday::Sun)
    }
    | "monday" | "mon" => {
      Ok(Weekday::Mon)
    }
    | other => {
      Err(anyhow!(
        "unsupported week start: \
         {other} (expected sunday or \
         monday)"
      ))
    }
  }
}

/// Parses a single day: `today`,
/// `yesterday`, `tomorrow`, `YYYYMMDD`
/// or `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();

  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Ok(today),
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | _ => {}
  }

  let day_re = Regex::new(
    r"^(?P<year>\d{4})-?(?P<month>\d{2})-?(?P<day>\d{2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  let caps = day_re
    .captures(token)
    .ok_or_else(|| {
      anyhow!(
        "unrecognized day: {token} \
         (expected YYYYMMDD, \
         YYYY-MM-DD or today)"
      )
    })?;

  let year: i32 = caps["year"]
    .parse()
    .context("invalid year")?;
  let month: u32 = caps["month"]
    .parse()
    .context("invalid month")?;
  let day: u32 = caps["day"]
    .parse()
    .context("invalid day")?;

  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .ok_or_else(|| {
    anyhow!(
      "date does not exist: {token}"
    )
  })
}

/// Parses a month selector and returns
/// the first day of that month.
/// Accepts `YYYY-MM`, `YYYYMM`, `now`
/// and relative `+N` / `-N` months from
/// `current`.
#[tracing::instrument(skip(current), fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  current: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let base = first_day_of_month(
    current.year(),
    current.month()
  );

  if token.is_empty()
    || token
      .eq_ignore_ascii_case("now")
  {
    return Ok(base);
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i32 = caps["num"]
      .parse()
      .context(
        "invalid relative month \
         count"
      )?;
    let step = if &caps["sign"] == "-"
    {
      -num
    } else {
      num
    };
    return shift_months(base, step)
      .ok_or_else(|| {
        anyhow!(
          "month offset out of range: \
           {token}"
        )
      });
  }

  let month_re = Regex::new(
    r"^(?P<year>\d{4})-?(?P<month>\d{2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  let caps = month_re
    .captures(token)
    .ok_or_else(|| {
      anyhow!(
        "unrecognized month: {token} \
         (expected YYYY-MM, +N or -N)"
      )
    })?;
  let year: i32 = caps["year"]
    .parse()
    .context("invalid year")?;
  let month: u32 = caps["month"]
    .parse()
    .context("invalid month")?;

  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or_else(|| {
    anyhow!(
      "month does not exist: {token}"
    )
  })
}

/// `date` moved by `months`, with the
/// day clamped to the target month.
/// `None` when the result leaves the
/// range chrono can represent.
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> Option<NaiveDate> {
  let step =
    Months::new(months.unsigned_abs());
  if months >= 0 {
    date.checked_add_months(step)
  } else {
    date.checked_sub_months(step)
  }
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn end_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  add_days(
    start_of_week(day, week_start),
    6
  )
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    Weekday
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn parses_compact_and_dashed_days() {
    let today = date(2024, 9, 20);
    assert_eq!(
      parse_day_expr("20240917", today)
        .expect("compact day"),
      date(2024, 9, 17)
    );
    assert_eq!(
      parse_day_expr(
        "2024-12-25",
        today
      )
      .expect("dashed day"),
      date(2024, 12, 25)
    );
    assert_eq!(
      parse_day_expr(
        "yesterday",
        today
      )
      .expect("relative day"),
      date(2024, 9, 19)
    );
    assert!(
      parse_day_expr(
        "20240231", today
      )
      .is_err()
    );
    assert!(
      parse_day_expr("soon", today)
        .is_err()
    );
  }

  #[test]
  fn parses_month_selectors() {
    let current = date(2024, 12, 31);
    assert_eq!(
      parse_month_expr("+1", current)
        .expect("next month"),
      date(2025, 1, 1)
    );
    assert_eq!(
      parse_month_expr("-3", current)
        .expect("back three"),
      date(2024, 9, 1)
    );
    assert_eq!(
      parse_month_expr(
        "2024-02", current
      )
      .expect("explicit month"),
      date(2024, 2, 1)
    );
    assert!(
      parse_month_expr(
        "2024-13", current
      )
      .is_err()
    );
  }

  #[test]
  fn shift_months_clamps_day() {
    assert_eq!(
      shift_months(
        date(2024, 1, 31),
        1
      ),
      Some(date(2024, 2, 29))
    );
    assert_eq!(
      shift_months(
        date(2024, 3, 31),
        -13
      ),
      Some(date(2023, 2, 28))
    );
    assert_eq!(
      shift_months(NaiveDate::MAX, 1),
      None
    );
  }

  #[test]
  fn huge_month_offsets_are_errors() {
    let current = date(2024, 12, 31);
    for input in [
      "+2147483647",
      "-2147483647",
      "+100000000",
      "+99999999999"
    ] {
      assert!(
        parse_month_expr(input, current)
          .is_err(),
        "{input} should be rejected"
      );
    }
  }

  #[test]
  fn week_bounds_follow_week_start() {
    // 2024-09-01 is a Sunday.
    let sunday = date(2024, 9, 1);
    assert_eq!(
      start_of_week(
        sunday,
        Weekday::Sun
      ),
      sunday
    );
    assert_eq!(
      start_of_week(
        sunday,
        Weekday::Mon
      ),
      date(2024, 8, 26)
    );
    assert_eq!(
      end_of_week(
        date(2024, 9, 30),
        Weekday::Sun
      ),
      date(2024, 10, 5)
    );
  }

  #[test]
  fn week_start_names() {
    assert_eq!(
      parse_week_start("Sunday")
        .expect("sunday"),
      Weekday::Sun
    );
    assert_eq!(
      parse_week_start("mon")
        .expect("monday"),
      Weekday::Mon
    );
    assert!(
      parse_week_start("friday")
        .is_err()
    );
  }

  #[test]
  fn day_key_is_compact() {
    assert_eq!(
      day_key(date(2024, 9, 7)),
      "20240907"
    );
  }
}
