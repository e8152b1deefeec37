//! Challenge day arithmetic and timezone-aware calendar dates.
//!
//! # Responsibility
//! - Compute the 1-based day number of a running challenge and its expiry.
//! - Derive "today" in the user's zone, honoring the daily reset time.
//! - Decide whether a task counts as done given its completion history.
//!
//! # Invariants
//! - Day number is `floor((now - activated_at) / 24h) + 1`, never below 1.
//! - A challenge is expired once its day number exceeds its duration.
//! - Calendar dates are derived from the local wall clock of a named zone,
//!   never by truncating the UTC instant.

use crate::model::active::TaskCompletion;
use crate::model::profile::UserPreferences;
use crate::observe::lock;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Date format used in stored completion entries.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const RESET_TIME_FORMAT: &str = "%H:%M";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for hosts that replay time (tests, simulations).
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *lock(&self.now) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// 1-based challenge day for `now`.
///
/// Clock skew (a `now` earlier than activation) reports day 1.
pub fn day_number(activated_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed_ms = now.signed_duration_since(activated_at).num_milliseconds();
    if elapsed_ms < 0 {
        return 1;
    }
    let whole_days = elapsed_ms / MILLIS_PER_DAY;
    u32::try_from(whole_days + 1).unwrap_or(u32::MAX)
}

/// Whether a challenge of `duration_days` has run out at `now`.
pub fn is_expired(activated_at: DateTime<Utc>, duration_days: u32, now: DateTime<Utc>) -> bool {
    day_number(activated_at, now) > duration_days
}

/// Day counter shown in the challenge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayProgress {
    /// Raw day number; exceeds `total_days` once expired.
    pub day_number: u32,
    /// Day number capped at the duration, for display.
    pub current_day: u32,
    pub total_days: u32,
    pub expired: bool,
}

impl DayProgress {
    pub fn compute(activated_at: DateTime<Utc>, duration_days: u32, now: DateTime<Utc>) -> Self {
        let day_number = day_number(activated_at, now);
        Self {
            day_number,
            current_day: day_number.min(duration_days),
            total_days: duration_days,
            expired: day_number > duration_days,
        }
    }
}

/// Whether a task counts as done on `today`.
///
/// Daily tasks need a completion dated exactly `today`; other tasks are done
/// once any completion exists.
pub fn is_task_done(reset_daily: bool, completions: &[TaskCompletion], today: NaiveDate) -> bool {
    if reset_daily {
        completions.iter().any(|completion| completion.date == today)
    } else {
        !completions.is_empty()
    }
}

/// Timezone used for calendar-date derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// IANA zone configured by the user.
    Named(Tz),
    /// Zone detected from the host.
    Local,
}

impl Zone {
    /// Resolves a stored IANA name, falling back to the host zone when the
    /// name is missing or unknown.
    pub fn from_setting(name: Option<&str>) -> Self {
        name.and_then(parse_zone).map_or(Self::Local, Self::Named)
    }

    fn local_datetime(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
            Self::Local => instant.with_timezone(&Local).naive_local(),
        }
    }
}

impl Display for Zone {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Parses an IANA zone name such as `Europe/Berlin`.
pub fn parse_zone(name: &str) -> Option<Tz> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<Tz>().ok()
}

/// IANA name of the host zone, or an empty string when it cannot be named.
///
/// An empty name resolves to `Zone::Local`, so dates still follow the host
/// clock (including POSIX-style `TZ` rules) instead of being pinned to UTC.
pub fn detected_zone_name() -> String {
    let tz_env = std::env::var("TZ").ok();
    host_zone_name(tz_env.as_deref(), || iana_time_zone::get_timezone().ok())
}

/// `TZ` wins when set, as it does for `Local`; a `TZ` that is not an IANA
/// name yields an empty name. Otherwise the system zone is asked.
fn host_zone_name(tz_env: Option<&str>, system: impl FnOnce() -> Option<String>) -> String {
    let named = match tz_env.map(|value| value.trim().trim_start_matches(':')) {
        Some(value) if !value.is_empty() => parse_zone(value),
        _ => system().as_deref().and_then(parse_zone),
    };
    named.map(|tz| tz.name().to_string()).unwrap_or_default()
}

/// Parses an `HH:mm` reset time.
pub fn parse_reset_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), RESET_TIME_FORMAT).ok()
}

pub fn format_reset_time(value: NaiveTime) -> String {
    value.format(RESET_TIME_FORMAT).to_string()
}

/// Zone and day boundary used to answer "what day is it".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarContext {
    pub zone: Zone,
    /// Local time at which a new day starts. Midnight by default.
    pub reset_time: NaiveTime,
}

impl Default for CalendarContext {
    fn default() -> Self {
        Self {
            zone: Zone::Local,
            reset_time: NaiveTime::default(),
        }
    }
}

impl CalendarContext {
    pub fn new(zone: Zone, reset_time: NaiveTime) -> Self {
        Self { zone, reset_time }
    }

    /// Context for a named zone with a midnight boundary.
    pub fn in_zone(tz: Tz) -> Self {
        Self::new(Zone::Named(tz), NaiveTime::default())
    }

    /// Builds the context from stored preferences; unparsable fields fall
    /// back to the host zone and midnight.
    pub fn from_preferences(preferences: Option<&UserPreferences>) -> Self {
        match preferences {
            Some(preferences) => Self::new(
                Zone::from_setting(Some(preferences.timezone.as_str())),
                parse_reset_time(&preferences.reset_time).unwrap_or_default(),
            ),
            None => Self::default(),
        }
    }

    /// Overrides the zone, keeping the reset time.
    pub fn with_zone(self, zone: Zone) -> Self {
        Self { zone, ..self }
    }

    /// Calendar date that `instant` belongs to.
    ///
    /// With a reset time other than `00:00` the day rolls over at that local
    /// time, so between midnight and the reset "today" is still the previous
    /// calendar date in the zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        let local = self.zone.local_datetime(instant);
        let boundary = Duration::seconds(i64::from(self.reset_time.num_seconds_from_midnight()));
        (local - boundary).date()
    }

    /// `date_of(now)` formatted as `YYYY-MM-DD`.
    pub fn date_string(&self, instant: DateTime<Utc>) -> String {
        self.date_of(instant).format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        day_number, host_zone_name, is_expired, is_task_done, parse_reset_time, CalendarContext,
        DayProgress, Zone,
    };
    use crate::model::active::TaskCompletion;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use chrono_tz::Tz;

    fn completion(date: NaiveDate) -> TaskCompletion {
        TaskCompletion {
            completed_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            date,
        }
    }

    #[test]
    fn day_number_starts_at_one_and_advances_per_full_day() {
        let activated = Utc.with_ymd_and_hms(2025, 3, 1, 22, 30, 0).unwrap();
        assert_eq!(day_number(activated, activated), 1);
        assert_eq!(day_number(activated, activated + Duration::hours(23)), 1);
        assert_eq!(day_number(activated, activated + Duration::hours(24)), 2);
        assert_eq!(day_number(activated, activated - Duration::hours(3)), 1);
    }

    #[test]
    fn challenge_expires_one_second_after_duration() {
        let activated = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        for duration in [1_u32, 7, 30] {
            let end = activated + Duration::days(i64::from(duration));
            assert!(!is_expired(activated, duration, end - Duration::seconds(1)));
            assert!(is_expired(activated, duration, end + Duration::seconds(1)));
        }
    }

    #[test]
    fn day_progress_caps_display_day() {
        let activated = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let progress = DayProgress::compute(activated, 3, activated + Duration::days(5));
        assert_eq!(progress.day_number, 6);
        assert_eq!(progress.current_day, 3);
        assert!(progress.expired);
    }

    #[test]
    fn date_uses_local_wall_clock_not_utc() {
        // 23:30 in New York is already the next UTC day.
        let instant = Utc.with_ymd_and_hms(2025, 6, 11, 3, 30, 0).unwrap();
        let ny = CalendarContext::in_zone(Tz::America__New_York);
        let tokyo = CalendarContext::in_zone(Tz::Asia__Tokyo);

        assert_eq!(ny.date_of(instant), NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_eq!(tokyo.date_of(instant), NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
        assert_eq!(ny.date_string(instant), "2025-06-10");
    }

    #[test]
    fn reset_time_shifts_day_boundary() {
        let ctx = CalendarContext::new(
            Zone::Named(Tz::Europe__Berlin),
            parse_reset_time("04:00").unwrap(),
        );
        // 02:00 Berlin (CEST) on June 11th still belongs to June 10th.
        let before = Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 11, 2, 30, 0).unwrap();
        assert_eq!(ctx.date_of(before), NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_eq!(ctx.date_of(after), NaiveDate::from_ymd_opt(2025, 6, 11).unwrap());
    }

    #[test]
    fn unknown_zone_falls_back_to_local() {
        assert_eq!(Zone::from_setting(Some("Mars/Olympus")), Zone::Local);
        assert_eq!(Zone::from_setting(None), Zone::Local);
        assert_eq!(
            Zone::from_setting(Some(" Asia/Tokyo ")),
            Zone::Named(Tz::Asia__Tokyo)
        );
    }

    #[test]
    fn daily_task_needs_completion_dated_today() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(is_task_done(true, &[completion(today)], today));
        assert!(!is_task_done(true, &[completion(yesterday)], today));
        assert!(!is_task_done(true, &[], today));
    }

    #[test]
    fn one_off_task_stays_done_after_any_completion() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let long_ago = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        assert!(is_task_done(false, &[completion(long_ago)], today));
        assert!(!is_task_done(false, &[], today));
    }

    #[test]
    fn reset_time_parser_rejects_garbage() {
        assert!(parse_reset_time("25:00").is_none());
        assert!(parse_reset_time("noon").is_none());
        assert_eq!(
            parse_reset_time("06:30").unwrap().format("%H:%M").to_string(),
            "06:30"
        );
    }

    #[test]
    fn host_zone_prefers_tz_then_system_and_never_guesses_utc() {
        let system = || Some("Asia/Tokyo".to_string());
        assert_eq!(host_zone_name(Some(":Europe/Paris"), system), "Europe/Paris");
        assert_eq!(host_zone_name(None, system), "Asia/Tokyo");
        assert_eq!(host_zone_name(Some(""), system), "Asia/Tokyo");
        assert_eq!(host_zone_name(Some("CET-1CEST,M3.5.0,M10.5.0/3"), system), "");
        assert_eq!(host_zone_name(None, || None), "");
        assert_eq!(Zone::from_setting(Some("")), Zone::Local);
    }
}
