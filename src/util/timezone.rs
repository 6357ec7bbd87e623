use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use time::{Date, Month, OffsetDateTime, UtcOffset};

use crate::application::clock::Clock;

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    let utc = time.to_offset(UtcOffset::UTC);
    let datetime_utc = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())?;
    Some(tz.from_utc_datetime(&datetime_utc.naive_utc()))
}

/// Calendar date of `time` in `tz`, falling back to the UTC date.
pub fn localized_date(time: OffsetDateTime, tz: Tz) -> Date {
    localized_datetime(time, tz)
        .and_then(|localized| {
            let month = Month::try_from(u8::try_from(localized.month()).ok()?).ok()?;
            let day = u8::try_from(localized.day()).ok()?;
            Date::from_calendar_date(localized.year(), month, day).ok()
        })
        .unwrap_or_else(|| time.to_offset(UtcOffset::UTC).date())
}

/// Wall clock resolving "today" in the service's configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> Date {
        localized_date(OffsetDateTime::now_utc(), self.tz)
    }
}
