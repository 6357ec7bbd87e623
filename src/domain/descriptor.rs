//! Request descriptors: the validated, clock-free form of a generation request.
//!
//! Raw query parameters arrive as loosely-typed strings (`GenerateParams`).
//! [`canonicalize`] resolves every optional field, including "today", into a
//! [`RequestDescriptor`]. Nothing downstream of this module reads the clock.

use serde::{Deserialize, Serialize};
use time::{Date, Month, format_description::BorrowedFormatItem, macros::format_description};

use super::error::DomainError;
use super::types::{CostClass, PageVariant, PrayerKind, PsalmCycle, ScopeClass};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;
const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Raw query parameters as accepted on the wire.
///
/// Aliases keep the legacy router's parameter names working (`type`,
/// `psalm_cycle`, `nocache`, `remarkable`, `monthly`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateParams {
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub date: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
    pub variant: Option<String>,
    pub remarkable: Option<String>,
    #[serde(alias = "psalm_cycle")]
    pub cycle: Option<String>,
    #[serde(alias = "nocache")]
    pub bypass: Option<String>,
    pub monthly: Option<String>,
}

/// Period covered by a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    SingleDay {
        #[serde(with = "iso_date")]
        date: Date,
    },
    MonthRange {
        year: i32,
        month: u8,
    },
}

impl Scope {
    pub fn class(&self) -> ScopeClass {
        match self {
            Scope::SingleDay { .. } => ScopeClass::Daily,
            Scope::MonthRange { .. } => ScopeClass::Monthly,
        }
    }

    /// Cost class is a static property of the scope shape.
    pub fn cost_class(&self) -> CostClass {
        match self {
            Scope::SingleDay { .. } => CostClass::Sync,
            Scope::MonthRange { .. } => CostClass::Async,
        }
    }

    /// Key token for the period: `YYYY-MM-DD` or `YYYY/MM`.
    pub fn temporal_token(&self) -> String {
        match self {
            Scope::SingleDay { date } => format_iso_date(*date),
            Scope::MonthRange { year, month } => format!("{year:04}/{month:02}"),
        }
    }
}

/// Canonical generation request. Every field is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub kind: PrayerKind,
    pub scope: Scope,
    pub variant: PageVariant,
    /// `None` defers to the generator's own default cycle.
    pub cycle: Option<PsalmCycle>,
    /// Skip the cache lookup; the fresh artifact is still written back.
    pub bypass_cache: bool,
}

impl RequestDescriptor {
    pub fn daily(kind: PrayerKind, date: Date) -> Self {
        Self {
            kind,
            scope: Scope::SingleDay { date },
            variant: PageVariant::default(),
            cycle: None,
            bypass_cache: false,
        }
    }

    pub fn monthly(kind: PrayerKind, year: i32, month: Month) -> Self {
        Self {
            kind,
            scope: Scope::MonthRange {
                year,
                month: month as u8,
            },
            variant: PageVariant::default(),
            cycle: None,
            bypass_cache: false,
        }
    }

    pub fn with_variant(mut self, variant: PageVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_cycle(mut self, cycle: Option<PsalmCycle>) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_bypass(mut self, bypass_cache: bool) -> Self {
        self.bypass_cache = bypass_cache;
        self
    }

    /// Suggested attachment name, e.g. `morning_prayer_2025-11-08.pdf`.
    pub fn download_filename(&self) -> String {
        match self.scope {
            Scope::SingleDay { date } => {
                format!("{}_prayer_{}.pdf", self.kind, format_iso_date(date))
            }
            Scope::MonthRange { year, month } => {
                let abbreviation = MONTH_ABBREVIATIONS
                    .get(usize::from(month.saturating_sub(1)))
                    .copied()
                    .unwrap_or("Unknown");
                format!("{}_prayer_monthly_{abbreviation}_{year}.pdf", self.kind)
            }
        }
    }
}

/// Validate raw parameters and resolve defaults against `today`.
///
/// Fails on the first invalid field; no partially-resolved descriptor escapes.
pub fn canonicalize(params: &GenerateParams, today: Date) -> Result<RequestDescriptor, DomainError> {
    let kind = present(&params.kind)
        .and_then(|raw| PrayerKind::try_from(raw).ok())
        .ok_or_else(|| {
            DomainError::validation(
                "kind",
                "invalid or missing prayer type; must be one of: morning, evening, midday, compline",
            )
        })?;

    let variant = match present(&params.variant) {
        Some(raw) => PageVariant::try_from(raw).map_err(|_| {
            DomainError::validation("variant", format!("unsupported page variant `{raw}`"))
        })?,
        None if parse_flag(params.remarkable.as_deref()) => PageVariant::Remarkable,
        None => PageVariant::Letter,
    };

    let cycle = match present(&params.cycle) {
        Some(raw) => {
            let days: u8 = raw.parse().map_err(|_| {
                DomainError::validation("cycle", "invalid psalm cycle; must be 30 or 60")
            })?;
            Some(
                PsalmCycle::try_from(days)
                    .map_err(|_| DomainError::validation("cycle", "invalid psalm cycle; must be 30 or 60"))?,
            )
        }
        None => None,
    };

    let year = present(&params.year);
    let month = present(&params.month);
    let monthly = parse_flag(params.monthly.as_deref()) || year.is_some() || month.is_some();

    let scope = if monthly {
        if present(&params.date).is_some() {
            return Err(DomainError::validation(
                "date",
                "`date` cannot be combined with `year`/`month`",
            ));
        }
        let year = match year {
            Some(raw) => parse_year(raw)?,
            None => today.year(),
        };
        let month = match month {
            Some(raw) => parse_month(raw)?,
            None => today.month() as u8,
        };
        Scope::MonthRange { year, month }
    } else {
        let date = match present(&params.date) {
            Some(raw) => parse_date(raw)?,
            None => today,
        };
        Scope::SingleDay { date }
    };

    Ok(RequestDescriptor {
        kind,
        scope,
        variant,
        cycle,
        bypass_cache: parse_flag(params.bypass.as_deref()),
    })
}

/// Legacy boolean parsing: `true`, `1`, and `yes` (any case) are truthy.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    })
    .unwrap_or(false)
}

pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE)
        .unwrap_or_else(|_| format!("{:04}-{:02}-{:02}", date.year(), date.month() as u8, date.day()))
}

fn parse_date(raw: &str) -> Result<Date, DomainError> {
    let date = Date::parse(raw, ISO_DATE).map_err(|_| {
        DomainError::validation(
            "date",
            format!("invalid date format `{raw}`; expected YYYY-MM-DD"),
        )
    })?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(DomainError::validation(
            "date",
            format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
        ));
    }
    Ok(date)
}

fn parse_year(raw: &str) -> Result<i32, DomainError> {
    let year: i32 = raw
        .parse()
        .map_err(|_| DomainError::validation("year", "invalid year format; expected YYYY"))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(DomainError::validation(
            "year",
            format!("year must be between {MIN_YEAR} and {MAX_YEAR}"),
        ));
    }
    Ok(year)
}

fn parse_month(raw: &str) -> Result<u8, DomainError> {
    raw.parse::<u8>()
        .ok()
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| DomainError::validation("month", "invalid month; must be 1-12"))
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    const TODAY: Date = date!(2025 - 11 - 08);

    fn params(pairs: &[(&str, &str)]) -> GenerateParams {
        let mut params = GenerateParams::default();
        for (name, value) in pairs {
            let value = Some(value.to_string());
            match *name {
                "kind" => params.kind = value,
                "date" => params.date = value,
                "year" => params.year = value,
                "month" => params.month = value,
                "variant" => params.variant = value,
                "remarkable" => params.remarkable = value,
                "cycle" => params.cycle = value,
                "bypass" => params.bypass = value,
                "monthly" => params.monthly = value,
                other => panic!("unknown param {other}"),
            }
        }
        params
    }

    #[test]
    fn daily_request_defaults_to_today_and_letter() {
        let descriptor = canonicalize(&params(&[("kind", "morning")]), TODAY).expect("valid");
        assert_eq!(descriptor.kind, PrayerKind::Morning);
        assert_eq!(descriptor.scope, Scope::SingleDay { date: TODAY });
        assert_eq!(descriptor.variant, PageVariant::Letter);
        assert_eq!(descriptor.cycle, None);
        assert!(!descriptor.bypass_cache);
    }

    #[test]
    fn explicit_date_is_parsed() {
        let descriptor = canonicalize(
            &params(&[("kind", "evening"), ("date", "2025-12-25")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(
            descriptor.scope,
            Scope::SingleDay {
                date: date!(2025 - 12 - 25)
            }
        );
    }

    #[test]
    fn year_or_month_selects_month_scope() {
        let descriptor = canonicalize(
            &params(&[("kind", "evening"), ("year", "2025"), ("month", "12")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(
            descriptor.scope,
            Scope::MonthRange {
                year: 2025,
                month: 12
            }
        );
        assert_eq!(descriptor.scope.cost_class(), CostClass::Async);
    }

    #[test]
    fn monthly_flag_defaults_to_current_month() {
        let descriptor = canonicalize(
            &params(&[("kind", "compline"), ("monthly", "yes")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(
            descriptor.scope,
            Scope::MonthRange {
                year: 2025,
                month: 11
            }
        );
    }

    #[test]
    fn legacy_flags_resolve_variant_and_bypass() {
        let descriptor = canonicalize(
            &params(&[("kind", "midday"), ("remarkable", "TRUE"), ("bypass", "1")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(descriptor.variant, PageVariant::Remarkable);
        assert!(descriptor.bypass_cache);

        let descriptor = canonicalize(
            &params(&[("kind", "midday"), ("remarkable", "nope")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(descriptor.variant, PageVariant::Letter);
    }

    #[test]
    fn query_aliases_deserialize_into_params() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(flatten)]
            params: GenerateParams,
        }
        let json = serde_json::json!({ "type": "morning", "psalm_cycle": "30", "nocache": "yes" });
        let wrapper: Wrapper = serde_json::from_value(json).expect("deserialize");
        let descriptor = canonicalize(&wrapper.params, TODAY).expect("valid");
        assert_eq!(descriptor.kind, PrayerKind::Morning);
        assert_eq!(descriptor.cycle, Some(PsalmCycle::Thirty));
        assert!(descriptor.bypass_cache);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = canonicalize(&params(&[("kind", "xyz")]), TODAY).expect_err("invalid");
        assert_eq!(err.field(), "kind");
        let err = canonicalize(&GenerateParams::default(), TODAY).expect_err("missing");
        assert_eq!(err.field(), "kind");
    }

    #[test]
    fn rejects_malformed_fields() {
        let cases: &[(&[(&str, &str)], &str)] = &[
            (&[("kind", "morning"), ("date", "11/08/2025")], "date"),
            (&[("kind", "morning"), ("date", "2025-02-30")], "date"),
            (&[("kind", "morning"), ("month", "13")], "month"),
            (&[("kind", "morning"), ("month", "0")], "month"),
            (&[("kind", "morning"), ("year", "twenty")], "year"),
            (&[("kind", "morning"), ("cycle", "45")], "cycle"),
            (&[("kind", "morning"), ("variant", "a4")], "variant"),
            (
                &[("kind", "morning"), ("date", "2025-12-01"), ("month", "12")],
                "date",
            ),
        ];
        for (pairs, field) in cases {
            let err = canonicalize(&params(pairs), TODAY).expect_err("invalid");
            assert_eq!(err.field(), *field, "case {pairs:?}");
        }
    }

    #[test]
    fn blank_values_count_as_absent() {
        let descriptor = canonicalize(
            &params(&[("kind", "morning"), ("date", " "), ("cycle", "")]),
            TODAY,
        )
        .expect("valid");
        assert_eq!(descriptor.scope, Scope::SingleDay { date: TODAY });
        assert_eq!(descriptor.cycle, None);
    }

    #[test]
    fn download_filenames_follow_scope() {
        let daily = RequestDescriptor::daily(PrayerKind::Morning, date!(2025 - 11 - 08));
        assert_eq!(daily.download_filename(), "morning_prayer_2025-11-08.pdf");

        let monthly = RequestDescriptor::monthly(PrayerKind::Evening, 2025, Month::December);
        assert_eq!(
            monthly.download_filename(),
            "evening_prayer_monthly_Dec_2025.pdf"
        );
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let descriptor = RequestDescriptor::monthly(PrayerKind::Evening, 2025, Month::December)
            .with_cycle(Some(PsalmCycle::Sixty));
        let json = serde_json::to_value(descriptor).expect("serialize");
        assert_eq!(json["scope"]["type"], "month_range");
        let parsed: RequestDescriptor = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, descriptor);
    }
}
