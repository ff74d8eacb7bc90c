use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

/// Timezone used to decide which calendar day "today" is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() > 2 {
        let (h, m) = rest.split_at(rest.len() - 2);
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };

    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn canonical_name(trimmed: &str) -> String {
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("gmt") {
        "UTC".to_string()
    } else if trimmed == "Europe/Kiev" {
        "Europe/Kyiv".to_string()
    } else {
        trimmed.to_string()
    }
}

impl EngineTimezone {
    pub fn utc() -> Self {
        EngineTimezone::Named(Tz::UTC)
    }

    /// Accepts IANA names (`Europe/Kyiv`), `UTC`/`GMT`, and offsets such as
    /// `UTC+2`, `GMT-05:30` or `+0100`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let name = canonical_name(trimmed);
        if name == "UTC" {
            return Some(Self::utc());
        }

        let upper = name.to_uppercase();
        if upper.starts_with("UTC") || upper.starts_with("GMT") {
            return parse_fixed_offset(&name[3..]).map(EngineTimezone::Fixed);
        }
        if let Some(offset) = parse_fixed_offset(&name) {
            return Some(EngineTimezone::Fixed(offset));
        }
        name.parse::<Tz>().ok().map(EngineTimezone::Named)
    }

    pub fn local_date(&self, utc_dt: DateTime<Utc>) -> NaiveDate {
        match self {
            EngineTimezone::Named(tz) => utc_dt.with_timezone(tz).date_naive(),
            EngineTimezone::Fixed(offset) => utc_dt.with_timezone(offset).date_naive(),
        }
    }
}

/// Canonical spelling of a timezone setting, or `None` when it cannot be parsed.
pub fn normalize_timezone(raw: &str) -> Option<String> {
    EngineTimezone::parse(raw).map(|_| canonical_name(raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parses_names_and_offsets() {
        assert_eq!(EngineTimezone::parse("utc"), Some(EngineTimezone::utc()));
        assert!(matches!(EngineTimezone::parse("Europe/Kiev"), Some(EngineTimezone::Named(_))));
        assert_eq!(
            EngineTimezone::parse("UTC+2"),
            FixedOffset::east_opt(7200).map(EngineTimezone::Fixed)
        );
        assert_eq!(
            EngineTimezone::parse("GMT-05:30"),
            FixedOffset::east_opt(-(5 * 3600 + 30 * 60)).map(EngineTimezone::Fixed)
        );
        assert!(EngineTimezone::parse("Mars/Olympus").is_none());
        assert!(EngineTimezone::parse("UTC+15").is_none());
        assert!(EngineTimezone::parse("  ").is_none());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let late = Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 0).unwrap();
        let kyiv = EngineTimezone::parse("Europe/Kyiv").unwrap();
        assert_eq!(kyiv.local_date(late), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(EngineTimezone::utc().local_date(late), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        let west = EngineTimezone::parse("UTC-3").unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();
        assert_eq!(west.local_date(early), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn test_normalize_timezone() {
        assert_eq!(normalize_timezone(" gmt ").as_deref(), Some("UTC"));
        assert_eq!(normalize_timezone("Europe/Kiev").as_deref(), Some("Europe/Kyiv"));
        assert_eq!(normalize_timezone("nowhere"), None);
    }
}
