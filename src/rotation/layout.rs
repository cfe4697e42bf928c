//! Mapping between backup identities and object keys
//!
//! A [`KeyLayout`] is built once per run from the configured template, the
//! fixed placeholder values (`{baseurl}`, `{basepath}`, `{ext}`) and the date
//! and time formats. The key is the only durable record of a backup, so every
//! key the layout renders must identify back to the same date and time.

use std::fmt::{self, Write};

use chrono::{NaiveDate, NaiveTime};

use super::identity::BackupIdentity;
use super::template::{KeyMatcher, PathTemplate, DATE, TIME};
use crate::error::{SpinError, SpinResult};

/// Renders keys for identities and recognises identities in keys
#[derive(Debug, Clone)]
pub struct KeyLayout {
    template: PathTemplate,
    matcher: KeyMatcher,
    date_format: String,
    time_format: String,
}

impl KeyLayout {
    /// Bind `fixed` into `template` and compile the matcher
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either format uses an unsupported
    /// token, or if the date format cannot reproduce a calendar date.
    pub fn new(
        template: &PathTemplate,
        fixed: &[(&str, &str)],
        date_format: &str,
        time_format: &str,
    ) -> SpinResult<Self> {
        check_date_format(date_format)?;
        check_time_format(time_format)?;

        let template = template.bind(fixed)?;
        check_segments(&template)?;
        let date_fragment = format_fragment(date_format)?;
        let time_fragment = format_fragment(time_format)?;
        let matcher = template.compile(&[(DATE, &date_fragment), (TIME, &time_fragment)])?;

        Ok(Self {
            template,
            matcher,
            date_format: date_format.to_string(),
            time_format: time_format.to_string(),
        })
    }

    /// The template with fixed placeholders substituted
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Listing prefix under which all backup keys live
    pub fn prefix(&self) -> String {
        self.template.prefix()
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        date.format(&self.date_format).to_string()
    }

    pub fn format_time(&self, time: NaiveTime) -> String {
        time.format(&self.time_format).to_string()
    }

    /// Object key for an identity
    pub fn key_for(&self, identity: &BackupIdentity) -> String {
        let date = self.format_date(identity.date());
        let time = self.format_time(identity.time().unwrap_or(NaiveTime::MIN));
        self.template.render(&[(DATE, &date), (TIME, &time)])
    }

    /// Identity encoded in `key`, or `None` if the key is not a backup
    ///
    /// A key whose captures have the right shape but do not denote a real
    /// date or time (say, month 13) is not a backup either.
    pub fn identify(&self, key: &str) -> Option<BackupIdentity> {
        let fields = self.matcher.parse(key)?;
        let date = NaiveDate::parse_from_str(fields.get(DATE)?, &self.date_format).ok()?;
        let time = match fields.get(TIME) {
            Some(time) => Some(NaiveTime::parse_from_str(time, &self.time_format).ok()?),
            None => None,
        };
        Some(BackupIdentity::new(date, time))
    }
}

/// Translate a strftime format into a regex fragment matching its output
pub fn format_fragment(format: &str) -> SpinResult<String> {
    let mut fragment = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            fragment.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            continue;
        }

        let token = match chars.next() {
            Some('Y') => r"\d{4}",
            Some('y' | 'm' | 'd' | 'H' | 'M' | 'S') => r"\d{2}",
            Some('e') => r"[ \d]\d",
            Some('j') => r"\d{3}",
            Some('b' | 'a') => "[A-Za-z]{3}",
            Some('B' | 'A') => "[A-Za-z]+",
            Some('%') => "%",
            Some(other) => {
                return Err(SpinError::Config(format!(
                    "Unsupported token %{} in format '{}'",
                    other, format
                )))
            }
            None => {
                return Err(SpinError::Config(format!(
                    "Format '{}' ends with a lone %",
                    format
                )))
            }
        };
        fragment.push_str(token);
    }

    Ok(fragment)
}

fn check_date_format(format: &str) -> SpinResult<()> {
    // Token check first: chrono panics when displaying an invalid format
    format_fragment(format)?;

    let samples = [(2024, 12, 31), (2031, 1, 2)];
    for (y, m, d) in samples {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            continue;
        };
        let rendered = render(date.format(format), "Date", format)?;
        if NaiveDate::parse_from_str(&rendered, format).ok() != Some(date) {
            return Err(SpinError::Config(format!(
                "Date format '{}' does not identify a calendar date",
                format
            )));
        }
    }
    Ok(())
}

fn check_time_format(format: &str) -> SpinResult<()> {
    format_fragment(format)?;

    let sample = NaiveTime::from_hms_opt(13, 45, 56).unwrap_or(NaiveTime::MIN);
    let rendered = render(sample.format(format), "Time", format)?;
    NaiveTime::parse_from_str(&rendered, format)
        .map(|_| ())
        .map_err(|e| SpinError::Config(format!("Time format '{}' is not usable: {}", format, e)))
}

/// Format into a string, turning tokens the value cannot supply (a clock
/// field in a date format, say) into a configuration error
fn render(value: impl fmt::Display, kind: &str, format: &str) -> SpinResult<String> {
    let mut rendered = String::new();
    write!(rendered, "{}", value).map_err(|_| {
        SpinError::Config(format!(
            "{} format '{}' uses a field it cannot provide",
            kind, format
        ))
    })?;
    Ok(rendered)
}

/// Reject templates whose rendered keys would contain an empty `/` segment
fn check_segments(template: &PathTemplate) -> SpinResult<()> {
    let sample = template.render(&[(DATE, "d"), (TIME, "t")]);
    if sample.split('/').any(str::is_empty) {
        return Err(SpinError::Config(format!(
            "Path template '{}' produces an empty path segment; check {{baseurl}} and {{basepath}}",
            template.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn layout(pattern: &str) -> KeyLayout {
        let template = PathTemplate::new(pattern).unwrap();
        KeyLayout::new(
            &template,
            &[("baseurl", "site.com"), ("basepath", "var/db"), ("ext", ".sql.gz")],
            "%Y-%m-%d",
            "%H.%M.%S",
        )
        .unwrap()
    }

    #[test]
    fn test_key_for_default_template() {
        let layout = layout("{baseurl}/db_{date}{ext}");
        let identity = BackupIdentity::new(date(2024, 3, 15), NaiveTime::from_hms_opt(2, 0, 0));

        assert_eq!(layout.key_for(&identity), "site.com/db_2024-03-15.sql.gz");
        assert_eq!(layout.prefix(), "site.com");
    }

    #[test]
    fn test_round_trip_with_time() {
        let layout = layout("{baseurl}/{basepath}/{date}/db_{time}{ext}");
        let identity = BackupIdentity::new(date(2024, 2, 29), NaiveTime::from_hms_opt(23, 59, 7));

        let key = layout.key_for(&identity);
        assert_eq!(key, "site.com/var/db/2024-02-29/db_23.59.07.sql.gz");

        let parsed = layout.identify(&key).unwrap();
        assert_eq!(parsed.date(), identity.date());
        assert_eq!(parsed.time(), identity.time());
    }

    #[test]
    fn test_round_trip_across_dates() {
        let layout = layout("{baseurl}/db_{date}{ext}");
        let mut day = date(2023, 12, 25);
        for _ in 0..400 {
            let identity = BackupIdentity::new(day, None);
            let parsed = layout.identify(&layout.key_for(&identity)).unwrap();
            assert_eq!(parsed.date(), day);
            assert_eq!(parsed.time(), None);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_identify_skips_unrelated_keys() {
        let layout = layout("{baseurl}/db_{date}{ext}");

        for key in [
            "site.com/db_2024-03-15.sql",
            "site.com/assets/logo.png",
            "site.com/db_2024-13-01.sql.gz",
            "site.com/db_2024-02-30.sql.gz",
            "other.com/db_2024-03-15.sql.gz",
        ] {
            assert!(layout.identify(key).is_none(), "{} should be skipped", key);
        }
    }

    #[test]
    fn test_invalid_time_capture_is_a_mismatch() {
        let layout = layout("{baseurl}/db_{date}_{time}{ext}");
        assert!(layout.identify("site.com/db_2024-03-15_25.00.00.sql.gz").is_none());
        assert!(layout.identify("site.com/db_2024-03-15_01.00.00.sql.gz").is_some());
    }

    #[test]
    fn test_compact_date_format() {
        let template = PathTemplate::new("dumps/{date}{ext}").unwrap();
        let layout = KeyLayout::new(&template, &[("ext", ".sql")], "%Y%m%d", "%H%M%S").unwrap();

        let identity = BackupIdentity::new(date(2024, 3, 5), None);
        let key = layout.key_for(&identity);
        assert_eq!(key, "dumps/20240305.sql");
        assert_eq!(layout.identify(&key).unwrap().date(), date(2024, 3, 5));
    }

    #[test]
    fn test_format_fragment() {
        assert_eq!(format_fragment("%Y%m%d").unwrap(), r"\d{4}\d{2}\d{2}");
        assert_eq!(format_fragment("%H.%M.%S").unwrap(), r"\d{2}\.\d{2}\.\d{2}");
        assert_eq!(format_fragment("%j%%").unwrap(), r"\d{3}%");
        assert!(format_fragment("%Q").unwrap_err().is_config());
        assert!(format_fragment("%Y%").unwrap_err().is_config());
    }

    #[test]
    fn test_lossy_date_format_rejected() {
        let template = PathTemplate::new("db_{date}.sql").unwrap();
        let err = KeyLayout::new(&template, &[], "%Y-%m", "%H.%M.%S").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_format_with_foreign_fields_rejected() {
        let template = PathTemplate::new("db_{date}_{time}.sql").unwrap();

        let err = KeyLayout::new(&template, &[], "%Y-%m-%d-%H", "%H.%M.%S").unwrap_err();
        assert!(err.is_config());

        let err = KeyLayout::new(&template, &[], "%Y-%m-%d", "%Y.%H.%M.%S").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_space_padded_day() {
        let template = PathTemplate::new("dumps/{date}.sql").unwrap();
        let layout = KeyLayout::new(&template, &[], "%Y-%m-%e", "%H.%M.%S").unwrap();

        let identity = BackupIdentity::new(date(2024, 3, 5), None);
        let key = layout.key_for(&identity);
        assert_eq!(key, "dumps/2024-03- 5.sql");
        assert_eq!(layout.identify(&key).unwrap().date(), date(2024, 3, 5));

        let identity = BackupIdentity::new(date(2024, 3, 15), None);
        let key = layout.key_for(&identity);
        assert_eq!(key, "dumps/2024-03-15.sql");
        assert_eq!(layout.identify(&key).unwrap().date(), date(2024, 3, 15));
    }

    #[test]
    fn test_empty_path_segment_rejected() {
        let template = PathTemplate::new("{baseurl}/{basepath}/db_{date}{ext}").unwrap();

        let err = KeyLayout::new(
            &template,
            &[("baseurl", "backups"), ("basepath", ""), ("ext", ".sql")],
            "%Y-%m-%d",
            "%H.%M.%S",
        )
        .unwrap_err();
        assert!(err.is_config());

        let err = KeyLayout::new(
            &template,
            &[("baseurl", ""), ("basepath", "site"), ("ext", ".sql")],
            "%Y-%m-%d",
            "%H.%M.%S",
        )
        .unwrap_err();
        assert!(err.is_config());

        let layout = KeyLayout::new(
            &template,
            &[("baseurl", "backups"), ("basepath", "site"), ("ext", ".sql")],
            "%Y-%m-%d",
            "%H.%M.%S",
        )
        .unwrap();
        assert_eq!(layout.prefix(), "backups/site");
    }
}
