//! `mokapi.date`: formatting with Go reference layouts.
//!
//! A layout spells the reference time `Mon Jan 2 15:04:05 MST 2006`; each
//! recognised element is mapped to a chrono specifier. Times are UTC.

use chrono::{DateTime, TimeZone, Utc};

/// Layout names accepted in place of a layout string.
const NAMED_LAYOUTS: &[(&str, &str)] = &[
    ("RFC3339", "2006-01-02T15:04:05Z07:00"),
    ("RFC3339Nano", "2006-01-02T15:04:05.999999999Z07:00"),
    ("RFC1123", "Mon, 02 Jan 2006 15:04:05 MST"),
    ("RFC1123Z", "Mon, 02 Jan 2006 15:04:05 -0700"),
    ("RFC822", "02 Jan 06 15:04 MST"),
    ("RFC822Z", "02 Jan 06 15:04 -0700"),
    ("RFC850", "Monday, 02-Jan-06 15:04:05 MST"),
    ("ANSIC", "Mon Jan _2 15:04:05 2006"),
    ("UnixDate", "Mon Jan _2 15:04:05 MST 2006"),
    ("Kitchen", "3:04PM"),
    ("DateTime", "2006-01-02 15:04:05"),
    ("DateOnly", "2006-01-02"),
    ("TimeOnly", "15:04:05"),
];

/// Layout elements, longest first where one is a prefix of another.
const ELEMENTS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("2006", "%Y"),
    ("Z07:00", "Z"),
    ("-07:00", "%:z"),
    ("Z0700", "Z"),
    ("-0700", "%z"),
    (".000000000", "%.9f"),
    (".999999999", "%.f"),
    (".000000", "%.6f"),
    (".999999", "%.f"),
    (".000", "%.3f"),
    (".999", "%.f"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "UTC"),
    ("002", "%j"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

/// Expands a layout name to its layout; other strings are returned as is.
pub fn named_layout(layout: &str) -> &str {
    NAMED_LAYOUTS
        .iter()
        .find(|(name, _)| *name == layout)
        .map(|(_, l)| *l)
        .unwrap_or(layout)
}

fn to_strftime(layout: &str) -> String {
    let mut out = String::new();
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (element, spec) in ELEMENTS {
            if rest.starts_with(element) {
                out.push_str(spec);
                rest = &rest[element.len()..];
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }
    out
}

/// Formats `time` with a Go layout or layout name.
pub fn format_go_layout(time: &DateTime<Utc>, layout: &str) -> String {
    time.format(&to_strftime(named_layout(layout))).to_string()
}

/// Milliseconds since the epoch as a UTC time.
pub fn from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
    }

    #[test]
    fn named_layouts() {
        let t = reference();
        assert_eq!(format_go_layout(&t, "RFC3339"), "2024-03-05T07:08:09Z");
        assert_eq!(format_go_layout(&t, "DateOnly"), "2024-03-05");
        assert_eq!(format_go_layout(&t, "TimeOnly"), "07:08:09");
        assert_eq!(format_go_layout(&t, "DateTime"), "2024-03-05 07:08:09");
        assert_eq!(format_go_layout(&t, "RFC1123"), "Tue, 05 Mar 2024 07:08:09 UTC");
    }

    #[test]
    fn custom_layouts() {
        let t = reference();
        assert_eq!(format_go_layout(&t, "02.01.2006"), "05.03.2024");
        assert_eq!(format_go_layout(&t, "Jan 2, 2006 at 3:04pm"), "Mar 5, 2024 at 7:08am");
        assert_eq!(format_go_layout(&t, "2006%"), "2024%");
    }

    #[test]
    fn millis() {
        let t = from_millis(0.0).unwrap();
        assert_eq!(format_go_layout(&t, "RFC3339"), "1970-01-01T00:00:00Z");
        assert!(from_millis(f64::NAN).is_none());
    }
}
