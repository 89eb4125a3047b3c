use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use pest_consume::{match_nodes, Error, Parser};

use super::duration::parse_duration;
use super::SchedulerError;

type ParseResult<T> = std::result::Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Upper bound for the next-fire search; a schedule that matches no date
/// within it (e.g. `0 0 30 2 *`) never fires.
const SEARCH_YEARS: i32 = 5;

#[derive(Debug, Clone)]
enum Token {
    Number(u32),
    Name(String),
}

#[derive(Debug, Clone)]
enum RangeSpec {
    All,
    Single(Token),
    Span(Token, Token),
}

#[derive(Debug, Clone)]
struct Item {
    range: RangeSpec,
    step: Option<u32>,
}

/// A parsed cron line.
#[derive(Debug, Clone)]
pub enum CronExpr {
    Fields(CronSchedule),
    /// `@every <duration>`
    Every(Duration),
}

/// Matching sets of a five-field schedule. Bit `n` set means value `n`
/// matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value of the first entry in `names`.
    name_base: u32,
}

const FIELD_SPECS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59, names: &[], name_base: 0 },
    FieldSpec { name: "hour", min: 0, max: 23, names: &[], name_base: 0 },
    FieldSpec { name: "day of month", min: 1, max: 31, names: &[], name_base: 0 },
    FieldSpec { name: "month", min: 1, max: 12, names: &MONTH_NAMES, name_base: 1 },
    FieldSpec { name: "day of week", min: 0, max: 7, names: &DAY_NAMES, name_base: 0 },
];

impl FieldSpec {
    fn resolve(&self, token: &Token) -> Result<u32, String> {
        let n = match token {
            Token::Number(n) => *n,
            Token::Name(name) => match self.names.iter().position(|candidate| candidate == name) {
                Some(i) => i as u32 + self.name_base,
                None => return Err(format!("unknown {} name {:?}", self.name, name)),
            },
        };
        if n < self.min || n > self.max {
            return Err(format!(
                "{} value {} out of range [{}, {}]",
                self.name, n, self.min, self.max
            ));
        }
        Ok(n)
    }

    /// Bit set for one field plus whether it restricts anything.
    fn bits(&self, items: &[Item]) -> Result<(u64, bool), String> {
        let mut bits = 0u64;
        let mut restricted = false;
        for item in items {
            let (start, end) = match &item.range {
                RangeSpec::All => (self.min, self.max),
                RangeSpec::Single(t) => {
                    let v = self.resolve(t)?;
                    // `5/15` means from 5 to the end in steps of 15.
                    if item.step.is_some() {
                        (v, self.max)
                    } else {
                        (v, v)
                    }
                }
                RangeSpec::Span(a, b) => (self.resolve(a)?, self.resolve(b)?),
            };
            if start > end {
                return Err(format!("{} range {}-{} is reversed", self.name, start, end));
            }
            if !matches!(item.range, RangeSpec::All) || item.step.is_some() {
                restricted = true;
            }
            let step = item.step.unwrap_or(1) as usize;
            for v in (start..=end).step_by(step) {
                bits |= 1 << v;
            }
        }
        Ok((bits, restricted))
    }
}

#[derive(Parser)]
#[grammar = "scheduler/cron.pest"]
struct CronParser;

#[pest_consume::parser]
impl CronParser {
    #[allow(non_snake_case)]
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn cron(input: Node) -> ParseResult<CronExpr> {
        Ok(match_nodes!(input.into_children();
            [every_expr(d), EOI(_)] => CronExpr::Every(d),
            [macro_expr(s), EOI(_)] => CronExpr::Fields(s),
            [fields(s), EOI(_)] => CronExpr::Fields(s),
        ))
    }

    fn every_expr(input: Node) -> ParseResult<Duration> {
        Ok(match_nodes!(input.into_children();
            [duration_text(d)] => d,
        ))
    }

    fn duration_text(input: Node) -> ParseResult<Duration> {
        parse_duration(input.as_str()).map_err(|e| input.error(e))
    }

    fn macro_expr(input: Node) -> ParseResult<CronSchedule> {
        Ok(match_nodes!(input.into_children();
            [macro_name(s)] => s,
        ))
    }

    fn macro_name(input: Node) -> ParseResult<CronSchedule> {
        let line = match input.as_str() {
            "yearly" | "annually" => "0 0 1 1 *",
            "monthly" => "0 0 1 * *",
            "weekly" => "0 0 * * 0",
            "daily" | "midnight" => "0 0 * * *",
            _ => "0 * * * *",
        };
        match parse_cron(line) {
            Ok(CronExpr::Fields(s)) => Ok(s),
            _ => Err(input.error("invalid macro")),
        }
    }

    fn fields(input: Node) -> ParseResult<CronSchedule> {
        let span_input = input.clone();
        let fields: Vec<Vec<Item>> = match_nodes!(input.into_children();
            [field(f)..] => f.collect(),
        );
        let mut sets = Vec::with_capacity(FIELD_SPECS.len());
        for (spec, items) in FIELD_SPECS.iter().zip(fields.iter()) {
            sets.push(spec.bits(items).map_err(|m| span_input.error(m))?);
        }
        let (minutes, _) = sets[0];
        let (hours, _) = sets[1];
        let (dom, dom_restricted) = sets[2];
        let (months, _) = sets[3];
        let (mut dow, dow_restricted) = sets[4];
        // Both 0 and 7 are Sunday.
        if dow & (1 << 7) != 0 {
            dow |= 1;
        }
        Ok(CronSchedule {
            minutes,
            hours: hours as u32,
            days_of_month: dom as u32,
            months: months as u16,
            days_of_week: (dow & 0x7f) as u8,
            dom_restricted,
            dow_restricted,
        })
    }

    fn field(input: Node) -> ParseResult<Vec<Item>> {
        Ok(match_nodes!(input.into_children();
            [item(items)..] => items.collect(),
        ))
    }

    fn item(input: Node) -> ParseResult<Item> {
        Ok(match_nodes!(input.into_children();
            [range_expr(range)] => Item { range, step: None },
            [range_expr(range), step(s)] => Item { range, step: Some(s) },
        ))
    }

    fn range_expr(input: Node) -> ParseResult<RangeSpec> {
        Ok(match_nodes!(input.into_children();
            [star(_)] => RangeSpec::All,
            [span(s)] => s,
            [value(v)] => RangeSpec::Single(v),
        ))
    }

    fn star(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn span(input: Node) -> ParseResult<RangeSpec> {
        Ok(match_nodes!(input.into_children();
            [value(a), value(b)] => RangeSpec::Span(a, b),
        ))
    }

    fn value(input: Node) -> ParseResult<Token> {
        Ok(match_nodes!(input.into_children();
            [number(n)] => Token::Number(n),
            [name(n)] => Token::Name(n),
        ))
    }

    fn number(input: Node) -> ParseResult<u32> {
        input.as_str().parse::<u32>().map_err(|e| input.error(e))
    }

    fn name(input: Node) -> ParseResult<String> {
        Ok(input.as_str().to_ascii_lowercase())
    }

    fn step(input: Node) -> ParseResult<u32> {
        match input.as_str().parse::<u32>() {
            Ok(0) => Err(input.error("step must be positive")),
            Ok(n) => Ok(n),
            Err(e) => Err(input.error(e)),
        }
    }
}

/// Parses a five-field expression, a macro such as `@daily`, or
/// `@every <duration>`.
pub fn parse_cron(expr: &str) -> Result<CronExpr, SchedulerError> {
    let invalid = |message: String| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        message,
    };
    let nodes = CronParser::parse(Rule::cron, expr.trim())
        .map_err(|e| invalid(e.variant.message().to_string()))?;
    let node = nodes.single().map_err(|e| invalid(e.variant.message().to_string()))?;
    CronParser::cron(node).map_err(|e| invalid(e.variant.message().to_string()))
}

impl CronSchedule {
    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month & (1 << t.day()) != 0;
        let dow = self.days_of_week & (1 << t.weekday().num_days_from_sunday()) != 0;
        // When both day fields are restricted either may match.
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + ChronoDuration::minutes(1);
        let limit = start.year() + SEARCH_YEARS;
        let mut t = start;
        while t.year() <= limit {
            if self.months & (1 << t.month()) == 0 {
                let (y, m) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(y, m, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.day_matches(&t) {
                t = Utc
                    .with_ymd_and_hms(t.year(), t.month(), t.day(), 0, 0, 0)
                    .single()?
                    + ChronoDuration::days(1);
                continue;
            }
            if self.hours & (1 << t.hour()) == 0 {
                t = t.with_minute(0)? + ChronoDuration::hours(1);
                continue;
            }
            if self.minutes & (1 << t.minute()) == 0 {
                t += ChronoDuration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(expr: &str) -> CronSchedule {
        match parse_cron(expr).unwrap() {
            CronExpr::Fields(s) => s,
            CronExpr::Every(_) => panic!("expected fields"),
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_every_five_minutes() {
        let s = schedule("*/5 * * * *");
        assert_eq!(s.next_after(at(2024, 3, 1, 10, 2)), Some(at(2024, 3, 1, 10, 5)));
        assert_eq!(s.next_after(at(2024, 3, 1, 10, 5)), Some(at(2024, 3, 1, 10, 10)));
    }

    #[test]
    fn test_names_and_ranges() {
        let s = schedule("30 9 * jan-mar mon-fri");
        // 2024-03-30 is a Saturday.
        assert_eq!(s.next_after(at(2024, 3, 30, 0, 0)), Some(at(2025, 1, 1, 9, 30)));
    }

    #[test]
    fn test_macros_and_every() {
        assert_eq!(schedule("@daily"), schedule("0 0 * * *"));
        match parse_cron("@every 1m30s").unwrap() {
            CronExpr::Every(d) => assert_eq!(d, Duration::from_secs(90)),
            CronExpr::Fields(_) => panic!("expected @every"),
        }
    }

    #[test]
    fn test_day_fields_match_either_when_both_restricted() {
        let s = schedule("0 0 13 * 5");
        // 2024-09-06 is a Friday, not the 13th.
        assert_eq!(s.next_after(at(2024, 9, 1, 0, 0)), Some(at(2024, 9, 6, 0, 0)));
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in ["* * * *", "60 * * * *", "* * * foo *", "5-1 * * * *", "*/0 * * * *"] {
            let err = parse_cron(expr).unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidCron { .. }), "{}", expr);
        }
    }

    #[test]
    fn test_impossible_date_never_fires() {
        let s = schedule("0 0 30 2 *");
        assert_eq!(s.next_after(at(2024, 1, 1, 0, 0)), None);
    }
}
