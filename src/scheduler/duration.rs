use std::time::Duration;

use pest_consume::{match_nodes, Error, Parser};

use super::SchedulerError;

type ParseResult<T> = std::result::Result<T, Error<Rule>>;
type Node<'i> = pest_consume::Node<'i, Rule, ()>;

#[derive(Parser)]
#[grammar = "scheduler/duration.pest"]
struct DurationParser;

#[pest_consume::parser]
impl DurationParser {
    #[allow(non_snake_case)]
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn duration(input: Node) -> ParseResult<f64> {
        Ok(match_nodes!(input.into_children();
            [millis(ms), EOI(_)] => ms,
            [component(parts).., EOI(_)] => parts.sum(),
        ))
    }

    fn millis(input: Node) -> ParseResult<f64> {
        input.as_str().parse::<f64>().map_err(|e| input.error(e))
    }

    /// One `<amount><unit>` pair, in milliseconds.
    fn component(input: Node) -> ParseResult<f64> {
        Ok(match_nodes!(input.into_children();
            [amount(a), unit(factor)] => a * factor,
        ))
    }

    fn amount(input: Node) -> ParseResult<f64> {
        input.as_str().parse::<f64>().map_err(|e| input.error(e))
    }

    fn unit(input: Node) -> ParseResult<f64> {
        Ok(match input.as_str() {
            "ns" => 1e-6,
            "us" | "µs" => 1e-3,
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            "h" => 3_600_000.0,
            other => return Err(input.error(format!("unknown unit {:?}", other))),
        })
    }
}

/// Parses `"1500"`, `"250ms"`, `"1.5s"` or `"1h2m3s"`.
pub fn parse_duration(text: &str) -> Result<Duration, SchedulerError> {
    let invalid = |message: String| SchedulerError::InvalidDuration {
        input: text.to_string(),
        message,
    };
    let trimmed = text.trim();
    let nodes = DurationParser::parse(Rule::duration, trimmed)
        .map_err(|e| invalid(e.variant.message().to_string()))?;
    let node = nodes.single().map_err(|e| invalid(e.variant.message().to_string()))?;
    let millis = DurationParser::duration(node).map_err(|e| invalid(e.variant.message().to_string()))?;
    duration_from_millis(millis).ok_or_else(|| invalid("duration out of range".to_string()))
}

pub fn duration_from_millis(millis: f64) -> Option<Duration> {
    if !millis.is_finite() || millis < 0.0 {
        return None;
    }
    Some(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number_is_milliseconds() {
        assert_eq!(parse_duration("1500").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_compound_duration() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_invalid_duration() {
        let err = parse_duration("5 parsecs").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidDuration { .. }));
        assert!(parse_duration("").is_err());
    }
}
