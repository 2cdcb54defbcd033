use std::time::Duration;

use anyhow::anyhow;
use nom::character::complete::char;
use nom::combinator::{map_res, opt};
use nom::sequence::{preceded, tuple};

use crate::common::parser::{NomResult, consume_all, p_u32};

// Allows specifying humantime format (2h, 3m, etc.) or HH:MM:SS
crate::arg_wrapper!(ExtendedArgDuration, Duration, parse_hms_or_human_time);

pub fn parse_hms_or_human_time(text: &str) -> anyhow::Result<Duration> {
    parse_hms_time(text)
        .or_else(|_| humantime::parse_duration(text))
        .map_err(|e| {
            anyhow!(
                "Could not parse walltime. Use either `HH:MM:SS` or humantime format (2hours): {:?}",
                e
            )
        })
}

fn p_hms_time(input: &str) -> NomResult<Duration> {
    map_res(
        tuple((
            p_u32,
            opt(preceded(char(':'), p_u32)),
            opt(preceded(char(':'), p_u32)),
        )),
        |parsed| match parsed {
            (seconds, None, None) => Ok(Duration::from_secs(seconds as u64)),
            (minutes, Some(seconds), None) => {
                Ok(Duration::from_secs(minutes as u64 * 60 + seconds as u64))
            }
            (hours, Some(minutes), Some(seconds)) => Ok(Duration::from_secs(
                hours as u64 * 3600 + minutes as u64 * 60 + seconds as u64,
            )),
            _ => Err(anyhow!("Invalid time specification")),
        },
    )(input)
}

/// Parses time strings in the format [[hh:]mm:]ss.
/// Individual time values may be zero padded.
pub fn parse_hms_time(input: &str) -> anyhow::Result<Duration> {
    consume_all(p_hms_time, input)
}

#[cfg(test)]
mod tests {
    use crate::common::utils::time::{parse_hms_or_human_time, parse_hms_time};

    #[test]
    fn parse_hms_seconds() {
        let duration = parse_hms_time("01").unwrap();
        assert_eq!(duration.as_secs(), 1);

        let duration = parse_hms_time("1").unwrap();
        assert_eq!(duration.as_secs(), 1);
    }

    #[test]
    fn parse_hms_minutes() {
        let duration = parse_hms_time("1:1").unwrap();
        assert_eq!(duration.as_secs(), 61);

        let duration = parse_hms_time("80:02").unwrap();
        assert_eq!(duration.as_secs(), 80 * 60 + 2);
    }

    #[test]
    fn parse_hms_hours() {
        let duration = parse_hms_time("1:1:1").unwrap();
        assert_eq!(duration.as_secs(), 3600 + 60 + 1);

        let duration = parse_hms_time("12:00:00").unwrap();
        assert_eq!(duration.as_secs(), 12 * 3600);
    }

    #[test]
    fn parse_hms_invalid() {
        assert!(parse_hms_time("").is_err());
        assert!(parse_hms_time("x").is_err());
        assert!(parse_hms_time("1:2:3:4").is_err());
    }

    #[test]
    fn parse_extended_walltime() {
        assert_eq!(parse_hms_or_human_time("2h").unwrap().as_secs(), 7200);
        assert_eq!(
            parse_hms_or_human_time("30minutes").unwrap().as_secs(),
            1800
        );
        assert_eq!(
            parse_hms_or_human_time("12:00:00").unwrap().as_secs(),
            12 * 3600
        );
        assert!(parse_hms_or_human_time("tomorrow").is_err());
    }
}
