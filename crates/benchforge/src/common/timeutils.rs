use std::time::Duration;

use nom::character::complete::char;
use nom::combinator::opt;
use nom::sequence::{preceded, tuple};

use crate::common::parser::{NomResult, consume_all, p_u32};

fn p_hms_time(input: &str) -> NomResult<Duration> {
    let parser = tuple((
        p_u32,
        opt(preceded(char(':'), p_u32)),
        opt(preceded(char(':'), p_u32)),
    ));
    nom::combinator::map_res(parser, |parsed| match parsed {
        (seconds, None, None) => Ok(Duration::from_secs(seconds as u64)),
        (minutes, Some(seconds), None) => {
            Ok(Duration::from_secs(minutes as u64 * 60 + seconds as u64))
        }
        (hours, Some(minutes), Some(seconds)) => Ok(Duration::from_secs(
            hours as u64 * 3600 + minutes as u64 * 60 + seconds as u64,
        )),
        _ => Err(anyhow::anyhow!("Invalid time specification")),
    })(input)
}

/// Parses time strings in the format [[hh:]mm:]ss.
/// Individual time values may be zero padded.
pub fn parse_hms_time(input: &str) -> anyhow::Result<Duration> {
    consume_all(p_hms_time, input)
}

/// Parses the `Elapsed` notation of the accounting tool, `HH:MM:SS` with an
/// optional fractional suffix after a comma.
pub fn parse_elapsed_seconds(value: &str) -> anyhow::Result<u64> {
    let value = value.split(',').next().unwrap_or(value).trim();
    Ok(parse_hms_time(value)?.as_secs())
}
