use std::fmt::{Debug, Display, Formatter};

use nom::IResult;
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map_res};
use nom::error::{ErrorKind, FromExternalError, ParseError};

pub enum ParserError<I> {
    Custom(anyhow::Error),
    Nom(I, ErrorKind),
}

impl<I: Debug> Debug for ParserError<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom(error) => f.write_fmt(format_args!("Semantic error at {}", error)),
            Self::Nom(input, error) => f.write_fmt(format_args!(
                "Parser error at '{:?}': expecting {:?}",
                input, error
            )),
        }
    }
}

impl<I> ParseError<I> for ParserError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        ParserError::Nom(input, kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I: Display, E: Into<anyhow::Error>> FromExternalError<I, E> for ParserError<I> {
    fn from_external_error(input: I, _: ErrorKind, error: E) -> Self {
        ParserError::Custom(anyhow::anyhow!("'{}': {}", input, error.into()))
    }
}

pub(crate) fn format_parse_error<I: Debug>(error: nom::Err<ParserError<I>>) -> anyhow::Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => anyhow::anyhow!("{:?}", e),
        _ => anyhow::anyhow!(error.to_string()),
    }
}

pub type NomResult<'a, Ret> = IResult<&'a str, Ret, ParserError<&'a str>>;

/// Runs `parser` over the whole `input`, failing if anything is left over.
pub fn consume_all<'a, F, O>(parser: F, input: &'a str) -> anyhow::Result<O>
where
    F: FnMut(&'a str) -> NomResult<'a, O>,
{
    all_consuming(parser)(input)
        .map(|(_, output)| output)
        .map_err(format_parse_error)
}

pub fn p_u32(input: &str) -> NomResult<u32> {
    map_res(digit1, |digits: &str| digits.parse::<u32>())(input)
}

pub fn p_u64(input: &str) -> NomResult<u64> {
    map_res(digit1, |digits: &str| digits.parse::<u64>())(input)
}

#[cfg(test)]
mod tests {
    use super::{consume_all, p_u32};

    #[test]
    fn test_parse_u32() {
        assert_eq!(consume_all(p_u32, "0").unwrap(), 0);
        assert_eq!(consume_all(p_u32, "1").unwrap(), 1);
        assert_eq!(consume_all(p_u32, "1019").unwrap(), 1019);
    }

    #[test]
    fn test_parse_u32_empty() {
        assert!(consume_all(p_u32, "").is_err());
    }

    #[test]
    fn test_parse_u32_invalid() {
        assert!(consume_all(p_u32, "x").is_err());
        assert!(consume_all(p_u32, "10x").is_err());
    }

    #[test]
    fn test_parse_u32_overflow() {
        assert!(consume_all(p_u32, "99999999999999").is_err());
    }
}
