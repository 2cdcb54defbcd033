use std::fmt;
use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::combinator::{map, map_res, opt};
use nom::sequence::tuple;
use serde::{Deserialize, Serialize};

use crate::common::parser::{NomResult, consume_all, p_u64};

/// Amount of memory requested for a single array task.
///
/// Stored in megabytes, the smallest unit accepted by `sbatch --mem`.
/// A bare number is interpreted as megabytes, matching sbatch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAmount {
    megabytes: u64,
}

impl MemoryAmount {
    pub fn from_megabytes(megabytes: u64) -> Self {
        MemoryAmount { megabytes }
    }

    pub fn from_gigabytes(gigabytes: u64) -> Self {
        MemoryAmount {
            megabytes: gigabytes * 1024,
        }
    }

    pub fn megabytes(&self) -> u64 {
        self.megabytes
    }
}

fn p_memory_amount(input: &str) -> NomResult<MemoryAmount> {
    map_res(
        tuple((
            p_u64,
            opt(alt((
                map(alt((tag_no_case("gb"), tag_no_case("g"))), |_| 1024u64),
                map(alt((tag_no_case("tb"), tag_no_case("t"))), |_| {
                    1024 * 1024u64
                }),
                map(alt((tag_no_case("mb"), tag_no_case("m"))), |_| 1u64),
            ))),
        )),
        |(amount, multiplier)| {
            amount
                .checked_mul(multiplier.unwrap_or(1))
                .map(MemoryAmount::from_megabytes)
                .ok_or_else(|| anyhow::anyhow!("Memory amount is too large"))
        },
    )(input)
}

impl FromStr for MemoryAmount {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        consume_all(p_memory_amount, s)
    }
}

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.megabytes != 0 && self.megabytes % (1024 * 1024) == 0 {
            write!(f, "{}T", self.megabytes / (1024 * 1024))
        } else if self.megabytes != 0 && self.megabytes % 1024 == 0 {
            write!(f, "{}G", self.megabytes / 1024)
        } else {
            write!(f, "{}M", self.megabytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::common::memory::MemoryAmount;

    #[test]
    fn parse_plain_megabytes() {
        assert_eq!(
            MemoryAmount::from_str("512").unwrap(),
            MemoryAmount::from_megabytes(512)
        );
    }

    #[test]
    fn parse_suffixes() {
        assert_eq!(
            MemoryAmount::from_str("16M").unwrap(),
            MemoryAmount::from_megabytes(16)
        );
        assert_eq!(
            MemoryAmount::from_str("8G").unwrap(),
            MemoryAmount::from_gigabytes(8)
        );
        assert_eq!(
            MemoryAmount::from_str("8GB").unwrap(),
            MemoryAmount::from_gigabytes(8)
        );
        assert_eq!(
            MemoryAmount::from_str("8g").unwrap(),
            MemoryAmount::from_gigabytes(8)
        );
        assert_eq!(
            MemoryAmount::from_str("2T").unwrap(),
            MemoryAmount::from_megabytes(2 * 1024 * 1024)
        );
    }

    #[test]
    fn parse_invalid() {
        assert!(MemoryAmount::from_str("").is_err());
        assert!(MemoryAmount::from_str("G8").is_err());
        assert!(MemoryAmount::from_str("8X").is_err());
        assert!(MemoryAmount::from_str("8 G").is_err());
    }

    #[test]
    fn display_compact_unit() {
        assert_eq!(MemoryAmount::from_gigabytes(8).to_string(), "8G");
        assert_eq!(MemoryAmount::from_megabytes(512).to_string(), "512M");
        assert_eq!(MemoryAmount::from_megabytes(1536).to_string(), "1536M");
        assert_eq!(
            MemoryAmount::from_megabytes(3 * 1024 * 1024).to_string(),
            "3T"
        );
        assert_eq!(MemoryAmount::from_megabytes(0).to_string(), "0M");
    }
}
