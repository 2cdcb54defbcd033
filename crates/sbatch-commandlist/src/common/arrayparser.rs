use std::collections::HashSet;

use anyhow::anyhow;
use nom::bytes::complete::tag;
use nom::combinator::{map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{preceded, tuple};

use crate::common::arraydef::{IntArray, IntRange};
use crate::common::parser::{NomResult, consume_all, p_u32};

fn p_int_range(input: &str) -> NomResult<IntRange> {
    map_res(
        tuple((
            p_u32,
            opt(preceded(tag("-"), p_u32)),
            opt(preceded(tag(":"), p_u32)),
        )),
        |r| match r {
            (v, None, None) => Ok(IntRange::new(v, 1, 1)),
            (v, Some(w), None) if w >= v => Ok(IntRange::new(v, w - v + 1, 1)),
            (v, Some(w), Some(x)) if w >= v && x <= w - v && x > 0 => {
                Ok(IntRange::new(v, w - v + 1, x))
            }
            _ => Err(anyhow!("Invalid range")),
        },
    )(input)
}

fn p_int_ranges(input: &str) -> NomResult<Vec<IntRange>> {
    separated_list1(tag(","), p_int_range)(input)
}

fn p_int_array(input: &str) -> NomResult<IntArray> {
    map_res(p_int_ranges, |ranges| {
        if is_overlapping(ranges.clone()) {
            Err(anyhow!("Ranges overlap"))
        } else {
            Ok(IntArray::new(ranges))
        }
    })(input)
}

pub fn parse_array(input: &str) -> anyhow::Result<IntArray> {
    consume_all(p_int_array, input)
}

fn is_overlapping(mut ranges: Vec<IntRange>) -> bool {
    ranges.sort_unstable_by_key(|range| range.start);
    let mut ids = HashSet::new();
    for range in ranges {
        if range.iter().any(|x| !ids.insert(x)) {
            return true;
        }
    }
    false
}
