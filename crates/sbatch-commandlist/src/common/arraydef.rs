use std::fmt;
use std::str::FromStr;

use crate::common::arrayparser::parse_array;

#[derive(Debug, Clone, Copy)]
pub struct IntRange {
    pub start: u32,
    pub count: u32,
    pub step: u32,
}

impl IntRange {
    pub fn new(start: u32, count: u32, step: u32) -> IntRange {
        IntRange { start, count, step }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        (self.start..self.start + self.count).step_by(self.step as usize)
    }
}

/// Set of task ids in the Slurm array selection syntax (`1`, `1-8`, `1-8:2`,
/// comma-separated combinations thereof).
#[derive(Debug, Clone)]
pub struct IntArray {
    ranges: Vec<IntRange>,
}

impl IntArray {
    pub fn new(ranges: Vec<IntRange>) -> IntArray {
        IntArray { ranges }
    }

    pub fn from_range(start: u32, count: u32) -> Self {
        IntArray {
            ranges: vec![IntRange {
                start,
                count,
                step: 1,
            }],
        }
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|x| x.iter())
    }
}

impl FromStr for IntArray {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_array(s)
    }
}

impl fmt::Display for IntArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, x) in self.ranges.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            if x.count == 1 {
                write!(f, "{}", x.start)?;
            } else if x.step == 1 {
                write!(f, "{}-{}", x.start, x.start + x.count - 1)?;
            } else {
                write!(f, "{}-{}:{}", x.start, x.start + x.count - 1, x.step)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::common::arraydef::{IntArray, IntRange};

    #[test]
    fn range_iterate() {
        assert_eq!(
            IntRange::new(1, 5, 1).iter().collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(
            IntRange::new(2, 9, 3).iter().collect::<Vec<_>>(),
            vec![2, 5, 8]
        );
    }

    #[test]
    fn array_display_range() {
        assert_eq!(IntArray::from_range(1, 200).to_string(), "1-200");
        assert_eq!(IntArray::from_range(1, 1).to_string(), "1");
    }

    #[test]
    fn array_display_selection_syntax() {
        for input in ["1-3,7,9-10", "4", "0-10:2"] {
            assert_eq!(input.parse::<IntArray>().unwrap().to_string(), input);
        }
    }
}
