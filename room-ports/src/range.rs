use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortError;

/// An inclusive range of host ports, stored on units as `"start-end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn parse(range_str: &str) -> Result<Self, PortError> {
        let Some((start, end)) = range_str.trim().split_once('-') else {
            return Err(PortError::InvalidFormat(range_str.to_string()));
        };

        // "1-2-3" splits into "1" and "2-3"; the second parse rejects it
        let start: u16 = start
            .parse()
            .map_err(|_| PortError::InvalidPort(start.to_string()))?;
        let end: u16 = end
            .parse()
            .map_err(|_| PortError::InvalidPort(end.to_string()))?;

        Self::new(start, end)
    }

    pub fn new(start: u16, end: u16) -> Result<Self, PortError> {
        if start > end {
            return Err(PortError::Reversed { start, end });
        }
        Ok(PortRange { start, end })
    }

    /// Builds the range of `width` ports beginning at `start`, if it fits in u16.
    pub fn with_width(start: u16, width: u16) -> Result<Self, PortError> {
        if width == 0 {
            return Err(PortError::ZeroWidth(width));
        }
        let end = start
            .checked_add(width - 1)
            .ok_or_else(|| PortError::InvalidPort(format!("{start}+{width}")))?;
        Self::new(start, end)
    }

    pub fn overlaps_with(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, other: &PortRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of ports in the range. Returned as u32 so `0-65535` fits.
    pub fn size(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PortRange {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
