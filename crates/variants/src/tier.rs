//! The fixed rendition ladder and sets of rungs on it.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{Result, VariantError};

/// One rung of the quality ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeTier {
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl SizeTier {
    /// Every tier, lowest first
    pub const LADDER: [SizeTier; 5] = [
        SizeTier::P240,
        SizeTier::P360,
        SizeTier::P480,
        SizeTier::P720,
        SizeTier::P1080,
    ];

    pub fn height(self) -> u32 {
        match self {
            SizeTier::P240 => 240,
            SizeTier::P360 => 360,
            SizeTier::P480 => 480,
            SizeTier::P720 => 720,
            SizeTier::P1080 => 1080,
        }
    }

    /// Position on the ladder, 0 for 240p up to 4 for 1080p
    pub fn size_category(self) -> u8 {
        self as u8
    }

    pub fn from_height(height: u32) -> Option<SizeTier> {
        Self::LADDER.into_iter().find(|t| t.height() == height)
    }

    pub fn from_size_category(size_category: u8) -> Option<SizeTier> {
        Self::LADDER.get(size_category as usize).copied()
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.height())
    }
}

/// A set of requested tiers
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TierSet(u8);

impl TierSet {
    pub const EMPTY: TierSet = TierSet(0);
    pub const SD: TierSet = TierSet(0b00111);
    pub const HD: TierSet = TierSet(0b11000);
    pub const ALL: TierSet = TierSet(Self::SD.0 | Self::HD.0);

    pub fn single(tier: SizeTier) -> Self {
        TierSet(tier.bit())
    }

    pub fn insert(&mut self, tier: SizeTier) {
        self.0 |= tier.bit();
    }

    pub fn contains(&self, tier: SizeTier) -> bool {
        self.0 & tier.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn intersection(self, other: TierSet) -> TierSet {
        TierSet(self.0 & other.0)
    }

    /// Tiers in the set, lowest first
    pub fn iter(&self) -> impl Iterator<Item = SizeTier> + '_ {
        SizeTier::LADDER.into_iter().filter(move |t| self.contains(*t))
    }

    /// Parse and union a list of tier names
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<TierSet> {
        let mut set = TierSet::EMPTY;
        for name in names {
            set = set | name.as_ref().parse::<TierSet>()?;
        }
        Ok(set)
    }
}

impl BitOr for TierSet {
    type Output = TierSet;

    fn bitor(self, rhs: TierSet) -> TierSet {
        TierSet(self.0 | rhs.0)
    }
}

impl From<SizeTier> for TierSet {
    fn from(tier: SizeTier) -> Self {
        TierSet::single(tier)
    }
}

impl FromIterator<SizeTier> for TierSet {
    fn from_iter<I: IntoIterator<Item = SizeTier>>(iter: I) -> Self {
        let mut set = TierSet::EMPTY;
        for tier in iter {
            set.insert(tier);
        }
        set
    }
}

impl FromStr for TierSet {
    type Err = VariantError;

    /// Accepts `240`, `240p`, ... `1080p`, and the groups `sd`, `hd`, `all`
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "sd" => return Ok(TierSet::SD),
            "hd" => return Ok(TierSet::HD),
            "all" => return Ok(TierSet::ALL),
            _ => {}
        }

        name.strip_suffix('p')
            .unwrap_or(&name)
            .parse::<u32>()
            .ok()
            .and_then(SizeTier::from_height)
            .map(TierSet::single)
            .ok_or_else(|| VariantError::invalid_value(format!("Unknown tier: {}", s)))
    }
}

impl fmt::Debug for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
