use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::EngineError;

/// Cooldown applied when a tier has no cell for a channel/subtype pair.
pub const DEFAULT_REQUIRED_WEEKS: i64 = 4;
pub const DEFAULT_TIER: &str = "일반";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Phone,
    Chat,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Phone, Channel::Chat];

    pub fn label(self) -> &'static str {
        match self {
            Channel::Phone => "전화",
            Channel::Chat => "채팅",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.label() == label)
    }
}

/// An ad slot type, written as `channel(subtype)`, e.g. `전화(타로)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdType {
    pub channel: Channel,
    pub subtype: String,
}

impl FromStr for AdType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || EngineError::MalformedAdType(value.to_string());
        let trimmed = value.trim();
        let (channel, rest) = trimmed.split_once('(').ok_or_else(malformed)?;
        let subtype = rest.strip_suffix(')').ok_or_else(malformed)?.trim();
        let channel = Channel::from_label(channel.trim()).ok_or_else(malformed)?;

        if subtype.is_empty() || subtype.contains(['(', ')']) {
            return Err(malformed());
        }

        Ok(AdType {
            channel,
            subtype: subtype.to_string(),
        })
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.channel.label(), self.subtype)
    }
}

#[derive(Debug)]
struct CycleCell {
    channel: Channel,
    subtype: &'static str,
    weeks: i64,
}

#[derive(Debug)]
struct TierCycles {
    level_cat: &'static str,
    cells: &'static [CycleCell],
}

const fn cell(channel: Channel, subtype: &'static str, weeks: i64) -> CycleCell {
    CycleCell {
        channel,
        subtype,
        weeks,
    }
}

static STANDARD_TIERS: &[TierCycles] = &[
    TierCycles {
        level_cat: "전문",
        cells: &[
            cell(Channel::Phone, "타로", 2),
            cell(Channel::Phone, "사주", 2),
            cell(Channel::Phone, "신점", 3),
            cell(Channel::Chat, "타로", 2),
            cell(Channel::Chat, "사주", 3),
        ],
    },
    TierCycles {
        level_cat: "일반",
        cells: &[
            cell(Channel::Phone, "타로", 4),
            cell(Channel::Phone, "사주", 4),
            cell(Channel::Phone, "신점", 6),
            cell(Channel::Chat, "타로", 3),
            cell(Channel::Chat, "사주", 4),
        ],
    },
];

/// Required cooldown weeks per tier, channel and subtype.
#[derive(Debug, Clone, Copy)]
pub struct AdCycleTable {
    tiers: &'static [TierCycles],
    default_tier: &'static str,
}

impl Default for AdCycleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl AdCycleTable {
    pub fn standard() -> Self {
        Self {
            tiers: STANDARD_TIERS,
            default_tier: DEFAULT_TIER,
        }
    }

    fn tier(&self, level_cat: &str) -> Option<&'static TierCycles> {
        let found = self.tiers.iter().find(|tier| tier.level_cat == level_cat);
        if found.is_none() {
            debug!(level_cat, default = self.default_tier, "unknown tier, using default");
        }
        found.or_else(|| {
            self.tiers
                .iter()
                .find(|tier| tier.level_cat == self.default_tier)
        })
    }

    fn cell(&self, level_cat: &str, channel: Channel, subtype: &str) -> Option<i64> {
        self.tier(level_cat)?
            .cells
            .iter()
            .find(|cell| cell.channel == channel && cell.subtype == subtype)
            .map(|cell| cell.weeks)
    }

    pub fn required_weeks(&self, level_cat: &str, ad_type: &AdType) -> i64 {
        self.cell(level_cat, ad_type.channel, &ad_type.subtype)
            .unwrap_or_else(|| {
                debug!(level_cat, ad_type = %ad_type, "no cycle cell, using default weeks");
                DEFAULT_REQUIRED_WEEKS
            })
    }
}

/// Resolves the ad types a counselor may apply for.
pub trait AdCatalog {
    fn resolve(&self, category: &str, level_cat: &str, level: &str) -> Vec<String>;
}

impl<F> AdCatalog for F
where
    F: Fn(&str, &str, &str) -> Vec<String>,
{
    fn resolve(&self, category: &str, level_cat: &str, level: &str) -> Vec<String> {
        self(category, level_cat, level)
    }
}

/// Offers `channel(category)` for every channel the counselor's tier
/// schedules for their category.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierCatalog {
    table: AdCycleTable,
}

impl TierCatalog {
    pub fn new(table: AdCycleTable) -> Self {
        Self { table }
    }
}

impl AdCatalog for TierCatalog {
    fn resolve(&self, category: &str, level_cat: &str, _level: &str) -> Vec<String> {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.table.cell(level_cat, *channel, category).is_some())
            .map(|channel| {
                AdType {
                    channel,
                    subtype: category.to_string(),
                }
                .to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(value: &str) -> AdType {
        value.parse().unwrap()
    }

    #[test]
    fn parses_channel_and_subtype() {
        let parsed = ad("전화(타로)");
        assert_eq!(parsed.channel, Channel::Phone);
        assert_eq!(parsed.subtype, "타로");
        assert_eq!(parsed.to_string(), "전화(타로)");
        assert_eq!(ad(" 채팅( 사주 ) ").to_string(), "채팅(사주)");
    }

    #[test]
    fn rejects_malformed_ad_types() {
        for value in ["전화", "전화()", "문자(타로)", "전화(타로", "(타로)", "전화(타(로))"] {
            assert!(
                matches!(value.parse::<AdType>(), Err(EngineError::MalformedAdType(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn looks_up_tier_cell() {
        let table = AdCycleTable::standard();
        assert_eq!(table.required_weeks("전문", &ad("전화(타로)")), 2);
        assert_eq!(table.required_weeks("일반", &ad("전화(신점)")), 6);
    }

    #[test]
    fn unknown_tier_uses_default_tier() {
        let table = AdCycleTable::standard();
        assert_eq!(table.required_weeks("없는등급", &ad("전화(신점)")), 6);
    }

    #[test]
    fn missing_cell_uses_default_weeks() {
        let table = AdCycleTable::standard();
        assert_eq!(
            table.required_weeks("전문", &ad("채팅(신점)")),
            DEFAULT_REQUIRED_WEEKS
        );
    }

    #[test]
    fn tier_catalog_offers_scheduled_channels() {
        let catalog = TierCatalog::default();
        assert_eq!(
            catalog.resolve("타로", "전문", "1"),
            vec!["전화(타로)".to_string(), "채팅(타로)".to_string()]
        );
        assert_eq!(catalog.resolve("신점", "일반", "2"), vec!["전화(신점)".to_string()]);
        assert!(catalog.resolve("연애", "일반", "2").is_empty());
    }
}
