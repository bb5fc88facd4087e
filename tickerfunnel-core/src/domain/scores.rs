//! Percentile strategy scores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five composite screens computed by Build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreKind {
    DividendDaddy,
    MoonShot,
    FallingKnife,
    OverHyped,
    InstWhale,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 5] = [
        ScoreKind::DividendDaddy,
        ScoreKind::MoonShot,
        ScoreKind::FallingKnife,
        ScoreKind::OverHyped,
        ScoreKind::InstWhale,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            ScoreKind::DividendDaddy => "dividend_daddy_score",
            ScoreKind::MoonShot => "moon_shot_score",
            ScoreKind::FallingKnife => "falling_knife_score",
            ScoreKind::OverHyped => "over_hyped_score",
            ScoreKind::InstWhale => "inst_whale_score",
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreKind::DividendDaddy => "dividend_daddy",
            ScoreKind::MoonShot => "moon_shot",
            ScoreKind::FallingKnife => "falling_knife",
            ScoreKind::OverHyped => "over_hyped",
            ScoreKind::InstWhale => "inst_whale",
        };
        f.write_str(name)
    }
}

/// Percentile scores (0..=100) for one symbol on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyScores {
    pub dividend_daddy: u8,
    pub moon_shot: u8,
    pub falling_knife: u8,
    pub over_hyped: u8,
    pub inst_whale: u8,
}

impl StrategyScores {
    pub fn get(&self, kind: ScoreKind) -> u8 {
        match kind {
            ScoreKind::DividendDaddy => self.dividend_daddy,
            ScoreKind::MoonShot => self.moon_shot,
            ScoreKind::FallingKnife => self.falling_knife,
            ScoreKind::OverHyped => self.over_hyped,
            ScoreKind::InstWhale => self.inst_whale,
        }
    }

    pub fn set(&mut self, kind: ScoreKind, value: u8) {
        match kind {
            ScoreKind::DividendDaddy => self.dividend_daddy = value,
            ScoreKind::MoonShot => self.moon_shot = value,
            ScoreKind::FallingKnife => self.falling_knife = value,
            ScoreKind::OverHyped => self.over_hyped = value,
            ScoreKind::InstWhale => self.inst_whale = value,
        }
    }
}
