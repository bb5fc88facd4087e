//! Domain types for the ticker funnel

pub mod metrics;
pub mod pipeline;
pub mod scores;
pub mod ticker;

pub use metrics::{DailyMetric, Fundamentals, Quote, ScoringInput};
pub use pipeline::{
    PipelineRun, PipelineStep, Reachability, RunOutcome, RunStatus, Stage, StepStatus,
    TickerSyncRecord,
};
pub use scores::{ScoreKind, StrategyScores};
pub use ticker::{ListingFeed, Ticker};

/// Symbol type alias
pub type Symbol = String;
