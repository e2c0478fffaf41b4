pub mod client;
pub mod wire;

pub use client::{HttpScoringClient, ScoringClient, REQUEST_TIMEOUT};
pub use wire::{
    ConversionCredit, FlattenedJourneyRecord, RedistributionParameter, ScoringRequest,
    ScoringResponse, SessionCredit,
};
