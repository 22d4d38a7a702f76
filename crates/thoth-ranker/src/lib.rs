//! thoth-ranker — ResearchQueryFilter (C10, §4.10): scores discovery-sourced
//! candidates against stored research queries before they're allowed into
//! `DocumentPipeline`.

pub mod filter;

pub use filter::{DiscoveryCandidate, FilterDecision, ResearchQueryFilter, ResearchQueryFilterConfig};
