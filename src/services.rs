pub mod briefing_service;

pub use briefing_service::{
    BriefingDeps, BriefingError, BriefingLookup, BriefingOutcome, BriefingPolicy, BriefingService,
};
