//! Domain types for barvault

pub mod bar;
pub mod timeframe;

pub use bar::{Bar, EnrichedBar};
pub use timeframe::{ParseTimeframeError, Timeframe};
