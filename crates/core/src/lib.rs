pub mod error;
pub mod logging;

pub mod analyzer;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod features;
pub mod graph;
pub mod index;
pub mod session;
pub mod watch;

pub use analyzer::{COUNT_UNKNOWN, RecomputeOutcome, ReferenceAnalyzer, SubscriptionId};
pub use codec::CodeCodec;
pub use config::SqlNavConfig;
pub use error::{Result, SqlNavError};
pub use index::{IndexState, PathIndex, RebuildOutcome};
pub use session::{ListenerId, StartOptions, Workspace};
