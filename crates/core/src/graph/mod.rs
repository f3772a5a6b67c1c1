pub mod source;

pub use source::SourceGraph;

use sqlnav_api::ReferenceGraph;
use std::sync::Arc;

pub type SharedGraph = Arc<dyn ReferenceGraph>;
