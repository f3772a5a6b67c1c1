pub mod error;
pub mod graph;
pub mod models;

// Re-export commonly used types
pub use error::{GraphError, GraphResult};
pub use graph::{
    ArgumentExpr, CallSite, MethodQuery, MethodSymbol, ReferenceGraph, SymbolRef, UnitId,
};
pub use models::*;
