use crate::error::GraphResult;
use crate::models::ReferenceLocation;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// A program unit (project, assembly, module) the graph can analyze on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Describes the loader method: a method named `method_name`, declared on the
/// type `type_name` (fully qualified), taking exactly one string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodQuery {
    pub type_name: String,
    pub method_name: String,
}

impl MethodQuery {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }

    /// Type name without its namespace, as it appears at most call sites.
    pub fn short_type_name(&self) -> &str {
        self.type_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.type_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSymbol {
    pub type_name: String,
    pub method_name: String,
    pub declared_in: Option<PathBuf>,
}

/// A name used as an expression, pointing at the declaration it binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRef {
    pub name: String,
    /// What the name was accessed through, as written: `Codes` in
    /// `Codes.Orders`, `this` in `this.code`. `None` for a bare name.
    pub qualifier: Option<String>,
    /// File containing the use; resolution starts there.
    pub file: PathBuf,
    /// Byte offset of the use in `file`.
    pub offset: usize,
}

/// Syntactic shape of an argument or initializer, as far as the graph can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentExpr {
    StringLiteral(String),
    Symbol(SymbolRef),
    /// Anything that is not statically known (calls, concatenation, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub location: ReferenceLocation,
    /// First argument of the call, `None` when the call has no arguments.
    pub argument: Option<ArgumentExpr>,
}

/// Whole-program symbol/call graph the reference analyzer runs against.
///
/// Implementations are free to be lazy and slow; the analyzer calls them from
/// a single recomputation pass at a time.
#[async_trait]
pub trait ReferenceGraph: Send + Sync {
    /// All program units in the graph.
    async fn units(&self) -> GraphResult<Vec<UnitId>>;

    /// Find the loader method as visible from `unit`. `Ok(None)` when the unit
    /// does not see such a type or method.
    async fn find_method(
        &self,
        unit: &UnitId,
        query: &MethodQuery,
    ) -> GraphResult<Option<MethodSymbol>>;

    /// Every call site of `method` across the whole graph.
    async fn find_call_sites(&self, method: &MethodSymbol) -> GraphResult<Vec<CallSite>>;

    /// The initializer expression of the variable, field or constant that
    /// `symbol` binds to. `Ok(None)` when there is no declaration or no
    /// initializer.
    async fn declaration_initializer(&self, symbol: &SymbolRef)
    -> GraphResult<Option<ArgumentExpr>>;
}
