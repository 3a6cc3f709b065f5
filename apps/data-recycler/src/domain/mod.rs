//! Domain layer - Core replay types with no I/O dependencies.

pub mod bar;
pub mod resolver;

pub use bar::Bar;
pub use resolver::{ResolveError, SymbolMapping, resolve_symbols};
