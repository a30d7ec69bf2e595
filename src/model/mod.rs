//! The data model (§3): sections, functions, relocations, reference
//! symbols, and the `Context` aggregate that owns them.

mod context;
mod function;
mod ids;
mod reloc;
mod section;
mod symbol;

pub use context::Context;
pub use function::{Function, FunctionFlags};
pub use ids::{
    DependencyEventId, DependencyId, EventId, FunctionId, ImportId, ReferenceSymbolId, SectionId,
    SectionTarget,
};
pub use reloc::{Reloc, RelocType};
pub use section::{Section, SectionFlags, ROM_NOT_PRESENT};
pub use symbol::{
    Callback, Dependency, DependencyEvent, EventSymbol, FunctionReplacement, ImportSymbol,
    ReferenceSymbol, ReplacementMode, SemVer,
};
