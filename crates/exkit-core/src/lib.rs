//! # exkit-core
//!
//! Structured errors with try/except/finally dispatch.
//!
//! An [`ErrorRecord`] carries a kind, message lines, typed properties and an
//! optional [`StackSnapshot`]. A [`Try`] runs protected work, hands failures
//! to [`Clause`]s selected by [`MatchPredicate`]s and always runs its finally
//! blocks. A failing finally block merges into the failure already carried
//! instead of replacing it.
//!
//! Engine state (default template, kinds, stack walker, output sink) lives in
//! a [`Context`], owned by the caller or kept per thread.
//!
//! ```
//! use exkit_core::{Clause, Context, MatchPredicate, Try};
//!
//! let ctx = Context::new();
//! let value = Try::new(|| -> Result<String, _> {
//!     Err(ctx.raise(ctx.error("io", "cannot open file")))
//! })
//! .except(Clause::when(MatchPredicate::kind("io")).then(|_, v: Option<String>| {
//!     Ok(v.unwrap_or_default() + "(handled)")
//! }))
//! .finally(|_, value| {
//!     if let Some(value) = value {
//!         value.push_str("(cleanup)");
//!     }
//!     Ok(())
//! })
//! .run(&ctx);
//! assert_eq!(value.unwrap(), "(handled)(cleanup)");
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod display;
pub mod frame;
pub mod kind;
pub mod level;
pub mod matcher;
pub mod normalize;
pub mod record;
pub mod snapshot;
pub mod value;
pub mod walker;

pub use config::{ContextConfig, KindDecl};
pub use context::{Context, throw};
pub use dispatch::{Action, Clause, Phase, Try, in_dispatch};
pub use display::{DisplayChain, DisplayHandler, JsonDisplay, SharedBuffer, Sink, TextDisplay};
pub use frame::{ENGINE_UNIT, StackFrame};
pub use kind::{KindId, KindRegistry, RUNTIME_KIND};
pub use level::DebugLevel;
pub use matcher::{MatchPredicate, Subject, TextPattern};
pub use normalize::RawFailure;
pub use record::{DEFAULT_EXIT_CODE, ErrorRecord, Origin, Provenance, Verbosity};
pub use snapshot::{StackSnapshot, merge_stacks};
pub use value::{Properties, PropertyValue};
pub use walker::{FrameGuard, ShadowStack, StackWalker, capture, capture_frames};
