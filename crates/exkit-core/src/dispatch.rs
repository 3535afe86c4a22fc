//! Try/except/finally orchestration.
//!
//! A [`Try`] runs a protected body, evaluates its [`Clause`]s against any
//! failure, then runs every finally block. Failures travel as
//! `Err(ErrorRecord)`; panics raised anywhere in the body, a clause or a
//! finally block are caught at the dispatcher and normalized.
//!
//! Clause selection: every predicate-bearing clause that matches runs, in
//! registration order. Default clauses (no predicates) run only when no
//! predicate-bearing clause matched. A clause without an action re-raises
//! the original failure and stops evaluation. A clause that fails replaces
//! the carried failure and stops evaluation.

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use strum_macros::{Display, IntoStaticStr};

use crate::context::Context;
use crate::matcher::MatchPredicate;
use crate::normalize::RawFailure;
use crate::record::{ErrorRecord, Origin};
use crate::walker::{self, ShadowStack, StackWalker};

/// Dispatcher states, logged at `trace` as a [`Try`] moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// The protected body is executing.
    Running,
    /// A failure occurred and clauses are being evaluated.
    Handling,
    /// Finally blocks are executing.
    Finalizing,
    /// A residual failure is delivered to the caller.
    Done,
    /// No residual failure; the return value is delivered.
    Returned,
}

/// What a clause runs when it fires.
pub type Action<'a, T> = Box<dyn FnOnce(&ErrorRecord, Option<T>) -> Result<T, ErrorRecord> + 'a>;
type Body<'a, T> = Box<dyn FnOnce() -> Result<T, ErrorRecord> + 'a>;
type Finally<'a, T> =
    Box<dyn FnOnce(Option<&ErrorRecord>, Option<&mut T>) -> Result<(), ErrorRecord> + 'a>;

/// One `except` arm: predicates (ORed) plus an optional action.
///
/// The action receives the failure and the return value produced so far
/// (from an earlier clause, if any); what it returns becomes the new return
/// value.
pub struct Clause<'a, T> {
    predicates: Vec<MatchPredicate>,
    action: Option<Action<'a, T>>,
}

impl<'a, T> Clause<'a, T> {
    pub fn new(predicates: Vec<MatchPredicate>, action: Option<Action<'a, T>>) -> Self {
        Self { predicates, action }
    }

    /// A clause firing on `predicate`. Without [`Clause::then`] it re-raises.
    pub fn when(predicate: MatchPredicate) -> Self {
        Self::new(vec![predicate], None)
    }

    pub fn or(mut self, predicate: MatchPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn then<F>(mut self, action: F) -> Self
    where
        F: FnOnce(&ErrorRecord, Option<T>) -> Result<T, ErrorRecord> + 'a,
    {
        self.action = Some(Box::new(action));
        self
    }

    /// A default clause running `action`.
    pub fn otherwise<F>(action: F) -> Self
    where
        F: FnOnce(&ErrorRecord, Option<T>) -> Result<T, ErrorRecord> + 'a,
    {
        Self::new(Vec::new(), None).then(action)
    }

    /// A default clause that re-raises whatever reaches it.
    pub fn catch_all() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn is_default(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn is_reraise(&self) -> bool {
        self.action.is_none()
    }

    /// Whether a predicate-bearing clause fires for `error`. Defaults never
    /// report a match here; they are selected by the dispatcher.
    pub fn matches(&self, error: &ErrorRecord, ctx: &Context) -> bool {
        self.predicates
            .iter()
            .any(|predicate| predicate.matches(error, ctx.kinds()))
    }
}

/// A protected computation with its clauses and finally blocks.
///
/// ```
/// use exkit_core::{Clause, Context, MatchPredicate, Try};
///
/// let ctx = Context::new();
/// let value = Try::new(|| Err(ctx.raise(ctx.error("io", "cannot open file"))))
///     .except(Clause::when(MatchPredicate::kind("io")).then(|_, _| Ok("fallback")))
///     .run(&ctx);
/// assert_eq!(value.unwrap(), "fallback");
/// ```
pub struct Try<'a, T> {
    body: Body<'a, T>,
    clauses: Vec<Clause<'a, T>>,
    finally: Vec<Finally<'a, T>>,
}

impl<'a, T> Try<'a, T> {
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() -> Result<T, ErrorRecord> + 'a,
    {
        Self {
            body: Box::new(body),
            clauses: Vec::new(),
            finally: Vec::new(),
        }
    }

    pub fn except(mut self, clause: Clause<'a, T>) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Register a block that runs after the body and clauses, whatever
    /// happened. It sees the carried failure, if any, and the return value,
    /// if there is one.
    pub fn finally<F>(mut self, block: F) -> Self
    where
        F: FnOnce(Option<&ErrorRecord>, Option<&mut T>) -> Result<(), ErrorRecord> + 'a,
    {
        self.finally.push(Box::new(block));
        self
    }

    pub fn run(self, ctx: &Context) -> Result<T, ErrorRecord> {
        let _frame = walker::enter_internal("try");
        let Try {
            body,
            clauses,
            finally,
        } = self;

        tracing::trace!(phase = %Phase::Running, "try");
        let outcome = match guarded(ctx, Origin::RuntimeRaised, body) {
            Ok(value) => Ok(value),
            Err(error) => {
                tracing::trace!(phase = %Phase::Handling, kind = %error.kind(), "try");
                handle(ctx, clauses, error)
            }
        };

        tracing::trace!(phase = %Phase::Finalizing, blocks = finally.len(), "try");
        let outcome = finalize(ctx, finally, outcome);

        match &outcome {
            Ok(_) => tracing::trace!(phase = %Phase::Returned, "try"),
            Err(error) => tracing::trace!(phase = %Phase::Done, kind = %error.kind(), "try"),
        }
        outcome
    }

    /// Run with this thread's context.
    pub fn run_current(self) -> Result<T, ErrorRecord> {
        Context::with_current(|ctx| self.run(ctx))
    }

    /// Run, and unwind with the residual failure as the panic payload so an
    /// enclosing dispatcher receives it unchanged.
    pub fn run_or_throw(self, ctx: &Context) -> T {
        match self.run(ctx) {
            Ok(value) => value,
            Err(error) => resume_unwind(Box::new(error)),
        }
    }
}

fn handle<T>(
    ctx: &Context,
    clauses: Vec<Clause<'_, T>>,
    error: ErrorRecord,
) -> Result<T, ErrorRecord> {
    let selected = guarded(ctx, Origin::HandlerFailure, || Ok(select(ctx, clauses, &error)))?;
    if selected.is_empty() {
        tracing::debug!(kind = %error.kind(), "no clause matched");
        return Err(error);
    }

    let mut value = None;
    for (index, clause) in selected {
        let Some(action) = clause.action else {
            tracing::debug!(clause = index, kind = %error.kind(), "clause re-raised");
            return Err(error);
        };
        tracing::debug!(clause = index, kind = %error.kind(), "clause matched");
        let previous = value.take();
        match guarded(ctx, Origin::HandlerFailure, || action(&error, previous)) {
            Ok(next) => value = Some(next),
            Err(failure) => {
                tracing::debug!(clause = index, kind = %failure.kind(), "clause failed");
                return Err(failure);
            }
        }
    }
    value.ok_or(error)
}

/// Matching predicate-bearing clauses in order, or else every default.
fn select<'a, T>(
    ctx: &Context,
    clauses: Vec<Clause<'a, T>>,
    error: &ErrorRecord,
) -> Vec<(usize, Clause<'a, T>)> {
    let (defaults, explicit): (Vec<_>, Vec<_>) = clauses
        .into_iter()
        .enumerate()
        .partition(|(_, clause)| clause.is_default());
    let matched: Vec<_> = explicit
        .into_iter()
        .filter(|(_, clause)| clause.matches(error, ctx))
        .collect();
    if matched.is_empty() { defaults } else { matched }
}

fn finalize<T>(
    ctx: &Context,
    blocks: Vec<Finally<'_, T>>,
    mut outcome: Result<T, ErrorRecord>,
) -> Result<T, ErrorRecord> {
    for (index, block) in blocks.into_iter().enumerate() {
        let result = {
            let (failure, value) = match &mut outcome {
                Ok(value) => (None, Some(value)),
                Err(failure) => (Some(&*failure), None),
            };
            guarded(ctx, Origin::HandlerFailure, || block(failure, value))
        };
        let Err(later) = result else { continue };
        outcome = match outcome {
            Ok(_) => Err(later),
            Err(carried) => {
                tracing::debug!(
                    block = index,
                    carried = %carried.kind(),
                    later = %later.kind(),
                    "finally failed, merging"
                );
                Err(carried.absorb(&later))
            }
        };
    }
    outcome
}

/// Whether the calling thread is inside [`Try::run`], where a panic is
/// caught and normalized instead of ending the thread.
pub fn in_dispatch() -> bool {
    ShadowStack
        .walk()
        .iter()
        .any(|frame| frame.is_internal() && frame.activation() == Some("try"))
}

/// Run `f`, turning a panic into a normalized record tagged with `origin`.
fn guarded<R>(
    ctx: &Context,
    origin: Origin,
    f: impl FnOnce() -> Result<R, ErrorRecord>,
) -> Result<R, ErrorRecord> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ctx.normalize_as(RawFailure::Panic(payload), origin)),
    }
}
