//! Per-thread engine state: default template, kinds, stack walker, sink.

use std::cell::RefCell;
use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;

use exkit_error::{Error, Result};

use crate::config::ContextConfig;
use crate::display::Sink;
use crate::frame::StackFrame;
use crate::kind::{KindId, KindRegistry};
use crate::level::DebugLevel;
use crate::record::ErrorRecord;
use crate::snapshot::StackSnapshot;
use crate::walker::{self, ShadowStack, StackWalker};

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::new());
}

/// Everything a raise or a dispatch needs besides the record itself.
///
/// Owned by the caller or kept per thread via [`Context::with_current`];
/// there is no process-wide instance.
#[derive(Clone)]
pub struct Context {
    template: ErrorRecord,
    kinds: KindRegistry,
    walker: Arc<dyn StackWalker>,
    sink: Sink,
    runtime_kind: KindId,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        let config = ContextConfig::default();
        Self {
            template: template_from(&config),
            kinds: KindRegistry::new(),
            walker: Arc::new(ShadowStack),
            sink: Sink::stderr(),
            runtime_kind: KindId::runtime(),
        }
    }

    pub fn from_config(config: &ContextConfig) -> Result<Self> {
        let mut kinds = KindRegistry::new();
        for decl in &config.kinds {
            kinds
                .register(&decl.name, decl.parent.as_deref())
                .map_err(|err| err.with_operation("context::from_config"))?;
        }
        let runtime_kind = KindId::new(config.runtime_kind.as_str());
        if !kinds.contains(&runtime_kind) {
            return Err(Error::unknown_kind(config.runtime_kind.as_str())
                .with_operation("context::from_config")
                .with_context("field", "runtime_kind"));
        }
        Ok(Self {
            template: template_from(config),
            kinds,
            walker: Arc::new(ShadowStack),
            sink: Sink::stderr(),
            runtime_kind,
        })
    }

    pub fn with_walker(mut self, walker: impl StackWalker + 'static) -> Self {
        self.walker = Arc::new(walker);
        self
    }

    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the default template new records are instantiated from.
    pub fn with_template(mut self, template: ErrorRecord) -> Self {
        self.template = template;
        self
    }

    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.template = self.template.with_debug_level(level);
        self
    }

    pub fn template(&self) -> &ErrorRecord {
        &self.template
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn runtime_kind(&self) -> &KindId {
        &self.runtime_kind
    }

    pub fn register_kind(&mut self, name: &str, parent: Option<&str>) -> Result<KindId> {
        self.kinds.register(name, parent)
    }

    pub fn is_kind_of(&self, kind: &KindId, ancestor: &KindId) -> bool {
        self.kinds.is_kind_of(kind, ancestor)
    }

    /// A new record of `kind` built from the template.
    pub fn error(&self, kind: impl Into<KindId>, message: impl Into<String>) -> ErrorRecord {
        self.template.instantiate(message).with_kind(kind)
    }

    /// Capture the calling thread's stack under `level`.
    pub fn capture(&self, level: DebugLevel) -> Option<StackSnapshot> {
        let _frame = walker::enter_internal("capture");
        walker::capture(level, self.walker.as_ref())
    }

    /// Raise `record`: capture a snapshot per its debug level and merge it
    /// into the stack already attached. Returns the raised record.
    pub fn raise(&self, record: ErrorRecord) -> ErrorRecord {
        self.raise_with(record, None)
    }

    /// Raise `record` again with one more line of context.
    pub fn rethrow(&self, record: ErrorRecord, line: impl Into<String>) -> ErrorRecord {
        self.raise_with(record, Some(line.into()))
    }

    fn raise_with(&self, record: ErrorRecord, line: Option<String>) -> ErrorRecord {
        let _frame = walker::enter_internal("raise");
        let captured = walker::capture(record.debug_level(), self.walker.as_ref());
        self.stamp(record, line, captured)
    }

    /// Raise `record` at a site that has already been unwound, capturing
    /// from `frames` instead of the live stack.
    pub(crate) fn raise_at(&self, record: ErrorRecord, frames: Vec<StackFrame>) -> ErrorRecord {
        let captured = walker::capture_frames(record.debug_level(), frames);
        self.stamp(record, None, captured)
    }

    /// Frames saved by the walker when this thread last began to unwind.
    pub(crate) fn unwound_frames(&self) -> Option<Vec<StackFrame>> {
        self.walker.unwound()
    }

    fn stamp(
        &self,
        record: ErrorRecord,
        line: Option<String>,
        captured: Option<StackSnapshot>,
    ) -> ErrorRecord {
        tracing::trace!(
            kind = %record.kind(),
            level = %record.debug_level(),
            frames = captured.as_ref().map(StackSnapshot::len),
            "raise"
        );
        record.raised(line, captured)
    }

    /// Raise `record` and unwind with it as the panic payload.
    pub fn throw(&self, record: ErrorRecord) -> ! {
        std::panic::panic_any(self.raise(record))
    }

    /// Run the record's display chain against this context's sink.
    pub fn display(&self, error: &ErrorRecord) {
        error.display_chain().run(error, &self.sink);
    }

    /// Top-level delivery: display the error and return its exit status.
    pub fn deliver(&self, error: &ErrorRecord) -> ExitCode {
        tracing::debug!(kind = %error.kind(), exit_code = error.exit_code(), "delivering error");
        self.display(error);
        ExitCode::from(error.exit_status())
    }

    /// Display the error and terminate the process with its exit status.
    pub fn die(&self, error: &ErrorRecord) -> ! {
        self.deliver(error);
        std::process::exit(i32::from(error.exit_status()))
    }

    /// Run `f` with this thread's context.
    ///
    /// Calls may nest. Replacing the context from inside `f` panics.
    pub fn with_current<R>(f: impl FnOnce(&Context) -> R) -> R {
        CURRENT.with(|ctx| f(&ctx.borrow()))
    }

    /// Install `ctx` as this thread's context, returning the previous one.
    pub fn set_current(ctx: Context) -> Context {
        CURRENT.with(|current| current.replace(ctx))
    }
}

fn template_from(config: &ContextConfig) -> ErrorRecord {
    ErrorRecord::new(KindId::unknown())
        .with_debug_level(config.debug_level)
        .with_exit_code(config.exit_code)
        .with_max_arg_len(config.max_arg_len)
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("template", &self.template)
            .field("kinds", &self.kinds.len())
            .field("runtime_kind", &self.runtime_kind)
            .finish()
    }
}

/// Raise `record` through this thread's context and unwind with it.
pub fn throw(record: ErrorRecord) -> ! {
    let raised = Context::with_current(|ctx| ctx.raise(record));
    std::panic::panic_any(raised)
}

/// Build a record from the thread's context and unwind with it.
///
/// ```should_panic
/// exkit_core::raise!("io", "cannot open {}", "settings.toml");
/// ```
#[macro_export]
macro_rules! raise {
    ($kind:expr, $($arg:tt)+) => {
        $crate::throw($crate::Context::with_current(|ctx| {
            ctx.error($kind, ::std::format!($($arg)+))
        }))
    };
}
