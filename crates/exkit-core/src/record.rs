//! The structured error value.

use serde::Serialize;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strum_macros::{Display, IntoStaticStr};

use crate::display::{DisplayChain, DisplayHandler};
use crate::kind::KindId;
use crate::level::DebugLevel;
use crate::snapshot::{StackSnapshot, merge_stacks};
use crate::value::{Properties, PropertyValue};

/// Exit status used when nothing else is configured.
pub const DEFAULT_EXIT_CODE: i32 = 255;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Explicitly constructed and raised by user code.
    UserRaised,
    /// A native failure (panic or foreign error) normalized by the engine.
    RuntimeRaised,
    /// A handler clause or finally callable failed during dispatch.
    HandlerFailure,
}

/// Opaque process metadata stamped on a record when it is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    timestamp: SystemTime,
    pid: u32,
    thread: String,
}

impl Provenance {
    pub fn capture() -> Self {
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        Self {
            timestamp: SystemTime::now(),
            pid: std::process::id(),
            thread,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn thread(&self) -> &str {
        &self.thread
    }

    fn unix_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// How much of a record [`ErrorRecord::render`] shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Verbosity {
    /// Kind and first message line.
    Brief,
    /// Every message line, the identifier and the properties.
    Full,
    /// `Full` plus the captured stack.
    Trace,
}

impl Verbosity {
    /// Verbosity the default display uses for a record at `level`.
    pub fn for_level(level: DebugLevel) -> Self {
        match level {
            DebugLevel::None => Verbosity::Full,
            _ => Verbosity::Trace,
        }
    }
}

/// A structured error.
///
/// Records are values. Raising or re-raising produces a new record (see
/// `Context::raise`), so a record already handed to a handler never changes
/// under it. `kind`, `id`, `debug_level`, the display chain, `exit_code` and
/// the display cap are template values: [`ErrorRecord::instantiate`] copies
/// them into a fresh record.
#[derive(Clone)]
pub struct ErrorRecord {
    kind: KindId,
    id: Option<String>,
    lines: Vec<String>,
    properties: Arc<Properties>,
    stack: Option<StackSnapshot>,
    debug_level: DebugLevel,
    display_chain: DisplayChain,
    exit_code: i32,
    max_arg_len: usize,
    origin: Origin,
    provenance: Provenance,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<KindId>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            lines: Vec::new(),
            properties: Arc::new(Properties::new()),
            stack: None,
            debug_level: DebugLevel::default(),
            display_chain: DisplayChain::default(),
            exit_code: DEFAULT_EXIT_CODE,
            max_arg_len: 0,
            origin: Origin::UserRaised,
            provenance: Provenance::capture(),
        }
    }

    /// A fresh record sharing this record's template values, with `message`
    /// as its only line. Properties, stack and provenance start over.
    pub fn instantiate(&self, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: self.kind.clone(),
            id: self.id.clone(),
            lines: if message.is_empty() { Vec::new() } else { vec![message] },
            properties: Arc::new(Properties::new()),
            stack: None,
            debug_level: self.debug_level,
            display_chain: self.display_chain.clone(),
            exit_code: self.exit_code,
            max_arg_len: self.max_arg_len,
            origin: Origin::UserRaised,
            provenance: Provenance::capture(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<KindId>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Arc::make_mut(&mut self.properties).insert(key.into(), value.into());
        self
    }

    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Cap, in characters, on rendered property values. 0 means no cap.
    pub fn with_max_arg_len(mut self, len: usize) -> Self {
        self.max_arg_len = len;
        self
    }

    /// Register a display handler; it runs before the ones already present.
    pub fn with_display(mut self, handler: impl DisplayHandler + 'static) -> Self {
        self.display_chain.push(handler);
        self
    }

    pub fn with_display_chain(mut self, chain: DisplayChain) -> Self {
        self.display_chain = chain;
        self
    }

    pub fn with_stack(mut self, stack: Option<StackSnapshot>) -> Self {
        self.stack = stack;
        self
    }

    pub(crate) fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn kind(&self) -> &KindId {
        &self.kind
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All message lines joined by newlines.
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn stack(&self) -> Option<&StackSnapshot> {
        self.stack.as_ref()
    }

    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    pub fn display_chain(&self) -> &DisplayChain {
        &self.display_chain
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Process exit status for the exit code; codes outside 0 to 255 map to 255.
    pub fn exit_status(&self) -> u8 {
        u8::try_from(self.exit_code).unwrap_or(u8::MAX)
    }

    pub fn max_arg_len(&self) -> usize {
        self.max_arg_len
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// One raise event: optionally append a line, merge `captured` into the
    /// attached stack.
    pub(crate) fn raised(mut self, line: Option<String>, captured: Option<StackSnapshot>) -> Self {
        if let Some(line) = line {
            self.lines.push(line);
        }
        self.stack = merge_stacks(self.stack.as_ref(), captured.as_ref());
        self
    }

    /// Fold a failure that happened while this one was already carried.
    ///
    /// Lines are this record's followed by `later`'s; stacks are merged with
    /// this record's stack as the older one. Everything else stays this
    /// record's.
    pub fn absorb(mut self, later: &ErrorRecord) -> Self {
        self.lines.extend(later.lines.iter().cloned());
        self.stack = merge_stacks(self.stack.as_ref(), later.stack.as_ref());
        self
    }

    /// Human-readable text at the requested verbosity.
    pub fn render(&self, verbosity: Verbosity) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.render_into(&mut out, verbosity);
        out
    }

    fn render_into(&self, out: &mut String, verbosity: Verbosity) -> fmt::Result {
        let first = self.lines.first().map(String::as_str).unwrap_or("(no message)");
        if self.kind.is_unknown() {
            write!(out, "{first}")?;
        } else {
            write!(out, "{}: {first}", self.kind)?;
        }
        if verbosity == Verbosity::Brief {
            return Ok(());
        }

        for line in self.lines.iter().skip(1) {
            write!(out, "\n  | {line}")?;
        }
        if let Some(id) = &self.id {
            write!(out, "\n  id = {id}")?;
        }
        for (key, value) in self.properties.iter() {
            write!(out, "\n  {key} = {}", clip(&value.to_string(), self.max_arg_len))?;
        }
        if verbosity == Verbosity::Full {
            return Ok(());
        }

        if let Some(stack) = &self.stack {
            for frame in stack.iter().rev() {
                write!(out, "\n    at {frame}")?;
            }
        }
        Ok(())
    }

    /// Serializable view used by JSON displays.
    pub fn to_json(&self) -> serde_json::Value {
        let view = RecordView {
            kind: &self.kind,
            id: self.id.as_deref(),
            lines: &self.lines,
            properties: &self.properties,
            stack: self.stack.as_ref(),
            debug_level: self.debug_level,
            exit_code: self.exit_code,
            origin: self.origin,
            timestamp_ms: self.provenance.unix_millis(),
            pid: self.provenance.pid,
            thread: &self.provenance.thread,
        };
        serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Serialize)]
struct RecordView<'a> {
    kind: &'a KindId,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    lines: &'a [String],
    properties: &'a Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a StackSnapshot>,
    debug_level: DebugLevel,
    exit_code: i32,
    origin: Origin,
    timestamp_ms: u64,
    pid: u32,
    thread: &'a str,
}

fn clip(text: &str, max: usize) -> String {
    if max == 0 || text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max).collect();
    clipped.push_str("...");
    clipped
}

impl fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("lines", &self.lines)
            .field("properties", &self.properties)
            .field("stack", &self.stack.as_ref().map(StackSnapshot::len))
            .field("debug_level", &self.debug_level)
            .field("exit_code", &self.exit_code)
            .field("origin", &self.origin)
            .finish()
    }
}
