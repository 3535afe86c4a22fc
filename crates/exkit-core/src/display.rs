//! Display handlers and the output sink they write to.
//!
//! A record carries a [`DisplayChain`]. Showing a record runs every handler
//! in the chain, last registered first, against the caller's [`Sink`].
//! Display is fire-and-forget: a handler that fails is logged and skipped,
//! and nothing raised while displaying ever reaches a dispatcher.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::record::{ErrorRecord, Verbosity};

/// Writes a representation of an error to an output stream.
pub trait DisplayHandler: Send + Sync {
    fn display(&self, error: &ErrorRecord, out: &mut dyn Write) -> io::Result<()>;
}

/// Renders the record as text, with a stack trace unless capture is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDisplay;

impl DisplayHandler for TextDisplay {
    fn display(&self, error: &ErrorRecord, out: &mut dyn Write) -> io::Result<()> {
        let text = error.render(Verbosity::for_level(error.debug_level()));
        writeln!(out, "{text}")
    }
}

/// Writes the record as one JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDisplay;

impl DisplayHandler for JsonDisplay {
    fn display(&self, error: &ErrorRecord, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, &error.to_json()).map_err(io::Error::other)?;
        writeln!(out)
    }
}

/// Ordered display handlers; the most recently pushed runs first.
#[derive(Clone)]
pub struct DisplayChain {
    handlers: Vec<Arc<dyn DisplayHandler>>,
}

impl Default for DisplayChain {
    /// A chain holding only [`TextDisplay`].
    fn default() -> Self {
        Self {
            handlers: vec![Arc::new(TextDisplay)],
        }
    }
}

impl DisplayChain {
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn push(&mut self, handler: impl DisplayHandler + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler against `sink`. Returns how many succeeded.
    pub fn run(&self, error: &ErrorRecord, sink: &Sink) -> usize {
        let mut shown = 0;
        for (index, handler) in self.handlers.iter().enumerate().rev() {
            let result = catch_unwind(AssertUnwindSafe(|| {
                sink.write_with(|out| handler.display(error, out))
            }));
            match result {
                Ok(Ok(())) => shown += 1,
                Ok(Err(err)) => {
                    tracing::warn!(handler = index, error = %err, "display handler failed");
                }
                Err(_) => {
                    tracing::warn!(handler = index, "display handler panicked");
                }
            }
        }
        shown
    }
}

impl fmt::Debug for DisplayChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Shared, caller-supplied error output stream.
#[derive(Clone)]
pub struct Sink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Sink {
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// A sink writing into memory, plus a handle to read what was written.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::from_writer(buffer.clone()), buffer)
    }

    /// Run `f` with exclusive access to the stream, then flush it.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut dyn Write) -> io::Result<R>) -> io::Result<R> {
        let mut out = self.inner.lock();
        let result = f(&mut **out)?;
        out.flush()?;
        Ok(result)
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sink")
    }
}

/// In-memory writer whose contents can be read back.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::DebugLevel;

    struct Tag(&'static str);

    impl DisplayHandler for Tag {
        fn display(&self, _error: &ErrorRecord, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "{}", self.0)
        }
    }

    struct Broken;

    impl DisplayHandler for Broken {
        fn display(&self, _error: &ErrorRecord, _out: &mut dyn Write) -> io::Result<()> {
            Err(io::Error::other("sink closed"))
        }
    }

    struct Exploding;

    impl DisplayHandler for Exploding {
        fn display(&self, _error: &ErrorRecord, _out: &mut dyn Write) -> io::Result<()> {
            panic!("display exploded");
        }
    }

    #[test]
    fn test_last_registered_runs_first() {
        let (sink, buffer) = Sink::buffer();
        let mut chain = DisplayChain::empty();
        chain.push(Tag("first"));
        chain.push(Tag("second"));
        let shown = chain.run(&ErrorRecord::new("io"), &sink);
        assert_eq!(shown, 2);
        assert_eq!(buffer.contents(), "second\nfirst\n");
    }

    #[test]
    fn test_failing_handlers_are_swallowed() {
        let (sink, buffer) = Sink::buffer();
        let mut chain = DisplayChain::empty();
        chain.push(Tag("kept"));
        chain.push(Broken);
        chain.push(Exploding);
        let shown = chain.run(&ErrorRecord::new("io"), &sink);
        assert_eq!(shown, 1);
        assert_eq!(buffer.contents(), "kept\n");
    }

    #[test]
    fn test_text_display_uses_debug_level() {
        let (sink, buffer) = Sink::buffer();
        let err = ErrorRecord::new("io")
            .with_line("cannot open file")
            .with_debug_level(DebugLevel::None);
        DisplayChain::default().run(&err, &sink);
        assert_eq!(buffer.contents(), "io: cannot open file\n");
    }

    #[test]
    fn test_json_display_writes_one_line() {
        let (sink, buffer) = Sink::buffer();
        let err = ErrorRecord::new("io")
            .with_line("cannot open file")
            .with_display_chain(DisplayChain::empty())
            .with_display(JsonDisplay);
        err.display_chain().run(&err, &sink);
        let text = buffer.contents();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["lines"][0], "cannot open file");
    }
}
