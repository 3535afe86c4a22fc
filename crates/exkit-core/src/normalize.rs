//! Turning raw failures into records.

use std::any::Any;
use std::fmt;

use crate::context::Context;
use crate::record::{ErrorRecord, Origin};

/// A failure that reached the engine in some form other than a record.
pub enum RawFailure {
    /// Payload recovered from an unwind.
    Panic(Box<dyn Any + Send>),
    /// A foreign error value.
    Error(Box<dyn std::error::Error + Send + Sync>),
    /// Bare failure text.
    Message(String),
}

impl RawFailure {
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RawFailure::Error(Box::new(err))
    }
}

impl From<Box<dyn Any + Send>> for RawFailure {
    fn from(payload: Box<dyn Any + Send>) -> Self {
        RawFailure::Panic(payload)
    }
}

impl From<String> for RawFailure {
    fn from(message: String) -> Self {
        RawFailure::Message(message)
    }
}

impl From<&str> for RawFailure {
    fn from(message: &str) -> Self {
        RawFailure::Message(message.to_string())
    }
}

impl fmt::Debug for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawFailure::Panic(_) => f.write_str("Panic(..)"),
            RawFailure::Error(err) => write!(f, "Error({err})"),
            RawFailure::Message(message) => write!(f, "Message({message:?})"),
        }
    }
}

impl Context {
    /// Normalize a raw failure into a record.
    ///
    /// A panic whose payload already is an [`ErrorRecord`] yields that record
    /// untouched. Anything else becomes a new record of the runtime kind,
    /// instantiated from the template. A panic is raised at the frames the
    /// walker saved when the unwind began; other failures are raised from here.
    pub fn normalize(&self, raw: impl Into<RawFailure>) -> ErrorRecord {
        self.normalize_as(raw.into(), Origin::RuntimeRaised)
    }

    pub(crate) fn normalize_as(&self, raw: RawFailure, origin: Origin) -> ErrorRecord {
        let mut unwound = None;
        let lines = match raw {
            RawFailure::Panic(payload) => {
                // taken even for records so the next panic starts clean
                unwound = self.unwound_frames();
                match payload.downcast::<ErrorRecord>() {
                    Ok(record) => return *record,
                    Err(payload) => vec![panic_message(payload.as_ref())],
                }
            }
            RawFailure::Error(err) => {
                let mut lines = vec![err.to_string()];
                let mut source = err.source();
                while let Some(cause) = source {
                    lines.push(format!("caused by: {cause}"));
                    source = cause.source();
                }
                lines
            }
            RawFailure::Message(message) => vec![message],
        };

        let mut lines = lines.into_iter();
        let first = lines.next().unwrap_or_default();
        let record = lines.fold(
            self.template()
                .instantiate(first)
                .with_kind(self.runtime_kind().clone())
                .with_origin(origin),
            |record, line| record.with_line(line),
        );
        tracing::debug!(
            %origin,
            kind = %record.kind(),
            unwound = unwound.is_some(),
            "normalized raw failure"
        );
        match unwound {
            Some(frames) => self.raise_at(record, frames),
            None => self.raise(record),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
