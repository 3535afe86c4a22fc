//! Call-stack introspection and the capture policy.
//!
//! The engine does not walk the native stack itself. It asks a
//! [`StackWalker`] for the current frames and applies the policy selected by
//! a [`DebugLevel`]. [`ShadowStack`] is the built-in walker: a per-thread
//! stack of frames pushed by RAII guards ([`enter`], [`frame!`]).
//!
//! [`frame!`]: crate::frame

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::frame::StackFrame;
use crate::level::DebugLevel;
use crate::snapshot::StackSnapshot;

/// Source of call-stack frames for the calling thread.
pub trait StackWalker: Send + Sync {
    /// Frames of the calling thread, oldest caller first.
    fn walk(&self) -> Vec<StackFrame>;

    /// Frames that were live where the calling thread last started to
    /// unwind, if the walker kept them. Taking them clears them.
    fn unwound(&self) -> Option<Vec<StackFrame>> {
        None
    }
}

thread_local! {
    static SHADOW: RefCell<Vec<StackFrame>> = const { RefCell::new(Vec::new()) };
    // frames at the panic site, saved by the first guard dropped while unwinding
    static UNWOUND: RefCell<Option<Vec<StackFrame>>> = const { RefCell::new(None) };
}

/// Walker over the thread-local frame stack maintained by [`enter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowStack;

impl StackWalker for ShadowStack {
    fn walk(&self) -> Vec<StackFrame> {
        SHADOW.with(|frames| frames.borrow().clone())
    }

    fn unwound(&self) -> Option<Vec<StackFrame>> {
        UNWOUND.with(|unwound| unwound.borrow_mut().take())
    }
}

impl ShadowStack {
    /// Number of frames currently pushed on this thread.
    pub fn depth() -> usize {
        SHADOW.with(|frames| frames.borrow().len())
    }
}

/// Pops the frame pushed by [`enter`] when dropped, including during unwind.
///
/// The first guard dropped by an unwind saves the whole stack first, so the
/// panic site can still be captured once the panic is caught.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    depth: usize,
    // tied to the thread whose shadow stack it pushed onto
    _thread: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        SHADOW.with(|frames| {
            let mut frames = frames.borrow_mut();
            if std::thread::panicking() {
                UNWOUND.with(|unwound| {
                    unwound.borrow_mut().get_or_insert_with(|| frames.to_vec());
                });
            }
            frames.truncate(self.depth);
        });
    }
}

/// Push `frame` onto this thread's shadow stack until the guard drops.
///
/// Outside an unwind this also forgets frames left over from an earlier
/// panic that nobody normalized.
pub fn enter(frame: StackFrame) -> FrameGuard {
    if !std::thread::panicking() {
        UNWOUND.with(|unwound| unwound.borrow_mut().take());
    }
    SHADOW.with(|frames| {
        let mut frames = frames.borrow_mut();
        let depth = frames.len();
        frames.push(frame);
        FrameGuard {
            depth,
            _thread: PhantomData,
        }
    })
}

/// Push an engine-internal frame.
pub(crate) fn enter_internal(activation: &'static str) -> FrameGuard {
    enter(StackFrame::internal(activation))
}

/// Push a frame for the current call-site onto the shadow stack.
///
/// ```
/// fn load_config() {
///     let _frame = exkit_core::frame!("load_config");
///     // frames raised from here on include `load_config`
/// }
/// ```
#[macro_export]
macro_rules! frame {
    ($activation:expr) => {
        $crate::walker::enter($crate::StackFrame::new(
            ::std::module_path!(),
            ::std::file!(),
            ::std::line!(),
            $activation,
        ))
    };
    ($activation:expr, args) => {
        $crate::walker::enter(
            $crate::StackFrame::new(
                ::std::module_path!(),
                ::std::file!(),
                ::std::line!(),
                $activation,
            )
            .with_arguments(true),
        )
    };
}

/// Apply the capture policy for `level` to the frames reported by `walker`.
pub fn capture(level: DebugLevel, walker: &dyn StackWalker) -> Option<StackSnapshot> {
    if level == DebugLevel::None {
        return None;
    }

    capture_frames(level, walker.walk())
}

/// Apply the capture policy for `level` to `frames`, oldest first.
pub fn capture_frames(level: DebugLevel, frames: Vec<StackFrame>) -> Option<StackSnapshot> {
    let snapshot = match level {
        DebugLevel::None => return None,
        DebugLevel::Context => {
            // innermost frame outside the engine, else whatever is innermost
            let site = frames
                .iter()
                .rev()
                .find(|frame| !frame.is_internal())
                .or_else(|| frames.last())
                .cloned();
            StackSnapshot::new(site.into_iter().collect())
        }
        DebugLevel::Stack => frames
            .into_iter()
            .filter(|frame| !frame.is_internal())
            .collect(),
        DebugLevel::All => StackSnapshot::new(frames),
    };
    Some(snapshot)
}
