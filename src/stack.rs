//! Stack growth for the recursive parser and evaluator.
//!
//! Nesting is bounded by the expression length limit and
//! [`crate::EvaluatorConfig::max_depth`], but a few thousand levels of
//! recursive descent can still exhaust a small thread stack. Recursive entry
//! points run through [`ensure_sufficient_stack`], which moves onto a freshly
//! allocated segment when the remaining stack drops below the red zone.

/// Grow when less than this much stack is left.
#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[cfg(not(target_arch = "wasm32"))]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(target_arch = "wasm32")]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
