//! Tracking Context
//!
//! Two thread-local stacks record which effect and which computed getter are
//! currently executing. Interception paths consult the stack tops to decide
//! who subscribes to a read. The stacks are per-thread: the engine assumes a
//! single logical executor, and an executor's frames are never visible to
//! another thread.
//!
//! Frames are scoped guards — pushed on entry, popped on drop — so the
//! stacks unwind correctly even when a callback or getter panics.

use std::cell::RefCell;

use super::computed::Computed;
use super::effect::{Effect, EffectId};
use crate::graph::TargetId;

thread_local! {
    static EFFECT_STACK: RefCell<Vec<Effect>> = RefCell::new(Vec::new());
    static COMPUTED_STACK: RefCell<Vec<Computed>> = RefCell::new(Vec::new());
}

/// The effect currently being (initially) run by the watch API, if any.
pub(crate) fn current_effect() -> Option<Effect> {
    EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// The computed whose getter is currently executing, if any.
pub(crate) fn current_computed() -> Option<Computed> {
    COMPUTED_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Guard marking an effect as current for the duration of its initial run.
pub(crate) struct EffectFrame {
    id: EffectId,
}

impl EffectFrame {
    pub(crate) fn enter(effect: Effect) -> Self {
        let id = effect.id();
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect));
        Self { id }
    }
}

impl Drop for EffectFrame {
    fn drop(&mut self) {
        EFFECT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(effect) = popped {
                debug_assert_eq!(
                    effect.id(),
                    self.id,
                    "effect frame mismatch: expected {:?}, got {:?}",
                    self.id,
                    effect.id()
                );
            }
        });
    }
}

/// Guard marking a computed as current while its getter runs.
pub(crate) struct ComputedFrame {
    id: TargetId,
}

impl ComputedFrame {
    pub(crate) fn enter(computed: Computed) -> Self {
        let id = computed.id();
        COMPUTED_STACK.with(|stack| stack.borrow_mut().push(computed));
        Self { id }
    }
}

impl Drop for ComputedFrame {
    fn drop(&mut self) {
        COMPUTED_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(computed) = popped {
                debug_assert_eq!(
                    computed.id(),
                    self.id,
                    "computed frame mismatch: expected {:?}, got {:?}",
                    self.id,
                    computed.id()
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn effect_frame_tracks_current() {
        assert!(current_effect().is_none());

        let effect = Effect::new(|_| {});
        {
            let _frame = EffectFrame::enter(effect.clone());
            assert_eq!(current_effect().map(|e| e.id()), Some(effect.id()));
        }

        assert!(current_effect().is_none());
    }

    #[test]
    fn nested_effect_frames_restore_previous() {
        let outer = Effect::new(|_| {});
        let inner = Effect::new(|_| {});

        let _outer_frame = EffectFrame::enter(outer.clone());
        {
            let _inner_frame = EffectFrame::enter(inner.clone());
            assert_eq!(current_effect().map(|e| e.id()), Some(inner.id()));
        }
        assert_eq!(current_effect().map(|e| e.id()), Some(outer.id()));
    }

    #[test]
    fn computed_frame_tracks_current() {
        assert!(current_computed().is_none());

        let computed = Computed::new(|_| Value::Nil);
        {
            let _frame = ComputedFrame::enter(computed.clone());
            assert_eq!(current_computed().map(|c| c.id()), Some(computed.id()));
        }

        assert!(current_computed().is_none());
    }

    #[test]
    fn frames_unwind_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _frame = EffectFrame::enter(Effect::new(|_| {}));
            let _inner = ComputedFrame::enter(Computed::new(|_| Value::Nil));
            panic!("boom");
        });

        assert!(result.is_err());
        assert!(current_effect().is_none());
        assert!(current_computed().is_none());
    }
}
