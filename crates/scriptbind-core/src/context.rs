//! Per-call view handed to native thunks.

use std::fmt;

use crate::error::NativeError;
use crate::heap::ObjectHeap;
use crate::value::ScriptValue;

/// Context for a native call.
///
/// Provides access to the argument slots, the return slot, and the object
/// heap. For method calls slot 0 holds the receiver and arguments start at
/// slot 1.
pub struct CallContext<'rt> {
    /// Receiver and argument slots
    slots: &'rt mut [ScriptValue],
    /// Index of first argument (0 for functions, 1 for methods where 0 is `this`)
    arg_offset: usize,
    /// Return value slot
    return_slot: &'rt mut ScriptValue,
    /// Object heap for reference type access
    heap: &'rt mut ObjectHeap,
}

impl<'rt> CallContext<'rt> {
    /// Create a new call context.
    pub fn new(
        slots: &'rt mut [ScriptValue],
        arg_offset: usize,
        return_slot: &'rt mut ScriptValue,
        heap: &'rt mut ObjectHeap,
    ) -> Self {
        Self {
            slots,
            arg_offset,
            return_slot,
            heap,
        }
    }

    /// Number of script arguments, excluding the receiver.
    pub fn arg_count(&self) -> usize {
        self.slots.len().saturating_sub(self.arg_offset)
    }

    /// Whether slot 0 holds a receiver.
    pub fn is_method(&self) -> bool {
        self.arg_offset > 0
    }

    /// All argument slots, excluding the receiver.
    pub fn args(&self) -> &[ScriptValue] {
        self.slots.get(self.arg_offset..).unwrap_or(&[])
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&ScriptValue, NativeError> {
        let slot_index = self.arg_offset + index;
        self.slots.get(slot_index).ok_or(NativeError::ArgumentIndexOutOfBounds {
            index,
            count: self.arg_count(),
        })
    }

    /// Get a mutable reference to an argument slot.
    pub fn arg_slot_mut(&mut self, index: usize) -> Result<&mut ScriptValue, NativeError> {
        let slot_index = self.arg_offset + index;
        let count = self.arg_count();
        self.slots
            .get_mut(slot_index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })
    }

    /// Borrow an argument slot together with the heap.
    ///
    /// Write-back of by-reference arguments needs both at once.
    pub fn arg_slot_and_heap(
        &mut self,
        index: usize,
    ) -> Result<(&mut ScriptValue, &mut ObjectHeap), NativeError> {
        let slot_index = self.arg_offset + index;
        let count = self.arg_count();
        let slot = self
            .slots
            .get_mut(slot_index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })?;
        Ok((slot, &mut *self.heap))
    }

    /// Get the receiver slot for method calls.
    pub fn receiver(&self) -> Result<&ScriptValue, NativeError> {
        if self.arg_offset == 0 {
            return Err(NativeError::invalid_this("not a method call"));
        }
        self.slots
            .first()
            .ok_or_else(|| NativeError::invalid_this("missing receiver slot"))
    }

    /// Set the return value.
    pub fn set_return(&mut self, value: ScriptValue) {
        *self.return_slot = value;
    }

    /// Current contents of the return slot.
    pub fn return_value(&self) -> &ScriptValue {
        self.return_slot
    }

    /// Get access to the object heap.
    pub fn heap(&self) -> &ObjectHeap {
        self.heap
    }

    /// Get mutable access to the object heap.
    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        self.heap
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arg_count", &self.arg_count())
            .field("arg_offset", &self.arg_offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeHash;

    #[test]
    fn function_args() {
        let mut slots = vec![ScriptValue::Int(1), ScriptValue::Bool(true)];
        let mut ret = ScriptValue::Undefined;
        let mut heap = ObjectHeap::new();
        let ctx = CallContext::new(&mut slots, 0, &mut ret, &mut heap);

        assert_eq!(ctx.arg_count(), 2);
        assert!(!ctx.is_method());
        assert_eq!(ctx.arg_slot(1).unwrap(), &ScriptValue::Bool(true));
        assert!(matches!(
            ctx.arg_slot(2),
            Err(NativeError::ArgumentIndexOutOfBounds { index: 2, count: 2 })
        ));
        assert!(ctx.receiver().is_err());
    }

    #[test]
    fn method_receiver_offset() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(TypeHash::from_name("Counter"), 0i32);
        let mut slots = vec![ScriptValue::Object(handle), ScriptValue::Int(5)];
        let mut ret = ScriptValue::Undefined;
        let ctx = CallContext::new(&mut slots, 1, &mut ret, &mut heap);

        assert_eq!(ctx.arg_count(), 1);
        assert_eq!(ctx.args(), &[ScriptValue::Int(5)]);
        assert_eq!(ctx.receiver().unwrap(), &ScriptValue::Object(handle));
    }

    #[test]
    fn return_and_write_back() {
        let mut slots = vec![ScriptValue::Int(1)];
        let mut ret = ScriptValue::Undefined;
        let mut heap = ObjectHeap::new();
        {
            let mut ctx = CallContext::new(&mut slots, 0, &mut ret, &mut heap);
            let (slot, heap) = ctx.arg_slot_and_heap(0).unwrap();
            *slot = ScriptValue::Int(heap.live_count() as i64 + 9);
            ctx.set_return(ScriptValue::String("done".into()));
        }
        assert_eq!(slots[0], ScriptValue::Int(9));
        assert_eq!(ret, ScriptValue::String("done".into()));
    }
}
