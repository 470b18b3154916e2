//! Managed-code callback bridge
//!
//! Scripts register callbacks and receive a generation-checked
//! `CallbackHandle`. Invoking a callback sends a `CallbackMessage` to the
//! `CallbackSink` that fronts the scripting runtime. Invocations are
//! fire-and-forget: a stale or null handle is logged and dropped.

use slotmap::{new_key_type, Key, SlotMap};
use crate::engine_warn;

const SOURCE: &str = "ember3d::Callback";

new_key_type! {
    /// Registered managed callback
    pub struct CallbackHandle;
}

/// Argument passed to a managed callback
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackArg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<i64> for CallbackArg {
    fn from(value: i64) -> Self {
        CallbackArg::Int(value)
    }
}

impl From<f64> for CallbackArg {
    fn from(value: f64) -> Self {
        CallbackArg::Float(value)
    }
}

impl From<bool> for CallbackArg {
    fn from(value: bool) -> Self {
        CallbackArg::Bool(value)
    }
}

impl From<String> for CallbackArg {
    fn from(value: String) -> Self {
        CallbackArg::Text(value)
    }
}

impl From<&str> for CallbackArg {
    fn from(value: &str) -> Self {
        CallbackArg::Text(value.to_string())
    }
}

impl From<Vec<u8>> for CallbackArg {
    fn from(value: Vec<u8>) -> Self {
        CallbackArg::Bytes(value)
    }
}

/// One invocation crossing into managed code
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackMessage {
    pub handle: CallbackHandle,
    pub name: String,
    pub arg: Option<CallbackArg>,
}

/// Receiving end of the bridge (the scripting runtime)
pub trait CallbackSink {
    fn dispatch(&mut self, message: CallbackMessage);
}

/// Sink that discards every message
#[derive(Debug, Default)]
pub struct NullCallbackSink;

impl CallbackSink for NullCallbackSink {
    fn dispatch(&mut self, _message: CallbackMessage) {}
}

/// Registered callbacks and the sink they are delivered to
pub struct CallbackRegistry {
    callbacks: SlotMap<CallbackHandle, String>,
    sink: Box<dyn CallbackSink>,
    dropped: u64,
}

impl CallbackRegistry {
    pub fn new(sink: Box<dyn CallbackSink>) -> Self {
        Self {
            callbacks: SlotMap::with_key(),
            sink,
            dropped: 0,
        }
    }

    pub fn register(&mut self, name: impl Into<String>) -> CallbackHandle {
        self.callbacks.insert(name.into())
    }

    /// Returns `false` if the handle was already gone
    pub fn unregister(&mut self, handle: CallbackHandle) -> bool {
        self.callbacks.remove(handle).is_some()
    }

    pub fn contains(&self, handle: CallbackHandle) -> bool {
        self.callbacks.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invocations dropped because of stale or null handles
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Deliver an invocation. Returns `false` when it was dropped.
    pub fn dispatch(&mut self, handle: CallbackHandle, arg: Option<CallbackArg>) -> bool {
        let Some(name) = self.callbacks.get(handle) else {
            self.dropped += 1;
            if handle.is_null() {
                engine_warn!(SOURCE, "Invoked a null callback handle, ignoring");
            } else {
                engine_warn!(SOURCE, "Invoked a stale callback handle {:?}, ignoring", handle);
            }
            return false;
        };

        self.sink.dispatch(CallbackMessage {
            handle,
            name: name.clone(),
            arg,
        });
        true
    }
}

/// Handle to a managed callback held by native code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagedCallback {
    handle: CallbackHandle,
}

impl ManagedCallback {
    pub fn new(handle: CallbackHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> CallbackHandle {
        self.handle
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    pub fn invoke(&self, registry: &mut CallbackRegistry) {
        registry.dispatch(self.handle, None);
    }

    pub fn invoke_with(&self, registry: &mut CallbackRegistry, arg: impl Into<CallbackArg>) {
        registry.dispatch(self.handle, Some(arg.into()));
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
