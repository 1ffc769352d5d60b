//! Module closures exposed to the host.

use crate::abi::WasmValue;
use crate::bridge::Bridge;
use crate::error::{BridgeError, CallError};
use crate::imports::ImportKind;
use closure_adapter::{wrap, AdapterSpec, ArgPassing, ClosureState, ClosureTarget, WrappedClosure};
use core_types::{ErrorKind, HostResult, HostValue};
use std::rc::Rc;

/// The closure behind a host function created by a closure wrapper import.
pub fn wrapped_closure(value: &HostValue) -> Option<Rc<WrappedClosure>> {
    match value {
        HostValue::Function(function) => function
            .attachment()
            .and_then(|attachment| Rc::clone(attachment).downcast::<WrappedClosure>().ok()),
        _ => None,
    }
}

impl Bridge {
    /// Registers a closure wrapper import.
    ///
    /// The import takes `(context, env, _)` and returns a handle to a host
    /// function that calls into the module through `spec`.
    ///
    /// # Examples
    ///
    /// ```
    /// use closure_adapter::AdapterSpec;
    /// use host_bridge::{Bridge, BridgeConfig};
    ///
    /// let bridge = Bridge::new(BridgeConfig::default());
    /// bridge
    ///     .register_closure_adapter("closure_wrapper40", AdapterSpec::reusable(1, 233))
    ///     .unwrap();
    /// assert!(bridge.has_import("closure_wrapper40"));
    /// ```
    pub fn register_closure_adapter(&self, name: &str, spec: AdapterSpec) -> Result<(), BridgeError> {
        self.register_import(name, ImportKind::Plain, move |bridge, args| {
            let function = bridge.wrap_closure(spec, args.u32(0)?, args.u32(1)?);
            Ok(Some(WasmValue::from_handle(
                bridge.acquire(HostValue::Function(function)),
            )))
        })
    }

    /// Wraps `(context, env)` as a host function.
    pub fn wrap_closure(&self, spec: AdapterSpec, context: u32, env: u32) -> core_types::HostFunction {
        let bridge = self.weak();
        wrap(
            ClosureState::new(spec, context, env),
            Some(self.finalizers()),
            move || bridge.upgrade(),
        )
    }
}

impl ClosureTarget for Bridge {
    fn call(
        &self,
        spec: &AdapterSpec,
        context: u32,
        env: u32,
        args: &[HostValue],
    ) -> HostResult<HostValue> {
        let exports = self
            .exports()
            .map_err(|err| CallError::from(err).into_thrown())?;
        let mut scope = self.borrow_scope();
        let handles = match spec.args {
            ArgPassing::Borrowed => args
                .iter()
                .map(|arg| scope.push(arg.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| HostValue::error(ErrorKind::RangeError, &err.to_string()))?,
            ArgPassing::Owned => args.iter().map(|arg| self.to_handle(arg.clone())).collect(),
        };
        exports
            .invoke_closure(spec.invoke, context, env, &handles)
            .map_err(CallError::into_thrown)?;
        Ok(HostValue::Undefined)
    }

    fn destroy(&self, destructor: u32, context: u32, env: u32) {
        match self.exports() {
            Ok(exports) => exports.destroy_closure(destructor, context, env),
            Err(_) => tracing::debug!(destructor, env, "no instance, closure destructor skipped"),
        }
    }
}
