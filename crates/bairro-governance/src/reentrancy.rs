//! Call-stack tracking for bundle dispatch.
//!
//! Every component entered during a transaction is pushed here; entering
//! one that is already on the stack fails, so an executing proposal
//! cannot call back into the governor or re-enter the treasury.

use std::collections::HashSet;

use bairro_types::{Address, Amount};
use tracing::warn;

use crate::error::CallError;

/// Maximum nesting of component calls within one transaction.
pub const MAX_CALL_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct ReentrancyGuard {
    stack: Vec<CallFrame>,
    /// Addresses on the stack, for O(1) lookup
    in_stack: HashSet<Address>,
    max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub address: Address,
    pub caller: Address,
    pub value: Amount,
    /// 0 for the outermost call
    pub depth: usize,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            in_stack: HashSet::new(),
            max_depth,
        }
    }

    /// Push a frame for a call into `address`.
    ///
    /// # Errors
    /// - `CallDepthExceeded` at the depth limit
    /// - `Reentrant` if `address` is already executing
    pub fn enter(
        &mut self,
        address: Address,
        caller: Address,
        value: Amount,
    ) -> Result<usize, CallError> {
        let depth = self.stack.len();
        if depth >= self.max_depth {
            return Err(CallError::CallDepthExceeded { depth });
        }
        if self.in_stack.contains(&address) {
            if let Some(frame) = self.current_frame() {
                warn!(
                    callee = %address.short(),
                    from = %frame.address.short(),
                    from_caller = %frame.caller.short(),
                    from_value = frame.value,
                    origin = ?self.tx_origin().map(|a| a.short()),
                    depth,
                    "re-entrant call rejected"
                );
            }
            return Err(CallError::Reentrant(address));
        }

        self.in_stack.insert(address);
        self.stack.push(CallFrame {
            address,
            caller,
            value,
            depth,
        });
        Ok(depth)
    }

    /// Pop the innermost frame.
    pub fn exit(&mut self) -> Option<CallFrame> {
        let frame = self.stack.pop()?;
        self.in_stack.remove(&frame.address);
        Some(frame)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.in_stack.contains(address)
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.stack.last()
    }

    /// Caller of the outermost frame.
    pub fn tx_origin(&self) -> Option<Address> {
        self.stack.first().map(|f| f.caller)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.in_stack.clear();
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_basic_enter_exit() {
        let mut guard = ReentrancyGuard::new();
        assert!(guard.is_empty());

        assert_eq!(guard.enter(addr("governor"), addr("alice"), 100).unwrap(), 0);
        assert_eq!(guard.depth(), 1);
        assert_eq!(guard.current_frame().unwrap().value, 100);

        let frame = guard.exit().unwrap();
        assert_eq!(frame.address, addr("governor"));
        assert!(guard.is_empty());
        assert!(guard.exit().is_none());
    }

    #[test]
    fn test_reentry_rejected() {
        let mut guard = ReentrancyGuard::new();
        guard.enter(addr("governor"), addr("alice"), 0).unwrap();
        guard.enter(addr("treasury"), addr("governor"), 0).unwrap();

        let err = guard.enter(addr("governor"), addr("treasury"), 0).unwrap_err();
        assert_eq!(err, CallError::Reentrant(addr("governor")));
        assert_eq!(guard.depth(), 2);
        let frame = guard.current_frame().unwrap();
        assert_eq!((frame.address, frame.caller), (addr("treasury"), addr("governor")));
        assert_eq!(guard.tx_origin(), Some(addr("alice")));
    }

    #[test]
    fn test_sibling_calls_allowed() {
        let mut guard = ReentrancyGuard::new();
        guard.enter(addr("governor"), addr("alice"), 0).unwrap();
        guard.enter(addr("treasury"), addr("governor"), 0).unwrap();
        guard.exit();
        guard.enter(addr("treasury"), addr("governor"), 0).unwrap();
        assert!(guard.contains(&addr("treasury")));
    }

    #[test]
    fn test_depth_limit() {
        let mut guard = ReentrancyGuard::with_max_depth(2);
        guard.enter(addr("a"), addr("x"), 0).unwrap();
        guard.enter(addr("b"), addr("a"), 0).unwrap();
        let err = guard.enter(addr("c"), addr("b"), 0).unwrap_err();
        assert_eq!(err, CallError::CallDepthExceeded { depth: 2 });
    }

    #[test]
    fn test_reset() {
        let mut guard = ReentrancyGuard::new();
        guard.enter(addr("a"), addr("x"), 0).unwrap();
        guard.reset();
        assert!(guard.is_empty());
        assert!(!guard.contains(&addr("a")));
    }
}
