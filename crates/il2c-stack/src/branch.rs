//! Simulated evaluation stacks
//!
//! A [`StackBranch`] is one independently evolving evaluation stack. The main
//! branch lives for the whole method body; forked branches track one arm of a
//! conditional until the address where that arm rejoins the main flow.

use std::fmt;

use il2c_bytecode::Address;
use serde::Serialize;

use crate::error::{StackError, StackResult};

/// Identity of a branch, stable for the lifetime of one engine pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BranchId(pub u32);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch#{}", self.0)
    }
}

/// One stack slot: a producing instruction, or a hole that keeps depths aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    /// Value produced by the instruction at this address
    Value(Address),
    /// No value produced on this path at this depth
    Hole,
}

impl Slot {
    /// Producer address, `None` for a hole
    #[inline]
    pub fn value(self) -> Option<Address> {
        match self {
            Self::Value(address) => Some(address),
            Self::Hole => None,
        }
    }

    /// Whether this slot is a hole
    #[inline]
    pub fn is_hole(self) -> bool {
        matches!(self, Self::Hole)
    }
}

/// A simulated evaluation stack
#[derive(Debug, Clone)]
pub struct StackBranch {
    id: BranchId,
    stop: Address,
    root: Option<BranchId>,
    slots: Vec<Slot>,
}

impl StackBranch {
    /// Create a branch that stays live until `stop`
    pub fn new(id: BranchId, stop: Address, root: Option<BranchId>) -> Self {
        Self {
            id,
            stop,
            root,
            slots: Vec::new(),
        }
    }

    /// Branch identity
    #[inline]
    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Address at which this branch stops being active
    #[inline]
    pub fn stop(&self) -> Address {
        self.stop
    }

    /// Branch that was active when this one was forked
    #[inline]
    pub fn root(&self) -> Option<BranchId> {
        self.root
    }

    /// Whether the cursor has reached this branch's stop address
    #[inline]
    pub fn is_closed_at(&self, cursor: Address) -> bool {
        self.stop <= cursor
    }

    /// Push a slot
    #[inline]
    pub fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
    }

    /// Pop the top slot
    pub fn pop(&mut self) -> StackResult<Slot> {
        self.slots.pop().ok_or(StackError::StackUnderflow {
            branch: self.id,
            address: None,
        })
    }

    /// Top slot
    #[inline]
    pub fn peek(&self) -> Option<Slot> {
        self.slots.last().copied()
    }

    /// Bottom slot
    #[inline]
    pub fn first(&self) -> Option<Slot> {
        self.slots.first().copied()
    }

    /// Whether the stack holds no slots (holes included)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Slots from bottom to top
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}
