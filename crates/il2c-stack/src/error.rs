//! Translation errors

use il2c_bytecode::{Address, BytecodeError};
use thiserror::Error;

use crate::branch::BranchId;

fn at(address: &Option<Address>) -> String {
    match address {
        Some(address) => format!(" at {}", address),
        None => String::new(),
    }
}

/// Errors that abort translation of one method body
#[derive(Debug, Error)]
pub enum StackError {
    /// Pop from an empty branch: the driver's arity disagrees with the bytecode
    #[error("Stack underflow on {branch}{}", at(.address))]
    StackUnderflow {
        /// Branch that was popped
        branch: BranchId,
        /// Cursor address, when known
        address: Option<Address>,
    },

    /// Control-flow shape the fork heuristic does not model
    #[error("Inconsistent fork state at {address}: {reason}")]
    InconsistentForkState {
        /// Cursor address
        address: Address,
        /// What went wrong
        reason: String,
    },

    /// A consumer already carries a phi annotation
    #[error("Phi annotation already attached at {address}")]
    PhiAlreadyAttached {
        /// Consumer address
        address: Address,
    },

    /// Lookup of an address with no instruction
    #[error("Unknown instruction address {0}")]
    UnknownAddress(Address),

    /// The method body failed validation
    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}

impl StackError {
    /// Create an inconsistent fork state error
    pub fn inconsistent(address: Address, reason: impl Into<String>) -> Self {
        Self::InconsistentForkState {
            address,
            reason: reason.into(),
        }
    }

    /// Attach the cursor address to an underflow raised by a bare branch
    pub fn at(self, cursor: Address) -> Self {
        match self {
            Self::StackUnderflow {
                branch,
                address: None,
            } => Self::StackUnderflow {
                branch,
                address: Some(cursor),
            },
            other => other,
        }
    }

    /// Address the error refers to, if any
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::StackUnderflow { address, .. } => *address,
            Self::InconsistentForkState { address, .. } | Self::PhiAlreadyAttached { address } => {
                Some(*address)
            }
            Self::UnknownAddress(address) => Some(*address),
            Self::Bytecode(_) => None,
        }
    }
}

/// Result type for translation
pub type StackResult<T> = Result<T, StackError>;
