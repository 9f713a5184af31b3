//! Bytecode errors

use thiserror::Error;

use crate::operand::Address;

/// Errors that can occur while loading or validating bytecode
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Unsupported module version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Invalid opcode byte
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Jump to an address that holds no instruction
    #[error("Invalid jump target {target} from {address}")]
    InvalidJumpTarget {
        /// Address of the jump
        address: Address,
        /// Requested destination
        target: Address,
    },

    /// Instruction addresses must be strictly increasing
    #[error("Address {address} does not follow {previous}")]
    NonMonotonicAddress {
        /// Preceding instruction address
        previous: Address,
        /// Offending address
        address: Address,
    },

    /// `Address::MAX` is reserved for the unbounded main branch
    #[error("Reserved address used by instruction: {0}")]
    ReservedAddress(Address),

    /// Operand kind does not fit the opcode
    #[error("Operand mismatch at {address}: {opcode} does not take {operand}")]
    OperandMismatch {
        /// Instruction address
        address: Address,
        /// Opcode mnemonic
        opcode: &'static str,
        /// Operand description
        operand: String,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error during loading or saving
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
