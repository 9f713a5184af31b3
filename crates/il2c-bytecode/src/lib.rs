//! # il2c Bytecode
//!
//! This crate defines the stack-machine bytecode consumed by the il2c backend.
//!
//! ## Design Principles
//!
//! - **Stack-based**: Operands are implicit, popped from and pushed to an evaluation stack
//! - **Address-ordered**: Every instruction carries a strictly increasing address
//! - **Forward-structured**: Branches form structured if/else shapes and loops
//! - **Serializable**: Modules load from and save to JSON

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod instruction;
pub mod method;
pub mod module;
pub mod operand;

pub use error::BytecodeError;
pub use instruction::{FlowControl, Instruction, Opcode};
pub use method::{MethodBody, MethodBodyBuilder};
pub use module::Module;
pub use operand::{Address, CallSite, MethodToken, Operand};

/// Bytecode format version written into JSON modules
pub const BYTECODE_VERSION: u32 = 1;
