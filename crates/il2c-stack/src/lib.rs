//! # il2c stack reconciliation
//!
//! Rebuilds expression trees from il2c stack bytecode.
//!
//! ## Pipeline
//!
//! 1. Index a validated method body into a [`NodeArena`]
//! 2. Walk instructions in address order, simulating the evaluation stack
//!    with [`StackBranches`]
//! 3. Fork a branch at every forward jump that leads to a reconvergence point
//! 4. Annotate consumers whose operand arrives along several paths with
//!    [`PhiNodes`]
//! 5. Assemble [`Statement`]s for every instruction that leaves the stack
//!    unchanged in depth

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod blocks;
pub mod branch;
pub mod branches;
pub mod error;
pub mod node;
pub mod phi;
pub mod translator;
pub mod tree;

pub use blocks::BlockOrigin;
pub use branch::{BranchId, Slot, StackBranch};
pub use branches::{Popped, StackBranches};
pub use error::{StackError, StackResult};
pub use node::{InstructionNode, NodeArena};
pub use phi::PhiNodes;
pub use translator::{
    MethodOutcome, MethodTranslator, ModuleReport, TranslateOptions, translate_module,
};
pub use tree::{Expr, PhiIncoming, Statement, TranslatedMethod};
