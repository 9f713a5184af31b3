//! Reconstructed expression tree

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use il2c_bytecode::{Address, Opcode, Operand};
use serde::Serialize;

use crate::phi::PhiNodes;

/// One incoming value of a merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhiIncoming {
    /// Label of the block that produced the value
    pub label: Address,
    /// Producing expression
    pub value: Expr,
}

/// Expression rebuilt from stack operations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Instruction applied to its popped operands
    Op {
        /// Producing instruction
        address: Address,
        /// Operation
        opcode: Opcode,
        /// Inline operand
        operand: Operand,
        /// Popped operands in source order
        args: Vec<Expr>,
    },
    /// Value that depends on the path taken into a merge point
    Phi {
        /// Consumer carrying the phi annotation
        anchor: Address,
        /// Alternatives, one per incoming path
        incoming: Vec<PhiIncoming>,
    },
}

impl Expr {
    /// Address the expression is attributed to
    pub fn address(&self) -> Address {
        match self {
            Self::Op { address, .. } => *address,
            Self::Phi { anchor, .. } => *anchor,
        }
    }

    /// Whether this expression, or any sub-expression, is a merge
    pub fn contains_phi(&self) -> bool {
        match self {
            Self::Op { args, .. } => args.iter().any(Expr::contains_phi),
            Self::Phi { .. } => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op {
                opcode,
                operand,
                args,
                ..
            } => {
                write!(f, "{}", opcode)?;
                if *operand != Operand::None {
                    write!(f, " {}", operand)?;
                }
                if !args.is_empty() {
                    f.write_str("(")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(")")?;
                }
                Ok(())
            }
            Self::Phi { incoming, .. } => {
                f.write_str("phi[")?;
                for (idx, input) in incoming.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", input.label, input.value)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Instruction that leaves no value on the stack, with its rebuilt operands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// Address of the statement's root instruction
    pub address: Address,
    /// Labels to emit before this statement
    pub labels: Vec<Address>,
    /// Statement expression
    pub expr: Expr,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            writeln!(f, "{}:", label)?;
        }
        write!(f, "    {}", self.expr)
    }
}

/// Translation result of one method body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedMethod {
    /// Method name
    pub name: String,
    /// Statements in address order
    pub statements: Vec<Statement>,
    /// Phi annotations keyed by consumer address
    pub phis: BTreeMap<Address, PhiNodes>,
    /// Every label address, real or synthesized
    pub labels: BTreeSet<Address>,
}

impl TranslatedMethod {
    /// Number of merges found in the body
    pub fn phi_count(&self) -> usize {
        self.phis.len()
    }
}

impl fmt::Display for TranslatedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method {} {{", self.name)?;
        for statement in &self.statements {
            writeln!(f, "{}", statement)?;
        }
        f.write_str("}")
    }
}
