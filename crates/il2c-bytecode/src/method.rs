//! Method body representation

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::instruction::{Instruction, Opcode};
use crate::operand::{Address, CallSite, MethodToken, Operand};

/// A method body: an address-ordered instruction stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    /// Method name (empty for anonymous)
    #[serde(default)]
    pub name: String,

    /// Instructions in strictly increasing address order
    pub instructions: Vec<Instruction>,
}

impl MethodBody {
    /// Create a new method body builder
    pub fn builder(name: impl Into<String>) -> MethodBodyBuilder {
        MethodBodyBuilder::new(name)
    }

    /// Get the method name or `<anonymous>`
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        }
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the body has no instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the instruction at `address`
    pub fn position(&self, address: Address) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&address, |i| i.address)
            .ok()
    }

    /// Instruction at `address`
    pub fn find(&self, address: Address) -> Option<&Instruction> {
        self.position(address).map(|idx| &self.instructions[idx])
    }

    /// Check the structural contract the backend relies on:
    /// strictly increasing addresses, no reserved address, operand kinds
    /// matching opcodes and jump targets that land on an instruction.
    pub fn validate(&self) -> Result<()> {
        let mut previous: Option<Address> = None;
        let mut addresses = FxHashSet::default();

        for instruction in &self.instructions {
            let address = instruction.address;
            if address == Address::MAX {
                return Err(BytecodeError::ReservedAddress(address));
            }
            if let Some(previous) = previous
                && address <= previous
            {
                return Err(BytecodeError::NonMonotonicAddress { previous, address });
            }
            if !instruction.opcode.accepts(&instruction.operand) {
                return Err(BytecodeError::OperandMismatch {
                    address,
                    opcode: instruction.opcode.name(),
                    operand: format!("{:?}", instruction.operand),
                });
            }
            addresses.insert(address);
            previous = Some(address);
        }

        for instruction in &self.instructions {
            if let Some(target) = instruction.jump_target()
                && !addresses.contains(&target)
            {
                return Err(BytecodeError::InvalidJumpTarget {
                    address: instruction.address,
                    target,
                });
            }
        }

        Ok(())
    }
}

/// Builder for creating method bodies
#[derive(Debug, Default)]
pub struct MethodBodyBuilder {
    name: String,
    instructions: Vec<Instruction>,
}

impl MethodBodyBuilder {
    /// Create a new method body builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    /// Add a single instruction
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Add an instruction without inline operand
    pub fn op(self, address: u32, opcode: Opcode) -> Self {
        self.instruction(Instruction::simple(Address(address), opcode))
    }

    /// Add `ldc.i4 value`
    pub fn ldc(self, address: u32, value: i32) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            Opcode::LdcI4,
            Operand::Int32(value),
        ))
    }

    /// Add `ldarg index`
    pub fn ldarg(self, address: u32, index: u16) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            Opcode::Ldarg,
            Operand::Arg(index),
        ))
    }

    /// Add `ldloc index`
    pub fn ldloc(self, address: u32, index: u16) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            Opcode::Ldloc,
            Operand::Local(index),
        ))
    }

    /// Add `stloc index`
    pub fn stloc(self, address: u32, index: u16) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            Opcode::Stloc,
            Operand::Local(index),
        ))
    }

    /// Add a branch instruction
    pub fn jump(self, address: u32, opcode: Opcode, target: u32) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            opcode,
            Operand::Target(Address(target)),
        ))
    }

    /// Add a call
    pub fn call(self, address: u32, method: u32, args: u8, returns: bool) -> Self {
        self.instruction(Instruction::new(
            Address(address),
            Opcode::Call,
            Operand::Call(CallSite {
                method: MethodToken(method),
                args,
                returns,
            }),
        ))
    }

    /// Set all instructions
    pub fn instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Build the method body
    pub fn build(self) -> MethodBody {
        MethodBody {
            name: self.name,
            instructions: self.instructions,
        }
    }
}
