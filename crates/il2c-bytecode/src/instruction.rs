//! Bytecode instructions (opcodes)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operand::{Address, Operand};

/// How an instruction hands control to its successor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowControl {
    /// Falls through to the next instruction
    Next,
    /// Unconditional transfer to the jump target
    Branch,
    /// Either falls through or transfers to the jump target
    CondBranch,
    /// Calls another method, then falls through
    Call,
    /// Leaves the method
    Return,
    /// Raises an exception
    Throw,
}

impl FlowControl {
    /// Whether an instruction with this flow control ends its basic block
    #[inline]
    pub fn ends_block(self) -> bool {
        matches!(
            self,
            Self::Branch | Self::CondBranch | Self::Return | Self::Throw
        )
    }
}

/// Bytecode opcodes
///
/// Stack-based instruction set. Most instructions pop their inputs from the
/// evaluation stack and push at most one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== Constants ====================
    /// No operation
    Nop = 0x00,
    /// Push null
    Ldnull = 0x01,
    /// Push 32-bit integer immediate
    LdcI4 = 0x02,

    // ==================== Variables ====================
    /// Push argument
    Ldarg = 0x10,
    /// Pop into argument
    Starg = 0x11,
    /// Push local
    Ldloc = 0x12,
    /// Pop into local
    Stloc = 0x13,

    // ==================== Arithmetic ====================
    /// lhs + rhs
    Add = 0x20,
    /// lhs - rhs
    Sub = 0x21,
    /// lhs * rhs
    Mul = 0x22,
    /// lhs / rhs
    Div = 0x23,
    /// lhs % rhs
    Rem = 0x24,
    /// -src
    Neg = 0x25,

    // ==================== Bitwise ====================
    /// lhs & rhs
    And = 0x30,
    /// lhs | rhs
    Or = 0x31,
    /// lhs ^ rhs
    Xor = 0x32,
    /// ~src
    Not = 0x33,
    /// lhs << rhs
    Shl = 0x34,
    /// lhs >> rhs
    Shr = 0x35,

    // ==================== Comparison ====================
    /// lhs == rhs
    Ceq = 0x40,
    /// lhs > rhs
    Cgt = 0x41,
    /// lhs < rhs
    Clt = 0x42,

    // ==================== Calls ====================
    /// Call a method; arity comes from the call site operand
    Call = 0x50,
    /// Return the top of stack
    Ret = 0x51,
    /// Return without a value
    RetVoid = 0x52,

    // ==================== Stack ====================
    /// Discard the top of stack
    Pop = 0x60,
    /// Throw the top of stack
    Throw = 0x61,

    // ==================== Control Flow ====================
    /// Unconditional jump
    Br = 0x70,
    /// Jump if value is non-zero
    Brtrue = 0x71,
    /// Jump if value is zero
    Brfalse = 0x72,
    /// Jump if equal
    Beq = 0x73,
    /// Jump if not equal (unordered)
    BneUn = 0x74,
    /// Jump if less than
    Blt = 0x75,
    /// Jump if less than (unordered)
    BltUn = 0x76,
    /// Jump if less or equal
    Ble = 0x77,
    /// Jump if less or equal (unordered)
    BleUn = 0x78,
    /// Jump if greater than
    Bgt = 0x79,
    /// Jump if greater than (unordered)
    BgtUn = 0x7A,
    /// Jump if greater or equal
    Bge = 0x7B,
    /// Jump if greater or equal (unordered)
    BgeUn = 0x7C,
}

impl Opcode {
    /// Convert from raw byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Ldnull),
            0x02 => Some(Self::LdcI4),

            0x10 => Some(Self::Ldarg),
            0x11 => Some(Self::Starg),
            0x12 => Some(Self::Ldloc),
            0x13 => Some(Self::Stloc),

            0x20 => Some(Self::Add),
            0x21 => Some(Self::Sub),
            0x22 => Some(Self::Mul),
            0x23 => Some(Self::Div),
            0x24 => Some(Self::Rem),
            0x25 => Some(Self::Neg),

            0x30 => Some(Self::And),
            0x31 => Some(Self::Or),
            0x32 => Some(Self::Xor),
            0x33 => Some(Self::Not),
            0x34 => Some(Self::Shl),
            0x35 => Some(Self::Shr),

            0x40 => Some(Self::Ceq),
            0x41 => Some(Self::Cgt),
            0x42 => Some(Self::Clt),

            0x50 => Some(Self::Call),
            0x51 => Some(Self::Ret),
            0x52 => Some(Self::RetVoid),

            0x60 => Some(Self::Pop),
            0x61 => Some(Self::Throw),

            0x70 => Some(Self::Br),
            0x71 => Some(Self::Brtrue),
            0x72 => Some(Self::Brfalse),
            0x73 => Some(Self::Beq),
            0x74 => Some(Self::BneUn),
            0x75 => Some(Self::Blt),
            0x76 => Some(Self::BltUn),
            0x77 => Some(Self::Ble),
            0x78 => Some(Self::BleUn),
            0x79 => Some(Self::Bgt),
            0x7A => Some(Self::BgtUn),
            0x7B => Some(Self::Bge),
            0x7C => Some(Self::BgeUn),

            _ => None,
        }
    }

    /// Convert to raw byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Get the assembler mnemonic of this opcode
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Ldnull => "ldnull",
            Self::LdcI4 => "ldc.i4",
            Self::Ldarg => "ldarg",
            Self::Starg => "starg",
            Self::Ldloc => "ldloc",
            Self::Stloc => "stloc",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::Neg => "neg",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Ceq => "ceq",
            Self::Cgt => "cgt",
            Self::Clt => "clt",
            Self::Call => "call",
            Self::Ret => "ret",
            Self::RetVoid => "ret.void",
            Self::Pop => "pop",
            Self::Throw => "throw",
            Self::Br => "br",
            Self::Brtrue => "brtrue",
            Self::Brfalse => "brfalse",
            Self::Beq => "beq",
            Self::BneUn => "bne.un",
            Self::Blt => "blt",
            Self::BltUn => "blt.un",
            Self::Ble => "ble",
            Self::BleUn => "ble.un",
            Self::Bgt => "bgt",
            Self::BgtUn => "bgt.un",
            Self::Bge => "bge",
            Self::BgeUn => "bge.un",
        }
    }

    /// Flow-control classification
    pub const fn flow_control(self) -> FlowControl {
        match self {
            Self::Br => FlowControl::Branch,
            Self::Brtrue
            | Self::Brfalse
            | Self::Beq
            | Self::BneUn
            | Self::Blt
            | Self::BltUn
            | Self::Ble
            | Self::BleUn
            | Self::Bgt
            | Self::BgtUn
            | Self::Bge
            | Self::BgeUn => FlowControl::CondBranch,
            Self::Call => FlowControl::Call,
            Self::Ret | Self::RetVoid => FlowControl::Return,
            Self::Throw => FlowControl::Throw,
            _ => FlowControl::Next,
        }
    }

    /// Relational or truth-test branch
    #[inline]
    pub const fn is_conditional_branch(self) -> bool {
        matches!(self.flow_control(), FlowControl::CondBranch)
    }

    /// Any instruction that carries a jump target
    #[inline]
    pub const fn is_jump(self) -> bool {
        matches!(
            self.flow_control(),
            FlowControl::Branch | FlowControl::CondBranch
        )
    }

    /// Fixed stack effect as `(pops, pushes)`.
    ///
    /// `None` for `call`, whose effect depends on the call site operand.
    pub const fn stack_behaviour(self) -> Option<(u8, u8)> {
        let effect = match self {
            Self::Nop | Self::Br | Self::RetVoid => (0, 0),
            Self::Ldnull | Self::LdcI4 | Self::Ldarg | Self::Ldloc => (0, 1),
            Self::Starg | Self::Stloc | Self::Pop | Self::Throw | Self::Ret => (1, 0),
            Self::Brtrue | Self::Brfalse => (1, 0),
            Self::Neg | Self::Not => (1, 1),
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Rem
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Shl
            | Self::Shr
            | Self::Ceq
            | Self::Cgt
            | Self::Clt => (2, 1),
            Self::Beq
            | Self::BneUn
            | Self::Blt
            | Self::BltUn
            | Self::Ble
            | Self::BleUn
            | Self::Bgt
            | Self::BgtUn
            | Self::Bge
            | Self::BgeUn => (2, 0),
            Self::Call => return None,
        };
        Some(effect)
    }

    /// Whether `operand` is the right kind of inline operand for this opcode
    pub fn accepts(self, operand: &Operand) -> bool {
        match self {
            Self::LdcI4 => matches!(operand, Operand::Int32(_)),
            Self::Ldarg | Self::Starg => matches!(operand, Operand::Arg(_)),
            Self::Ldloc | Self::Stloc => matches!(operand, Operand::Local(_)),
            Self::Call => matches!(operand, Operand::Call(_)),
            op if op.is_jump() => matches!(operand, Operand::Target(_)),
            _ => matches!(operand, Operand::None),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Position in the instruction stream
    pub address: Address,
    /// Operation
    pub opcode: Opcode,
    /// Inline operand
    #[serde(default)]
    pub operand: Operand,
}

impl Instruction {
    /// Create a new instruction
    pub const fn new(address: Address, opcode: Opcode, operand: Operand) -> Self {
        Self {
            address,
            opcode,
            operand,
        }
    }

    /// Create an instruction without an inline operand
    pub const fn simple(address: Address, opcode: Opcode) -> Self {
        Self::new(address, opcode, Operand::None)
    }

    /// Number of stack slots this instruction pops
    pub fn pops(&self) -> usize {
        match (self.opcode.stack_behaviour(), self.operand) {
            (Some((pops, _)), _) => pops as usize,
            (None, Operand::Call(site)) => site.args as usize,
            (None, _) => 0,
        }
    }

    /// Number of stack slots this instruction pushes (0 or 1)
    pub fn pushes(&self) -> usize {
        match (self.opcode.stack_behaviour(), self.operand) {
            (Some((_, pushes)), _) => pushes as usize,
            (None, Operand::Call(site)) => site.returns as usize,
            (None, _) => 0,
        }
    }

    /// Destination of a jump instruction
    #[inline]
    pub fn jump_target(&self) -> Option<Address> {
        match self.operand {
            Operand::Target(target) if self.opcode.is_jump() => Some(target),
            _ => None,
        }
    }

    /// Jump whose destination lies after the jump itself
    #[inline]
    pub fn is_forward_jump(&self) -> bool {
        self.jump_target()
            .is_some_and(|target| target > self.address)
    }

    /// Flow-control classification of the opcode
    #[inline]
    pub fn flow_control(&self) -> FlowControl {
        self.opcode.flow_control()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.opcode)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}
