//! Bytecode operands

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of an instruction in the method's instruction stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Address(pub u32);

impl Address {
    /// Largest representable address; reserved as the stop address of the main branch
    pub const MAX: Address = Address(u32::MAX);

    /// Create a new address
    #[inline]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Get the raw offset
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }
}

impl From<u32> for Address {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MAX {
            f.write_str("IL_MAX")
        } else {
            write!(f, "IL_{:04x}", self.0)
        }
    }
}

/// Token identifying a callee in the metadata tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MethodToken(pub u32);

impl MethodToken {
    /// Create a new method token
    #[inline]
    pub const fn new(token: u32) -> Self {
        Self(token)
    }

    /// Get token value
    #[inline]
    pub const fn token(self) -> u32 {
        self.0
    }
}

/// Call shape: which method, how many stack arguments, whether a result is pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    /// Callee
    pub method: MethodToken,
    /// Number of arguments popped from the stack
    pub args: u8,
    /// Whether the call pushes a return value
    pub returns: bool,
}

/// Inline operand of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operand {
    /// No inline operand
    #[default]
    None,
    /// 32-bit integer immediate
    Int32(i32),
    /// Local variable slot
    Local(u16),
    /// Argument slot
    Arg(u16),
    /// Branch destination
    Target(Address),
    /// Call site description
    Call(CallSite),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Int32(value) => write!(f, "{}", value),
            Self::Local(idx) => write!(f, "V_{}", idx),
            Self::Arg(idx) => write!(f, "A_{}", idx),
            Self::Target(target) => write!(f, "{}", target),
            Self::Call(site) => write!(
                f,
                "M_{:08x}/{}{}",
                site.method.token(),
                site.args,
                if site.returns { "" } else { " void" }
            ),
        }
    }
}
