//! Instruction arena
//!
//! Instruction nodes live in one arena per method body and refer to each other
//! by [`Address`]. The relations that the reconciliation pass mutates (operand
//! links, synthesized jump-destination links, phi annotations) are kept in
//! separate address-keyed maps so ownership stays acyclic.

use std::collections::BTreeSet;

use il2c_bytecode::{Address, Instruction, MethodBody};
use rustc_hash::FxHashMap;

use crate::error::{StackError, StackResult};
use crate::phi::PhiNodes;

/// One decoded instruction plus its resolved operand producers
#[derive(Debug, Clone)]
pub struct InstructionNode {
    /// Decoded instruction
    pub instruction: Instruction,
    /// Producers of the popped operands, in source order
    pub operands: Vec<Address>,
}

impl InstructionNode {
    /// Address of the instruction
    #[inline]
    pub fn address(&self) -> Address {
        self.instruction.address
    }
}

/// Address-indexed storage for the instruction nodes of one method body
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<InstructionNode>,
    index: FxHashMap<Address, usize>,
    /// target -> jump instructions transferring control there
    incoming: FxHashMap<Address, Vec<Address>>,
    /// instruction -> phi sources that forced a block boundary here
    synthesized: FxHashMap<Address, Vec<Address>>,
    phis: FxHashMap<Address, PhiNodes>,
}

impl NodeArena {
    /// Validate `body` and index its instructions
    pub fn from_body(body: &MethodBody) -> StackResult<Self> {
        body.validate()?;

        let mut arena = Self::default();
        for (idx, instruction) in body.instructions.iter().enumerate() {
            arena.index.insert(instruction.address, idx);
            arena.nodes.push(InstructionNode {
                instruction: *instruction,
                operands: Vec::new(),
            });
            if let Some(target) = instruction.jump_target() {
                arena
                    .incoming
                    .entry(target)
                    .or_default()
                    .push(instruction.address);
            }
        }

        Ok(arena)
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in address order
    pub fn nodes(&self) -> &[InstructionNode] {
        &self.nodes
    }

    /// Node at `address`
    pub fn node(&self, address: Address) -> Option<&InstructionNode> {
        self.index.get(&address).map(|&idx| &self.nodes[idx])
    }

    /// Instruction at `address`
    pub fn instruction(&self, address: Address) -> Option<&Instruction> {
        self.node(address).map(|node| &node.instruction)
    }

    /// Address of the instruction that follows `address` in decode order
    pub fn next_address(&self, address: Address) -> Option<Address> {
        let idx = *self.index.get(&address)?;
        self.nodes.get(idx + 1).map(InstructionNode::address)
    }

    /// Address of the instruction that precedes `address` in decode order
    pub fn previous_address(&self, address: Address) -> Option<Address> {
        let idx = *self.index.get(&address)?;
        idx.checked_sub(1).map(|prev| self.nodes[prev].address())
    }

    /// Jump instructions targeting `address`, in address order
    pub fn incoming_jumps(&self, address: Address) -> &[Address] {
        self.incoming
            .get(&address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Phi sources whose block boundary was synthesized at `address`
    pub fn synthesized_links(&self, address: Address) -> &[Address] {
        self.synthesized
            .get(&address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record that `address` must start a block because `source` is a phi
    /// alternative without a resolved label
    pub fn add_synthesized_link(&mut self, address: Address, source: Address) {
        let links = self.synthesized.entry(address).or_default();
        if !links.contains(&source) {
            links.push(source);
        }
    }

    /// Whether control can arrive at `address` by a jump, real or synthesized
    pub fn is_label(&self, address: Address) -> bool {
        !self.incoming_jumps(address).is_empty() || !self.synthesized_links(address).is_empty()
    }

    /// All label addresses that hold an instruction
    pub fn labels(&self) -> BTreeSet<Address> {
        self.incoming
            .keys()
            .chain(self.synthesized.keys())
            .copied()
            .filter(|address| self.index.contains_key(address))
            .collect()
    }

    /// Producers of the operands popped by the instruction at `address`
    pub fn operands(&self, address: Address) -> &[Address] {
        self.node(address)
            .map(|node| node.operands.as_slice())
            .unwrap_or(&[])
    }

    /// Record the operand producers of the instruction at `address`
    pub fn set_operands(&mut self, address: Address, operands: Vec<Address>) -> StackResult<()> {
        let idx = *self
            .index
            .get(&address)
            .ok_or(StackError::UnknownAddress(address))?;
        self.nodes[idx].operands = operands;
        Ok(())
    }

    /// Address where the expression rooted at `address` begins: the group
    /// start of its first operand, or the instruction itself.
    pub fn group_start(&self, address: Address) -> Address {
        let mut current = address;
        while let Some(&first) = self.operands(current).first() {
            if first >= current {
                break;
            }
            current = first;
        }
        current
    }

    /// Attach `phi` to the consumer at `address`; a consumer is annotated once
    pub fn attach_phi(&mut self, address: Address, phi: PhiNodes) -> StackResult<()> {
        if !self.index.contains_key(&address) {
            return Err(StackError::UnknownAddress(address));
        }
        if self.phis.contains_key(&address) {
            return Err(StackError::PhiAlreadyAttached { address });
        }
        self.phis.insert(address, phi);
        Ok(())
    }

    /// Phi annotation of the consumer at `address`
    pub fn phi_at(&self, address: Address) -> Option<&PhiNodes> {
        self.phis.get(&address)
    }

    /// All phi annotations in address order
    pub fn phis(&self) -> Vec<(Address, &PhiNodes)> {
        let mut phis: Vec<_> = self.phis.iter().map(|(a, p)| (*a, p)).collect();
        phis.sort_by_key(|(address, _)| *address);
        phis
    }
}
