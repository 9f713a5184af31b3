//! Stack-branch reconciliation engine
//!
//! [`StackBranches`] simulates the evaluation stack of one method body while
//! the decode driver walks its instructions in address order. A forward
//! branch whose target is a reconvergence point forks a new [`StackBranch`];
//! both arms then push onto their own branch. When the cursor reaches the
//! merge address the engine switches back to the root branch, and the next
//! pop that finds a value waiting on a closed branch produces a [`PhiNodes`]
//! annotation instead of silently picking one producer.
//!
//! The fork/merge detection is address driven and assumes structured
//! control flow (if/else shapes, loops with backward jumps). Shapes it does
//! not model surface as [`StackError::InconsistentForkState`].

use il2c_bytecode::{Address, FlowControl};
use tracing::{debug, trace};

use crate::blocks::BlockOrigin;
use crate::branch::{BranchId, Slot, StackBranch};
use crate::error::{StackError, StackResult};
use crate::node::NodeArena;
use crate::phi::PhiNodes;

/// Result of popping one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped {
    /// Slot taken from the active branch
    pub slot: Slot,
    /// Consumer that received a phi annotation while popping this slot
    pub merge: Option<Address>,
}

impl Popped {
    fn plain(slot: Slot) -> Self {
        Self { slot, merge: None }
    }
}

/// Owner of all live stack branches of one method body
#[derive(Debug)]
pub struct StackBranches {
    branches: Vec<StackBranch>,
    cursor: Address,
    main: BranchId,
    current: BranchId,
    next_id: u32,
}

impl StackBranches {
    /// Create an engine holding only the main branch
    pub fn new() -> Self {
        let mut engine = Self {
            branches: Vec::new(),
            cursor: Address(0),
            main: BranchId(0),
            current: BranchId(0),
            next_id: 0,
        };
        engine.create_main_branch();
        engine
    }

    /// Discard every branch and start over with a fresh main branch
    pub fn clear(&mut self) {
        self.branches.clear();
        self.cursor = Address(0);
        self.create_main_branch();
    }

    /// Current address cursor
    #[inline]
    pub fn cursor(&self) -> Address {
        self.cursor
    }

    /// Number of tracked branches, main included
    #[inline]
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// All tracked branches in creation order
    pub fn branches(&self) -> &[StackBranch] {
        &self.branches
    }

    /// Identity of the main branch
    #[inline]
    pub fn main_id(&self) -> BranchId {
        self.main
    }

    /// Branch receiving pushes and pops
    pub fn active_branch(&self) -> &StackBranch {
        &self.branches[self.active_index()]
    }

    /// Top slot of the active branch
    pub fn peek(&self) -> Option<Slot> {
        self.active_branch().peek()
    }

    /// Bottom slot of the active branch
    pub fn first(&self) -> Option<Slot> {
        self.active_branch().first()
    }

    /// Whether the active branch is empty
    pub fn is_empty(&self) -> bool {
        self.active_branch().is_empty()
    }

    /// Inspect the instruction at `address` and fork a new branch when it is
    /// a forward jump whose target is a reconvergence point.
    ///
    /// Returns `true` when a branch was created.
    pub fn maybe_fork(&mut self, arena: &NodeArena, address: Address) -> bool {
        let Some(instruction) = arena.instruction(address) else {
            return false;
        };
        if !instruction.is_forward_jump() {
            return false;
        }
        let Some(target) = instruction.jump_target() else {
            return false;
        };

        let fork = match instruction.flow_control() {
            // Tail of a then-arm: the instruction after the jump starts the
            // else-arm, which a conditional branch jumps to.
            FlowControl::Branch => arena.next_address(address).is_some_and(|alternate| {
                arena
                    .incoming_jumps(alternate)
                    .iter()
                    .filter_map(|&source| arena.instruction(source))
                    .find(|jump| jump.is_forward_jump())
                    .is_some_and(|jump| jump.opcode.is_conditional_branch())
            }),
            // The target is reached by fall-through as well as by this jump.
            FlowControl::CondBranch => arena
                .previous_address(target)
                .and_then(|previous| arena.instruction(previous))
                .is_some_and(|previous| !previous.flow_control().ends_block()),
            _ => false,
        };

        if fork {
            self.fork(target);
        }
        fork
    }

    /// Create a branch live until `stop`, rooted at the active branch, and
    /// make it active
    pub fn fork(&mut self, stop: Address) -> BranchId {
        let id = self.allocate_id();
        debug!(branch = %id, root = %self.current, stop = %stop, at = %self.cursor, "fork");
        self.branches.push(StackBranch::new(id, stop, Some(self.current)));
        self.current = id;
        id
    }

    /// Move the cursor to `address`, collecting exhausted branches and
    /// switching back to the root of a branch that stops here.
    ///
    /// The active branch and its live roots are never collected, so nested
    /// arms that share a merge address unwind to the outermost root.
    pub fn advance_to(&mut self, address: Address) -> StackResult<()> {
        self.cursor = address;
        self.collect_exhausted();
        if !self.active_branch().is_closed_at(address) {
            return Ok(());
        }

        // Prefer the outermost arm of the active chain, then any live branch.
        let chain = self.active_chain();
        let stopping = |branch: &&StackBranch| branch.stop() == address;
        let ending = self
            .branches
            .iter()
            .filter(|branch| chain.contains(&branch.id()))
            .find(stopping)
            .or_else(|| self.branches.iter().find(stopping))
            .map(|branch| (branch.id(), branch.root()));

        if let Some((ending, root)) = ending {
            let target = root.unwrap_or(self.main);
            trace!(branch = %ending, "merge point reached");
            self.switch_to(target)?;
            self.collect_exhausted();
        }

        Ok(())
    }

    /// Push the value produced by the instruction at `address`
    pub fn push(&mut self, address: Address) {
        // keep depth aligned with the active branch
        for idx in self.merging_into_active() {
            self.branches[idx].push(Slot::Hole);
        }

        trace!(value = %address, branch = %self.current, "push");
        let idx = self.active_index();
        self.branches[idx].push(Slot::Value(address));
    }

    /// Pop one operand from the active branch.
    ///
    /// When a closed branch reconverging into the active branch still holds a
    /// slot at this depth, one slot is popped from every such branch, and the
    /// values found form a [`PhiNodes`] set attached in `arena` to the
    /// instruction following the alternative with the highest address.
    pub fn pop(&mut self, arena: &mut NodeArena) -> StackResult<Popped> {
        let cursor = self.cursor;
        let idx = self.active_index();
        let slot = self.branches[idx].pop().map_err(|err| err.at(cursor))?;
        trace!(slot = ?slot, branch = %self.current, "pop");

        let merging: Vec<usize> = self
            .merging_into_active()
            .into_iter()
            .filter(|&idx| !self.branches[idx].is_empty())
            .collect();
        if merging.is_empty() {
            return Ok(Popped::plain(slot));
        }

        let alternatives: Vec<Address> = merging
            .into_iter()
            .filter_map(|idx| self.branches[idx].pop().ok().and_then(Slot::value))
            .collect();

        let mut phi = PhiNodes::new();
        for value in alternatives {
            add_alternative(arena, &mut phi, value);
        }
        if !phi.is_empty()
            && let Some(value) = slot.value()
        {
            add_alternative(arena, &mut phi, value);
        }

        self.collect_exhausted();

        let Some(anchor) = phi.anchor_value() else {
            return Ok(Popped::plain(slot));
        };
        let consumer = arena.next_address(anchor).ok_or_else(|| {
            StackError::inconsistent(cursor, format!("phi source {} has no consumer", anchor))
        })?;

        debug!(consumer = %consumer, alternatives = phi.len(), at = %cursor, "phi");
        arena.attach_phi(consumer, phi)?;

        Ok(Popped {
            slot,
            merge: Some(consumer),
        })
    }

    fn create_main_branch(&mut self) {
        let id = self.allocate_id();
        self.branches.push(StackBranch::new(id, Address::MAX, None));
        self.main = id;
        self.current = id;
    }

    fn allocate_id(&mut self) -> BranchId {
        let id = BranchId(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: BranchId) -> Option<usize> {
        self.branches.iter().position(|branch| branch.id() == id)
    }

    // The active branch is never collected and main always sits at index 0.
    fn active_index(&self) -> usize {
        self.position(self.current).unwrap_or(0)
    }

    fn switch_to(&mut self, id: BranchId) -> StackResult<()> {
        if self.position(id).is_none() {
            return Err(StackError::inconsistent(
                self.cursor,
                format!("root {} of the merging branch is no longer live", id),
            ));
        }
        if id != self.current {
            debug!(from = %self.current, to = %id, at = %self.cursor, "switch");
            self.current = id;
        }
        Ok(())
    }

    /// The active branch followed by its live roots, innermost first
    fn active_chain(&self) -> Vec<BranchId> {
        let mut chain = vec![self.current];
        let mut next = self.active_branch().root();
        while let Some(id) = next {
            let Some(idx) = self.position(id) else {
                break;
            };
            chain.push(id);
            next = self.branches[idx].root();
        }
        chain
    }

    /// Drop every closed, empty branch outside the active chain
    fn collect_exhausted(&mut self) {
        let cursor = self.cursor;
        let chain = self.active_chain();
        let before = self.branches.len();
        self.branches.retain(|branch| {
            chain.contains(&branch.id()) || !(branch.is_closed_at(cursor) && branch.is_empty())
        });
        let removed = before - self.branches.len();
        if removed > 0 {
            trace!(removed, at = %cursor, "collected exhausted branches");
        }
    }

    /// Indices of the closed branches whose stacks run parallel to the
    /// active branch, in creation order
    fn merging_into_active(&self) -> Vec<usize> {
        self.branches
            .iter()
            .enumerate()
            .filter(|(_, branch)| {
                branch.id() != self.current
                    && branch.is_closed_at(self.cursor)
                    && self.reconverges_into_active(branch)
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether `branch` merges back into the active branch, directly or
    /// through roots that are closed as well.
    ///
    /// A branch whose root is still open is parallel to that root, not to
    /// a fork of it that happens to be active.
    fn reconverges_into_active(&self, branch: &StackBranch) -> bool {
        let mut root = branch.root();
        loop {
            let id = root.unwrap_or(self.main);
            if id == self.current {
                return true;
            }
            match self.position(id).map(|idx| &self.branches[idx]) {
                Some(parent) if id != self.main && parent.is_closed_at(self.cursor) => {
                    root = parent.root();
                }
                _ => return false,
            }
        }
    }
}

impl Default for StackBranches {
    fn default() -> Self {
        Self::new()
    }
}

/// Record `value` in `phi` together with the label of the block producing it.
///
/// A value whose block has no label gets one synthesized at the start of its
/// expression. The link is recorded on the innermost first operand
/// ([`NodeArena::group_start`]), not on the direct first operand, so for
/// `mul(add(a, b), c)` the block starts at `a`. The code generator places the
/// assignment to the merge temporary there.
fn add_alternative(arena: &mut NodeArena, phi: &mut PhiNodes, value: Address) {
    let label = match arena.block_start(value) {
        Some(label) => label,
        None => {
            let label = arena.group_start(value);
            arena.add_synthesized_link(label, value);
            label
        }
    };
    phi.add_alternative(value, label);
}
