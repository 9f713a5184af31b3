//! Basic-block origin lookup

use il2c_bytecode::Address;

use crate::node::NodeArena;

/// Maps an instruction to the labelled start of its basic block
pub trait BlockOrigin {
    /// Address of the label that begins the block holding `address`.
    ///
    /// `None` when the block has no label, e.g. it is the method entry or the
    /// fall-through arm of a conditional branch.
    fn block_start(&self, address: Address) -> Option<Address>;
}

impl BlockOrigin for NodeArena {
    fn block_start(&self, address: Address) -> Option<Address> {
        self.node(address)?;

        let mut current = address;
        loop {
            if self.is_label(current) {
                return Some(current);
            }
            let previous = self.previous_address(current)?;
            let flow = self.instruction(previous)?.flow_control();
            if flow.ends_block() {
                return None;
            }
            current = previous;
        }
    }
}
