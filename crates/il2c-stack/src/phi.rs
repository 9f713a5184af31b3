//! Phi node sets

use il2c_bytecode::Address;
use serde::Serialize;

/// Alternative producers of one consumed stack slot, with the label of the
/// block each alternative was produced in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhiNodes {
    values: Vec<Address>,
    labels: Vec<Address>,
}

impl PhiNodes {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alternative producer and its block label
    pub fn add_alternative(&mut self, value: Address, label: Address) {
        self.values.push(value);
        self.labels.push(label);
    }

    /// Alternative producers, in gathering order
    pub fn values(&self) -> &[Address] {
        &self.values
    }

    /// Block labels, parallel to [`values`](Self::values)
    pub fn labels(&self) -> &[Address] {
        &self.labels
    }

    /// `(value, label)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Address, Address)> + '_ {
        self.values.iter().copied().zip(self.labels.iter().copied())
    }

    /// Number of alternatives
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no alternative was gathered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Alternative that reconverges last (highest address).
    ///
    /// The consumer annotated with this set is the instruction following it.
    /// This is a heuristic: nested or back-to-back merges may deserve a
    /// different anchor.
    pub fn anchor_value(&self) -> Option<Address> {
        self.values.iter().copied().max()
    }
}
