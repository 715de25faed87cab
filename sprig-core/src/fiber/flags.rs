//! Side-Effect Flags
//!
//! Flags record the host mutations a fiber needs at commit time. Each fiber
//! also carries the union of its descendants' flags (`subtree_flags`) so the
//! commit phase can skip untouched subtrees without visiting them.

bitflags::bitflags! {
    /// Pending host mutations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// Insert (or move) this fiber's host nodes.
        const PLACEMENT = 0b0000_0001;
        /// Apply changed props or text to the existing host node.
        const UPDATE = 0b0000_0010;
        /// Some children were removed; see the fiber's deletion list.
        const CHILD_DELETION = 0b0000_0100;
    }
}

impl Flags {
    /// No pending effects.
    pub const NONE: Self = Self::empty();

    /// Every flag that requires the mutation step of the commit phase.
    pub const MUTATION_MASK: Self = Self::PLACEMENT
        .union(Self::UPDATE)
        .union(Self::CHILD_DELETION);

    /// Whether any mutation flag is set.
    pub fn needs_mutation(self) -> bool {
        self.intersects(Self::MUTATION_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_mask_covers_every_flag() {
        assert_eq!(Flags::MUTATION_MASK, Flags::all());
        assert!(Flags::UPDATE.needs_mutation());
        assert!(!Flags::NONE.needs_mutation());
    }
}
