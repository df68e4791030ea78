use std::ptr::NonNull;

use crate::{
    block::Block,
    list::{List, Node},
};

/// Free space management policy: which free block satisfies a request when
/// several could. All three scans are O(n) over the block list, there is no
/// auxiliary index to keep in sync with splits and merges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Strategy {
    /// First free block that is big enough, scanning from the head.
    FirstFit,
    /// Smallest free block that is still big enough.
    BestFit,
    /// Largest free block that is big enough.
    WorstFit,
}

impl Strategy {
    /// Parses the value of the `ALLOCATOR_ALGORITHM` variable. Anything
    /// unrecognized falls back to first fit, the default policy.
    pub fn parse(value: &[u8]) -> Self {
        match value {
            b"best_fit" => Self::BestFit,
            b"worst_fit" => Self::WorstFit,
            _ => Self::FirstFit,
        }
    }

    /// Picks a free block of at least `needed` bytes (header included), or
    /// `None` when no tracked free block is big enough. Ties between equally
    /// sized candidates always go to the one found first, so a fixed list
    /// and a fixed policy select deterministically.
    pub fn find(self, blocks: &List<Block>, needed: usize) -> Option<NonNull<Node<Block>>> {
        match self {
            Self::FirstFit => first_fit(blocks, needed),
            Self::BestFit => best_fit(blocks, needed),
            Self::WorstFit => worst_fit(blocks, needed),
        }
    }
}

fn first_fit(blocks: &List<Block>, needed: usize) -> Option<NonNull<Node<Block>>> {
    for node in blocks.nodes() {
        let block = unsafe { &node.as_ref().data };

        if block.free && block.size >= needed {
            return Some(node);
        }
    }

    None
}

fn best_fit(blocks: &List<Block>, needed: usize) -> Option<NonNull<Node<Block>>> {
    let mut candidate: Option<(NonNull<Node<Block>>, usize)> = None;

    for node in blocks.nodes() {
        let block = unsafe { &node.as_ref().data };

        if !block.free || block.size < needed {
            continue;
        }

        // Strictly smaller, so the earliest candidate wins ties.
        if candidate.is_none_or(|(_, size)| block.size < size) {
            candidate = Some((node, block.size));
        }
    }

    candidate.map(|(node, _)| node)
}

fn worst_fit(blocks: &List<Block>, needed: usize) -> Option<NonNull<Node<Block>>> {
    let mut candidate: Option<(NonNull<Node<Block>>, usize)> = None;

    for node in blocks.nodes() {
        let block = unsafe { &node.as_ref().data };

        if !block.free || block.size < needed {
            continue;
        }

        if candidate.is_none_or(|(_, size)| block.size > size) {
            candidate = Some((node, block.size));
        }
    }

    candidate.map(|(node, _)| node)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a synthetic block list. The nodes are not address contiguous
    /// like real blocks, but the strategies only look at `size` and `free`.
    fn build(
        specs: &[(usize, bool)],
        storage: &mut Vec<Box<[u64; 8]>>,
    ) -> List<Block> {
        let mut list = List::new();

        for (name, &(size, free)) in specs.iter().enumerate() {
            let mut slot = Box::new([0u64; 8]);
            let addr = NonNull::new(slot.as_mut_ptr().cast::<u8>()).unwrap();
            storage.push(slot);

            unsafe {
                list.append(
                    Block {
                        size,
                        free,
                        region_id: 0,
                        name: name as u64,
                    },
                    addr,
                );
            }
        }

        list
    }

    fn picked_size(found: Option<NonNull<Node<Block>>>) -> usize {
        unsafe { found.expect("no block picked").as_ref().data.size }
    }

    #[test]
    fn parse_recognizes_the_three_policies() {
        assert_eq!(Strategy::parse(b"first_fit"), Strategy::FirstFit);
        assert_eq!(Strategy::parse(b"best_fit"), Strategy::BestFit);
        assert_eq!(Strategy::parse(b"worst_fit"), Strategy::WorstFit);
        assert_eq!(Strategy::parse(b"anything else"), Strategy::FirstFit);
        assert_eq!(Strategy::parse(b""), Strategy::FirstFit);
    }

    #[test]
    fn first_fit_skips_used_and_small_blocks() {
        let mut storage = Vec::new();
        let list = build(&[(400, false), (100, true), (500, true)], &mut storage);

        assert_eq!(picked_size(Strategy::FirstFit.find(&list, 200)), 500);
    }

    #[test]
    fn best_fit_picks_tightest_block() {
        let mut storage = Vec::new();
        let list = build(&[(500, true), (300, true), (200, true)], &mut storage);

        assert_eq!(picked_size(Strategy::BestFit.find(&list, 150)), 200);
    }

    #[test]
    fn worst_fit_picks_largest_block() {
        let mut storage = Vec::new();
        let list = build(&[(200, true), (500, true), (300, true)], &mut storage);

        assert_eq!(picked_size(Strategy::WorstFit.find(&list, 150)), 500);
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        let mut storage = Vec::new();
        let list = build(&[(300, true), (200, true), (200, true)], &mut storage);

        let found = Strategy::BestFit.find(&list, 150).unwrap();
        assert_eq!(unsafe { found.as_ref().data.name }, 1);

        let list = build(&[(500, true), (500, true)], &mut storage);
        let found = Strategy::WorstFit.find(&list, 150).unwrap();
        assert_eq!(unsafe { found.as_ref().data.name }, 0);
    }

    #[test]
    fn selection_is_deterministic() {
        let mut storage = Vec::new();
        let list = build(&[(200, true), (500, true), (300, true)], &mut storage);

        for strategy in [Strategy::FirstFit, Strategy::BestFit, Strategy::WorstFit] {
            assert_eq!(strategy.find(&list, 150), strategy.find(&list, 150));
        }
    }

    #[test]
    fn nothing_fits() {
        let mut storage = Vec::new();
        let list = build(&[(200, true), (300, false)], &mut storage);

        assert!(Strategy::FirstFit.find(&list, 250).is_none());
        assert!(Strategy::BestFit.find(&list, 250).is_none());
        assert!(Strategy::WorstFit.find(&list, 250).is_none());
    }
}
