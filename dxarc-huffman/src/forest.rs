//! The Huffman forest shared by the encoder and decoder.
//!
//! The tree lives in a fixed arena of 511 slots: leaves `0..256` are byte
//! values, slots `256..511` are internal nodes in creation order, and the
//! last one created (slot 510) is the root. Both sides rebuild the forest
//! from the same 256 weights, so the merge order below is part of the wire
//! format.

/// Number of leaf nodes (one per byte value).
pub const LEAF_COUNT: usize = 256;

/// Total number of arena slots.
pub const NODE_COUNT: usize = LEAF_COUNT * 2 - 1;

/// Index of the root node.
pub const ROOT: usize = NODE_COUNT - 1;

/// Maximum code length in bits (a fully skewed tree).
pub const MAX_CODE_BITS: usize = LEAF_COUNT - 1;

const NONE: u16 = u16::MAX;

/// One slot of the forest arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// Weight of a leaf, or the sum of both children.
    pub weight: u32,
    /// Parent slot, if merged.
    pub parent: Option<u16>,
    /// Branch bit this node occupies under its parent.
    pub branch: u8,
    /// Child slots for bit 0 and bit 1; `None` for leaves.
    pub children: Option<[u16; 2]>,
}

/// Code of a leaf in root-to-leaf order.
///
/// Bit `k` of the code (the `k`-th branch taken from the root) is stored
/// at `words[k / 32] >> (k % 32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Code {
    words: [u32; 8],
    len: u8,
}

impl Code {
    /// Number of bits in the code.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the code is empty (only possible before the forest is built).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Branch bit at depth `k`.
    pub fn bit(&self, k: usize) -> u8 {
        ((self.words[k / 32] >> (k % 32)) & 1) as u8
    }

    /// Code bits packed LSB-first in 32-bit words, for bulk output.
    pub fn words(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        let len = self.len();
        (0..len.div_ceil(32)).map(move |w| {
            let count = (len - w * 32).min(32) as u8;
            (self.words[w], count)
        })
    }

    fn push(&mut self, bit: u8) {
        let k = self.len as usize;
        self.words[k / 32] |= (bit as u32) << (k % 32);
        self.len += 1;
    }
}

/// A fully built Huffman forest.
#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    /// Build the forest from 256 leaf weights.
    ///
    /// Each round scans the unmerged slots in index order for the two
    /// lowest weights. A slot only displaces the current minimum when it
    /// is strictly lighter, so ties keep the lower index. The lightest slot
    /// becomes child 0 of the new node and the runner-up child 1.
    pub fn build(weights: &[u32; LEAF_COUNT]) -> Self {
        let mut nodes = Vec::with_capacity(NODE_COUNT);
        nodes.extend(weights.iter().map(|&weight| Node {
            weight,
            parent: None,
            branch: 0,
            children: None,
        }));

        while nodes.len() < NODE_COUNT {
            let mut min1 = NONE;
            let mut min2 = NONE;

            for (index, node) in nodes.iter().enumerate() {
                if node.parent.is_some() {
                    continue;
                }
                let index = index as u16;
                if min1 == NONE || nodes[min1 as usize].weight > node.weight {
                    min2 = min1;
                    min1 = index;
                } else if min2 == NONE || nodes[min2 as usize].weight > node.weight {
                    min2 = index;
                }
            }

            let parent = nodes.len() as u16;
            let weight = nodes[min1 as usize].weight + nodes[min2 as usize].weight;

            nodes[min1 as usize].parent = Some(parent);
            nodes[min1 as usize].branch = 0;
            nodes[min2 as usize].parent = Some(parent);
            nodes[min2 as usize].branch = 1;

            nodes.push(Node {
                weight,
                parent: None,
                branch: 0,
                children: Some([min1, min2]),
            });
        }

        Self { nodes }
    }

    /// Get a node by slot.
    #[inline]
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Child of an internal node along `bit`.
    ///
    /// Leaves return themselves.
    #[inline]
    pub fn child(&self, index: usize, bit: u8) -> usize {
        match self.nodes[index].children {
            Some(children) => children[bit as usize & 1] as usize,
            None => index,
        }
    }

    /// Codes of all 256 leaves.
    pub fn leaf_codes(&self) -> Vec<Code> {
        (0..LEAF_COUNT).map(|leaf| self.code_of(leaf)).collect()
    }

    /// Walk from `index` to the root and return the path root-first.
    fn code_of(&self, index: usize) -> Code {
        let mut path = [0u8; MAX_CODE_BITS];
        let mut depth = 0;
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            path[depth] = self.nodes[current].branch;
            depth += 1;
            current = parent as usize;
        }

        let mut code = Code::default();
        for &bit in path[..depth].iter().rev() {
            code.push(bit);
        }
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_last_slot() {
        let forest = Forest::build(&[1; LEAF_COUNT]);
        assert!(forest.node(ROOT).parent.is_none());
        assert_eq!(forest.node(ROOT).weight, 256);
        for index in 0..ROOT {
            assert!(forest.node(index).parent.is_some(), "slot {index}");
        }
    }

    #[test]
    fn test_equal_weights_give_binary_codes() {
        // Pairs merge in index order, so leaf k gets the 8-bit binary of k.
        let forest = Forest::build(&[255; LEAF_COUNT]);
        let codes = forest.leaf_codes();
        for (value, code) in codes.iter().enumerate() {
            assert_eq!(code.len(), 8);
            let msb_first = (0..8).fold(0usize, |acc, k| (acc << 1) | code.bit(k) as usize);
            assert_eq!(msb_first, value);
        }
    }

    #[test]
    fn test_single_heavy_leaf() {
        let mut weights = [0u32; LEAF_COUNT];
        weights[97] = 65535;
        let forest = Forest::build(&weights);

        // The zero-weight subtree is scanned after leaf 97 but is lighter,
        // so it takes branch 0 of the root.
        assert_eq!(forest.node(ROOT).children, Some([509, 97]));
        let code = forest.leaf_codes()[97];
        assert_eq!(code.len(), 1);
        assert_eq!(code.bit(0), 1);
    }

    #[test]
    fn test_tie_keeps_lower_index_first() {
        let mut weights = [1000u32; LEAF_COUNT];
        weights[10] = 1;
        weights[3] = 1;
        let forest = Forest::build(&weights);
        assert_eq!(forest.node(256).children, Some([3, 10]));
    }

    #[test]
    fn test_skewed_tree_code_lengths() {
        // Fibonacci-like weights force a deep chain.
        let mut weights = [0u32; LEAF_COUNT];
        let (mut a, mut b) = (1u32, 1u32);
        for w in weights.iter_mut().take(24) {
            *w = a;
            let next = a + b;
            a = b;
            b = next;
        }
        let forest = Forest::build(&weights);
        let codes = forest.leaf_codes();
        assert_eq!(codes[23].len(), 1);
        assert!(codes.iter().all(|c| !c.is_empty() && c.len() <= MAX_CODE_BITS));
    }

    #[test]
    fn test_code_words_cover_length() {
        let mut code = Code::default();
        for k in 0..40 {
            code.push((k % 3 == 0) as u8);
        }
        let words: Vec<(u32, u8)> = code.words().collect();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].1, 32);
        assert_eq!(words[1].1, 8);
        assert_eq!(words[0].0 & 1, 1);
    }
}
