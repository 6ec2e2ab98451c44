//! Extract split snapshots from phylogenetic trees.
//!
//! # Overview
//! A TreeSnapshot captures all non-trivial bipartitions (splits) of one tree
//! as bitsets over the taxa. Snapshots of a whole tree collection are the
//! raw material of the bipartition profile.
//!
//! # What is a bipartition?
//! Each internal branch in a tree divides the leaves into two groups.
//! For example:
//! ```text
//!      root
//!     /    \
//!   {A,B}  {C,D}  ← This branch creates partition {A,B}
//! ```
//!
//! We only store one side of each partition: the side without taxon 0.
//!
//! # Taxon names, not node IDs
//! Node IDs are assigned during tree parsing and differ across trees.
//! Taxon names are consistent. We sort leaves alphabetically by name
//! so identical taxa always map to the same bit positions.

use crate::bitset::Bitset;
use crate::error::{Error, Result};
use phylotree::tree::Tree as PhyloTree;
use std::collections::{HashMap, HashSet};

/// All non-trivial splits of one tree.
///
/// # Fields
/// - `parts`: canonical splits (side without taxon 0), trivial splits excluded
/// - `taxa`: taxon names in bit order (alphabetical)
/// - `words`: Number of u64 words needed for bitsets
/// - `num_leaves`: Total number of leaves
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub parts: HashSet<Bitset>,
    pub taxa: Vec<String>,
    pub words: usize,
    pub num_leaves: usize,
}

impl TreeSnapshot {
    /// Extract a snapshot from a phylogenetic tree.
    ///
    /// # Algorithm
    /// 1. Extract leaf names and sort them alphabetically for consistency
    /// 2. Map each leaf name to a compact index [0..n)
    /// 3. DFS from root, building bitsets bottom-up
    /// 4. Collect the bitset of every non-root node as a split, skipping trivial ones
    /// 5. Canonicalize (always store the side without taxon 0)
    ///
    /// # Errors
    /// Fails if the tree is empty, malformed, or has unnamed leaves.
    pub fn from_tree(tree: &PhyloTree) -> Result<Self> {
        let mut leaf_names: Vec<(usize, String)> = Vec::new();
        for leaf_id in tree.get_leaves() {
            let name = tree
                .get(&leaf_id)?
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::Snapshot(format!("leaf {leaf_id} has no name")))?;
            leaf_names.push((leaf_id, name));
        }
        leaf_names.sort_by(|a, b| a.1.cmp(&b.1));

        let num_leaves = leaf_names.len();
        let words = Bitset::words_for(num_leaves);

        let node_id_to_leaf_index: HashMap<usize, usize> = leaf_names
            .iter()
            .enumerate()
            .map(|(idx, &(node_id, _))| (node_id, idx))
            .collect();

        // Key: node_id, Value: Bitset of leaves under this node
        let root_id = tree.get_root()?;
        let mut cache: HashMap<usize, Bitset> = HashMap::new();
        Self::compute_bitsets(root_id, tree, &node_id_to_leaf_index, words, &mut cache)?;

        let parts = cache
            .into_iter()
            .filter(|(node_id, _)| *node_id != root_id)
            .map(|(_, bitset)| canonicalize(bitset, num_leaves))
            .filter(|bitset| !is_trivial(bitset, num_leaves))
            .collect();

        Ok(TreeSnapshot {
            parts,
            taxa: leaf_names.into_iter().map(|(_, name)| name).collect(),
            words,
            num_leaves,
        })
    }

    /// Recursively compute bitsets for all nodes via DFS.
    ///
    /// - **Leaf node**: bitset with single bit set
    /// - **Internal node**: OR of all child bitsets
    fn compute_bitsets(
        node_id: usize,
        tree: &PhyloTree,
        node_id_to_leaf_index: &HashMap<usize, usize>,
        words: usize,
        cache: &mut HashMap<usize, Bitset>,
    ) -> Result<Bitset> {
        if let Some(bitset) = cache.get(&node_id) {
            return Ok(bitset.clone());
        }

        let node = tree.get(&node_id)?;

        let mut bitset = Bitset::zeros(words);
        if node.children.is_empty() {
            let leaf_idx = node_id_to_leaf_index
                .get(&node_id)
                .ok_or_else(|| Error::Snapshot(format!("leaf {node_id} is not indexed")))?;
            bitset.set(*leaf_idx);
        } else {
            for &child_id in &node.children {
                let child_bitset =
                    Self::compute_bitsets(child_id, tree, node_id_to_leaf_index, words, cache)?;
                bitset.or_assign(&child_bitset);
            }
        }

        cache.insert(node_id, bitset.clone());
        Ok(bitset)
    }
}

/// Always store the side that does NOT contain taxon 0.
///
/// # Example
/// Leaves: A=0, B=1, C=2, D=3
/// Partition {A,B}: bitset 0b0011 (taxon 0 SET) → flip to {C,D}: 0b1100
/// Partition {C,D}: bitset 0b1100 (taxon 0 NOT set) → keep as 0b1100
fn canonicalize(bitset: Bitset, num_leaves: usize) -> Bitset {
    if bitset.test(0) {
        complement(&bitset, num_leaves)
    } else {
        bitset
    }
}

/// Flips all bits up to num_leaves, keeping remaining bits as 0.
fn complement(bitset: &Bitset, num_leaves: usize) -> Bitset {
    let mut result = Bitset::ones(bitset.words(), num_leaves);
    result.and_not_assign(bitset);
    result
}

/// A split with at most one taxon on one of its sides carries no information.
fn is_trivial(bitset: &Bitset, num_leaves: usize) -> bool {
    let ones = bitset.count_ones();
    ones <= 1 || ones + 1 >= num_leaves
}

/// Checks that all snapshots are over the same taxa.
pub fn check_same_taxa(snapshots: &[TreeSnapshot]) -> Result<()> {
    let first = snapshots.first().ok_or(Error::NoTrees)?;
    for (index, snap) in snapshots.iter().enumerate().skip(1) {
        if snap.taxa != first.taxa {
            return Err(Error::LeafSetMismatch { index });
        }
    }
    Ok(())
}
