//! Candidate dropsets from pairs of profile elements.
//!
//! Two splits `A` and `B` become the same split once the taxa on which they
//! disagree are removed. They disagree either on `A XOR B` (the direct
//! difference) or, viewing `B` from its other side, on the live taxa where
//! they agree, `NOT(A XOR B)` without dropped and padding bits (the
//! complemented difference).

use crate::bitset::WORD_BITS;
use crate::context::RunContext;
use crate::index_list::IndexList;
use crate::profile::ProfileElem;

/// The taxa whose removal turns `a` and `b` into the same split.
///
/// Returns `None` when
/// - `a` and `b` are the same element,
/// - the difference is empty,
/// - the difference exceeds `ctx.max_dropset_size` (checked word by word, so
///   large differences stop early),
/// - the difference holds a taxon outside `ctx.masks.droppable`.
///
/// The result lists taxa in increasing order.
pub fn compute_dropset(
    a: &ProfileElem,
    b: &ProfileElem,
    complement: bool,
    ctx: &RunContext,
) -> Option<IndexList> {
    if a.id == b.id {
        return None;
    }
    debug_assert_eq!(a.bits.words(), b.bits.words());

    let masks = &ctx.masks;
    let mut result = IndexList::new();
    let mut num_bits = 0;

    for (i, (&wa, &wb)) in a.bits.0.iter().zip(&b.bits.0).enumerate() {
        let difference = if complement {
            !((wa ^ wb) | masks.dropped.0[i] | masks.padding.0[i])
        } else {
            wa ^ wb
        };

        let local = difference.count_ones() as usize;
        num_bits += local;
        if num_bits > ctx.max_dropset_size {
            return None;
        }

        let mut rest = difference;
        while rest != 0 {
            let taxon = i * WORD_BITS + rest.trailing_zeros() as usize;
            rest &= rest - 1;
            if !masks.droppable.test(taxon) {
                return None;
            }
            result.push_if_absent(taxon);
        }
    }

    if result.is_empty() { None } else { Some(result) }
}
