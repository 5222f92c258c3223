//! Fractional order keys
//!
//! Each block carries an `f64` key. Inserting between two blocks takes the
//! midpoint of their keys; inserting at either end steps one unit past the
//! outermost key. Display always sorts ascending by key.
//!
//! Repeated insertion into the same gap halves it each time, so after roughly
//! fifty insertions adjacent keys stop being distinguishable. [`place_between`]
//! reports that as [`Placement::Collision`] and callers respond with
//! [`renumber`], which rewrites every key in the chapter to dense integers.

use crate::block::Block;
use crate::ids::BlockId;

/// Distance between keys at the ends and after renumbering
pub const KEY_STEP: f64 = 1.0;

/// Smallest gap treated as usable between two neighbours
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Key for a new block between `key_before` and `key_after`.
///
/// - start of chapter (`key_before = None`): `key_after - 1`, or `0` when empty
/// - end of chapter (`key_after = None`): `key_before + 1`
/// - between: the midpoint
#[must_use]
pub fn insert_after(key_before: Option<f64>, key_after: Option<f64>) -> f64 {
    match (key_before, key_after) {
        (None, None) => 0.0,
        (None, Some(after)) => after - KEY_STEP,
        (Some(before), None) => before + KEY_STEP,
        (Some(before), Some(after)) => (before + after) / 2.0,
    }
}

/// Outcome of placing a key between neighbours
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Usable key
    Key(f64),
    /// Neighbours are too close; renumber and retry
    Collision,
}

impl Placement {
    /// Key, if placement succeeded
    #[inline]
    #[must_use]
    pub fn key(self) -> Option<f64> {
        match self {
            Self::Key(k) => Some(k),
            Self::Collision => None,
        }
    }
}

/// Like [`insert_after`], but detects keys that would not sort strictly
/// between their neighbours at working precision.
#[must_use]
pub fn place_between(key_before: Option<f64>, key_after: Option<f64>, epsilon: f64) -> Placement {
    let key = insert_after(key_before, key_after);
    if !key.is_finite() {
        return Placement::Collision;
    }
    if let (Some(before), Some(after)) = (key_before, key_after) {
        if after - before <= epsilon || key <= before || key >= after {
            return Placement::Collision;
        }
    }
    Placement::Key(key)
}

/// Sort blocks into document order (stable for equal keys)
pub fn sort_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| a.order.total_cmp(&b.order));
}

/// Whether `blocks` is already in ascending key order
#[must_use]
pub fn is_sorted(blocks: &[Block]) -> bool {
    blocks.windows(2).all(|w| w[0].order <= w[1].order)
}

/// Neighbour keys for inserting after `after` (or at the start when `None`).
///
/// `sorted` must be in document order. `moving` is skipped so that a block
/// being moved is not its own neighbour. Returns `None` when `after` is not
/// in the list.
#[must_use]
pub fn neighbours(
    sorted: &[Block],
    after: Option<BlockId>,
    moving: Option<BlockId>,
) -> Option<(Option<f64>, Option<f64>)> {
    let keys: Vec<(BlockId, f64)> = sorted
        .iter()
        .filter(|b| Some(b.id) != moving)
        .map(|b| (b.id, b.order))
        .collect();

    match after {
        None => Some((None, keys.first().map(|(_, k)| *k))),
        Some(target) => {
            let idx = keys.iter().position(|(id, _)| *id == target)?;
            Some((Some(keys[idx].1), keys.get(idx + 1).map(|(_, k)| *k)))
        }
    }
}

/// Neighbour keys for a block landing at `index` of `sorted`.
///
/// `index` counts positions in the list with `moving` removed; an index past
/// the end places the block last.
#[must_use]
pub fn key_for_position(sorted: &[Block], index: usize, moving: Option<BlockId>) -> (Option<f64>, Option<f64>) {
    let keys: Vec<f64> = sorted
        .iter()
        .filter(|b| Some(b.id) != moving)
        .map(|b| b.order)
        .collect();
    let index = index.min(keys.len());
    let before = index.checked_sub(1).map(|i| keys[i]);
    (before, keys.get(index).copied())
}

/// Whether any two adjacent keys are within `epsilon` of each other
#[must_use]
pub fn needs_renumber(sorted: &[Block], epsilon: f64) -> bool {
    sorted.windows(2).any(|w| {
        let gap = w[1].order - w[0].order;
        gap.is_nan() || gap <= epsilon
    })
}

/// Rewrite keys to `0, 1, 2, ...` in current document order.
///
/// Sorts `blocks` first. Returns the ids whose key changed.
pub fn renumber(blocks: &mut [Block]) -> Vec<BlockId> {
    sort_blocks(blocks);
    let mut changed = Vec::new();
    for (i, block) in blocks.iter_mut().enumerate() {
        let key = i as f64 * KEY_STEP;
        if block.order != key {
            block.order = key;
            changed.push(block.id);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockType, ChapterId};

    fn blocks(keys: &[f64]) -> Vec<Block> {
        let chapter = ChapterId::new();
        keys.iter()
            .map(|k| Block::new(chapter, BlockType::Paragraph, format!("{k}"), *k))
            .collect()
    }

    #[test]
    fn position_keys() {
        let list = blocks(&[0.0, 1.0, 2.0]);
        assert_eq!(key_for_position(&list, 0, None), (None, Some(0.0)));
        assert_eq!(key_for_position(&list, 2, None), (Some(1.0), Some(2.0)));
        assert_eq!(key_for_position(&list, 9, None), (Some(2.0), None));
        assert_eq!(
            key_for_position(&list, 1, Some(list[0].id)),
            (Some(1.0), Some(2.0))
        );
    }

    #[test]
    fn insert_rules() {
        assert_eq!(insert_after(None, None), 0.0);
        assert_eq!(insert_after(None, Some(3.0)), 2.0);
        assert_eq!(insert_after(Some(3.0), None), 4.0);
        assert_eq!(insert_after(Some(1.0), Some(2.0)), 1.5);
    }

    #[test]
    fn collision_detected_when_gap_exhausted() {
        assert_eq!(place_between(Some(1.0), Some(2.0), DEFAULT_EPSILON), Placement::Key(1.5));
        assert_eq!(
            place_between(Some(1.0), Some(1.0 + 1e-12), DEFAULT_EPSILON),
            Placement::Collision
        );
        assert_eq!(place_between(Some(2.0), Some(2.0), 0.0), Placement::Collision);
    }

    #[test]
    fn repeated_midpoints_eventually_collide() {
        let before = 0.0;
        let mut after = 1.0;
        let mut steps = 0;
        while let Placement::Key(k) = place_between(Some(before), Some(after), DEFAULT_EPSILON) {
            after = k;
            steps += 1;
            assert!(steps < 200);
        }
        assert!(steps > 20);
    }

    #[test]
    fn neighbours_skip_moving_block() {
        let list = blocks(&[0.0, 1.0, 2.0]);
        let (a, b, c) = (list[0].id, list[1].id, list[2].id);

        assert_eq!(neighbours(&list, None, None), Some((None, Some(0.0))));
        assert_eq!(neighbours(&list, Some(a), None), Some((Some(0.0), Some(1.0))));
        assert_eq!(neighbours(&list, Some(c), None), Some((Some(2.0), None)));
        // Moving b after a: b is not its own upper neighbour
        assert_eq!(neighbours(&list, Some(a), Some(b)), Some((Some(0.0), Some(2.0))));
        // Moving a to the start: the first other block is b
        assert_eq!(neighbours(&list, None, Some(a)), Some((None, Some(1.0))));
        assert_eq!(neighbours(&list, Some(BlockId::new()), None), None);
    }

    #[test]
    fn renumber_densifies_in_order() {
        let mut list = blocks(&[0.5, 0.500_000_000_000_1, -3.0, 0.0]);
        let changed = renumber(&mut list);
        let keys: Vec<f64> = list.iter().map(|b| b.order).collect();
        assert_eq!(keys, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(changed.len(), 4);
        assert!(!needs_renumber(&list, DEFAULT_EPSILON));
    }

    #[test]
    fn renumber_reports_only_changed() {
        let mut list = blocks(&[0.0, 1.0, 5.0]);
        let changed = renumber(&mut list);
        assert_eq!(changed, vec![list[2].id]);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut list = blocks(&[1.0, 1.0, 0.0]);
        let first_tie = list[0].id;
        sort_blocks(&mut list);
        assert_eq!(list[1].id, first_tie);
        assert!(is_sorted(&list));
        assert!(needs_renumber(&list, DEFAULT_EPSILON));
    }
}
