//! Foreign-key assignment for child rows.
//!
//! The primary parent of a child table is balanced: every parent key gets at
//! least [`MIN_PER_PARENT`] children when the child count allows it, and the
//! rest are spread least-used-first. Secondary parents are drawn uniformly.

use rand::RngCore;
use rand::seq::{IndexedRandom, SliceRandom};

use mockcraft_core::Value;

/// Floor of children guaranteed to every parent key.
pub const MIN_PER_PARENT: usize = 2;

/// Balanced assignment of `keys` to `rows` child rows, in row order.
///
/// Returns `None` when there are no keys to distribute.
pub fn balanced(rows: usize, keys: &[Value], rng: &mut dyn RngCore) -> Option<Vec<Value>> {
    let parents = keys.len();
    if parents == 0 {
        return None;
    }

    let guaranteed = parents.saturating_mul(MIN_PER_PARENT);
    let mut assigned = Vec::with_capacity(rows);
    if rows >= guaranteed {
        for key in keys {
            for _ in 0..MIN_PER_PARENT {
                assigned.push(key.clone());
            }
        }
        // After the floor every key has the same use count, so least-used-first
        // with random ties is a sequence of shuffled passes over the keys.
        let mut order: Vec<usize> = (0..parents).collect();
        while assigned.len() < rows {
            order.shuffle(&mut *rng);
            let take = (rows - assigned.len()).min(parents);
            assigned.extend(order[..take].iter().map(|&idx| keys[idx].clone()));
        }
    } else {
        let per_parent = rows / parents;
        let remainder = rows % parents;
        for (idx, key) in keys.iter().enumerate() {
            let share = per_parent + usize::from(idx < remainder);
            for _ in 0..share {
                assigned.push(key.clone());
            }
        }
    }
    Some(assigned)
}

/// One-to-one assignment: each key at most once, in key order. Rows beyond the
/// key count get no assignment.
pub fn one_to_one(rows: usize, keys: &[Value]) -> Vec<Option<Value>> {
    (0..rows).map(|idx| keys.get(idx).cloned()).collect()
}

/// Uniform pick for a secondary parent reference.
pub fn uniform_pick(keys: &[Value], rng: &mut dyn RngCore) -> Option<Value> {
    keys.choose(&mut *rng).cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn keys(n: i64) -> Vec<Value> {
        (1..=n).map(Value::Int).collect()
    }

    fn counts(assigned: &[Value]) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for value in assigned {
            if let Some(key) = value.as_i64() {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn floor_then_even_spread() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let assigned = balanced(6, &keys(2), &mut rng).expect("keys");
        assert_eq!(&assigned[..4], &[Value::Int(1), Value::Int(1), Value::Int(2), Value::Int(2)]);
        assert_eq!(counts(&assigned), BTreeMap::from([(1, 3), (2, 3)]));
    }

    #[test]
    fn extras_never_differ_by_more_than_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let assigned = balanced(57, &keys(5), &mut rng).expect("keys");
        assert_eq!(assigned.len(), 57);
        let counts = counts(&assigned);
        let min = counts.values().min().copied().unwrap_or_default();
        let max = counts.values().max().copied().unwrap_or_default();
        assert!(min >= MIN_PER_PARENT);
        assert!(max - min <= 1);
    }

    #[test]
    fn insufficient_rows_fall_back_to_even_split() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let assigned = balanced(5, &keys(3), &mut rng).expect("keys");
        assert_eq!(counts(&assigned), BTreeMap::from([(1, 2), (2, 2), (3, 1)]));

        let assigned = balanced(2, &keys(4), &mut rng).expect("keys");
        assert_eq!(assigned, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn no_keys_no_assignment() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(balanced(5, &[], &mut rng).is_none());
        assert!(uniform_pick(&[], &mut rng).is_none());
        assert_eq!(balanced(0, &keys(2), &mut rng), Some(Vec::new()));
    }

    #[test]
    fn same_seed_same_assignment() {
        let a = balanced(40, &keys(7), &mut ChaCha8Rng::seed_from_u64(3));
        let b = balanced(40, &keys(7), &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn one_to_one_uses_each_key_once() {
        let assigned = one_to_one(4, &keys(3));
        assert_eq!(
            assigned,
            vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3)), None]
        );
    }
}
