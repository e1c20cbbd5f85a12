// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Ian Philip Eglin
/// Lexicographic k-subsets of a slice, yielded as owned vectors.
#[derive(Debug, Clone)]
pub struct Combinations<'a, T> {
    items: &'a [T],
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

pub fn combinations<T: Clone>(items: &[T], k: usize) -> Combinations<'_, T> {
    Combinations {
        items,
        indices: (0..k).collect(),
        started: false,
        done: k > items.len(),
    }
}

/// Every non-empty subset with at most `max_size` members, by ascending size.
/// `max_size == 0` means no bound.
pub fn subsets_by_size<T: Clone>(
    items: &[T],
    max_size: usize,
) -> impl Iterator<Item = Vec<T>> + '_ {
    let max = if max_size == 0 {
        items.len()
    } else {
        max_size.min(items.len())
    };
    (1..=max).flat_map(move |k| combinations(items, k))
}

impl<T: Clone> Combinations<'_, T> {
    fn current(&self) -> Vec<T> {
        self.indices.iter().map(|i| self.items[*i].clone()).collect()
    }

    fn advance(&mut self) -> bool {
        let n = self.items.len();
        let k = self.indices.len();
        let Some(pos) = (0..k).rev().find(|&i| self.indices[i] < n - k + i) else {
            return false;
        };
        self.indices[pos] += 1;
        for i in pos + 1..k {
            self.indices[i] = self.indices[i - 1] + 1;
        }
        true
    }
}

impl<T: Clone> Iterator for Combinations<'_, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
        } else if !self.advance() {
            self.done = true;
            return None;
        }
        Some(self.current())
    }
}
