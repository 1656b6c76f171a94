/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{cmp::Ordering, collections::BinaryHeap};

//////////////
// Neighbor //
//////////////

/// A point found by a nearest-neighbor query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// The index of the point in the tree.
    pub id: usize,

    /// The squared euclidean distance from the query to the point.
    pub distance: f64,
}

impl Neighbor {
    pub fn new(id: usize, distance: f64) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

/// Orders by distance, breaking ties by id so that results are deterministic.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///////////////////
// NeighborQueue //
///////////////////

/// Keeps the `capacity` closest neighbors seen so far.
#[derive(Debug)]
pub struct NeighborQueue {
    heap: BinaryHeap<Neighbor>,
    capacity: usize,
}

impl NeighborQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// The distance a candidate must beat to be admitted.
    ///
    /// Infinite until the queue is full.
    pub fn bound(&self) -> f64 {
        if self.heap.len() < self.capacity {
            f64::INFINITY
        } else {
            self.heap.peek().map_or(f64::NEG_INFINITY, |n| n.distance)
        }
    }

    pub fn insert(&mut self, neighbor: Neighbor) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(neighbor);
        } else if let Some(mut worst) = self.heap.peek_mut()
            && neighbor < *worst
        {
            *worst = neighbor;
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume the queue, returning neighbors sorted from closest to farthest.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}
