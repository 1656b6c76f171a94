/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! A ball tree over the rows of a dense matrix.
//!
//! Each node covers a contiguous range of a permutation of the points and stores the
//! centroid and radius of the smallest centroid-centered ball containing them. Nodes are
//! split at the median of the dimension with the largest spread until at most
//! [`LEAF_SIZE`] points remain.

use corals_utils::views::{Matrix, MatrixView};

use crate::{
    linalg::squared_l2,
    neighbor::{Neighbor, NeighborQueue},
};

/// The maximum number of points held by a leaf.
pub const LEAF_SIZE: usize = 40;

#[derive(Debug)]
struct Node {
    start: usize,
    end: usize,
    radius: f64,
    children: Option<(usize, usize)>,
}

#[derive(Debug)]
pub struct BallTree {
    points: Matrix<f64>,
    indices: Vec<usize>,
    nodes: Vec<Node>,
    centroids: Vec<f64>,
}

impl BallTree {
    /// Build a tree over the rows of `points`.
    pub fn new(points: Matrix<f64>) -> Self {
        let mut tree = Self {
            indices: (0..points.nrows()).collect(),
            nodes: Vec::new(),
            centroids: Vec::new(),
            points,
        };
        if !tree.indices.is_empty() {
            tree.build(0, tree.indices.len());
        }
        tracing::trace!(
            points = tree.len(),
            nodes = tree.nodes.len(),
            "built ball tree"
        );
        tree
    }

    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    /// Return the point with index `id`.
    pub fn point(&self, id: usize) -> &[f64] {
        self.points.row(id)
    }

    /// Every point id once, in leaf order: points sharing a leaf are adjacent.
    pub fn order(&self) -> &[usize] {
        &self.indices
    }

    fn centroid(&self, node: usize) -> &[f64] {
        let dim = self.dim();
        &self.centroids[node * dim..(node + 1) * dim]
    }

    fn build(&mut self, start: usize, end: usize) -> usize {
        let dim = self.dim();
        let id = self.nodes.len();

        let mut centroid = vec![0.0; dim];
        for &i in &self.indices[start..end] {
            centroid
                .iter_mut()
                .zip(self.points.row(i))
                .for_each(|(c, x)| *c += x);
        }
        let count = (end - start) as f64;
        centroid.iter_mut().for_each(|c| *c /= count);

        let radius = self.indices[start..end]
            .iter()
            .map(|&i| squared_l2(&centroid, self.points.row(i)))
            .fold(0.0, f64::max)
            .sqrt();

        self.centroids.extend_from_slice(&centroid);
        self.nodes.push(Node {
            start,
            end,
            radius,
            children: None,
        });

        if end - start > LEAF_SIZE {
            let axis = self.widest_dimension(start, end);
            let mid = start + (end - start) / 2;
            let points = &self.points;
            self.indices[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
                points.row(a)[axis].total_cmp(&points.row(b)[axis])
            });

            let left = self.build(start, mid);
            let right = self.build(mid, end);
            self.nodes[id].children = Some((left, right));
        }
        id
    }

    fn widest_dimension(&self, start: usize, end: usize) -> usize {
        let mut best = (0, f64::NEG_INFINITY);
        for axis in 0..self.dim() {
            let (lo, hi) = self.indices[start..end].iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| {
                    let x = self.points.row(i)[axis];
                    (lo.min(x), hi.max(x))
                },
            );
            if hi - lo > best.1 {
                best = (axis, hi - lo);
            }
        }
        best.0
    }

    /// Lower bound on the distance (not squared) from `query` to any point in `node`.
    fn min_distance(&self, node: usize, query: &[f64]) -> f64 {
        let center = squared_l2(query, self.centroid(node)).sqrt();
        (center - self.nodes[node].radius).max(0.0)
    }

    /// Return the `k` points closest to `query`, sorted from closest to farthest.
    ///
    /// Returns all points when `k >= self.len()`. Distances are squared.
    pub fn query(&self, query: &[f64], k: usize) -> Vec<Neighbor> {
        let mut queue = NeighborQueue::new(k.min(self.len()));
        if !self.nodes.is_empty() {
            self.search_knn(0, query, &mut queue);
        }
        queue.into_sorted_vec()
    }

    fn search_knn(&self, node: usize, query: &[f64], queue: &mut NeighborQueue) {
        let bound = self.min_distance(node, query);
        if bound * bound > queue.bound() {
            return;
        }

        let Node {
            start,
            end,
            children,
            ..
        } = self.nodes[node];
        match children {
            None => {
                for &i in &self.indices[start..end] {
                    let distance = squared_l2(query, self.points.row(i));
                    if distance < queue.bound() {
                        queue.insert(Neighbor::new(i, distance));
                    }
                }
            }
            Some((left, right)) => {
                let dl = self.min_distance(left, query);
                let dr = self.min_distance(right, query);
                let (first, second) = if dl <= dr { (left, right) } else { (right, left) };
                self.search_knn(first, query, queue);
                self.search_knn(second, query, queue);
            }
        }
    }

    /// Return the ids of all points within distance `radius` of `query`, in ascending
    /// order.
    pub fn query_radius(&self, query: &[f64], radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() && radius >= 0.0 {
            self.search_radius(0, query, radius, &mut out);
        }
        out.sort_unstable();
        out
    }

    fn search_radius(&self, node: usize, query: &[f64], radius: f64, out: &mut Vec<usize>) {
        let center = squared_l2(query, self.centroid(node)).sqrt();
        let Node {
            start,
            end,
            radius: ball,
            children,
        } = self.nodes[node];

        if center - ball > radius {
            return;
        }
        if center + ball <= radius {
            out.extend_from_slice(&self.indices[start..end]);
            return;
        }

        match children {
            None => {
                let r2 = radius * radius;
                out.extend(
                    self.indices[start..end]
                        .iter()
                        .copied()
                        .filter(|&i| squared_l2(query, self.points.row(i)) <= r2),
                );
            }
            Some((left, right)) => {
                self.search_radius(left, query, radius, out);
                self.search_radius(right, query, radius, out);
            }
        }
    }
}

/// Stack `points` on top of its negation, giving a `2n x d` matrix whose row `n + j` is
/// `-points[j]`.
pub fn with_negation(points: MatrixView<'_, f64>) -> Matrix<f64> {
    let (n, d) = points.shape();
    let mut out = Matrix::new(0.0, 2 * n, d);
    let (top, bottom) = out.as_mut_slice().split_at_mut(n * d);
    top.copy_from_slice(points.as_slice());
    bottom
        .iter_mut()
        .zip(points.as_slice())
        .for_each(|(o, x)| *o = -x);
    out
}
