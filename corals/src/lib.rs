/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Correlation search over the columns of a samples-by-features matrix.
//!
//! Every entry point accepts a row-major `m x n` matrix whose rows are samples and whose
//! columns are features, and reasons about the `n x n` Pearson correlation matrix between
//! features. Exact methods materialize (part of) that matrix with a Gram product. The
//! approximate methods standardize each feature to a unit vector, where correlation is a
//! dot product and `|z_i - z_j|^2 = 2 - 2 r_ij`, and use a [`balltree::BallTree`] to find
//! the strongest candidates without visiting every pair.
#![cfg_attr(
    not(test),
    warn(clippy::panic, clippy::unwrap_used, clippy::expect_used)
)]

pub mod balltree;
pub mod batched;
pub mod error;
pub mod full;
pub mod linalg;
pub mod neighbor;
pub mod result;
pub mod search;
pub mod standardize;
pub mod threads;
pub mod threshold;
pub mod topk;
pub mod topkdiff;

pub use balltree::BallTree;
pub use batched::{Mapper, topk_batched};
pub use error::CorrelationError;
pub use result::{Correlations, Outcome};
pub use search::Strategy;
pub use threads::Executor;
