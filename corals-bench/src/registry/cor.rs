/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use corals::{Outcome, full};
use corals_utils::views::MatrixView;

/// Full correlation matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cor {
    Corrcoef,
    Symmetrical,
    SymmetricalNocopy,
    Asymmetrical,
}

impl Cor {
    pub(super) fn all() -> Vec<Self> {
        vec![
            Self::Corrcoef,
            Self::Symmetrical,
            Self::SymmetricalNocopy,
            Self::Asymmetrical,
        ]
    }

    pub(super) fn run(&self, data: MatrixView<'_, f64>) -> Outcome {
        let matrix = match self {
            Self::Corrcoef => full::corrcoef(data),
            Self::Symmetrical => full::matrix_symmetrical(data),
            Self::SymmetricalNocopy => full::matrix_symmetrical_nocopy(data),
            Self::Asymmetrical => full::matrix_asymmetrical(data, data),
        };
        Outcome::Dense(matrix)
    }
}

impl fmt::Display for Cor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Corrcoef => "cor_corrcoef",
            Self::Symmetrical => "cor_matrix_symmetrical",
            Self::SymmetricalNocopy => "cor_matrix_symmetrical_nocopy",
            Self::Asymmetrical => "cor_matrix_asymmetrical",
        };
        f.write_str(name)
    }
}
