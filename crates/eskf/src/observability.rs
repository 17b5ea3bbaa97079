//! Observability analysis over a sliding window of corrections.
//!
//! Stacks `[H₁; H₂Φ₁; H₃Φ₂Φ₁; …]`, where `Φₖ` is the error-state transition
//! accumulated between correction `k` and `k + 1`, and reports the singular
//! values of the stack. Error states outside the observable subspace show up
//! as (near) zero singular values.

use std::collections::VecDeque;

use contracts::{Covariance, ERROR_STATE_DIM};
use nalgebra::DMatrix;
use serde::Serialize;

/// Singular values and numerical rank of the observability matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservabilityReport {
    /// Corrections stacked
    pub corrections: usize,

    /// Singular values, descending
    pub singular_values: Vec<f64>,

    /// Singular values above the numerical tolerance
    pub rank: usize,
}

impl ObservabilityReport {
    /// Whether every error state is observable over the window
    pub fn is_fully_observable(&self) -> bool {
        self.rank == ERROR_STATE_DIM
    }
}

#[derive(Debug, Clone)]
struct Segment {
    /// Transition from the previous correction to this one
    transition: Covariance,
    jacobian: DMatrix<f64>,
}

/// Accumulates transitions and Jacobians between corrections
#[derive(Debug, Clone)]
pub struct ObservabilityAnalyzer {
    window: usize,
    pending: Covariance,
    segments: VecDeque<Segment>,
}

impl ObservabilityAnalyzer {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            pending: Covariance::identity(),
            segments: VecDeque::new(),
        }
    }

    /// Chain one prediction step
    #[inline]
    pub fn accumulate(&mut self, transition: &Covariance) {
        self.pending = transition * self.pending;
    }

    /// Close the current segment with the Jacobian of an accepted correction
    pub fn record_correction(&mut self, jacobian: &DMatrix<f64>) {
        if self.segments.len() == self.window {
            self.segments.pop_front();
        }
        self.segments.push_back(Segment {
            transition: self.pending,
            jacobian: jacobian.clone(),
        });
        self.pending = Covariance::identity();
    }

    #[inline]
    pub fn corrections(&self) -> usize {
        self.segments.len()
    }

    /// Build the stacked matrix and decompose it
    pub fn report(&self) -> Option<ObservabilityReport> {
        if self.segments.is_empty() {
            return None;
        }

        let rows: usize = self.segments.iter().map(|s| s.jacobian.nrows()).sum();
        let mut stacked = DMatrix::zeros(rows, ERROR_STATE_DIM);
        let mut chained = DMatrix::<f64>::identity(ERROR_STATE_DIM, ERROR_STATE_DIM);
        let mut row = 0;

        for (i, segment) in self.segments.iter().enumerate() {
            // the oldest segment's transition precedes the window
            if i > 0 {
                let phi = DMatrix::from_column_slice(
                    ERROR_STATE_DIM,
                    ERROR_STATE_DIM,
                    segment.transition.as_slice(),
                );
                chained = phi * chained;
            }
            let block = &segment.jacobian * &chained;
            let n = block.nrows();
            stacked.rows_mut(row, n).copy_from(&block);
            row += n;
        }

        let mut singular_values: Vec<f64> = stacked
            .svd(false, false)
            .singular_values
            .iter()
            .copied()
            .collect();
        singular_values.sort_by(|a, b| b.total_cmp(a));

        let largest = singular_values.first().copied().unwrap_or(0.0);
        let tolerance = largest * rows.max(ERROR_STATE_DIM) as f64 * f64::EPSILON;
        let rank = singular_values.iter().filter(|s| **s > tolerance).count();

        Some(ObservabilityReport {
            corrections: self.segments.len(),
            singular_values,
            rank,
        })
    }
}
