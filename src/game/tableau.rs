use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;

use super::GameError;

/// Pivot-column entries at or below this value cannot bound the ratio test. The solver builds
/// its tableaus from payoffs normalized into `[1, 2]`, so the cutoff is independent of the
/// game's payoff scale.
pub const PIVOT_EPSILON: f64 = 1e-12;

/// Basis-inverse form of one side of the complementarity problem.
///
/// Row `i` of `coefficients` and `values` belongs to the label `basis[i]`. The columns of
/// `coefficients` are indexed by the labels of the whole universe `0..n + m`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    basis: Vec<usize>,
    coefficients: Array2<f64>,
    values: Array1<f64>,
}

impl Tableau {
    /// Creates a tableau starting at the all-ones basic solution.
    pub fn new(coefficients: Array2<f64>, basis: Vec<usize>) -> Result<Self, GameError> {
        let values = Array1::ones(coefficients.nrows());
        Self::with_values(coefficients, values, basis)
    }

    pub fn with_values(
        coefficients: Array2<f64>,
        values: Array1<f64>,
        basis: Vec<usize>,
    ) -> Result<Self, GameError> {
        let (rows, labels) = coefficients.dim();
        if basis.len() != rows || values.len() != rows {
            return Err(GameError::InvalidInput(format!(
                "tableau with {rows} rows needs {rows} basic labels and values, got {} and {}",
                basis.len(),
                values.len()
            )));
        }
        if let Some(label) = basis.iter().find(|&&label| label >= labels) {
            return Err(GameError::InvalidInput(format!(
                "basic label {label} out of range 0..{labels}"
            )));
        }
        for (i, label) in basis.iter().enumerate() {
            if basis[..i].contains(label) {
                return Err(GameError::InvalidInput(format!(
                    "label {label} appears twice in the basis"
                )));
            }
        }
        Ok(Tableau {
            basis,
            coefficients,
            values,
        })
    }

    pub fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn basic_values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn num_labels(&self) -> usize {
        self.coefficients.ncols()
    }

    pub fn is_basic(&self, label: usize) -> bool {
        self.basis.contains(&label)
    }

    pub fn is_feasible(&self) -> bool {
        self.values.iter().all(|v| *v >= 0.)
    }

    /// Value of every label of the universe: the basic value for basic labels, zero otherwise.
    pub fn values(&self) -> Array1<f64> {
        let mut values = Array1::zeros(self.num_labels());
        for (label, value) in self.basis.iter().zip(self.values.iter()) {
            values[*label] = *value;
        }
        values
    }

    /// Minimum ratio test for the column of `entering`. Rows whose pivot entry is not positive
    /// are skipped; ties go to the lowest row.
    fn leaving_row(&self, entering: usize) -> Option<usize> {
        Zip::indexed(&self.values)
            .and(&self.coefficients.column(entering))
            .fold(None, |best: Option<(usize, f64)>, i, b, a| {
                if *a <= PIVOT_EPSILON {
                    return best;
                }
                let ratio = *b / *a;
                match best {
                    Some((_, min_ratio)) if ratio >= min_ratio => best,
                    _ => Some((i, ratio)),
                }
            })
            .map(|(row, _)| row)
    }

    /// Brings `entering` into the basis and returns the label that leaves it.
    ///
    /// Fails with [`GameError::DegeneratePivot`] when no row qualifies in the ratio test; the
    /// tableau is left untouched in that case.
    pub fn pivot(&mut self, entering: usize) -> Result<usize, GameError> {
        if entering >= self.num_labels() {
            return Err(GameError::InvalidInput(format!(
                "entering label {entering} out of range 0..{}",
                self.num_labels()
            )));
        }
        if self.is_basic(entering) {
            return Err(GameError::InvalidInput(format!(
                "entering label {entering} is already basic"
            )));
        }
        let pivot_row = self
            .leaving_row(entering)
            .ok_or(GameError::DegeneratePivot { entering })?;

        let pivot_coeff = self.coefficients[[pivot_row, entering]];
        self.coefficients
            .row_mut(pivot_row)
            .mapv_inplace(|v| v / pivot_coeff);
        self.values[pivot_row] /= pivot_coeff;
        self.coefficients[[pivot_row, entering]] = 1.;

        let r = self.coefficients.row(pivot_row).into_owned();
        let theta = self.values[pivot_row];
        for (i, (mut row, value)) in self
            .coefficients
            .rows_mut()
            .into_iter()
            .zip(self.values.iter_mut())
            .enumerate()
        {
            if i == pivot_row {
                continue;
            }
            let e_coeff = row[entering];
            if e_coeff == 0. {
                continue;
            }
            row.scaled_add(-e_coeff, &r);
            row[entering] = 0.;
            *value -= e_coeff * theta;
            // The ratio test bounds these rows at zero; anything below is round-off.
            if e_coeff > 0. && *value < 0. {
                *value = 0.;
            }
        }

        let leaving = self.basis[pivot_row];
        self.basis[pivot_row] = entering;
        debug!("pivot: label {entering} enters, label {leaving} leaves (row {pivot_row})");
        Ok(leaving)
    }
}
