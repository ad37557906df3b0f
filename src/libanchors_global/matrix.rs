// Copyright 2021 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use anchors_core::{AnchorResult, DataInstance};

use crate::importance::{Atom, AtomIdentity, ImportanceMode};

/// The dense importance matrix of the global phase: one row per
/// explanation, one column per distinct atom, and a per-column importance
/// folded from the cells. Atoms are numbered in first-appearance order over
/// the results, so the layout is deterministic for a fixed result order.
pub struct ExplanationMatrix<V> {
    atoms: Vec<Atom<V>>,
    rows: Vec<Vec<f64>>,
    column_importance: Vec<f64>
}

impl<V: Clone + Eq + std::hash::Hash> ExplanationMatrix<V> {
    /// Builds the matrix of the given explanations.
    ///
    /// # Arguments
    ///
    /// * `results` -
    /// * `identity` - what counts as a column
    /// * `mode` - what the cells and column importances hold
    ///
    pub fn build<I>(results: &[AnchorResult<I>], identity: AtomIdentity, mode: ImportanceMode) -> Self
        where I: DataInstance<Value = V>
    {
        let mut index: HashMap<Atom<V>, usize> = HashMap::new();
        let mut atoms = vec! [];

        for result in results {
            for &feature in result.ordered_features() {
                let atom = identity.atom_of(result, feature);

                if !index.contains_key(&atom) {
                    index.insert(atom.clone(), atoms.len());
                    atoms.push(atom);
                }
            }
        }

        let mut rows = vec! [vec! [0.0; atoms.len()]; results.len()];

        for (i, result) in results.iter().enumerate() {
            for &feature in result.ordered_features() {
                let atom = identity.atom_of(result, feature);

                rows[i][index[&atom]] = mode.cell(result, feature);
            }
        }

        let column_importance = (0..atoms.len())
            .map(|j| {
                let column = rows.iter().map(|row| row[j]).collect::<Vec<_>>();

                mode.fold(&column, identity)
            })
            .collect();

        Self { atoms, rows, column_importance }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom<V>] {
        &self.atoms
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn column_importance(&self) -> &[f64] {
        &self.column_importance
    }

    /// Returns the submodular objective of a selection: the summed
    /// importance of every column that the selected rows touch.
    ///
    /// # Arguments
    ///
    /// * `column_sums` - the element-wise sum of the selected rows
    ///
    pub fn score(&self, column_sums: &[f64]) -> f64 {
        column_sums.iter()
            .zip(self.column_importance.iter())
            .filter(|&(&sum, _)| sum > 0.0)
            .map(|(_, &importance)| importance)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors_core::{Candidate, TabularInstance};
    use std::sync::Arc;
    use std::time::Duration;

    fn result_with_features(features: &[usize], coverage: f64) -> AnchorResult<TabularInstance> {
        let mut candidate: Option<Arc<Candidate>> = None;

        for &feature in features {
            let next = match &candidate {
                None => Candidate::new(vec! [feature], None).unwrap(),
                Some(parent) => Candidate::extend(parent, feature).unwrap()
            };
            next.register_samples(10, 10).unwrap();
            next.set_coverage(coverage).unwrap();
            candidate = Some(Arc::new(next));
        }

        AnchorResult::new(
            candidate.unwrap(),
            TabularInstance::new(vec! [1, 2, 3]),
            1,
            true,
            Duration::from_millis(1),
            Duration::from_millis(1)
        )
    }

    #[test]
    fn atoms_are_numbered_in_first_appearance_order() {
        let results = vec! [
            result_with_features(&[0, 2], 0.5),
            result_with_features(&[1], 0.5)
        ];
        let matrix = ExplanationMatrix::build(
            &results,
            AtomIdentity::Feature,
            ImportanceMode::FeatureAppearance
        );

        assert_eq!(matrix.atoms(), &[Atom::Feature(0), Atom::Feature(2), Atom::Feature(1)]);
        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.row(0), &[1.0, 1.0, 0.0]);
        assert_eq!(matrix.row(1), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn appearance_importance_is_the_root_of_the_counts() {
        let results = vec! [
            result_with_features(&[0], 0.5),
            result_with_features(&[0], 0.5),
            result_with_features(&[0, 1], 0.5),
            result_with_features(&[0, 1], 0.5)
        ];
        let matrix = ExplanationMatrix::build(
            &results,
            AtomIdentity::Feature,
            ImportanceMode::FeatureAppearance
        );

        assert_eq!(matrix.column_importance(), &[2.0, 2.0f64.sqrt()]);
    }

    #[test]
    fn score_counts_only_touched_columns() {
        let results = vec! [
            result_with_features(&[0, 2], 0.5),
            result_with_features(&[1], 0.5)
        ];
        let matrix = ExplanationMatrix::build(
            &results,
            AtomIdentity::Feature,
            ImportanceMode::FeatureAppearance
        );

        assert_eq!(matrix.score(&[1.0, 1.0, 0.0]), 2.0);
        assert_eq!(matrix.score(&[0.0, 0.0, 1.0]), 1.0);
        assert_eq!(matrix.score(&[1.0, 1.0, 1.0]), 3.0);
        assert_eq!(matrix.score(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn distinct_values_make_distinct_atoms() {
        let results = vec! [
            result_with_features(&[0], 0.5),
            result_with_features(&[0], 0.5)
        ];
        let matrix = ExplanationMatrix::build(
            &results,
            AtomIdentity::FeatureValue,
            ImportanceMode::FeatureAppearance
        );

        // both instances carry the same values, so the atoms collapse
        assert_eq!(matrix.num_atoms(), 1);
    }
}
