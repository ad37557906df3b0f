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

use anchors_core::{AnchorResult, DataInstance};

use crate::importance::{AtomIdentity, ImportanceMode};
use crate::matrix::ExplanationMatrix;

/// Greedy submodular selection of a small set of explanations that covers
/// as much column importance as possible.
pub struct SubmodularPick {
    identity: AtomIdentity,
    mode: ImportanceMode
}

impl SubmodularPick {
    pub fn new(identity: AtomIdentity, mode: ImportanceMode) -> Self {
        Self { identity, mode }
    }

    /// Picks up to `count` explanations, greedily maximizing the summed
    /// importance of the atoms the selection touches. Ties keep the first
    /// row encountered; the selection stops early once no remaining row
    /// improves the objective above zero.
    ///
    /// # Arguments
    ///
    /// * `results` -
    /// * `count` -
    ///
    pub fn pick<I: DataInstance>(
        &self,
        results: Vec<AnchorResult<I>>,
        count: usize
    ) -> Vec<AnchorResult<I>>
    {
        let matrix = ExplanationMatrix::build(&results, self.identity, self.mode);
        let mut remaining = (0..results.len()).collect::<Vec<_>>();
        let mut column_sums = vec! [0.0; matrix.num_atoms()];
        let mut selected = vec! [];

        for _ in 0..count.min(results.len()) {
            let mut best_score = f64::NEG_INFINITY;
            let mut best_row = None;

            for &row in &remaining {
                let candidate_sums = column_sums.iter()
                    .zip(matrix.row(row).iter())
                    .map(|(&sum, &cell)| sum + cell)
                    .collect::<Vec<_>>();
                let score = matrix.score(&candidate_sums);

                if score > best_score {
                    best_score = score;
                    best_row = Some(row);
                }
            }

            let row = match best_row {
                Some(row) if best_score > 0.0 => row,
                _ => break
            };

            for (sum, &cell) in column_sums.iter_mut().zip(matrix.row(row).iter()) {
                *sum += cell;
            }

            remaining.retain(|&r| r != row);
            selected.push(row);
        }

        take_rows(results, &selected)
    }
}

/// Extracts the given rows, in order, out of the result list.
pub(crate) fn take_rows<I: DataInstance>(
    results: Vec<AnchorResult<I>>,
    rows: &[usize]
) -> Vec<AnchorResult<I>>
{
    let mut slots = results.into_iter().map(Some).collect::<Vec<_>>();

    rows.iter()
        .map(|&row| slots[row].take().expect("row selected twice"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors_core::{Candidate, TabularInstance};
    use std::sync::Arc;
    use std::time::Duration;

    fn result_with_features(features: &[usize]) -> AnchorResult<TabularInstance> {
        let mut candidate: Option<Arc<Candidate>> = None;

        for &feature in features {
            let next = match &candidate {
                None => Candidate::new(vec! [feature], None).unwrap(),
                Some(parent) => Candidate::extend(parent, feature).unwrap()
            };
            next.register_samples(10, 10).unwrap();
            next.set_coverage(0.5).unwrap();
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
    fn picks_the_widest_row_first() {
        // two explanations over three atoms: the first touches two of
        // them, so it scores 2 against 1 and is picked first; the second
        // then completes the score to 3
        let results = vec! [
            result_with_features(&[0, 2]),
            result_with_features(&[1])
        ];
        let picked = SubmodularPick::new(AtomIdentity::Feature, ImportanceMode::FeatureAppearance)
            .pick(results, 2);

        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].ordered_features(), &[0, 2]);
        assert_eq!(picked[1].ordered_features(), &[1]);
    }

    #[test]
    fn stops_once_nothing_scores() {
        let results = vec! [result_with_features(&[0])];
        let picked = SubmodularPick::new(AtomIdentity::Feature, ImportanceMode::FeatureAppearance)
            .pick(results, 5);

        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn ties_keep_the_first_row() {
        let results = vec! [
            result_with_features(&[0]),
            result_with_features(&[1])
        ];
        let picked = SubmodularPick::new(AtomIdentity::Feature, ImportanceMode::FeatureAppearance)
            .pick(results, 1);

        assert_eq!(picked[0].ordered_features(), &[0]);
    }

    #[test]
    fn score_never_decreases_as_the_selection_grows() {
        let results = vec! [
            result_with_features(&[0, 2]),
            result_with_features(&[1]),
            result_with_features(&[2]),
            result_with_features(&[1, 0])
        ];
        let matrix = ExplanationMatrix::build(
            &results,
            AtomIdentity::Feature,
            ImportanceMode::FeatureAppearance
        );
        let mut column_sums = vec! [0.0; matrix.num_atoms()];
        let mut previous = 0.0;

        for row in 0..results.len() {
            for (sum, &cell) in column_sums.iter_mut().zip(matrix.row(row).iter()) {
                *sum += cell;
            }

            let score = matrix.score(&column_sums);

            assert!(score >= previous, "score {} fell below {}", score, previous);
            previous = score;
        }
    }
}
