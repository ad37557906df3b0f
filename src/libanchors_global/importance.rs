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

use std::sync::Arc;

use anchors_core::{AnchorResult, Candidate, DataInstance};

/// A column of the explanation matrix: either a bare feature index, or a
/// feature together with the value it took in the explained instance (used
/// for discretized or categorical tabular features).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Atom<V> {
    Feature(usize),
    FeatureValue(usize, V)
}

/// Which of the two atom flavours the global phase aggregates over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomIdentity {
    Feature,
    FeatureValue
}

impl AtomIdentity {
    /// Returns the atom a feature of the given result maps to.
    ///
    /// # Arguments
    ///
    /// * `result` -
    /// * `feature` -
    ///
    pub fn atom_of<I: DataInstance>(&self, result: &AnchorResult<I>, feature: usize) -> Atom<I::Value> {
        match *self {
            AtomIdentity::Feature => Atom::Feature(feature),
            AtomIdentity::FeatureValue => Atom::FeatureValue(feature, result.instance().value(feature))
        }
    }
}

/// How much weight an explanation assigns to each of its atoms, and how a
/// column of such weights folds into a single column importance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportanceMode {
    /// The clamped precision gained when the feature joined the rule.
    FeaturePrecision,

    /// One minus the clamped ratio of coverage kept when the feature
    /// joined the rule.
    FeatureCoverage,

    /// One if the atom appears in the explanation at all.
    FeatureAppearance
}

/// Returns the ancestor of `candidate` whose final growth step added the
/// given feature.
///
/// # Arguments
///
/// * `candidate` -
/// * `feature` -
///
fn introducing_ancestor(candidate: &Arc<Candidate>, feature: usize) -> Option<&Arc<Candidate>> {
    let mut node = Some(candidate);

    while let Some(current) = node {
        if current.ordered_features().last() == Some(&feature) {
            return Some(current);
        }

        node = current.parent();
    }

    None
}

impl ImportanceMode {
    /// Returns the importance the given result assigns to one of its own
    /// features.
    ///
    /// # Arguments
    ///
    /// * `result` - the explanation
    /// * `feature` - a feature present in the explanation
    ///
    pub fn cell<I: DataInstance>(&self, result: &AnchorResult<I>, feature: usize) -> f64 {
        let ancestor = introducing_ancestor(result.candidate(), feature);

        match *self {
            ImportanceMode::FeaturePrecision => {
                ancestor.map(|a| a.added_precision().clamp(0.0, 1.0)).unwrap_or(0.0)
            },
            ImportanceMode::FeatureCoverage => {
                ancestor.map(|a| 1.0 - a.added_coverage_ratio().clamp(0.0, 1.0)).unwrap_or(0.0)
            },
            ImportanceMode::FeatureAppearance => 1.0
        }
    }

    /// Folds one matrix column into its importance.
    ///
    /// # Arguments
    ///
    /// * `column` -
    /// * `identity` - the atom flavour the matrix was built with; the
    ///   precision mode averages instead of sums for feature-value atoms
    ///
    pub fn fold(&self, column: &[f64], identity: AtomIdentity) -> f64 {
        let sum = column.iter().sum::<f64>();

        match *self {
            ImportanceMode::FeaturePrecision => {
                if identity == AtomIdentity::FeatureValue {
                    let non_zero = column.iter().filter(|&&v| v != 0.0).count();

                    if non_zero == 0 { 0.0 } else { sum / non_zero as f64 }
                } else {
                    sum
                }
            },
            ImportanceMode::FeatureCoverage => sum,
            ImportanceMode::FeatureAppearance => sum.sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors_core::TabularInstance;
    use std::time::Duration;

    fn chain() -> Arc<Candidate> {
        let root = Arc::new(Candidate::new(vec! [2], None).unwrap());
        root.register_samples(10, 5).unwrap();
        root.set_coverage(0.8).unwrap();

        let child = Arc::new(Candidate::extend(&root, 0).unwrap());
        child.register_samples(10, 9).unwrap();
        child.set_coverage(0.4).unwrap();

        child
    }

    fn result() -> AnchorResult<TabularInstance> {
        AnchorResult::new(
            chain(),
            TabularInstance::new(vec! [7, 8, 9]),
            1,
            true,
            Duration::from_millis(1),
            Duration::from_millis(1)
        )
    }

    #[test]
    fn finds_the_introducing_ancestor() {
        let candidate = chain();

        assert_eq!(introducing_ancestor(&candidate, 0).unwrap().feature_count(), 2);
        assert_eq!(introducing_ancestor(&candidate, 2).unwrap().feature_count(), 1);
        assert!(introducing_ancestor(&candidate, 1).is_none());
    }

    #[test]
    fn precision_cell_is_the_added_precision() {
        let result = result();

        // the child raised the precision from 0.5 to 0.9
        assert!((ImportanceMode::FeaturePrecision.cell(&result, 0) - 0.4).abs() < 1e-12);
        // the root has no added precision by definition
        assert_eq!(ImportanceMode::FeaturePrecision.cell(&result, 2), 0.0);
    }

    #[test]
    fn coverage_cell_is_the_lost_coverage() {
        let result = result();

        // the child kept half of its parent's coverage
        assert!((ImportanceMode::FeatureCoverage.cell(&result, 0) - 0.5).abs() < 1e-12);
        assert_eq!(ImportanceMode::FeatureCoverage.cell(&result, 2), 0.0);
    }

    #[test]
    fn appearance_cell_is_one() {
        assert_eq!(ImportanceMode::FeatureAppearance.cell(&result(), 0), 1.0);
    }

    #[test]
    fn appearance_fold_is_the_square_root() {
        assert_eq!(ImportanceMode::FeatureAppearance.fold(&[1.0, 1.0, 1.0, 1.0], AtomIdentity::Feature), 2.0);
    }

    #[test]
    fn precision_fold_averages_for_feature_values() {
        let column = [0.0, 0.4, 0.2, 0.0];

        assert!((ImportanceMode::FeaturePrecision.fold(&column, AtomIdentity::Feature) - 0.6).abs() < 1e-12);
        assert!((ImportanceMode::FeaturePrecision.fold(&column, AtomIdentity::FeatureValue) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn atom_identity_carries_the_value() {
        let result = result();

        assert_eq!(AtomIdentity::Feature.atom_of(&result, 2), Atom::Feature(2));
        assert_eq!(AtomIdentity::FeatureValue.atom_of(&result, 2), Atom::FeatureValue(2, 9));
    }
}
