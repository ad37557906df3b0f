// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use std::fmt::Debug;
use std::hash::Hash;

/// A single input to the classifier, seen by the engine only as a fixed
/// number of indexable feature values. The value type feeds the global
/// phase, where a `(feature, value)` pair can act as an explanation atom, so
/// it must support equality and hashing.
pub trait DataInstance: Clone + Send + Sync + 'static {
    type Value: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns the number of features of this instance.
    fn feature_count(&self) -> usize;

    /// Returns the value of the given feature.
    ///
    /// # Arguments
    ///
    /// * `feature` - the feature index, must be less than `feature_count()`
    ///
    fn value(&self, feature: usize) -> Self::Value;
}

/// A dense row of discretized tabular features.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TabularInstance {
    values: Vec<i64>
}

impl TabularInstance {
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

impl DataInstance for TabularInstance {
    type Value = i64;

    fn feature_count(&self) -> usize {
        self.values.len()
    }

    fn value(&self, feature: usize) -> i64 {
        self.values[feature]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabular_instance() {
        let instance = TabularInstance::new(vec! [1, 100]);

        assert_eq!(instance.feature_count(), 2);
        assert_eq!(instance.value(0), 1);
        assert_eq!(instance.value(1), 100);
    }
}
