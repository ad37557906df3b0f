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

use crate::error::AnchorError;
use crate::instance::DataInstance;

/// The discrete label a classifier assigns to an instance.
pub type Label = i32;

/// The black-box model being explained. Implementations must be
/// deterministic, or at least stochastically stable, under identical inputs
/// for the duration of a single construction run.
pub trait ClassificationFunction<I: DataInstance>: Send + Sync {
    /// Returns the label of a single instance.
    ///
    /// # Arguments
    ///
    /// * `instance` -
    ///
    fn predict(&self, instance: &I) -> Result<Label, AnchorError>;

    /// Returns the labels of a batch of instances, in order. The default
    /// implementation forwards to `predict` one instance at a time, batch
    /// oriented models should override it.
    ///
    /// # Arguments
    ///
    /// * `instances` -
    ///
    fn predict_batch(&self, instances: &[I]) -> Result<Vec<Label>, AnchorError> {
        instances.iter().map(|instance| self.predict(instance)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::TabularInstance;

    struct SignClassifier;

    impl ClassificationFunction<TabularInstance> for SignClassifier {
        fn predict(&self, instance: &TabularInstance) -> Result<Label, AnchorError> {
            Ok(if instance.value(0) > 0 { 1 } else { 0 })
        }
    }

    #[test]
    fn default_batch_matches_predict() {
        let classifier = SignClassifier;
        let instances = vec! [
            TabularInstance::new(vec! [1]),
            TabularInstance::new(vec! [-1]),
            TabularInstance::new(vec! [3])
        ];

        assert_eq!(classifier.predict_batch(&instances).unwrap(), vec! [1, 0, 1]);
    }
}
