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

use anchors_core::TabularInstance;
use anchors_global::{AtomIdentity, GlobalAggregator, ImportanceMode};
use anchors_search::ConstructionOptions;

use crate::fixtures::{QuadrantClassifier, UniformOffsetPerturbation};

fn aggregator() -> GlobalAggregator<TabularInstance> {
    GlobalAggregator::new(
        Arc::new(QuadrantClassifier),
        Arc::new(UniformOffsetPerturbation::new(TabularInstance::new(vec! [1, 1]), 0xfeed)),
        ConstructionOptions {
            tau: 0.8,
            beam_size: 1,
            init_sample_count: 20,
            ..Default::default()
        }
    ).unwrap()
}

fn instances() -> Vec<TabularInstance> {
    vec! [
        TabularInstance::new(vec! [1, 100]),
        TabularInstance::new(vec! [1, 1]),
        TabularInstance::new(vec! [1, 0]),
        TabularInstance::new(vec! [100, 100])
    ]
}

#[test]
fn every_quadrant_instance_is_explained() {
    let results = aggregator().with_worker_count(2).explain(&instances());

    assert_eq!(results.len(), 4);

    for result in &results {
        assert!(result.is_anchor(), "{} is not an anchor", result);
        assert!(result.precision() >= 0.8);
    }
}

#[test]
fn global_summary_is_a_subset_of_the_local_results() {
    let picked = aggregator()
        .with_worker_count(2)
        .with_importance_mode(ImportanceMode::FeatureAppearance)
        .explain_global(&instances(), 2);

    assert!(!picked.is_empty());
    assert!(picked.len() <= 2);

    for result in &picked {
        assert!(result.is_anchor());
    }
}

#[test]
fn feature_value_atoms_distinguish_origins() {
    let picked = aggregator()
        .with_worker_count(2)
        .with_atom_identity(AtomIdentity::FeatureValue)
        .with_importance_mode(ImportanceMode::FeatureAppearance)
        .explain_global(&instances(), 4);

    assert!(!picked.is_empty());
}
