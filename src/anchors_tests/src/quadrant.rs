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
use anchors_search::{AnchorConstruction, BalancedParallelExecution, ConstructionOptions};

use crate::fixtures::{QuadrantClassifier, UniformOffsetPerturbation};

fn options() -> ConstructionOptions {
    ConstructionOptions {
        tau: 0.8,
        beam_size: 1,
        init_sample_count: 20,
        ..Default::default()
    }
}

fn construct(x: i64, y: i64, seed: u64) -> AnchorConstruction<TabularInstance> {
    let instance = TabularInstance::new(vec! [x, y]);
    let perturbation = UniformOffsetPerturbation::new(instance.clone(), seed);
    let label = if x > 0 && y > 0 { 1 } else { 0 };

    AnchorConstruction::new(
        Arc::new(QuadrantClassifier),
        Arc::new(perturbation),
        instance,
        label,
        options()
    ).unwrap()
}

// far inside the quadrant on the y axis, only x is ever at risk from the
// +-5 offsets, so fixing x alone already preserves the label
#[test]
fn single_feature_boundary() {
    let result = construct(1, 100, 0x5eed).construct().unwrap();

    assert!(result.is_anchor());
    assert_eq!(result.canonical_features().iter().cloned().collect::<Vec<_>>(), vec! [0]);
    assert!(result.precision() >= 0.8);
}

// with both coordinates at 1 either one can be pushed out of the quadrant,
// so only the full conjunction is an anchor
#[test]
fn both_features_near_the_boundary() {
    let result = construct(1, 1, 0x5eed).construct().unwrap();

    assert!(result.is_anchor());
    assert_eq!(result.canonical_features().iter().cloned().collect::<Vec<_>>(), vec! [0, 1]);
    assert_eq!(result.precision(), 1.0);
}

// below the boundary the label is 0 and holding y = 0 fixed keeps it there
#[test]
fn below_the_boundary() {
    let result = construct(1, 0, 0x5eed).construct().unwrap();

    assert!(result.is_anchor());
    assert_eq!(result.canonical_features().iter().cloned().collect::<Vec<_>>(), vec! [1]);
}

#[test]
fn repeated_runs_find_the_same_anchor() {
    let first = construct(1, 1, 42).construct().unwrap();
    let second = construct(1, 1, 42).construct().unwrap();

    assert_eq!(first.canonical_features(), second.canonical_features());
}

#[test]
fn balanced_sampling_finds_the_same_anchor() {
    let result = construct(1, 100, 7)
        .with_execution(BalancedParallelExecution::default())
        .construct()
        .unwrap();

    assert!(result.is_anchor());
    assert_eq!(result.canonical_features().iter().cloned().collect::<Vec<_>>(), vec! [0]);
}

#[test]
fn result_carries_timing_metadata() {
    let result = construct(1, 100, 11).construct().unwrap();

    assert!(result.time_to_result() >= result.time_spent_sampling());
    assert!(result.sampled_size() > 0);
}
