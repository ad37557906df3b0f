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

use std::collections::HashSet;

use anchors_core::{AnchorResult, DataInstance};

use crate::importance::AtomIdentity;
use crate::submodular::take_rows;

/// Selects explanations by raw coverage: the widest remaining explanation
/// is taken, and everything that shares an atom with it is discarded, until
/// the requested count is reached or nothing remains.
pub struct CoveragePick {
    identity: AtomIdentity
}

impl CoveragePick {
    pub fn new(identity: AtomIdentity) -> Self {
        Self { identity }
    }

    /// Picks up to `count` non-overlapping explanations, widest first. On
    /// equal coverage the first result encountered wins.
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
        let atoms = results.iter()
            .map(|result| {
                result.ordered_features().iter()
                    .map(|&feature| self.identity.atom_of(result, feature))
                    .collect::<HashSet<_>>()
            })
            .collect::<Vec<_>>();
        let mut remaining = (0..results.len()).collect::<Vec<_>>();
        let mut selected = vec! [];

        while selected.len() < count && !remaining.is_empty() {
            let mut best = remaining[0];

            for &row in &remaining {
                if results[row].coverage() > results[best].coverage() {
                    best = row;
                }
            }

            selected.push(best);
            remaining.retain(|&row| row != best && atoms[row].is_disjoint(&atoms[best]));
        }

        take_rows(results, &selected)
    }
}
