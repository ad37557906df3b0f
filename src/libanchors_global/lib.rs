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

/* -------- Modules -------- */

mod aggregator;
mod coverage_pick;
mod importance;
mod matrix;
mod submodular;

/* -------- Exports -------- */

pub use self::aggregator::GlobalAggregator;
pub use self::coverage_pick::CoveragePick;
pub use self::importance::{Atom, AtomIdentity, ImportanceMode};
pub use self::matrix::ExplanationMatrix;
pub use self::submodular::SubmodularPick;
