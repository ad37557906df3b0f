// Copyright 2020 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
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

use anchors_core::{AnchorError, Candidate, DataInstance};

use super::{EvaluationContext, ExecutionStrategy};

/// Evaluates registered candidates one after another on the calling
/// thread.
#[derive(Default)]
pub struct LinearExecution;

impl<I: DataInstance> ExecutionStrategy<I> for LinearExecution {
    fn execute(
        &self,
        context: &EvaluationContext<I>,
        requests: &[(Arc<Candidate>, usize)]
    ) -> Result<(), AnchorError>
    {
        for (candidate, count) in requests {
            context.evaluate(candidate, *count)?;
        }

        Ok(())
    }
}
