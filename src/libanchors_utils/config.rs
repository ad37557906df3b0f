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

use std::env;
use std::str::FromStr;
use std::thread;

/// Returns the value of the environment variable `name` parsed as a `T`, or
/// `default` if the variable is unset or fails to parse.
///
/// # Arguments
///
/// * `name` - the name of the environment variable
/// * `default` - the value to use when the variable is absent or malformed
///
fn env_or_default<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.parse::<T>().unwrap_or(default),
        Err(_) => default
    }
}

/// Returns the number of worker threads available on this machine, used as
/// the default pool capacity.
fn default_parallelism() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

lazy_static! {
    /// The number of worker threads in each fixed-size pool. Always at
    /// least one.
    pub static ref NUM_WORKERS: usize = env_or_default("ANCHORS_NUM_WORKERS", default_parallelism()).max(1);

    /// The number of perturbations drawn up-front by the perturbation based
    /// coverage estimator.
    pub static ref COVERAGE_SAMPLE_COUNT: usize = env_or_default("ANCHORS_COVERAGE_SAMPLES", 1000).max(1);

    /// The number of additional samples requested per candidate each time a
    /// bandit asks for one more batch.
    pub static ref SAMPLE_BATCH_SIZE: usize = env_or_default("ANCHORS_BATCH_SIZE", 100).max(1);
}
