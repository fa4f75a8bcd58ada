// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Harmonic numbers and the bitmap (linear counting) estimator built on them.

/// Below this, harmonic numbers are summed exactly.
const NUM_EXACT_HARMONIC_NUMBERS: u64 = 25;

const EULER_MASCHERONI_CONSTANT: f64 = 0.577_215_664_901_532_9;

/// The n-th harmonic number, `1 + 1/2 + ... + 1/n`. `H(0)` is 0.
pub(crate) fn harmonic_number(n: u64) -> f64 {
    if n < NUM_EXACT_HARMONIC_NUMBERS {
        (1..=n).map(|i| 1.0 / i as f64).sum()
    } else {
        let x = n as f64;
        let inv_sq = 1.0 / (x * x);
        EULER_MASCHERONI_CONSTANT + x.ln() + 0.5 / x - inv_sq / 12.0 + inv_sq * inv_sq / 120.0
    }
}

/// Expected number of distinct items that set `num_bits_set` out of
/// `bit_vector_length` bits.
pub(crate) fn bitmap_estimate(bit_vector_length: u32, num_bits_set: u32) -> f64 {
    debug_assert!(num_bits_set <= bit_vector_length);
    if num_bits_set == 0 {
        return 0.0;
    }
    let k = bit_vector_length as u64;
    let unset = k - num_bits_set as u64;
    k as f64 * (harmonic_number(k) - harmonic_number(unset))
}
