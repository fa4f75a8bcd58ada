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

//! Item hashing feeding the HLL coupons.
//!
//! Items are hashed with MurmurHash3 x64-128. The low 64 bits choose the register
//! address and the high 64 bits supply the leading-zero run.

use std::hash::Hash;

/// Seed used by every HLL sketch; sketches built with other seeds cannot be merged.
pub(crate) const DEFAULT_UPDATE_SEED: u32 = 9001;

/// Hash any `Hash` value through the streaming 128-bit hasher.
pub(crate) fn hash_value<T: Hash>(value: T) -> (u64, u64) {
    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_UPDATE_SEED);
    value.hash(&mut hasher);
    hasher.finish128()
}

/// Hash a raw byte string, bit-compatible with other DataSketches implementations.
pub(crate) fn hash_bytes(bytes: &[u8]) -> (u64, u64) {
    mur3::murmurhash3_x64_128(bytes, DEFAULT_UPDATE_SEED)
}
