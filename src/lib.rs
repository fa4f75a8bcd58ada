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

//! HyperLogLog cardinality sketches.
//!
//! A sketch keeps its entire state in one byte image laid out in the DataSketches
//! HLL format. The image either lives on the heap or in a region the caller owns,
//! and sketches move through three representations as they fill: a short coupon
//! list, an open-addressing coupon set, and a dense register array of 4, 6 or 8
//! bits per register.
//!
//! # Usage
//!
//! ```rust
//! use datasketches_hll::common::NumStdDev;
//! use datasketches_hll::hll::{HllSketch, HllType};
//!
//! let mut sketch = HllSketch::new(12, HllType::Hll8);
//! for i in 0..10_000 {
//!     sketch.update(i).unwrap();
//! }
//!
//! let bytes = sketch.to_bytes();
//! let restored = HllSketch::wrap(&bytes).unwrap();
//! assert_eq!(restored.estimate(), sketch.estimate());
//! assert!(restored.upper_bound(NumStdDev::Two) >= restored.estimate());
//! ```

pub mod codec;
pub mod common;
pub mod error;
pub mod hll;

mod hash;
mod memory;
