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

//! Coupon helpers shared by the sparse representations.
//!
//! Sparse images store raw coupons, so their estimate and bounds depend only on the
//! number of distinct coupons held.

use crate::common::NumStdDev;
use crate::hll::KEY_BITS_26;
use crate::hll::harmonic_numbers;
use crate::memory::Memory;

/// Sentinel value indicating an empty coupon slot
pub(crate) const COUPON_EMPTY: u32 = 0;

/// Relative standard error of the coupon estimate.
const COUPON_RSE_FACTOR: f64 = 0.409;
const COUPON_RSE: f64 = COUPON_RSE_FACTOR / (1 << 13) as f64;

/// Cardinality estimate for `count` distinct coupons.
///
/// Distinct items can collide on the same 26-bit slot and value, so the estimate is
/// the expected number of items that produced `count` distinct coupons.
pub(crate) fn coupon_estimate(count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let len = count as f64;
    len.max(harmonic_numbers::bitmap_estimate(1 << KEY_BITS_26, count))
}

pub(crate) fn coupon_upper_bound(count: u32, num_std_dev: NumStdDev) -> f64 {
    let len = count as f64;
    let bound = coupon_estimate(count) / (1.0 - num_std_dev.as_f64() * COUPON_RSE);
    len.max(bound)
}

pub(crate) fn coupon_lower_bound(count: u32, num_std_dev: NumStdDev) -> f64 {
    let len = count as f64;
    let bound = coupon_estimate(count) / (1.0 + num_std_dev.as_f64() * COUPON_RSE);
    len.max(bound)
}

/// Non-empty coupons of `slots` consecutive slots starting at `start`, in slot order.
pub(crate) fn live_coupons(mem: &Memory, start: usize, slots: usize) -> Vec<u32> {
    let mut coupons = mem.get_u32_array(start, slots);
    coupons.retain(|&coupon| coupon != COUPON_EMPTY);
    coupons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_estimate_tracks_count() {
        assert_eq!(coupon_estimate(0), 0.0);
        for count in [1, 7, 8, 100, 3000] {
            let est = coupon_estimate(count);
            assert!(est >= count as f64);
            assert!(est < count as f64 * 1.001, "count {count}, estimate {est}");
        }
    }

    #[test]
    fn test_coupon_bounds_bracket_estimate() {
        for count in [1, 8, 500] {
            let est = coupon_estimate(count);
            for n in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
                assert!(coupon_lower_bound(count, n) <= est);
                assert!(coupon_lower_bound(count, n) >= count as f64);
                assert!(coupon_upper_bound(count, n) >= est);
            }
        }
    }

    #[test]
    fn test_live_coupons_skip_empty_slots() {
        let mut mem = Memory::Heap(vec![0u8; 24]);
        mem.put_u32(8, 5).unwrap();
        mem.put_u32(16, 9).unwrap();
        assert_eq!(live_coupons(&mem, 4, 5), vec![5, 9]);
        assert!(live_coupons(&mem, 20, 1).is_empty());
    }
}
