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

//! HIP (Historical Inverse Probability) Estimator for HyperLogLog
//!
//! The HIP estimator provides improved cardinality estimation by maintaining
//! an accumulator that tracks the historical sequence of register updates.
//! This is more accurate than the standard HLL estimator, especially for
//! moderate cardinalities.
//!
//! The estimator state lives in the dense image itself; arrays load it, apply a
//! register transition, and store it back.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::harmonic_numbers;
use crate::hll::preamble;
use crate::memory::Memory;

/// Relative standard error factors, scaled by `1 / sqrt(k)`.
const HIP_RSE_FACTOR: f64 = 0.8326;
const NON_HIP_RSE_FACTOR: f64 = 1.03896;

/// Below this multiple of k, the bitmap estimate replaces the raw HLL estimate.
const LINEAR_COUNTING_CUTOFF: f64 = 2.5;

/// HIP estimator with KxQ registers for improved cardinality estimation
///
/// The estimator supports two modes:
/// - **In-order mode**: Uses HIP (Historical Inverse Probability) accumulator
///   for accurate sequential updates
/// - **Out-of-order mode**: Uses composite estimator (raw HLL + linear counting)
///   after merging or type conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HipEstimator {
    /// HIP estimator accumulator
    hip_accum: f64,
    /// KxQ register for values < 32 (larger inverse powers)
    kxq0: f64,
    /// KxQ register for values >= 32 (tiny inverse powers)
    kxq1: f64,
    /// Out-of-order flag: when true, HIP updates are skipped
    out_of_order: bool,
}

impl HipEstimator {
    /// Create a new HIP estimator for a sketch with 2^lg_config_k registers
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;
        Self {
            hip_accum: 0.0,
            kxq0: k as f64, // All registers start at 0, so kxq0 = k * (1/2^0) = k
            kxq1: 0.0,
            out_of_order: false,
        }
    }

    /// Read the estimator fields of a dense image.
    pub fn load(mem: &Memory) -> Self {
        Self {
            hip_accum: preamble::extract_hip_accum(mem),
            kxq0: preamble::extract_kxq0(mem),
            kxq1: preamble::extract_kxq1(mem),
            out_of_order: preamble::extract_ooo_flag(mem),
        }
    }

    /// Write the accumulator and KxQ registers back. The out-of-order flag is owned
    /// by the flags byte and written separately.
    pub fn store(&self, mem: &mut Memory) -> Result<(), Error> {
        preamble::insert_hip_accum(mem, self.hip_accum)?;
        preamble::insert_kxq0(mem, self.kxq0)?;
        preamble::insert_kxq1(mem, self.kxq1)
    }

    /// Update the estimator when a register changes from old_value to new_value
    ///
    /// The accumulator advances using the KxQ sums as they were before the
    /// change, then the KxQ registers move. They are split for numerical precision:
    /// - kxq0: sum of 1/2^v for v < 32
    /// - kxq1: sum of 1/2^v for v >= 32
    pub fn update(&mut self, lg_config_k: u8, old_value: u8, new_value: u8) {
        let k = (1 << lg_config_k) as f64;

        // When out-of-order, HIP is invalid
        if !self.out_of_order {
            self.hip_accum += k / (self.kxq0 + self.kxq1);
        }

        self.update_kxq(old_value, new_value);
    }

    fn update_kxq(&mut self, old_value: u8, new_value: u8) {
        if old_value < 32 {
            self.kxq0 -= inv_pow2(old_value);
        } else {
            self.kxq1 -= inv_pow2(old_value);
        }

        if new_value < 32 {
            self.kxq0 += inv_pow2(new_value);
        } else {
            self.kxq1 += inv_pow2(new_value);
        }
    }

    /// Get the current cardinality estimate
    ///
    /// # Arguments
    /// * `lg_config_k` - Log2 of number of registers (k)
    /// * `cur_min` - Current minimum register value (for Array4, 0 for Array6/8)
    /// * `num_at_cur_min` - Number of registers at cur_min value
    pub fn estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        if self.out_of_order {
            self.composite_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            self.hip_accum
        }
    }

    /// Raw HLL estimate: `correction * k^2 / (kxq0 + kxq1)`
    fn raw_estimate(&self, lg_config_k: u8) -> f64 {
        let k = (1 << lg_config_k) as f64;

        let correction_factor = match lg_config_k {
            4 => 0.673,
            5 => 0.697,
            6 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / k),
        };

        (correction_factor * k * k) / (self.kxq0 + self.kxq1)
    }

    /// Linear counting estimate from the number of empty registers.
    fn bitmap_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = 1u32 << lg_config_k;

        let num_unhit = if cur_min == 0 { num_at_cur_min } else { 0 };

        // Edge case: all buckets hit
        if num_unhit == 0 {
            return (k as f64) * (k as f64 / 0.5).ln();
        }

        harmonic_numbers::bitmap_estimate(k, k - num_unhit)
    }

    /// Estimate computed from the register contents alone.
    ///
    /// Linear counting is used while the raw estimate is small and some register is
    /// still empty; the raw HLL estimate otherwise. A sketch whose registers are all
    /// zero reports exactly 0.
    ///
    /// The raw estimate is not bias-corrected, so between roughly 2.5K and 5K distinct
    /// items it overestimates by a few percent. HIP estimates are unaffected; only
    /// out-of-order (merged) dense sketches report this value.
    pub fn composite_estimate(&self, lg_config_k: u8, cur_min: u8, num_at_cur_min: u32) -> f64 {
        let k = 1u32 << lg_config_k;
        if cur_min == 0 && num_at_cur_min == k {
            return 0.0;
        }

        let raw_est = self.raw_estimate(lg_config_k);
        let has_empty = cur_min == 0 && num_at_cur_min > 0;
        if has_empty && raw_est <= LINEAR_COUNTING_CUTOFF * k as f64 {
            self.bitmap_estimate(lg_config_k, cur_min, num_at_cur_min)
        } else {
            raw_est
        }
    }

    fn rel_err(&self, lg_config_k: u8, num_std_dev: NumStdDev) -> f64 {
        let factor = if self.out_of_order {
            NON_HIP_RSE_FACTOR
        } else {
            HIP_RSE_FACTOR
        };
        num_std_dev.as_f64() * factor / ((1u32 << lg_config_k) as f64).sqrt()
    }

    pub fn upper_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let est = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        est / (1.0 - self.rel_err(lg_config_k, num_std_dev))
    }

    pub fn lower_bound(
        &self,
        lg_config_k: u8,
        cur_min: u8,
        num_at_cur_min: u32,
        num_std_dev: NumStdDev,
    ) -> f64 {
        let est = self.estimate(lg_config_k, cur_min, num_at_cur_min);
        let bound = est / (1.0 + self.rel_err(lg_config_k, num_std_dev));
        // at least one distinct item per non-empty register
        let k = 1u32 << lg_config_k;
        let num_non_zero = if cur_min == 0 { k - num_at_cur_min } else { k };
        bound.max(num_non_zero as f64)
    }

    /// Get the HIP accumulator value
    pub fn hip_accum(&self) -> f64 {
        self.hip_accum
    }

    pub fn kxq0(&self) -> f64 {
        self.kxq0
    }

    pub fn kxq1(&self) -> f64 {
        self.kxq1
    }

    pub fn is_out_of_order(&self) -> bool {
        self.out_of_order
    }

    /// Set the out-of-order flag
    ///
    /// Going out-of-order invalidates the HIP accumulator.
    pub fn set_out_of_order(&mut self, ooo: bool) {
        self.out_of_order = ooo;
        if ooo {
            self.hip_accum = 0.0;
        }
    }

    pub fn set_hip_accum(&mut self, value: f64) {
        self.hip_accum = value;
    }
}

/// Compute 1 / 2^value (inverse power of 2)
#[inline]
fn inv_pow2(value: u8) -> f64 {
    if value == 0 {
        1.0
    } else if value <= 63 {
        1.0 / (1u64 << value) as f64
    } else {
        f64::exp2(-(value as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::CurMode;
    use crate::hll::HllType;

    fn dense_image(lg_config_k: u8) -> Memory<'static> {
        let len = preamble::hll_bytes(lg_config_k, HllType::Hll8, 0);
        let mut mem = Memory::Heap(vec![0u8; len]);
        preamble::insert_header(
            &mut mem,
            preamble::HLL_PREINTS,
            lg_config_k,
            0,
            0,
            CurMode::Hll,
            HllType::Hll8,
        )
        .unwrap();
        mem
    }

    #[test]
    fn test_estimator_initialization() {
        let est = HipEstimator::new(10); // 1024 registers

        assert_eq!(est.hip_accum(), 0.0);
        assert_eq!(est.kxq0(), 1024.0); // All zeros = 1.0 each
        assert_eq!(est.kxq1(), 0.0);
        assert!(!est.is_out_of_order());
        assert_eq!(est.composite_estimate(10, 0, 1024), 0.0);
    }

    #[test]
    fn test_estimator_update() {
        let mut est = HipEstimator::new(8); // 256 registers

        est.update(8, 0, 10);

        // first accepted change is worth exactly one item
        assert_eq!(est.hip_accum(), 1.0);
        assert!(est.kxq0() < 256.0);
        assert_eq!(est.kxq1(), 0.0);
    }

    #[test]
    fn test_kxq_split() {
        let mut est = HipEstimator::new(8);

        est.update(8, 0, 10);
        let kxq0_after_10 = est.kxq0();
        assert!(kxq0_after_10 < 256.0);
        assert_eq!(est.kxq1(), 0.0);

        // crosses the 32 boundary
        est.update(8, 10, 50);
        assert_eq!(est.kxq0(), 255.0);
        assert_eq!(est.kxq1(), inv_pow2(50));
    }

    #[test]
    fn test_out_of_order_flag() {
        let mut est = HipEstimator::new(10);

        est.update(10, 0, 5);
        assert!(est.hip_accum() > 0.0);

        est.set_out_of_order(true);
        assert!(est.is_out_of_order());
        assert_eq!(est.hip_accum(), 0.0);

        // kxq keeps moving while HIP stays frozen
        let kxq0_before = est.kxq0();
        est.update(10, 5, 10);
        assert_eq!(est.hip_accum(), 0.0);
        assert_ne!(est.kxq0(), kxq0_before);
    }

    #[test]
    fn test_load_store_round_trip() {
        let mut mem = dense_image(6);
        let mut est = HipEstimator::new(6);
        est.update(6, 0, 3);
        est.update(6, 0, 1);
        est.store(&mut mem).unwrap();

        let loaded = HipEstimator::load(&mem);
        assert_eq!(loaded, est);

        preamble::insert_ooo_flag(&mut mem, true).unwrap();
        assert!(HipEstimator::load(&mem).is_out_of_order());
    }

    #[test]
    fn test_composite_uses_linear_counting_when_sparse() {
        let mut est = HipEstimator::new(10);
        for _ in 0..10 {
            est.update(10, 0, 1);
        }
        let composite = est.composite_estimate(10, 0, 1014);
        assert!((composite - harmonic_numbers::bitmap_estimate(1024, 10)).abs() < 1e-9);
        assert!((composite - 10.0).abs() < 0.1);
    }

    #[test]
    fn test_composite_uses_raw_when_saturated() {
        let mut est = HipEstimator::new(4);
        for _ in 0..16 {
            est.update(4, 0, 4);
        }
        // every register holds 4: kxq0 = 16 / 16
        assert_eq!(est.kxq0(), 1.0);
        let composite = est.composite_estimate(4, 0, 0);
        assert!((composite - 0.673 * 256.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        let mut est = HipEstimator::new(12);
        for _ in 0..100 {
            est.update(12, 0, 1);
        }
        let e = est.estimate(12, 0, 3996);
        for n in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            assert!(est.lower_bound(12, 0, 3996, n) <= e);
            assert!(est.upper_bound(12, 0, 3996, n) >= e);
        }
        assert!(est.lower_bound(12, 0, 3996, NumStdDev::Three) >= 100.0);
    }
}
