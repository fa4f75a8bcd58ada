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

//! HyperLogLog Array6 mode - 6-bit packed representation
//!
//! Array6 stores HLL register values using 6 bits per slot, providing a range of 0-63.
//! This is sufficient for every coupon value without needing exception handling or
//! cur_min tracking like Array4, so `num_at_cur_min` simply counts zero registers.

use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::preamble;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::memory::Memory;

const VAL_MASK_6: u16 = 0x3F; // 6 bits: 0b0011_1111

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Array6 {
    lg_config_k: u8,
}

impl Array6 {
    pub fn new(lg_config_k: u8) -> Self {
        Self { lg_config_k }
    }

    /// Get value from slot
    ///
    /// Reads the little-endian 16-bit window holding the slot's 6 bits.
    #[inline]
    pub fn get(&self, mem: &Memory, slot: u32) -> u8 {
        let start_bit = slot * 6;
        let offset = HLL_BYTE_ARR_START + (start_bit >> 3) as usize;
        let shift = start_bit & 7;
        ((mem.get_u16_le(offset) >> shift) & VAL_MASK_6) as u8
    }

    #[inline]
    fn put(&self, mem: &mut Memory, slot: u32, value: u8) -> Result<(), Error> {
        let start_bit = slot * 6;
        let offset = HLL_BYTE_ARR_START + (start_bit >> 3) as usize;
        let shift = start_bit & 7;

        let mut two_bytes = mem.get_u16_le(offset);
        two_bytes &= !(VAL_MASK_6 << shift);
        two_bytes |= ((value as u16) & VAL_MASK_6) << shift;
        mem.put_u16_le(offset, two_bytes)
    }

    pub fn update(&self, mem: &mut Memory, coupon: u32) -> Result<(), Error> {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get(mem, slot);
        if new_value <= old_value {
            return Ok(());
        }
        let num_zeros = match old_value {
            0 => Some(preamble::decremented_num_at_cur_min(mem)?),
            _ => None,
        };

        self.put(mem, slot, new_value)?;

        let mut estimator = HipEstimator::load(mem);
        estimator.update(self.lg_config_k, old_value, new_value);
        estimator.store(mem)?;

        if let Some(num_zeros) = num_zeros {
            preamble::insert_num_at_cur_min(mem, num_zeros)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::HllType;
    use crate::hll::coupon;
    use crate::hll::pack_coupon;
    use crate::hll::promotion::init_dense;

    fn array(lg_config_k: u8) -> (Array6, Memory<'static>) {
        let mut mem = Memory::Heap(Vec::new());
        init_dense(&mut mem, lg_config_k, HllType::Hll6).unwrap();
        (Array6::new(lg_config_k), mem)
    }

    fn num_zeros(mem: &Memory) -> u32 {
        preamble::extract_num_at_cur_min(mem)
    }

    #[test]
    fn test_array6_basic() {
        let (arr, mem) = array(10);
        assert_eq!(arr.get(&mem, 0), 0);
        assert_eq!(arr.get(&mem, 1023), 0);
        assert_eq!(num_zeros(&mem), 1024);
        // k=1024: 1024 * 6 bits = 768 bytes, plus one byte for the last window
        assert_eq!(mem.capacity(), 40 + 769);
    }

    #[test]
    fn test_get_set() {
        let (arr, mut mem) = array(4);

        arr.put(&mut mem, 0, 0).unwrap();
        arr.put(&mut mem, 1, 1).unwrap();
        arr.put(&mut mem, 2, 31).unwrap();
        arr.put(&mut mem, 3, 63).unwrap();
        assert_eq!(arr.get(&mem, 0), 0);
        assert_eq!(arr.get(&mem, 1), 1);
        assert_eq!(arr.get(&mem, 2), 31);
        assert_eq!(arr.get(&mem, 3), 63);

        arr.put(&mut mem, 5, 42).unwrap();
        assert_eq!(arr.get(&mem, 5), 42);
        assert_eq!(arr.get(&mem, 3), 63);

        for slot in 0..16 {
            arr.put(&mut mem, slot, (slot * 4 + 3) as u8).unwrap();
        }
        for slot in 0..16 {
            assert_eq!(arr.get(&mem, slot), (slot * 4 + 3) as u8);
        }
    }

    #[test]
    fn test_boundary_crossing() {
        let (arr, mut mem) = array(8);

        // Slot 1 starts at bit 6 and crosses into byte 1
        arr.put(&mut mem, 1, 0b111111).unwrap();
        arr.put(&mut mem, 2, 0b101010).unwrap();
        // Slot 3 starts at bit 18 and crosses into byte 3
        arr.put(&mut mem, 3, 0b110011).unwrap();

        assert_eq!(arr.get(&mem, 0), 0);
        assert_eq!(arr.get(&mem, 1), 63);
        assert_eq!(arr.get(&mem, 2), 42);
        assert_eq!(arr.get(&mem, 3), 51);
        assert_eq!(mem.get_u8(HLL_BYTE_ARR_START), 0b1100_0000);
    }

    #[test]
    fn test_last_slot_stays_in_bounds() {
        let (arr, mut mem) = array(4);
        arr.put(&mut mem, 15, 63).unwrap();
        assert_eq!(arr.get(&mem, 15), 63);
        assert_eq!(arr.get(&mem, 14), 0);
    }

    #[test]
    fn test_update_and_zero_tracking() {
        let (arr, mut mem) = array(4);

        arr.update(&mut mem, pack_coupon(0, 5)).unwrap();
        assert_eq!(arr.get(&mem, 0), 5);
        assert_eq!(num_zeros(&mem), 15);

        arr.update(&mut mem, pack_coupon(0, 3)).unwrap();
        assert_eq!(arr.get(&mem, 0), 5);

        arr.update(&mut mem, pack_coupon(0, 8)).unwrap();
        assert_eq!(arr.get(&mem, 0), 8);
        assert_eq!(num_zeros(&mem), 15);

        arr.update(&mut mem, pack_coupon(1, 3)).unwrap();
        assert_eq!(num_zeros(&mem), 14);
    }

    #[test]
    fn test_hip_estimator() {
        let (arr, mut mem) = array(10);

        for i in 0..10_000u32 {
            arr.update(&mut mem, coupon(i)).unwrap();
        }

        let estimate = HipEstimator::load(&mem).estimate(10, 0, num_zeros(&mem));
        assert!(estimate.is_finite());
        // 1024 registers give roughly 2.6% relative error
        assert!(estimate > 9_000.0, "estimate {estimate} too low");
        assert!(estimate < 11_000.0, "estimate {estimate} too high");
    }

    #[test]
    fn test_zero_count_disagreeing_with_registers() {
        let mut mem = Memory::Heap(Vec::new());
        init_dense(&mut mem, 5, HllType::Hll6).unwrap();
        preamble::insert_num_at_cur_min(&mut mem, 0).unwrap();

        let err = Array6::new(5)
            .update(&mut mem, pack_coupon(31, 2))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(Array6::new(5).get(&mem, 31), 0);
    }
}
