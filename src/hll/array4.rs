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

//! HyperLogLog Array4 mode - 4-bit packed representation with exception handling
//!
//! Array4 stores HLL register values using 4 bits per slot (2 slots per byte),
//! relative to `cur_min`, the smallest value held by any register. When a value is
//! 15 or more above `cur_min`, the nibble holds [`AUX_TOKEN`] and the true value
//! goes to the exception table.

use tracing::trace;

use crate::error::Error;
use crate::hll::aux_table::AuxTable;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::preamble;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::memory::Memory;

/// Nibble marking a register whose value lives in the exception table.
pub(crate) const AUX_TOKEN: u8 = 15;

/// Register values never exceed 63, so neither can the minimum.
const MAX_CUR_MIN: u8 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Array4 {
    lg_config_k: u8,
}

impl Array4 {
    pub fn new(lg_config_k: u8) -> Self {
        Self { lg_config_k }
    }

    fn aux(&self) -> AuxTable {
        AuxTable::new(self.lg_config_k)
    }

    /// Get raw 4-bit value from slot (not adjusted for cur_min)
    #[inline]
    fn get_raw(&self, mem: &Memory, slot: u32) -> u8 {
        let byte = mem.get_u8(HLL_BYTE_ARR_START + (slot >> 1) as usize);
        if slot & 1 == 0 {
            byte & 15 // low nibble for even slots
        } else {
            byte >> 4 // high nibble for odd slots
        }
    }

    #[inline]
    fn put_raw(&self, mem: &mut Memory, slot: u32, value: u8) -> Result<(), Error> {
        debug_assert!(value <= AUX_TOKEN);

        let offset = HLL_BYTE_ARR_START + (slot >> 1) as usize;
        let old_byte = mem.get_u8(offset);
        let new_byte = if slot & 1 == 0 {
            (old_byte & 0xF0) | (value & 0x0F)
        } else {
            (old_byte & 0x0F) | (value << 4)
        };
        mem.put_u8(offset, new_byte)
    }

    fn lookup_exception(&self, mem: &Memory, slot: u32) -> Result<u8, Error> {
        self.aux().get(mem, slot).ok_or_else(|| {
            Error::invariant_violation("register marked as exception has no table entry")
                .with_context("slot", slot)
        })
    }

    /// Get actual value for slot (adjusted for cur_min and exceptions)
    pub fn get(&self, mem: &Memory, slot: u32) -> Result<u8, Error> {
        let raw = self.get_raw(mem, slot);
        if raw < AUX_TOKEN {
            Ok(raw + preamble::extract_cur_min(mem))
        } else {
            self.lookup_exception(mem, slot)
        }
    }

    pub fn update(&self, mem: &mut Memory, coupon: u32) -> Result<(), Error> {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);
        let cur_min = preamble::extract_cur_min(mem);

        // Quick rejection: if new value <= cur_min, no update needed
        if new_value <= cur_min {
            return Ok(());
        }

        let raw_stored = self.get_raw(mem, slot);
        let old_value = if raw_stored < AUX_TOKEN {
            raw_stored + cur_min
        } else {
            self.lookup_exception(mem, slot)?
        };

        if new_value <= old_value {
            return Ok(());
        }

        let num_at_cur_min = if old_value == cur_min {
            Some(preamble::decremented_num_at_cur_min(mem)?)
        } else {
            None
        };

        let shifted_new = new_value - cur_min;
        match (raw_stored, shifted_new) {
            // Both old and new are exceptions
            (AUX_TOKEN, shifted) if shifted >= AUX_TOKEN => {
                self.aux().replace(mem, slot, new_value)?;
            }
            (AUX_TOKEN, _) => {
                return Err(Error::invariant_violation(
                    "exception register would drop back into the 4-bit range",
                )
                .with_context("slot", slot));
            }
            // New exception: the table entry goes first so a full region fails cleanly
            (_, shifted) if shifted >= AUX_TOKEN => {
                self.aux().insert(mem, slot, new_value)?;
                self.put_raw(mem, slot, AUX_TOKEN)?;
            }
            _ => {
                self.put_raw(mem, slot, shifted_new)?;
            }
        }

        let mut estimator = HipEstimator::load(mem);
        estimator.update(self.lg_config_k, old_value, new_value);
        estimator.store(mem)?;

        if let Some(num_at_cur_min) = num_at_cur_min {
            preamble::insert_num_at_cur_min(mem, num_at_cur_min)?;
            while preamble::extract_num_at_cur_min(mem) == 0 {
                self.shift_to_bigger_cur_min(mem)?;
            }
        }
        Ok(())
    }

    /// Increment cur_min and adjust all values
    ///
    /// Called when no slot remains at cur_min. Every stored nibble drops by one and
    /// exceptions that fall back into the 4-bit range leave the table.
    fn shift_to_bigger_cur_min(&self, mem: &mut Memory) -> Result<(), Error> {
        let cur_min = preamble::extract_cur_min(mem);
        if cur_min >= MAX_CUR_MIN {
            return Err(Error::invariant_violation("cur_min cannot rise further")
                .with_context("cur_min", cur_min));
        }
        let new_cur_min = cur_min + 1;
        let k = 1u32 << self.lg_config_k;
        let mut num_at_new = 0;

        for slot in 0..k {
            let raw = self.get_raw(mem, slot);
            if raw < AUX_TOKEN {
                let decremented = raw.checked_sub(1).ok_or_else(|| {
                    Error::invariant_violation("register below cur_min").with_context("slot", slot)
                })?;
                self.put_raw(mem, slot, decremented)?;
                if decremented == 0 {
                    num_at_new += 1;
                }
            }
        }

        let aux = self.aux();
        let mut kept = Vec::new();
        for entry in aux.entries(mem) {
            let slot = get_slot(entry);
            let new_shifted = get_value(entry).checked_sub(new_cur_min).ok_or_else(|| {
                Error::invariant_violation("exception below cur_min").with_context("slot", slot)
            })?;
            if new_shifted < AUX_TOKEN {
                self.put_raw(mem, slot, new_shifted)?;
            } else {
                kept.push(entry);
            }
        }
        aux.rewrite(mem, &kept)?;

        preamble::insert_cur_min(mem, new_cur_min)?;
        preamble::insert_num_at_cur_min(mem, num_at_new)?;
        trace!(
            lg_config_k = self.lg_config_k,
            cur_min = new_cur_min,
            num_at_cur_min = num_at_new,
            exceptions = kept.len(),
            "shifted HLL4 cur_min"
        );
        Ok(())
    }
}
