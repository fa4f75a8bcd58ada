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

//! Exception table for the 4-bit register array.
//!
//! Registers whose value no longer fits the 4-bit field are kept here as packed
//! coupons (`value << 26 | slot`), sorted by slot so lookups are a binary search.
//! The table sits directly after the packed registers and its length is the
//! exception count in the preamble.

use crate::error::Error;
use crate::hll::HllType;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;
use crate::hll::preamble;
use crate::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AuxTable {
    start: usize,
}

impl AuxTable {
    pub fn new(lg_config_k: u8) -> Self {
        Self {
            start: preamble::HLL_BYTE_ARR_START
                + preamble::hll_array_bytes(lg_config_k, HllType::Hll4),
        }
    }

    pub fn len(&self, mem: &Memory) -> usize {
        preamble::extract_aux_count(mem) as usize
    }

    fn entry_offset(&self, index: usize) -> usize {
        self.start + 4 * index
    }

    /// Binary search by slot: `Ok(index)` of the entry, or `Err(index)` where it
    /// would be inserted.
    fn search(&self, mem: &Memory, slot: u32) -> Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.len(mem));
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_slot = get_slot(mem.get_u32(self.entry_offset(mid)));
            if mid_slot < slot {
                lo = mid + 1;
            } else if mid_slot > slot {
                hi = mid;
            } else {
                return Ok(mid);
            }
        }
        Err(lo)
    }

    pub fn get(&self, mem: &Memory, slot: u32) -> Option<u8> {
        self.search(mem, slot)
            .ok()
            .map(|index| get_value(mem.get_u32(self.entry_offset(index))))
    }

    /// Add an exception for a slot that has none yet.
    ///
    /// Space for the new entry is secured before anything is written.
    pub fn insert(&self, mem: &mut Memory, slot: u32, value: u8) -> Result<(), Error> {
        let len = self.len(mem);
        let index = match self.search(mem, slot) {
            Ok(_) => {
                return Err(Error::invariant_violation(
                    "slot already has an exception entry",
                )
                .with_context("slot", slot));
            }
            Err(index) => index,
        };

        mem.ensure_capacity(self.entry_offset(len + 1))?;
        if index < len {
            mem.copy_within(
                self.entry_offset(index)..self.entry_offset(len),
                self.entry_offset(index + 1),
            )?;
        }
        mem.put_u32(self.entry_offset(index), pack_coupon(slot, value))?;
        preamble::insert_aux_count(mem, (len + 1) as u32)
    }

    /// Overwrite the value of an existing exception.
    pub fn replace(&self, mem: &mut Memory, slot: u32, value: u8) -> Result<(), Error> {
        match self.search(mem, slot) {
            Ok(index) => mem.put_u32(self.entry_offset(index), pack_coupon(slot, value)),
            Err(_) => Err(Error::invariant_violation("no exception entry for slot")
                .with_context("slot", slot)),
        }
    }

    /// All entries in slot order.
    pub fn entries(&self, mem: &Memory) -> Vec<u32> {
        mem.get_u32_array(self.start, self.len(mem))
    }

    /// Replace the table with `entries`, which must be sorted by slot and no longer
    /// than the current table.
    pub fn rewrite(&self, mem: &mut Memory, entries: &[u32]) -> Result<(), Error> {
        let old_len = self.len(mem);
        debug_assert!(entries.len() <= old_len);
        debug_assert!(entries.windows(2).all(|w| get_slot(w[0]) < get_slot(w[1])));
        for (index, &entry) in entries.iter().enumerate() {
            mem.put_u32(self.entry_offset(index), entry)?;
        }
        let tail = self.entry_offset(entries.len());
        mem.clear(tail, self.entry_offset(old_len) - tail)?;
        preamble::insert_aux_count(mem, entries.len() as u32)
    }
}
