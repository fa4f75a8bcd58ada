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

//! Hash set for storing unique coupons with open addressing
//!
//! Uses a custom odd stride derived from the coupon to resolve collisions, so every
//! probe sequence visits all slots. The set lives in the image right after its
//! count field.

use tracing::trace;

use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::KEY_MASK_26;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::container::COUPON_EMPTY;
use crate::hll::container::live_coupons;
use crate::hll::mode::Transition;
use crate::hll::preamble;
use crate::hll::preamble::HASH_SET_INT_ARR_START;
use crate::hll::promotion;
use crate::memory::Memory;

/// Result of probing for a coupon.
enum Probe {
    Duplicate,
    Empty(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CouponHashSet {
    lg_config_k: u8,
    hll_type: HllType,
}

impl CouponHashSet {
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        Self {
            lg_config_k,
            hll_type,
        }
    }

    /// Insert coupon into hash set, ignoring duplicates
    ///
    /// Growing past the largest sparse table for this `lg_config_k` promotes to the
    /// dense representation instead.
    pub fn update(&self, mem: &mut Memory, coupon: u32) -> Result<Transition, Error> {
        let lg_arr = preamble::extract_lg_arr(mem);
        let index = match find(mem, lg_arr, coupon)? {
            Probe::Duplicate => return Ok(Transition::Unchanged),
            Probe::Empty(index) => index,
        };

        mem.put_u32(HASH_SET_INT_ARR_START + 4 * index, coupon)?;
        let count = preamble::extract_hash_set_count(mem) + 1;
        preamble::insert_hash_set_count(mem, count)?;
        preamble::insert_empty_flag(mem, false)?;

        if RESIZE_DENOM * count > RESIZE_NUMER * (1 << lg_arr) {
            if lg_arr >= self.lg_config_k - 3 {
                let next = promotion::promote_to_hll(mem, self.lg_config_k, self.hll_type)?;
                return Ok(Transition::Promoted(next));
            }
            self.grow(mem, lg_arr + 1)?;
        }
        Ok(Transition::Unchanged)
    }

    /// Rebuild the table at `2^lg_arr` slots, reinserting coupons in slot order.
    fn grow(&self, mem: &mut Memory, lg_arr: u8) -> Result<(), Error> {
        let coupons = Self::coupons(mem);
        let len = preamble::set_bytes(lg_arr);
        mem.ensure_capacity(len)?;

        preamble::insert_lg_arr(mem, lg_arr)?;
        mem.clear(HASH_SET_INT_ARR_START, len - HASH_SET_INT_ARR_START)?;
        for &coupon in &coupons {
            match find(mem, lg_arr, coupon)? {
                Probe::Empty(index) => mem.put_u32(HASH_SET_INT_ARR_START + 4 * index, coupon)?,
                Probe::Duplicate => {
                    return Err(Error::invariant_violation(
                        "duplicate coupon found while growing the hash set",
                    ));
                }
            }
        }

        trace!(
            lg_config_k = self.lg_config_k,
            lg_arr,
            count = coupons.len(),
            "grew coupon hash set"
        );
        Ok(())
    }

    pub fn count(mem: &Memory) -> u32 {
        preamble::extract_hash_set_count(mem)
    }

    /// Live coupons in table order.
    pub fn coupons(mem: &Memory) -> Vec<u32> {
        let slots = preamble::sparse_slots(mem, CurMode::Set);
        live_coupons(mem, HASH_SET_INT_ARR_START, slots)
    }
}

fn find(mem: &Memory, lg_arr: u8, coupon: u32) -> Result<Probe, Error> {
    let mask = (1u32 << lg_arr) - 1;

    // Initial probe position from low bits of coupon
    let mut probe = coupon & mask;
    let starting_position = probe;

    loop {
        let value = mem.get_u32(HASH_SET_INT_ARR_START + 4 * probe as usize);
        if value == COUPON_EMPTY {
            return Ok(Probe::Empty(probe as usize));
        } else if value == coupon {
            return Ok(Probe::Duplicate);
        }

        // Stride is always odd to ensure all slots are visited
        let stride = ((coupon & KEY_MASK_26) >> lg_arr) | 1;
        probe = (probe + stride) & mask;
        if probe == starting_position {
            return Err(Error::invariant_violation(
                "coupon hash set has no empty slot",
            )
            .with_context("lg_arr", lg_arr));
        }
    }
}
