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

//! Simple list for storing unique coupons in order
//!
//! Provides sequential storage with linear search for duplicates.
//! Efficient for small numbers of coupons before transitioning to a hash set
//! or, for small `lg_config_k`, directly to a dense array.

use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::LG_INIT_LIST_SIZE;
use crate::hll::container::COUPON_EMPTY;
use crate::hll::container::live_coupons;
use crate::hll::mode::Transition;
use crate::hll::preamble;
use crate::hll::preamble::LIST_INT_ARR_START;
use crate::hll::promotion;
use crate::memory::Memory;

/// Below this `lg_config_k` a full list skips the hash set stage.
const MIN_LG_K_FOR_SET: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CouponList {
    lg_config_k: u8,
    hll_type: HllType,
}

impl CouponList {
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        Self {
            lg_config_k,
            hll_type,
        }
    }

    /// Write an empty LIST image at the start of `mem`.
    pub fn init(&self, mem: &mut Memory) -> Result<(), Error> {
        let len = preamble::list_bytes(LG_INIT_LIST_SIZE);
        mem.ensure_capacity(len)?;
        preamble::insert_header(
            mem,
            preamble::LIST_PREINTS,
            self.lg_config_k,
            LG_INIT_LIST_SIZE,
            preamble::EMPTY_FLAG_MASK,
            CurMode::List,
            self.hll_type,
        )?;
        mem.clear(LIST_INT_ARR_START, len - LIST_INT_ARR_START)
    }

    /// Insert coupon into list, ignoring duplicates
    pub fn update(&self, mem: &mut Memory, coupon: u32) -> Result<Transition, Error> {
        let len = 1usize << preamble::extract_lg_arr(mem);
        for index in 0..len {
            let offset = LIST_INT_ARR_START + 4 * index;
            let value = mem.get_u32(offset);
            if value == COUPON_EMPTY {
                mem.put_u32(offset, coupon)?;
                let count = preamble::extract_list_count(mem) + 1;
                preamble::insert_list_count(mem, count)?;
                preamble::insert_empty_flag(mem, false)?;

                if count as usize >= len {
                    let next = if self.lg_config_k < MIN_LG_K_FOR_SET {
                        promotion::promote_to_hll(mem, self.lg_config_k, self.hll_type)?
                    } else {
                        promotion::promote_list_to_set(mem, self.lg_config_k, self.hll_type)?
                    };
                    return Ok(Transition::Promoted(next));
                }
                return Ok(Transition::Unchanged);
            } else if value == coupon {
                return Ok(Transition::Unchanged);
            }
        }

        Err(Error::invariant_violation(
            "coupon list has neither an empty slot nor a duplicate",
        )
        .with_context("count", preamble::extract_list_count(mem))
        .with_context("capacity", len))
    }

    pub fn count(mem: &Memory) -> u32 {
        preamble::extract_list_count(mem)
    }

    /// Live coupons in slot order.
    pub fn coupons(mem: &Memory) -> Vec<u32> {
        let slots = preamble::sparse_slots(mem, CurMode::List);
        live_coupons(mem, LIST_INT_ARR_START, slots)
    }
}
