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

//! HyperLogLog Array8 mode - one register per byte.

use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::preamble;
use crate::hll::preamble::HLL_BYTE_ARR_START;
use crate::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Array8 {
    lg_config_k: u8,
}

impl Array8 {
    pub fn new(lg_config_k: u8) -> Self {
        Self { lg_config_k }
    }

    #[inline]
    pub fn get(&self, mem: &Memory, slot: u32) -> u8 {
        mem.get_u8(HLL_BYTE_ARR_START + slot as usize)
    }

    #[inline]
    fn put(&self, mem: &mut Memory, slot: u32, value: u8) -> Result<(), Error> {
        mem.put_u8(HLL_BYTE_ARR_START + slot as usize, value)
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
