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

//! Representation dispatch.
//!
//! A sketch image is in exactly one representation at a time. [`Mode`] carries the
//! per-representation configuration and routes every operation to it; all state
//! lives in the image.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::container;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::list::CouponList;
use crate::hll::pack_coupon;
use crate::hll::preamble;
use crate::memory::Memory;

/// Current representation of a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurMode {
    /// Unsorted array of distinct coupons.
    List = 0,
    /// Open-addressing hash set of distinct coupons.
    Set = 1,
    /// Dense register array.
    Hll = 2,
}

impl CurMode {
    pub(crate) fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(CurMode::List),
            1 => Some(CurMode::Set),
            2 => Some(CurMode::Hll),
            _ => None,
        }
    }
}

/// Outcome of a single coupon update.
#[derive(Debug)]
pub(crate) enum Transition {
    Unchanged,
    /// The image was rewritten into a new representation.
    Promoted(Mode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    List(CouponList),
    Set(CouponHashSet),
    Array4(Array4),
    Array6(Array6),
    Array8(Array8),
}

impl Mode {
    pub fn from_image(lg_config_k: u8, hll_type: HllType, cur_mode: CurMode) -> Self {
        match cur_mode {
            CurMode::List => Mode::List(CouponList::new(lg_config_k, hll_type)),
            CurMode::Set => Mode::Set(CouponHashSet::new(lg_config_k, hll_type)),
            CurMode::Hll => Mode::dense(lg_config_k, hll_type),
        }
    }

    pub fn dense(lg_config_k: u8, hll_type: HllType) -> Self {
        match hll_type {
            HllType::Hll4 => Mode::Array4(Array4::new(lg_config_k)),
            HllType::Hll6 => Mode::Array6(Array6::new(lg_config_k)),
            HllType::Hll8 => Mode::Array8(Array8::new(lg_config_k)),
        }
    }

    pub fn cur_mode(&self) -> CurMode {
        match self {
            Mode::List(_) => CurMode::List,
            Mode::Set(_) => CurMode::Set,
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => CurMode::Hll,
        }
    }

    pub fn update(&self, mem: &mut Memory, coupon: u32) -> Result<Transition, Error> {
        match self {
            Mode::List(list) => list.update(mem, coupon),
            Mode::Set(set) => set.update(mem, coupon),
            Mode::Array4(arr) => arr.update(mem, coupon).map(|()| Transition::Unchanged),
            Mode::Array6(arr) => arr.update(mem, coupon).map(|()| Transition::Unchanged),
            Mode::Array8(arr) => arr.update(mem, coupon).map(|()| Transition::Unchanged),
        }
    }

    /// Register value of a dense slot, `None` in sparse modes.
    pub fn register(&self, mem: &Memory, slot: u32) -> Result<Option<u8>, Error> {
        match self {
            Mode::List(_) | Mode::Set(_) => Ok(None),
            Mode::Array4(arr) => arr.get(mem, slot).map(Some),
            Mode::Array6(arr) => Ok(Some(arr.get(mem, slot))),
            Mode::Array8(arr) => Ok(Some(arr.get(mem, slot))),
        }
    }

    /// Every live coupon. Dense images yield one coupon per non-zero register.
    pub fn coupons(&self, mem: &Memory) -> Result<Vec<u32>, Error> {
        match self {
            Mode::List(_) => Ok(CouponList::coupons(mem)),
            Mode::Set(_) => Ok(CouponHashSet::coupons(mem)),
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => {
                let k = 1u32 << preamble::extract_lg_k(mem);
                let mut coupons = Vec::new();
                for slot in 0..k {
                    match self.register(mem, slot)? {
                        Some(0) | None => {}
                        Some(value) => coupons.push(pack_coupon(slot, value)),
                    }
                }
                Ok(coupons)
            }
        }
    }

    /// Number of distinct coupons held by a sparse image.
    pub fn coupon_count(&self, mem: &Memory) -> u32 {
        match self {
            Mode::List(_) => CouponList::count(mem),
            Mode::Set(_) => CouponHashSet::count(mem),
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => 0,
        }
    }

    pub fn is_empty(&self, mem: &Memory) -> bool {
        match self {
            Mode::List(_) | Mode::Set(_) => self.coupon_count(mem) == 0,
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => {
                let k = 1u32 << preamble::extract_lg_k(mem);
                preamble::extract_cur_min(mem) == 0 && preamble::extract_num_at_cur_min(mem) == k
            }
        }
    }

    pub fn estimate(&self, mem: &Memory) -> f64 {
        match DenseState::of(self, mem) {
            Some(dense) => {
                dense
                    .estimator
                    .estimate(dense.lg_config_k, dense.cur_min, dense.num_at_cur_min)
            }
            None => container::coupon_estimate(self.coupon_count(mem)),
        }
    }

    pub fn composite_estimate(&self, mem: &Memory) -> f64 {
        match DenseState::of(self, mem) {
            Some(dense) => dense.estimator.composite_estimate(
                dense.lg_config_k,
                dense.cur_min,
                dense.num_at_cur_min,
            ),
            None => container::coupon_estimate(self.coupon_count(mem)),
        }
    }

    pub fn upper_bound(&self, mem: &Memory, num_std_dev: NumStdDev) -> f64 {
        match DenseState::of(self, mem) {
            Some(dense) => dense.estimator.upper_bound(
                dense.lg_config_k,
                dense.cur_min,
                dense.num_at_cur_min,
                num_std_dev,
            ),
            None => container::coupon_upper_bound(self.coupon_count(mem), num_std_dev),
        }
    }

    pub fn lower_bound(&self, mem: &Memory, num_std_dev: NumStdDev) -> f64 {
        match DenseState::of(self, mem) {
            Some(dense) => dense.estimator.lower_bound(
                dense.lg_config_k,
                dense.cur_min,
                dense.num_at_cur_min,
                num_std_dev,
            ),
            None => container::coupon_lower_bound(self.coupon_count(mem), num_std_dev),
        }
    }
}

/// Estimator inputs read from a dense image.
struct DenseState {
    lg_config_k: u8,
    cur_min: u8,
    num_at_cur_min: u32,
    estimator: HipEstimator,
}

impl DenseState {
    fn of(mode: &Mode, mem: &Memory) -> Option<Self> {
        match mode {
            Mode::List(_) | Mode::Set(_) => None,
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => Some(DenseState {
                lg_config_k: preamble::extract_lg_k(mem),
                cur_min: preamble::extract_cur_min(mem),
                num_at_cur_min: preamble::extract_num_at_cur_min(mem),
                estimator: HipEstimator::load(mem),
            }),
        }
    }
}
