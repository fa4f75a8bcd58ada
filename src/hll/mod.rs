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

//! HyperLogLog sketch implementation for cardinality estimation.
//!
//! This module provides a probabilistic data structure for estimating the cardinality
//! (number of distinct elements) of large datasets with high accuracy and low memory usage.
//!
//! # Overview
//!
//! A sketch lives in a single byte image laid out by the preamble codec. The image is
//! either owned by the sketch on the heap or borrowed from the caller, and both backings
//! run exactly the same code. The representation adapts to the observed cardinality:
//!
//! - **List mode**: Stores individual coupons for small cardinalities
//! - **Set mode**: Uses an open-addressing hash set for medium cardinalities
//! - **HLL mode**: Uses a bit-packed register array for large cardinalities
//!
//! Transitions only go forward: `List -> Set -> HLL`, and sketches with
//! `lg_config_k < 8` go straight from list to HLL.
//!
//! # HLL Types
//!
//! Three target HLL types are supported, trading precision for memory:
//!
//! - [`HllType::Hll4`]: 4 bits per bucket plus an exception table (most compact)
//! - [`HllType::Hll6`]: 6 bits per bucket (balanced)
//! - [`HllType::Hll8`]: 8 bits per bucket (simplest)
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a value (6 bits).
//! The slot identifies which bucket to update, and the value represents the number of
//! leading zeros in the hash plus one.

use std::hash::Hash;

use crate::error::Error;
use crate::hash::hash_bytes;
use crate::hash::hash_value;

mod array4;
mod array6;
mod array8;
mod aux_table;
mod container;
mod estimator;
mod harmonic_numbers;
mod hash_set;
mod list;
mod mode;
mod preamble;
mod promotion;
mod sketch;

pub use self::mode::CurMode;
pub use self::preamble::preamble_summary;
pub use self::sketch::HllSketch;
pub use self::sketch::HllSketchBuilder;

/// Target HLL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HllType {
    #[default]
    Hll4 = 0,
    Hll6 = 1,
    Hll8 = 2,
}

impl HllType {
    /// Map a register width in bits to its HLL type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) unless `bits`
    /// is 4, 6 or 8.
    pub fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            4 => Ok(HllType::Hll4),
            6 => Ok(HllType::Hll6),
            8 => Ok(HllType::Hll8),
            _ => Err(Error::config_invalid(format!(
                "register width must be 4, 6 or 8 bits, got {bits}"
            ))),
        }
    }

    /// Register width in bits.
    pub fn bits(self) -> u8 {
        match self {
            HllType::Hll4 => 4,
            HllType::Hll6 => 6,
            HllType::Hll8 => 8,
        }
    }

    pub(crate) fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(HllType::Hll4),
            1 => Some(HllType::Hll6),
            2 => Some(HllType::Hll8),
            _ => None,
        }
    }
}

pub(crate) const MIN_LG_K: u8 = 4;
pub(crate) const MAX_LG_K: u8 = 21;
pub(crate) const DEFAULT_LG_K: u8 = 12;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

/// Lists hold 2^3 coupons before promotion.
const LG_INIT_LIST_SIZE: u8 = 3;
const LG_INIT_SET_SIZE: u8 = 5;

// Resize at 3/4 = 75% load factor
const RESIZE_NUMER: u32 = 3;
const RESIZE_DENOM: u32 = 4;

pub(crate) fn check_lg_config_k(lg_config_k: u8) -> Result<(), Error> {
    if (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        Ok(())
    } else {
        Err(Error::config_invalid(format!(
            "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
        )))
    }
}

/// Extract slot number (low 26 bits) from coupon
#[inline]
fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

fn coupon_from_hash((lo, hi): (u64, u64)) -> u32 {
    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    value << KEY_BITS_26 | addr26
}

/// Coupon for any hashable value.
pub(crate) fn coupon<H: Hash>(v: H) -> u32 {
    coupon_from_hash(hash_value(v))
}

/// Coupon for a raw byte string.
pub(crate) fn coupon_from_bytes(bytes: &[u8]) -> u32 {
    coupon_from_hash(hash_bytes(bytes))
}
