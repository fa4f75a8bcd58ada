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

//! Preamble codec for HLL sketch images.
//!
//! Every representation stores its header through the functions below, so any
//! representation can recompute its own byte footprint from the header alone.
//!
//! # Layout
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | preamble size in 4-byte ints (low 6 bits), lg resize factor (high 2 bits) |
//! | 1 | serialization version |
//! | 2 | family id |
//! | 3 | lg_config_k |
//! | 4 | lg_arr (sparse modes), 0 in HLL mode |
//! | 5 | flags |
//! | 6 | list count (LIST) or cur_min (SET, HLL) |
//! | 7 | mode byte: `cur_mode | (tgt_hll_type << 2)` |
//!
//! LIST coupons start at byte 8. SET keeps its count at bytes 8-11 and coupons from
//! byte 12. HLL keeps `hip_accum`, `kxq0`, `kxq1` (f64) at 8, 16, 24, `num_at_cur_min`
//! and the exception count (u32) at 32 and 36, and the register array from byte 40;
//! the HLL4 exception table follows the registers.
//!
//! ## Flags (Byte 5)
//!
//! | Bit | Name | Description |
//! |-----|------|-------------|
//! | 0 | BIG_ENDIAN | Multi-byte fields were written big-endian |
//! | 1 | READ_ONLY | Reserved |
//! | 2 | EMPTY | No coupon has been stored |
//! | 3 | COMPACT | Sparse slots hold only live coupons |
//! | 4 | OUT_OF_ORDER | The HIP accumulator is not valid |

use std::fmt;

use crate::codec::Family;
use crate::codec::NATIVE_ORDER_IS_BIG_ENDIAN;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::LG_INIT_LIST_SIZE;
use crate::hll::LG_INIT_SET_SIZE;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::memory::Memory;

pub(crate) const PREAMBLE_INTS_BYTE: usize = 0;
pub(crate) const SER_VER_BYTE: usize = 1;
pub(crate) const FAMILY_BYTE: usize = 2;
pub(crate) const LG_K_BYTE: usize = 3;
pub(crate) const LG_ARR_BYTE: usize = 4;
pub(crate) const FLAGS_BYTE: usize = 5;
pub(crate) const LIST_COUNT_BYTE: usize = 6;
pub(crate) const HLL_CUR_MIN_BYTE: usize = 6;
pub(crate) const MODE_BYTE: usize = 7;

pub(crate) const LIST_INT_ARR_START: usize = 8;
pub(crate) const HASH_SET_COUNT_INT: usize = 8;
pub(crate) const HASH_SET_INT_ARR_START: usize = 12;

pub(crate) const HIP_ACCUM_DOUBLE: usize = 8;
pub(crate) const KXQ0_DOUBLE: usize = 16;
pub(crate) const KXQ1_DOUBLE: usize = 24;
pub(crate) const CUR_MIN_COUNT_INT: usize = 32;
pub(crate) const AUX_COUNT_INT: usize = 36;
pub(crate) const HLL_BYTE_ARR_START: usize = 40;

pub(crate) const BIG_ENDIAN_FLAG_MASK: u8 = 1;
pub(crate) const READ_ONLY_FLAG_MASK: u8 = 1 << 1;
pub(crate) const EMPTY_FLAG_MASK: u8 = 1 << 2;
pub(crate) const COMPACT_FLAG_MASK: u8 = 1 << 3;
pub(crate) const OUT_OF_ORDER_FLAG_MASK: u8 = 1 << 4;

pub(crate) const SER_VER: u8 = 1;
pub(crate) const LIST_PREINTS: u8 = 2;
pub(crate) const HASH_SET_PREINTS: u8 = 3;
pub(crate) const HLL_PREINTS: u8 = 10;

const PRE_INTS_MASK: u8 = 0x3F;

/// Log2 of the exception-table entries reserved per lg_config_k for caller-owned
/// HLL4 regions.
const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

// Byte-level field access.

pub(crate) fn extract_pre_ints(mem: &Memory) -> u8 {
    mem.get_u8(PREAMBLE_INTS_BYTE) & PRE_INTS_MASK
}

pub(crate) fn extract_lg_k(mem: &Memory) -> u8 {
    mem.get_u8(LG_K_BYTE)
}

pub(crate) fn extract_lg_arr(mem: &Memory) -> u8 {
    mem.get_u8(LG_ARR_BYTE)
}

pub(crate) fn extract_flags(mem: &Memory) -> u8 {
    mem.get_u8(FLAGS_BYTE)
}

pub(crate) fn extract_list_count(mem: &Memory) -> u32 {
    mem.get_u8(LIST_COUNT_BYTE) as u32
}

pub(crate) fn extract_cur_min(mem: &Memory) -> u8 {
    mem.get_u8(HLL_CUR_MIN_BYTE)
}

pub(crate) fn extract_cur_mode(mem: &Memory) -> Option<CurMode> {
    CurMode::from_ordinal(mem.get_u8(MODE_BYTE) & 3)
}

pub(crate) fn extract_tgt_hll_type(mem: &Memory) -> Option<HllType> {
    HllType::from_ordinal((mem.get_u8(MODE_BYTE) >> 2) & 3)
}

pub(crate) fn extract_hash_set_count(mem: &Memory) -> u32 {
    mem.get_u32(HASH_SET_COUNT_INT)
}

pub(crate) fn extract_hip_accum(mem: &Memory) -> f64 {
    mem.get_f64(HIP_ACCUM_DOUBLE)
}

pub(crate) fn extract_kxq0(mem: &Memory) -> f64 {
    mem.get_f64(KXQ0_DOUBLE)
}

pub(crate) fn extract_kxq1(mem: &Memory) -> f64 {
    mem.get_f64(KXQ1_DOUBLE)
}

pub(crate) fn extract_num_at_cur_min(mem: &Memory) -> u32 {
    mem.get_u32(CUR_MIN_COUNT_INT)
}

pub(crate) fn extract_aux_count(mem: &Memory) -> u32 {
    mem.get_u32(AUX_COUNT_INT)
}

pub(crate) fn extract_empty_flag(mem: &Memory) -> bool {
    extract_flags(mem) & EMPTY_FLAG_MASK != 0
}

pub(crate) fn extract_compact_flag(mem: &Memory) -> bool {
    extract_flags(mem) & COMPACT_FLAG_MASK != 0
}

pub(crate) fn extract_ooo_flag(mem: &Memory) -> bool {
    extract_flags(mem) & OUT_OF_ORDER_FLAG_MASK != 0
}

pub(crate) fn insert_pre_ints(mem: &mut Memory, pre_ints: u8) -> Result<(), Error> {
    let resize_bits = mem.get_u8(PREAMBLE_INTS_BYTE) & !PRE_INTS_MASK;
    mem.put_u8(PREAMBLE_INTS_BYTE, resize_bits | (pre_ints & PRE_INTS_MASK))
}

pub(crate) fn insert_lg_arr(mem: &mut Memory, lg_arr: u8) -> Result<(), Error> {
    mem.put_u8(LG_ARR_BYTE, lg_arr)
}

/// Write the flags byte; the byte-order bit always reflects this host.
pub(crate) fn insert_flags(mem: &mut Memory, flags: u8) -> Result<(), Error> {
    let order = if NATIVE_ORDER_IS_BIG_ENDIAN {
        BIG_ENDIAN_FLAG_MASK
    } else {
        0
    };
    mem.put_u8(FLAGS_BYTE, (flags & !BIG_ENDIAN_FLAG_MASK) | order)
}

fn insert_flag(mem: &mut Memory, mask: u8, on: bool) -> Result<(), Error> {
    let flags = extract_flags(mem);
    insert_flags(mem, if on { flags | mask } else { flags & !mask })
}

pub(crate) fn insert_empty_flag(mem: &mut Memory, empty: bool) -> Result<(), Error> {
    insert_flag(mem, EMPTY_FLAG_MASK, empty)
}

pub(crate) fn insert_compact_flag(mem: &mut Memory, compact: bool) -> Result<(), Error> {
    insert_flag(mem, COMPACT_FLAG_MASK, compact)
}

pub(crate) fn insert_ooo_flag(mem: &mut Memory, ooo: bool) -> Result<(), Error> {
    insert_flag(mem, OUT_OF_ORDER_FLAG_MASK, ooo)
}

pub(crate) fn insert_list_count(mem: &mut Memory, count: u32) -> Result<(), Error> {
    debug_assert!(count <= u8::MAX as u32);
    mem.put_u8(LIST_COUNT_BYTE, count as u8)
}

/// `num_at_cur_min - 1`, refusing an image whose header counts no register at the
/// minimum while one is being raised from it.
pub(crate) fn decremented_num_at_cur_min(mem: &Memory) -> Result<u32, Error> {
    extract_num_at_cur_min(mem).checked_sub(1).ok_or_else(|| {
        Error::invariant_violation("num_at_cur_min is zero but a register sits at cur_min")
    })
}

pub(crate) fn insert_cur_min(mem: &mut Memory, cur_min: u8) -> Result<(), Error> {
    mem.put_u8(HLL_CUR_MIN_BYTE, cur_min)
}

pub(crate) fn insert_modes(
    mem: &mut Memory,
    cur_mode: CurMode,
    tgt_hll_type: HllType,
) -> Result<(), Error> {
    mem.put_u8(MODE_BYTE, (cur_mode as u8) | ((tgt_hll_type as u8) << 2))
}

pub(crate) fn insert_hash_set_count(mem: &mut Memory, count: u32) -> Result<(), Error> {
    mem.put_u32(HASH_SET_COUNT_INT, count)
}

pub(crate) fn insert_hip_accum(mem: &mut Memory, value: f64) -> Result<(), Error> {
    mem.put_f64(HIP_ACCUM_DOUBLE, value)
}

pub(crate) fn insert_kxq0(mem: &mut Memory, value: f64) -> Result<(), Error> {
    mem.put_f64(KXQ0_DOUBLE, value)
}

pub(crate) fn insert_kxq1(mem: &mut Memory, value: f64) -> Result<(), Error> {
    mem.put_f64(KXQ1_DOUBLE, value)
}

pub(crate) fn insert_num_at_cur_min(mem: &mut Memory, count: u32) -> Result<(), Error> {
    mem.put_u32(CUR_MIN_COUNT_INT, count)
}

pub(crate) fn insert_aux_count(mem: &mut Memory, count: u32) -> Result<(), Error> {
    mem.put_u32(AUX_COUNT_INT, count)
}

/// Write bytes 0 to 7 of a fresh header.
pub(crate) fn insert_header(
    mem: &mut Memory,
    pre_ints: u8,
    lg_config_k: u8,
    lg_arr: u8,
    flags: u8,
    cur_mode: CurMode,
    tgt_hll_type: HllType,
) -> Result<(), Error> {
    mem.put_u8(PREAMBLE_INTS_BYTE, pre_ints & PRE_INTS_MASK)?;
    mem.put_u8(SER_VER_BYTE, SER_VER)?;
    mem.put_u8(FAMILY_BYTE, Family::HLL.id)?;
    mem.put_u8(LG_K_BYTE, lg_config_k)?;
    insert_lg_arr(mem, lg_arr)?;
    insert_flags(mem, flags)?;
    mem.put_u8(HLL_CUR_MIN_BYTE, 0)?;
    insert_modes(mem, cur_mode, tgt_hll_type)
}

// Footprints.

pub(crate) fn list_bytes(lg_arr: u8) -> usize {
    LIST_INT_ARR_START + (4 << lg_arr)
}

pub(crate) fn set_bytes(lg_arr: u8) -> usize {
    HASH_SET_INT_ARR_START + (4 << lg_arr)
}

/// Bytes of the packed register array alone.
pub(crate) fn hll_array_bytes(lg_config_k: u8, tgt_hll_type: HllType) -> usize {
    let k = 1usize << lg_config_k;
    match tgt_hll_type {
        HllType::Hll4 => k / 2,
        // one spare byte so the last 16-bit window stays in bounds
        HllType::Hll6 => (k * 3) / 4 + 1,
        HllType::Hll8 => k,
    }
}

pub(crate) fn hll_bytes(lg_config_k: u8, tgt_hll_type: HllType, aux_count: u32) -> usize {
    let aux_bytes = match tgt_hll_type {
        HllType::Hll4 => 4 * aux_count as usize,
        HllType::Hll6 | HllType::Hll8 => 0,
    };
    HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, tgt_hll_type) + aux_bytes
}

/// Bytes a caller-owned region needs so that no promotion can run out of space.
pub(crate) fn max_updatable_bytes(lg_config_k: u8, tgt_hll_type: HllType) -> usize {
    let aux_bytes = match tgt_hll_type {
        HllType::Hll4 => 4usize << LG_AUX_ARR_INTS[lg_config_k as usize],
        HllType::Hll6 | HllType::Hll8 => 0,
    };
    let hll = HLL_BYTE_ARR_START + hll_array_bytes(lg_config_k, tgt_hll_type) + aux_bytes;
    let list = list_bytes(crate::hll::LG_INIT_LIST_SIZE);
    hll.max(list)
}

/// Number of coupon slots a sparse image holds.
pub(crate) fn sparse_slots(mem: &Memory, cur_mode: CurMode) -> usize {
    if extract_compact_flag(mem) {
        match cur_mode {
            CurMode::Set => extract_hash_set_count(mem) as usize,
            _ => extract_list_count(mem) as usize,
        }
    } else {
        1 << extract_lg_arr(mem)
    }
}

/// Footprint of the image as declared by its own header.
pub(crate) fn image_bytes(mem: &Memory, cur_mode: CurMode, tgt_hll_type: HllType) -> usize {
    match cur_mode {
        CurMode::List => LIST_INT_ARR_START + 4 * sparse_slots(mem, cur_mode),
        CurMode::Set => HASH_SET_INT_ARR_START + 4 * sparse_slots(mem, cur_mode),
        CurMode::Hll => hll_bytes(extract_lg_k(mem), tgt_hll_type, extract_aux_count(mem)),
    }
}

/// Validate the preamble and return the declared mode and target type.
pub(crate) fn check_preamble(mem: &Memory) -> Result<(CurMode, HllType), Error> {
    let capacity = mem.capacity();
    if capacity < LIST_INT_ARR_START {
        return Err(Error::insufficient_data("preamble")
            .with_context("required", LIST_INT_ARR_START)
            .with_context("available", capacity));
    }

    let pre_ints = extract_pre_ints(mem);
    if capacity < 4 * pre_ints as usize {
        return Err(
            Error::deserial("buffer is shorter than its declared preamble")
                .with_context("pre_ints", pre_ints)
                .with_context("available", capacity),
        );
    }

    Family::HLL.validate_id(mem.get_u8(FAMILY_BYTE))?;
    let ser_ver = mem.get_u8(SER_VER_BYTE);
    if ser_ver != SER_VER {
        return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
    }

    let lg_config_k = extract_lg_k(mem);
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        return Err(Error::deserial(format!(
            "invalid lg_config_k: {lg_config_k}, must be in [{MIN_LG_K}, {MAX_LG_K}]"
        )));
    }

    let big_endian = extract_flags(mem) & BIG_ENDIAN_FLAG_MASK != 0;
    if big_endian != NATIVE_ORDER_IS_BIG_ENDIAN {
        return Err(Error::deserial(
            "sketch image was written with a different byte order",
        ));
    }

    let cur_mode = extract_cur_mode(mem)
        .ok_or_else(|| Error::deserial("invalid current mode in mode byte"))?;
    let tgt_hll_type = extract_tgt_hll_type(mem)
        .ok_or_else(|| Error::deserial("invalid target HLL type in mode byte"))?;

    let expected_pre_ints = match cur_mode {
        CurMode::List => LIST_PREINTS,
        CurMode::Set => HASH_SET_PREINTS,
        CurMode::Hll => HLL_PREINTS,
    };
    if pre_ints != expected_pre_ints {
        return Err(Error::deserial(format!(
            "invalid preamble ints for {cur_mode:?} mode: expected {expected_pre_ints}, got {pre_ints}"
        )));
    }

    match cur_mode {
        CurMode::List | CurMode::Set => {
            let lg_arr = extract_lg_arr(mem);
            let (min_lg_arr, max_lg_arr) = match cur_mode {
                CurMode::List => (LG_INIT_LIST_SIZE, LG_INIT_LIST_SIZE),
                _ => (LG_INIT_SET_SIZE, lg_config_k - 3),
            };
            if !(min_lg_arr..=max_lg_arr).contains(&lg_arr) {
                return Err(Error::deserial(format!(
                    "invalid lg_arr for {cur_mode:?} mode: {lg_arr}"
                ))
                .with_context("lg_config_k", lg_config_k));
            }
            let count = match cur_mode {
                CurMode::List => extract_list_count(mem),
                _ => extract_hash_set_count(mem),
            };
            if count as u64 > 1u64 << lg_arr {
                return Err(Error::deserial(format!(
                    "coupon count {count} exceeds capacity {}",
                    1u64 << lg_arr
                )));
            }
        }
        CurMode::Hll => {
            let k = 1u32 << lg_config_k;
            if extract_num_at_cur_min(mem) > k || extract_aux_count(mem) > k {
                return Err(Error::deserial("register counts exceed the register array"));
            }
            if extract_cur_min(mem) > 63 {
                return Err(Error::deserial("invalid cur_min"));
            }
            if tgt_hll_type != HllType::Hll4 && extract_aux_count(mem) != 0 {
                return Err(Error::deserial("exception table on a non-HLL4 image"));
            }
        }
    }

    let required = image_bytes(mem, cur_mode, tgt_hll_type);
    if capacity < required {
        return Err(Error::insufficient_data("sketch data")
            .with_context("required", required)
            .with_context("available", capacity));
    }

    Ok((cur_mode, tgt_hll_type))
}

pub(crate) fn write_summary(mem: &Memory, f: &mut impl fmt::Write) -> fmt::Result {
    let flags = extract_flags(mem);
    let family = Family::from_id(mem.get_u8(FAMILY_BYTE)).map_or("UNKNOWN", |family| family.name);
    let cur_mode = extract_cur_mode(mem);
    let native = if NATIVE_ORDER_IS_BIG_ENDIAN {
        "big-endian"
    } else {
        "little-endian"
    };

    writeln!(f, "### HLL SKETCH PREAMBLE SUMMARY:")?;
    writeln!(f, "Byte  0: Preamble Ints         : {}", extract_pre_ints(mem))?;
    writeln!(f, "Byte  1: Serialization Version : {}", mem.get_u8(SER_VER_BYTE))?;
    writeln!(f, "Byte  2: Family                : {family}")?;
    writeln!(f, "Byte  3: lg_config_k           : {}", extract_lg_k(mem))?;
    writeln!(f, "Byte  4: lg_arr                : {}", extract_lg_arr(mem))?;
    writeln!(f, "Byte  5: Flags                 : {flags:08b}, {flags}")?;
    writeln!(f, "  BIG_ENDIAN_STORAGE           : {}", flags & BIG_ENDIAN_FLAG_MASK != 0)?;
    writeln!(f, "  (Native Byte Order)          : {native}")?;
    writeln!(f, "  READ_ONLY                    : {}", flags & READ_ONLY_FLAG_MASK != 0)?;
    writeln!(f, "  EMPTY                        : {}", flags & EMPTY_FLAG_MASK != 0)?;
    writeln!(f, "  COMPACT                      : {}", flags & COMPACT_FLAG_MASK != 0)?;
    writeln!(f, "  OUT_OF_ORDER                 : {}", flags & OUT_OF_ORDER_FLAG_MASK != 0)?;
    match cur_mode {
        Some(CurMode::List) => {
            writeln!(f, "Byte  6: List Count            : {}", extract_list_count(mem))?;
        }
        _ => {
            writeln!(f, "Byte  6: cur_min               : {}", extract_cur_min(mem))?;
        }
    }
    writeln!(
        f,
        "Byte  7: Mode                  : {:?}, {:?}",
        cur_mode,
        extract_tgt_hll_type(mem)
    )?;
    match cur_mode {
        Some(CurMode::Set) => {
            writeln!(f, "Bytes 8-11: Set Count          : {}", extract_hash_set_count(mem))?;
        }
        Some(CurMode::Hll) => {
            writeln!(f, "Bytes 8-15: HIP Accum          : {}", extract_hip_accum(mem))?;
            writeln!(f, "Bytes 16-23: KxQ0              : {}", extract_kxq0(mem))?;
            writeln!(f, "Bytes 24-31: KxQ1              : {}", extract_kxq1(mem))?;
            writeln!(f, "Bytes 32-35: num_at_cur_min    : {}", extract_num_at_cur_min(mem))?;
            writeln!(f, "Bytes 36-39: Exception Count   : {}", extract_aux_count(mem))?;
        }
        _ => {}
    }
    writeln!(f, "### END PREAMBLE SUMMARY")
}

/// Human readable summary of the preamble of a serialized HLL image.
///
/// # Errors
///
/// Returns an error if `bytes` is not a valid HLL image.
///
/// # Examples
///
/// ```
/// use datasketches_hll::hll::{preamble_summary, HllSketch, HllType};
///
/// let sketch = HllSketch::new(10, HllType::Hll8);
/// let summary = preamble_summary(&sketch.to_bytes()).unwrap();
/// assert!(summary.contains("Family                : HLL"));
/// ```
pub fn preamble_summary(bytes: &[u8]) -> Result<String, Error> {
    let mem = Memory::ReadOnly(bytes);
    check_preamble(&mem)?;
    let mut out = String::new();
    write_summary(&mem, &mut out)
        .map_err(|e| Error::deserial("failed to format preamble").set_source(e))?;
    Ok(out)
}
