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

//! Representation transitions and merging.
//!
//! Every transition follows the same protocol: buffer the source's coupons, secure
//! the new footprint, rewrite the header, zero the data region, then replay the
//! buffered coupons through the new representation's ordinary update path.

use tracing::debug;

use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::HllType;
use crate::hll::LG_INIT_SET_SIZE;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::mode::Mode;
use crate::hll::mode::Transition;
use crate::hll::pack_coupon;
use crate::hll::preamble;
use crate::memory::Memory;

/// Feed `coupons` through `mode`, following any promotion they trigger.
pub(crate) fn replay(mem: &mut Memory, mode: &mut Mode, coupons: &[u32]) -> Result<(), Error> {
    for &coupon in coupons {
        if let Transition::Promoted(next) = mode.update(mem, coupon)? {
            *mode = next;
        }
    }
    Ok(())
}

/// Write an empty dense image: zero registers, `num_at_cur_min = k`, `kxq0 = k`.
pub(crate) fn init_dense(
    mem: &mut Memory,
    lg_config_k: u8,
    hll_type: HllType,
) -> Result<(), Error> {
    let len = preamble::hll_bytes(lg_config_k, hll_type, 0);
    mem.ensure_capacity(len)?;

    preamble::insert_header(
        mem,
        preamble::HLL_PREINTS,
        lg_config_k,
        0,
        0,
        CurMode::Hll,
        hll_type,
    )?;
    mem.clear(
        preamble::HIP_ACCUM_DOUBLE,
        len - preamble::HIP_ACCUM_DOUBLE,
    )?;
    preamble::insert_num_at_cur_min(mem, 1 << lg_config_k)?;
    HipEstimator::new(lg_config_k).store(mem)
}

/// Rewrite a full LIST image as a SET image holding the same coupons.
pub(crate) fn promote_list_to_set(
    mem: &mut Memory,
    lg_config_k: u8,
    hll_type: HllType,
) -> Result<Mode, Error> {
    let source = Mode::from_image(lg_config_k, hll_type, CurMode::List);
    let coupons = source.coupons(mem)?;
    let old_len = preamble::image_bytes(mem, CurMode::List, hll_type);
    let new_len = preamble::set_bytes(LG_INIT_SET_SIZE);
    mem.ensure_capacity(new_len)?;

    // a hash set does not preserve insertion order
    preamble::insert_header(
        mem,
        preamble::HASH_SET_PREINTS,
        lg_config_k,
        LG_INIT_SET_SIZE,
        preamble::OUT_OF_ORDER_FLAG_MASK,
        CurMode::Set,
        hll_type,
    )?;
    mem.clear(
        preamble::HASH_SET_COUNT_INT,
        new_len.max(old_len) - preamble::HASH_SET_COUNT_INT,
    )?;

    let mut mode = Mode::Set(CouponHashSet::new(lg_config_k, hll_type));
    replay(mem, &mut mode, &coupons)?;
    debug!(
        lg_config_k,
        coupons = coupons.len(),
        "promoted coupon list to hash set"
    );
    Ok(mode)
}

/// Rewrite a LIST or SET image as a dense image of the target type.
///
/// Replay alone cannot reconstruct the HIP history, so the accumulator is seeded
/// with the coupon estimate of the source.
pub(crate) fn promote_to_hll(
    mem: &mut Memory,
    lg_config_k: u8,
    hll_type: HllType,
) -> Result<Mode, Error> {
    let cur_mode = preamble::extract_cur_mode(mem)
        .ok_or_else(|| Error::invariant_violation("invalid current mode in mode byte"))?;
    let source = Mode::from_image(lg_config_k, hll_type, cur_mode);
    let estimate = source.estimate(mem);
    let coupons = source.coupons(mem)?;
    let old_len = preamble::image_bytes(mem, cur_mode, hll_type);

    init_dense(mem, lg_config_k, hll_type)?;
    let new_len = preamble::hll_bytes(lg_config_k, hll_type, 0);
    if old_len > new_len {
        mem.clear(new_len, old_len - new_len)?;
    }

    let mut mode = Mode::dense(lg_config_k, hll_type);
    replay(mem, &mut mode, &coupons)?;
    preamble::insert_hip_accum(mem, estimate)?;

    debug!(
        lg_config_k,
        ?hll_type,
        from = ?cur_mode,
        coupons = coupons.len(),
        "promoted to dense HLL"
    );
    Ok(mode)
}

/// Build a heap dense image of `hll_type` holding the registers of a dense source.
///
/// The register sums are exact, so only the HIP accumulator and the out-of-order
/// flag have to be carried over.
pub(crate) fn convert_dense(
    source: &Mode,
    src_mem: &Memory,
    hll_type: HllType,
) -> Result<(Mode, Memory<'static>), Error> {
    let lg_config_k = preamble::extract_lg_k(src_mem);
    let mut mem = Memory::Heap(Vec::new());
    init_dense(&mut mem, lg_config_k, hll_type)?;

    let mut mode = Mode::dense(lg_config_k, hll_type);
    replay(&mut mem, &mut mode, &source.coupons(src_mem)?)?;

    let src_estimator = HipEstimator::load(src_mem);
    preamble::insert_hip_accum(&mut mem, src_estimator.hip_accum())?;
    preamble::insert_ooo_flag(&mut mem, src_estimator.is_out_of_order())?;
    Ok((mode, mem))
}

/// Replay every coupon of `source` into the target image.
///
/// A dense source must have at least the target's `lg_config_k`; a wider source is
/// down-sampled by masking slots. A dense target is left out-of-order unless the
/// source is empty.
pub(crate) fn merge(
    source: &Mode,
    src_mem: &Memory,
    target: &mut Mode,
    tgt_mem: &mut Memory,
) -> Result<(), Error> {
    tgt_mem.check_writable()?;

    let src_lg_k = preamble::extract_lg_k(src_mem);
    let tgt_lg_k = preamble::extract_lg_k(tgt_mem);
    let mut coupons = source.coupons(src_mem)?;

    if source.cur_mode() == CurMode::Hll {
        if src_lg_k < tgt_lg_k {
            return Err(Error::config_invalid(format!(
                "cannot merge a dense sketch with lg_config_k {src_lg_k} into lg_config_k {tgt_lg_k}"
            )));
        }
        if src_lg_k > tgt_lg_k {
            let mask = (1u32 << tgt_lg_k) - 1;
            for coupon in coupons.iter_mut() {
                *coupon = pack_coupon(get_slot(*coupon) & mask, get_value(*coupon));
            }
        }
    }

    if coupons.is_empty() {
        return Ok(());
    }
    replay(tgt_mem, target, &coupons)?;

    if target.cur_mode() == CurMode::Hll {
        let mut estimator = HipEstimator::load(tgt_mem);
        estimator.set_out_of_order(true);
        estimator.store(tgt_mem)?;
        preamble::insert_ooo_flag(tgt_mem, true)?;
        debug!(
            src_lg_k,
            tgt_lg_k,
            coupons = coupons.len(),
            "merged into dense sketch, HIP estimate disabled"
        );
    }
    Ok(())
}
