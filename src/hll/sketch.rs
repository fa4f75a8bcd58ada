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

use std::fmt;
use std::hash::Hash;

use byteorder::ByteOrder;
use byteorder::NativeEndian;

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::CurMode;
use crate::hll::DEFAULT_LG_K;
use crate::hll::HllType;
use crate::hll::LG_INIT_LIST_SIZE;
use crate::hll::check_lg_config_k;
use crate::hll::coupon;
use crate::hll::coupon_from_bytes;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::list::CouponList;
use crate::hll::mode::Mode;
use crate::hll::mode::Transition;
use crate::hll::preamble;
use crate::hll::promotion;
use crate::memory::Memory;

/// A HyperLogLog sketch backed by a single byte image.
///
/// The image is owned by the sketch ([`build`](HllSketchBuilder::build),
/// [`from_bytes`](HllSketch::from_bytes)) or borrowed from the caller
/// ([`build_in`](HllSketchBuilder::build_in), [`wrap`](HllSketch::wrap),
/// [`writable_wrap`](HllSketch::writable_wrap)). Both behave identically; only
/// growth differs, since a borrowed region cannot be resized.
///
/// # Examples
///
/// ```
/// use datasketches_hll::hll::{HllSketch, HllType};
///
/// let mut sketch = HllSketch::builder()
///     .lg_config_k(12)
///     .hll_type(HllType::Hll6)
///     .build()
///     .unwrap();
/// for i in 0..1000 {
///     sketch.update(i).unwrap();
/// }
/// assert!((sketch.estimate() - 1000.0).abs() < 50.0);
/// ```
pub struct HllSketch<'a> {
    lg_config_k: u8,
    hll_type: HllType,
    mem: Memory<'a>,
    mode: Mode,
}

/// Builder for [`HllSketch`].
#[derive(Debug, Clone)]
pub struct HllSketchBuilder {
    lg_config_k: u8,
    hll_type: HllType,
}

impl Default for HllSketchBuilder {
    fn default() -> Self {
        Self {
            lg_config_k: DEFAULT_LG_K,
            hll_type: HllType::default(),
        }
    }
}

impl HllSketchBuilder {
    /// Set log2 of the number of registers. Must be in `[4, 21]`.
    pub fn lg_config_k(mut self, lg_config_k: u8) -> Self {
        self.lg_config_k = lg_config_k;
        self
    }

    /// Set the register width of the dense representation.
    pub fn hll_type(mut self, hll_type: HllType) -> Self {
        self.hll_type = hll_type;
        self
    }

    /// Build a sketch that owns its image.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `lg_config_k` is out of range.
    pub fn build(self) -> Result<HllSketch<'static>, Error> {
        check_lg_config_k(self.lg_config_k)?;
        let mut mem = Memory::Heap(Vec::new());
        let list = CouponList::new(self.lg_config_k, self.hll_type);
        list.init(&mut mem)?;
        Ok(HllSketch {
            lg_config_k: self.lg_config_k,
            hll_type: self.hll_type,
            mem,
            mode: Mode::List(list),
        })
    }

    /// Build a sketch whose image lives in `region`.
    ///
    /// The region must hold
    /// [`max_updatable_serialization_bytes`](HllSketch::max_updatable_serialization_bytes)
    /// so that every promotion fits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `lg_config_k` is out of range, or
    /// [`InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity) if the
    /// region is too small.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let len = HllSketch::max_updatable_serialization_bytes(10, HllType::Hll8).unwrap();
    /// let mut region = vec![0u8; len];
    /// let mut sketch = HllSketch::builder()
    ///     .lg_config_k(10)
    ///     .hll_type(HllType::Hll8)
    ///     .build_in(&mut region)
    ///     .unwrap();
    /// sketch.update("apple").unwrap();
    /// assert!(sketch.is_direct());
    /// ```
    pub fn build_in(self, region: &mut [u8]) -> Result<HllSketch<'_>, Error> {
        let required =
            HllSketch::max_updatable_serialization_bytes(self.lg_config_k, self.hll_type)?;
        if region.len() < required {
            return Err(Error::insufficient_capacity(required, region.len()));
        }

        let mut mem = Memory::Writable(region);
        let list = CouponList::new(self.lg_config_k, self.hll_type);
        list.init(&mut mem)?;
        Ok(HllSketch {
            lg_config_k: self.lg_config_k,
            hll_type: self.hll_type,
            mem,
            mode: Mode::List(list),
        })
    }
}

impl HllSketch<'static> {
    /// Create a new builder for HllSketch
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::HllSketch;
    ///
    /// let sketch = HllSketch::builder().lg_config_k(11).build().unwrap();
    /// assert_eq!(sketch.lg_config_k(), 11);
    /// ```
    pub fn builder() -> HllSketchBuilder {
        HllSketchBuilder::default()
    }

    /// Create a heap sketch.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in `[4, 21]`.
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        assert!(
            check_lg_config_k(lg_config_k).is_ok(),
            "lg_config_k must be in [4, 21], got {lg_config_k}"
        );
        match Self::builder()
            .lg_config_k(lg_config_k)
            .hll_type(hll_type)
            .build()
        {
            Ok(sketch) => sketch,
            Err(err) => panic!("failed to initialize heap sketch: {err}"),
        }
    }

    /// Copy a serialized image into a new heap sketch.
    ///
    /// Compact sparse images are rebuilt into updatable form.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if `bytes` is not a valid HLL image.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(12, HllType::Hll4);
    /// sketch.update("apple").unwrap();
    /// let restored = HllSketch::from_bytes(&sketch.to_bytes()).unwrap();
    /// assert_eq!(restored.estimate(), sketch.estimate());
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let view = Memory::ReadOnly(bytes);
        let (cur_mode, hll_type) = preamble::check_preamble(&view)?;
        let lg_config_k = preamble::extract_lg_k(&view);
        let source = Mode::from_image(lg_config_k, hll_type, cur_mode);

        if cur_mode != CurMode::Hll && preamble::extract_compact_flag(&view) {
            let mut sketch = HllSketch::builder()
                .lg_config_k(lg_config_k)
                .hll_type(hll_type)
                .build()?;
            for coupon in source.coupons(&view)? {
                sketch.update_coupon(coupon)?;
            }
            return Ok(sketch);
        }

        let len = preamble::image_bytes(&view, cur_mode, hll_type);
        let mut mem = view.to_heap(len);
        preamble::insert_compact_flag(&mut mem, false)?;
        Ok(HllSketch {
            lg_config_k,
            hll_type,
            mem,
            mode: source,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_dense(lg_config_k: u8, hll_type: HllType) -> Self {
        let mut mem = Memory::Heap(Vec::new());
        promotion::init_dense(&mut mem, lg_config_k, hll_type).unwrap();
        HllSketch {
            lg_config_k,
            hll_type,
            mem,
            mode: Mode::dense(lg_config_k, hll_type),
        }
    }
}

impl<'a> HllSketch<'a> {
    /// Read-only view over a serialized image, compact or not.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if `bytes` is not a valid HLL image.
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let mem = Memory::ReadOnly(bytes);
        let (cur_mode, hll_type) = preamble::check_preamble(&mem)?;
        let lg_config_k = preamble::extract_lg_k(&mem);
        Ok(HllSketch {
            lg_config_k,
            hll_type,
            mem,
            mode: Mode::from_image(lg_config_k, hll_type, cur_mode),
        })
    }

    /// Operate in place on an updatable image held by the caller.
    ///
    /// Growth beyond `bytes.len()` fails with
    /// [`InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity). Such a
    /// failure in the middle of a promotion can leave the region partially rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if `bytes` is not a valid HLL image or is compact.
    pub fn writable_wrap(bytes: &'a mut [u8]) -> Result<Self, Error> {
        let (cur_mode, hll_type) = preamble::check_preamble(&Memory::ReadOnly(bytes))?;
        let mem = Memory::Writable(bytes);
        if preamble::extract_compact_flag(&mem) {
            return Err(Error::deserial(
                "a compact image cannot be wrapped for writing",
            ));
        }
        let lg_config_k = preamble::extract_lg_k(&mem);
        Ok(HllSketch {
            lg_config_k,
            hll_type,
            mem,
            mode: Mode::from_image(lg_config_k, hll_type, cur_mode),
        })
    }

    /// Update the sketch with a hashable value.
    ///
    /// # Errors
    ///
    /// Returns [`NoWriteAccess`](crate::error::ErrorKind::NoWriteAccess) on a
    /// read-only sketch, or
    /// [`InsufficientCapacity`](crate::error::ErrorKind::InsufficientCapacity) if a
    /// borrowed region cannot hold the grown image.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(10, HllType::Hll8);
    /// sketch.update("apple").unwrap();
    /// sketch.update(42u64).unwrap();
    /// assert!(sketch.estimate() >= 2.0);
    /// ```
    pub fn update<T: Hash>(&mut self, value: T) -> Result<(), Error> {
        self.update_coupon(coupon(value))
    }

    /// Update the sketch with the murmur3 hash of raw bytes.
    pub fn update_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.update_coupon(coupon_from_bytes(bytes))
    }

    pub(crate) fn update_coupon(&mut self, coupon: u32) -> Result<(), Error> {
        self.mem.check_writable()?;
        if let Transition::Promoted(next) = self.mode.update(&mut self.mem, coupon)? {
            self.mode = next;
        }
        Ok(())
    }

    /// Return the cardinality estimate.
    ///
    /// Sparse sketches count their distinct coupons. Dense sketches report the HIP
    /// accumulator, or the composite estimate once out-of-order.
    pub fn estimate(&self) -> f64 {
        self.mode.estimate(&self.mem)
    }

    /// Return the estimate computed from the current contents alone.
    pub fn composite_estimate(&self) -> f64 {
        self.mode.composite_estimate(&self.mem)
    }

    /// Returns the approximate lower error bound given the specified number of
    /// standard deviations.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::common::NumStdDev;
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(12, HllType::Hll4);
    /// for i in 0..10000 {
    ///     sketch.update(i).unwrap();
    /// }
    ///
    /// let estimate = sketch.estimate();
    /// assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
    /// assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
    /// ```
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.lower_bound(&self.mem, num_std_dev)
    }

    /// Returns the approximate upper error bound given the specified number of
    /// standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.upper_bound(&self.mem, num_std_dev)
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn hll_type(&self) -> HllType {
        self.hll_type
    }

    pub fn current_mode(&self) -> CurMode {
        self.mode.cur_mode()
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_empty(&self.mem)
    }

    /// Whether coupons were not applied in stream order: set by hash-set images and by
    /// merges into a dense image, which disables the HIP estimate.
    pub fn is_out_of_order(&self) -> bool {
        preamble::extract_ooo_flag(&self.mem)
    }

    pub fn is_compact(&self) -> bool {
        preamble::extract_compact_flag(&self.mem)
    }

    /// Whether the image lives in caller-owned memory.
    pub fn is_direct(&self) -> bool {
        self.mem.is_direct()
    }

    pub fn is_read_only(&self) -> bool {
        !self.mem.is_writable()
    }

    /// Size of the updatable image in the current representation.
    pub fn updatable_serialization_bytes(&self) -> usize {
        let lg_arr = preamble::extract_lg_arr(&self.mem);
        match self.current_mode() {
            CurMode::List => preamble::list_bytes(lg_arr),
            CurMode::Set => preamble::set_bytes(lg_arr),
            CurMode::Hll => self.image_len(),
        }
    }

    /// Size of [`to_bytes`](Self::to_bytes).
    pub fn compact_serialization_bytes(&self) -> usize {
        let count = self.mode.coupon_count(&self.mem) as usize;
        match self.current_mode() {
            CurMode::List => preamble::LIST_INT_ARR_START + 4 * count,
            CurMode::Set => preamble::HASH_SET_INT_ARR_START + 4 * count,
            CurMode::Hll => self.image_len(),
        }
    }

    /// Bytes a caller-owned region needs to hold a sketch through every promotion.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `lg_config_k` is out of range.
    pub fn max_updatable_serialization_bytes(
        lg_config_k: u8,
        hll_type: HllType,
    ) -> Result<usize, Error> {
        check_lg_config_k(lg_config_k)?;
        Ok(preamble::max_updatable_bytes(lg_config_k, hll_type))
    }

    /// Footprint of the image as declared by its header.
    fn image_len(&self) -> usize {
        preamble::image_bytes(&self.mem, self.current_mode(), self.hll_type)
    }

    fn image(&self) -> &[u8] {
        &self.mem.as_slice()[..self.image_len()]
    }

    /// Serialize in compact form: sparse images keep only their live coupons.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(12, HllType::Hll8);
    /// sketch.update(1).unwrap();
    /// assert_eq!(sketch.to_bytes().len(), 8 + 4);
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let (start, coupons) = match self.mode {
            Mode::List(_) => (preamble::LIST_INT_ARR_START, CouponList::coupons(&self.mem)),
            Mode::Set(_) => (
                preamble::HASH_SET_INT_ARR_START,
                CouponHashSet::coupons(&self.mem),
            ),
            Mode::Array4(_) | Mode::Array6(_) | Mode::Array8(_) => {
                let mut bytes = self.image().to_vec();
                bytes[preamble::FLAGS_BYTE] |= preamble::COMPACT_FLAG_MASK;
                return bytes;
            }
        };

        let mut bytes = vec![0u8; start + 4 * coupons.len()];
        bytes[..start].copy_from_slice(&self.mem.as_slice()[..start]);
        bytes[preamble::FLAGS_BYTE] |= preamble::COMPACT_FLAG_MASK;
        NativeEndian::write_u32_into(&coupons, &mut bytes[start..]);
        bytes
    }

    /// Serialize the full updatable image, suitable for
    /// [`writable_wrap`](Self::writable_wrap).
    pub fn to_updatable_bytes(&self) -> Result<Vec<u8>, Error> {
        if self.is_compact() {
            return self.copy()?.to_updatable_bytes();
        }
        Ok(self.image().to_vec())
    }

    /// Copy into a new heap sketch.
    pub fn copy(&self) -> Result<HllSketch<'static>, Error> {
        HllSketch::from_bytes(self.image())
    }

    /// Copy into a new heap sketch with a different dense register width.
    ///
    /// Sparse sketches only change their target type; dense registers are converted
    /// and the HIP state carried over.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut sketch = HllSketch::new(8, HllType::Hll8);
    /// for i in 0..5000 {
    ///     sketch.update(i).unwrap();
    /// }
    /// let hll4 = sketch.copy_as(HllType::Hll4).unwrap();
    /// assert_eq!(hll4.hll_type(), HllType::Hll4);
    /// assert_eq!(hll4.estimate(), sketch.estimate());
    /// ```
    pub fn copy_as(&self, hll_type: HllType) -> Result<HllSketch<'static>, Error> {
        if hll_type == self.hll_type {
            return self.copy();
        }

        match self.current_mode() {
            CurMode::List | CurMode::Set => {
                let mut copy = self.copy()?;
                let cur_mode = copy.current_mode();
                preamble::insert_modes(&mut copy.mem, cur_mode, hll_type)?;
                copy.hll_type = hll_type;
                copy.mode = Mode::from_image(copy.lg_config_k, hll_type, cur_mode);
                Ok(copy)
            }
            CurMode::Hll => {
                let (mode, mem) = promotion::convert_dense(&self.mode, &self.mem, hll_type)?;
                Ok(HllSketch {
                    lg_config_k: self.lg_config_k,
                    hll_type,
                    mem,
                    mode,
                })
            }
        }
    }

    /// Return to an empty LIST image, keeping the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NoWriteAccess`](crate::error::ErrorKind::NoWriteAccess) on a
    /// read-only sketch.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.mem.check_writable()?;
        let old_len = self.image_len();
        let list = CouponList::new(self.lg_config_k, self.hll_type);
        list.init(&mut self.mem)?;

        let len = preamble::list_bytes(LG_INIT_LIST_SIZE);
        self.mem.shrink_to(len);
        let tail = old_len.min(self.mem.capacity());
        if tail > len {
            self.mem.clear(len, tail - len)?;
        }
        self.mode = Mode::List(list);
        Ok(())
    }

    /// Merge the contents of this sketch into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`NoWriteAccess`](crate::error::ErrorKind::NoWriteAccess) if the target
    /// is read-only, or [`ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// this sketch is dense with a smaller `lg_config_k` than the target.
    pub fn merge_into(&self, target: &mut HllSketch<'_>) -> Result<(), Error> {
        let mut mode = target.mode;
        let result = promotion::merge(&self.mode, &self.mem, &mut mode, &mut target.mem);
        target.mode = mode;
        result
    }

    /// Return a new heap sketch holding the union of this sketch and `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datasketches_hll::hll::{HllSketch, HllType};
    ///
    /// let mut a = HllSketch::new(12, HllType::Hll8);
    /// let mut b = HllSketch::new(12, HllType::Hll8);
    /// for i in 0..100 {
    ///     a.update(i).unwrap();
    ///     b.update(i + 50).unwrap();
    /// }
    /// let merged = a.merge(&b).unwrap();
    /// assert!((merged.estimate() - 150.0).abs() < 5.0);
    /// ```
    pub fn merge(&self, other: &HllSketch<'_>) -> Result<HllSketch<'static>, Error> {
        let mut result = self.copy()?;
        other.merge_into(&mut result)?;
        Ok(result)
    }

    /// Live coupons, sorted, for comparing contents across representations.
    fn sorted_coupons(&self) -> Result<Vec<u32>, Error> {
        let mut coupons = self.mode.coupons(&self.mem)?;
        coupons.sort_unstable();
        Ok(coupons)
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> Result<Vec<u8>, Error> {
        let k = 1u32 << self.lg_config_k;
        let mut registers = Vec::with_capacity(k as usize);
        for slot in 0..k {
            registers.push(self.mode.register(&self.mem, slot)?.unwrap_or(0));
        }
        Ok(registers)
    }
}

impl PartialEq for HllSketch<'_> {
    /// Two sketches are equal when they share configuration and representation and
    /// hold the same coupons or registers. Estimator state is not compared.
    fn eq(&self, other: &Self) -> bool {
        if self.lg_config_k != other.lg_config_k
            || self.hll_type != other.hll_type
            || self.current_mode() != other.current_mode()
        {
            return false;
        }
        match (self.sorted_coupons(), other.sorted_coupons()) {
            (Ok(ours), Ok(theirs)) => ours == theirs,
            _ => false,
        }
    }
}

impl fmt::Debug for HllSketch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HllSketch")
            .field("lg_config_k", &self.lg_config_k)
            .field("hll_type", &self.hll_type)
            .field("cur_mode", &self.current_mode())
            .field("direct", &self.is_direct())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl fmt::Display for HllSketch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### HLL SKETCH SUMMARY:")?;
        writeln!(f, "  lg_config_k     : {}", self.lg_config_k)?;
        writeln!(f, "  hll_type        : {:?}", self.hll_type)?;
        writeln!(f, "  cur_mode        : {:?}", self.current_mode())?;
        writeln!(f, "  direct          : {}", self.is_direct())?;
        writeln!(f, "  read_only       : {}", self.is_read_only())?;
        writeln!(f, "  empty           : {}", self.is_empty())?;
        writeln!(f, "  estimate        : {}", self.estimate())?;
        writeln!(f, "  lower_bound (1) : {}", self.lower_bound(NumStdDev::One))?;
        writeln!(f, "  upper_bound (1) : {}", self.upper_bound(NumStdDev::One))?;
        preamble::write_summary(&self.mem, f)
    }
}
