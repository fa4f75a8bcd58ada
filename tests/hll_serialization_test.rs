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

use datasketches_hll::error::ErrorKind;
use datasketches_hll::hll::CurMode;
use datasketches_hll::hll::HllSketch;
use datasketches_hll::hll::HllType;
use datasketches_hll::hll::preamble_summary;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

fn sketch_with(lg_k: u8, hll_type: HllType, n: u64) -> HllSketch<'static> {
    let mut sketch = HllSketch::new(lg_k, hll_type);
    for i in 0..n {
        sketch.update(i).unwrap();
    }
    sketch
}

#[test]
fn test_roundtrip_every_mode() {
    for hll_type in ALL_TYPES {
        for (n, mode) in [
            (0, CurMode::List),
            (5, CurMode::List),
            (100, CurMode::Set),
            (5000, CurMode::Hll),
        ] {
            let sketch = sketch_with(12, hll_type, n);
            assert_that!(sketch.current_mode(), eq(mode));

            let compact = sketch.to_bytes();
            assert_that!(compact.len(), eq(sketch.compact_serialization_bytes()));
            let restored = HllSketch::from_bytes(&compact).unwrap();
            assert_that!(restored.current_mode(), eq(mode));
            assert_that!(restored.estimate(), eq(sketch.estimate()));
            assert!(!restored.is_compact());
            assert!(restored == sketch);

            let updatable = sketch.to_updatable_bytes().unwrap();
            assert_that!(updatable.len(), eq(sketch.updatable_serialization_bytes()));
            let restored = HllSketch::from_bytes(&updatable).unwrap();
            assert_that!(restored.estimate(), eq(sketch.estimate()));
            assert_that!(restored.to_bytes(), eq(&compact));
        }
    }
}

#[test]
fn test_compact_sparse_is_smaller() {
    let sketch = sketch_with(12, HllType::Hll8, 100);
    assert_that!(sketch.compact_serialization_bytes(), eq(12 + 4 * 100));
    assert!(sketch.updatable_serialization_bytes() > sketch.compact_serialization_bytes());
}

#[test]
fn test_restored_sketch_keeps_updating() {
    for hll_type in ALL_TYPES {
        let mut original = sketch_with(10, hll_type, 50);
        let mut restored = HllSketch::from_bytes(&original.to_bytes()).unwrap();
        for i in 50..3000 {
            original.update(i).unwrap();
            restored.update(i).unwrap();
        }
        assert!(restored == original);
        assert_that!(restored.current_mode(), eq(CurMode::Hll));
    }
}

#[test]
fn test_wrap_reads_without_copying() {
    for n in [3, 200, 10_000] {
        let sketch = sketch_with(11, HllType::Hll4, n);
        for bytes in [sketch.to_bytes(), sketch.to_updatable_bytes().unwrap()] {
            let wrapped = HllSketch::wrap(&bytes).unwrap();
            assert!(wrapped.is_read_only());
            assert!(wrapped.is_direct());
            assert_that!(wrapped.estimate(), eq(sketch.estimate()));
            assert_that!(wrapped.current_mode(), eq(sketch.current_mode()));
        }
    }
}

#[test]
fn test_wrapped_compact_copies_back() {
    let sketch = sketch_with(12, HllType::Hll6, 150);
    let bytes = sketch.to_bytes();
    let wrapped = HllSketch::wrap(&bytes).unwrap();
    assert!(wrapped.is_compact());
    let copy = wrapped.copy().unwrap();
    assert!(!copy.is_compact());
    assert!(copy == sketch);
    // slot placement may differ once coupons are re-inserted
    let updatable = wrapped.to_updatable_bytes().unwrap();
    assert!(HllSketch::from_bytes(&updatable).unwrap() == sketch);
}

#[test]
fn test_rejects_short_buffers() {
    let err = HllSketch::from_bytes(&[]).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::MalformedDeserializeData));
    assert_that!(err.message(), contains_substring("insufficient data for preamble"));

    let bytes = sketch_with(10, HllType::Hll8, 5000).to_bytes();
    let err = HllSketch::wrap(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_that!(err.message(), contains_substring("insufficient data for sketch data"));

    let err = HllSketch::wrap(&bytes[..20]).unwrap_err();
    assert_that!(err.message(), contains_substring("shorter than its declared preamble"));
}

#[test]
fn test_rejects_foreign_family() {
    let mut bytes = sketch_with(10, HllType::Hll8, 3).to_bytes();
    bytes[2] = 3;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::MalformedDeserializeData));
    assert_that!(err.message(), contains_substring("invalid family"));
    assert_that!(err.message(), contains_substring("got 3"));
}

#[test]
fn test_rejects_bad_header_fields() {
    let good = sketch_with(10, HllType::Hll8, 3).to_bytes();

    let mut bytes = good.clone();
    bytes[1] = 2;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("unsupported serialization version"));

    let mut bytes = good.clone();
    bytes[3] = 22;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid lg_config_k"));

    let mut bytes = good.clone();
    bytes[7] = 3;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid current mode"));

    let mut bytes = good.clone();
    bytes[7] = 3 << 2;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid target HLL type"));

    let mut bytes = good.clone();
    bytes[0] = 3;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid preamble ints"));

    let mut bytes = good;
    bytes[5] ^= 1;
    let err = HllSketch::from_bytes(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("different byte order"));
}

#[test]
fn test_copy_as_across_types() {
    for from in ALL_TYPES {
        let sketch = sketch_with(10, from, 30_000);
        for to in ALL_TYPES {
            let converted = sketch.copy_as(to).unwrap();
            assert_that!(converted.hll_type(), eq(to));
            assert_that!(converted.estimate(), eq(sketch.estimate()));

            let back = HllSketch::from_bytes(&converted.to_bytes()).unwrap();
            assert_that!(back.hll_type(), eq(to));
            assert_that!(back.estimate(), eq(sketch.estimate()));
        }
    }
}

#[test]
fn test_preamble_summary() {
    let sketch = sketch_with(10, HllType::Hll4, 5000);
    let summary = preamble_summary(&sketch.to_bytes()).unwrap();
    assert_that!(summary, contains_substring("Family                : HLL"));
    assert_that!(summary, contains_substring("lg_config_k           : 10"));
    assert_that!(summary, contains_substring("COMPACT                      : true"));
    assert_that!(summary, contains_substring("Some(Hll), Some(Hll4)"));

    let err = preamble_summary(&[1, 2, 3]).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::MalformedDeserializeData));
}

#[test]
fn test_counters_disagreeing_with_registers() {
    let sketch = sketch_with(10, HllType::Hll8, 5000);
    let mut bytes = sketch.to_updatable_bytes().unwrap();
    // every register empty, yet no register counted at the minimum
    bytes[40..].fill(0);
    bytes[32..36].copy_from_slice(&0u32.to_ne_bytes());

    let mut restored = HllSketch::from_bytes(&bytes).unwrap();
    let err = restored.update(12345).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvariantViolation));

    let mut region = bytes.clone();
    let mut wrapped = HllSketch::writable_wrap(&mut region).unwrap();
    let err = wrapped.update(12345).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvariantViolation));
    drop(wrapped);
    assert_that!(region, eq(&bytes));
}

#[test]
fn test_rejects_oversized_sparse_arrays() {
    let mut list = sketch_with(12, HllType::Hll8, 3).to_updatable_bytes().unwrap();
    list[4] = 9;
    list.resize(8 + (4 << 9), 0);
    let err = HllSketch::from_bytes(&list).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::MalformedDeserializeData));
    assert_that!(err.message(), contains_substring("invalid lg_arr for List mode"));

    let mut set = sketch_with(12, HllType::Hll8, 100).to_updatable_bytes().unwrap();
    set[4] = 10;
    set.resize(12 + (4 << 10), 0);
    let err = HllSketch::writable_wrap(&mut set).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid lg_arr for Set mode"));
}
