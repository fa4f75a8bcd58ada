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

use datasketches_hll::common::NumStdDev;
use datasketches_hll::error::ErrorKind;
use datasketches_hll::hll::CurMode;
use datasketches_hll::hll::HllSketch;
use datasketches_hll::hll::HllType;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

#[test]
fn test_empty_sketch() {
    for hll_type in ALL_TYPES {
        let sketch = HllSketch::new(12, hll_type);
        assert!(sketch.is_empty());
        assert_that!(sketch.current_mode(), eq(CurMode::List));
        assert_that!(sketch.estimate(), eq(0.0));
        assert_that!(sketch.lower_bound(NumStdDev::One), eq(0.0));
        assert_that!(sketch.upper_bound(NumStdDev::One), eq(0.0));
    }
}

#[test]
fn test_basic_update() {
    let mut sketch = HllSketch::new(12, HllType::Hll8);

    for i in 0..100 {
        sketch.update(i).unwrap();
    }

    assert!(!sketch.is_empty());
    let estimate = sketch.estimate();
    assert!(
        (estimate - 100.0).abs() < 20.0,
        "Estimate should be reasonably close to 100, got {}",
        estimate
    );
}

#[test]
fn test_list_stays_exact() {
    let mut sketch = HllSketch::new(12, HllType::Hll4);
    for i in 0..7 {
        sketch.update(i).unwrap();
    }
    assert_that!(sketch.current_mode(), eq(CurMode::List));
    assert_that!(sketch.estimate(), near(7.0, 1e-3));
}

#[test]
fn test_list_to_set_promotion() {
    let mut sketch = HllSketch::new(12, HllType::Hll8);

    for i in 0..8 {
        sketch.update(i).unwrap();
    }
    assert_that!(sketch.current_mode(), eq(CurMode::Set));

    for i in 8..300 {
        sketch.update(i).unwrap();
    }
    assert_that!(sketch.current_mode(), eq(CurMode::Set));
    assert_that!(sketch.estimate(), near(300.0, 1.0));
}

#[test]
fn test_set_to_hll_promotion() {
    // the set promotes once it would grow past 2^(lg_k - 3) slots
    let mut sketch = HllSketch::new(10, HllType::Hll8);

    for i in 0..1000 {
        sketch.update(i).unwrap();
    }

    assert_that!(sketch.current_mode(), eq(CurMode::Hll));
    let estimate = sketch.estimate();
    assert!(
        (estimate - 1000.0).abs() < 150.0,
        "Estimate should be close to 1000 after full promotion, got {}",
        estimate
    );
}

#[test]
fn test_small_k_skips_set() {
    let mut sketch = HllSketch::new(6, HllType::Hll6);
    for i in 0..8 {
        sketch.update(i).unwrap();
    }
    assert_that!(sketch.current_mode(), eq(CurMode::Hll));
    assert_that!(sketch.estimate(), near(8.0, 1.0));
}

#[test]
fn test_duplicate_handling() {
    let mut sketch = HllSketch::new(12, HllType::Hll8);

    for _ in 0..10 {
        for i in 0..100 {
            sketch.update(i).unwrap();
        }
    }

    let estimate = sketch.estimate();
    assert!(
        (estimate - 100.0).abs() < 20.0,
        "Duplicates should not inflate estimate, got {}",
        estimate
    );
}

#[test]
fn test_different_types() {
    let mut sketch = HllSketch::new(10, HllType::Hll8);

    sketch.update(42i32).unwrap();
    sketch.update("hello").unwrap();
    sketch.update(100u64).unwrap();
    sketch.update(true).unwrap();
    sketch.update(vec![1, 2, 3]).unwrap();
    sketch.update_bytes(b"raw bytes").unwrap();

    assert!(sketch.estimate() >= 6.0, "Should have at least 6 distinct values");
}

#[test]
fn test_update_bytes_matches_itself() {
    let mut sketch = HllSketch::new(10, HllType::Hll4);
    sketch.update_bytes(b"abc").unwrap();
    sketch.update_bytes(b"abc").unwrap();
    assert_that!(sketch.estimate(), near(1.0, 1e-3));
}

#[test]
fn test_all_types_estimate() {
    for hll_type in ALL_TYPES {
        let mut sketch = HllSketch::new(12, hll_type);
        for i in 0..1000 {
            sketch.update(i).unwrap();
        }

        let estimate = sketch.estimate();
        assert!(
            (estimate - 1000.0).abs() < 200.0,
            "{hll_type:?} estimate should be reasonable, got {estimate}"
        );
    }
}

#[test]
fn test_types_agree_on_registers() {
    // the same stream yields identical logical registers in every width
    let mut sketches: Vec<_> = ALL_TYPES
        .iter()
        .map(|&hll_type| HllSketch::new(11, hll_type))
        .collect();
    for i in 0..50_000u64 {
        for sketch in sketches.iter_mut() {
            sketch.update(i).unwrap();
        }
    }

    let composite = sketches[2].composite_estimate();
    for sketch in &sketches {
        assert_that!(sketch.composite_estimate(), near(composite, composite * 1e-9));
    }
}

#[test]
fn test_bounds_bracket_estimate() {
    for hll_type in ALL_TYPES {
        let mut sketch = HllSketch::new(12, hll_type);
        for n in [0u64, 5, 100, 2000, 40_000] {
            for i in 0..n {
                sketch.update(i).unwrap();
            }
            let estimate = sketch.estimate();
            for num_std_dev in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
                assert_that!(sketch.lower_bound(num_std_dev), le(estimate));
                assert_that!(sketch.upper_bound(num_std_dev), ge(estimate));
            }
        }
    }
}

#[test]
fn test_large_cardinality() {
    let mut sketch = HllSketch::new(14, HllType::Hll8);

    for i in 0..100_000 {
        sketch.update(i).unwrap();
    }

    let estimate = sketch.estimate();
    let relative_error = (estimate - 100_000.0).abs() / 100_000.0;

    // For lg_k=14, relative error should be ~0.65% with HIP
    assert!(
        relative_error < 0.05,
        "Relative error should be < 5% for large cardinality, got {:.2}%",
        relative_error * 100.0
    );
    assert!(!sketch.is_out_of_order());
}

#[test]
fn test_hll4_high_cardinality() {
    // drives cur_min upward and exercises the exception table
    let mut sketch = HllSketch::new(8, HllType::Hll4);
    for i in 0..1_000_000u64 {
        sketch.update(i).unwrap();
    }
    let relative_error = (sketch.estimate() - 1_000_000.0).abs() / 1_000_000.0;
    assert!(relative_error < 0.2, "got {}", sketch.estimate());

    let hll8 = sketch.copy_as(HllType::Hll8).unwrap();
    assert_that!(
        hll8.composite_estimate(),
        near(sketch.composite_estimate(), sketch.composite_estimate() * 1e-9)
    );
}

#[test]
fn test_equals_method() {
    let mut sketch1 = HllSketch::new(10, HllType::Hll8);
    let mut sketch2 = HllSketch::new(10, HllType::Hll8);

    assert!(sketch1.eq(&sketch2));

    for i in 0..100 {
        sketch1.update(i).unwrap();
        sketch2.update(i).unwrap();
    }

    assert!(sketch1.eq(&sketch2));

    sketch2.update(999).unwrap();

    assert!(!sketch1.eq(&sketch2));
}

#[test]
fn test_reset() {
    let mut sketch = HllSketch::new(10, HllType::Hll4);
    for i in 0..5000 {
        sketch.update(i).unwrap();
    }
    sketch.reset().unwrap();
    assert!(sketch.is_empty());
    assert_that!(sketch.current_mode(), eq(CurMode::List));
    assert_that!(sketch.estimate(), eq(0.0));
    assert_that!(sketch.lg_config_k(), eq(10));
    assert_that!(sketch.hll_type(), eq(HllType::Hll4));
}

#[test]
fn test_builder_rejects_bad_lg_k() {
    for lg_k in [0u8, 3, 22, 30] {
        let err = HllSketch::builder().lg_config_k(lg_k).build().unwrap_err();
        assert_that!(err.kind(), eq(ErrorKind::ConfigInvalid));
        let err = HllSketch::max_updatable_serialization_bytes(lg_k, HllType::Hll8).unwrap_err();
        assert_that!(err.kind(), eq(ErrorKind::ConfigInvalid));
    }
}

#[test]
fn test_builder_defaults() {
    let sketch = HllSketch::builder().build().unwrap();
    assert_that!(sketch.lg_config_k(), eq(12));
    assert_that!(sketch.hll_type(), eq(HllType::Hll4));
}

#[test]
#[should_panic(expected = "lg_config_k must be in [4, 21]")]
fn test_invalid_lg_k_low() {
    HllSketch::new(3, HllType::Hll8);
}

#[test]
#[should_panic(expected = "lg_config_k must be in [4, 21]")]
fn test_invalid_lg_k_high() {
    HllSketch::new(22, HllType::Hll8);
}
