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

use crate::error::Error;

/// Defines the families of sketches that share the common preamble convention.
///
/// Every family agrees on the first three bytes of an image (preamble size,
/// serialization version, family id) and diverges afterward, so the family id is the
/// first thing a reader checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
    /// The minimum preamble size for this family, in the family's preamble units.
    pub min_pre_size: u8,
    /// The maximum preamble size for this family, in the family's preamble units.
    pub max_pre_size: u8,
}

impl Family {
    /// The Theta family of sketches. Preamble size is counted in 8-byte longs.
    pub const THETA: Family = Family {
        id: 3,
        name: "THETA",
        min_pre_size: 1,
        max_pre_size: 3,
    };

    /// The HLL family of sketches. Preamble size is counted in 4-byte ints.
    pub const HLL: Family = Family {
        id: 7,
        name: "HLL",
        min_pre_size: 2,
        max_pre_size: 10,
    };

    /// Look up a family by its byte ID.
    pub fn from_id(id: u8) -> Option<Family> {
        [Family::THETA, Family::HLL]
            .into_iter()
            .find(|family| family.id == id)
    }
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(Family::HLL.validate_id(7).is_ok());
        let err = Family::HLL.validate_id(Family::THETA.id).unwrap_err();
        assert_eq!(err.message(), "invalid family: expected 7 (HLL), got 3");
    }

    #[test]
    fn test_from_id() {
        assert_eq!(Family::from_id(7), Some(Family::HLL));
        assert_eq!(Family::from_id(3), Some(Family::THETA));
        assert_eq!(Family::from_id(42), None);
    }
}
