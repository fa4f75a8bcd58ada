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

//! Byte regions that hold a sketch image.
//!
//! A sketch never keeps typed views into its image. Every field is read and written
//! at a byte offset through [`Memory`], which is either a heap buffer owned by the
//! sketch or a region borrowed from the caller. Promotion code is written once
//! against this interface; only [`Memory::ensure_capacity`] behaves differently per
//! backing.
//!
//! Multi-byte header fields use the platform's native byte order. Packed register
//! windows are always little-endian so that the register layout does not depend on
//! the host.

use std::ops::Range;

use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::NativeEndian;

use crate::error::Error;

/// A contiguous byte region holding one sketch image.
#[derive(Debug)]
pub(crate) enum Memory<'a> {
    /// Owned by the sketch, resized on demand.
    Heap(Vec<u8>),
    /// Borrowed from the caller for reads and writes, fixed size.
    Writable(&'a mut [u8]),
    /// Borrowed from the caller for reads only.
    ReadOnly(&'a [u8]),
}

impl Memory<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Memory::Heap(bytes) => bytes.as_slice(),
            Memory::Writable(bytes) => &bytes[..],
            Memory::ReadOnly(bytes) => &bytes[..],
        }
    }

    fn as_mut_slice(&mut self) -> Result<&mut [u8], Error> {
        match self {
            Memory::Heap(bytes) => Ok(bytes.as_mut_slice()),
            Memory::Writable(bytes) => Ok(&mut bytes[..]),
            Memory::ReadOnly(_) => Err(Error::no_write_access()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Memory::ReadOnly(_))
    }

    /// Whether the region is owned by the caller rather than the sketch.
    pub fn is_direct(&self) -> bool {
        !matches!(self, Memory::Heap(_))
    }

    pub fn check_writable(&self) -> Result<(), Error> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(Error::no_write_access())
        }
    }

    /// Make sure at least `len` bytes are addressable.
    ///
    /// Heap buffers grow with zeroed bytes; borrowed regions fail instead of growing.
    pub fn ensure_capacity(&mut self, len: usize) -> Result<(), Error> {
        match self {
            Memory::Heap(bytes) => {
                if bytes.len() < len {
                    bytes.resize(len, 0);
                }
                Ok(())
            }
            Memory::Writable(bytes) => {
                if bytes.len() < len {
                    Err(Error::insufficient_capacity(len, bytes.len()))
                } else {
                    Ok(())
                }
            }
            Memory::ReadOnly(_) => Err(Error::no_write_access()),
        }
    }

    /// Release heap bytes beyond `len`. Borrowed regions keep their size.
    pub fn shrink_to(&mut self, len: usize) {
        if let Memory::Heap(bytes) = self {
            bytes.truncate(len);
            bytes.shrink_to_fit();
        }
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn get_u16_le(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.as_slice()[offset..offset + 2])
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        NativeEndian::read_u32(&self.as_slice()[offset..offset + 4])
    }

    pub fn get_f64(&self, offset: usize) -> f64 {
        NativeEndian::read_f64(&self.as_slice()[offset..offset + 8])
    }

    pub fn get_u32_array(&self, offset: usize, len: usize) -> Vec<u32> {
        let mut values = vec![0u32; len];
        NativeEndian::read_u32_into(&self.as_slice()[offset..offset + 4 * len], &mut values);
        values
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        self.as_mut_slice()?[offset] = value;
        Ok(())
    }

    pub fn put_u16_le(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        LittleEndian::write_u16(&mut self.as_mut_slice()?[offset..offset + 2], value);
        Ok(())
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        NativeEndian::write_u32(&mut self.as_mut_slice()?[offset..offset + 4], value);
        Ok(())
    }

    pub fn put_f64(&mut self, offset: usize, value: f64) -> Result<(), Error> {
        NativeEndian::write_f64(&mut self.as_mut_slice()?[offset..offset + 8], value);
        Ok(())
    }

    /// Zero `len` bytes starting at `offset`.
    pub fn clear(&mut self, offset: usize, len: usize) -> Result<(), Error> {
        self.as_mut_slice()?[offset..offset + len].fill(0);
        Ok(())
    }

    pub fn copy_within(&mut self, src: Range<usize>, dst: usize) -> Result<(), Error> {
        self.as_mut_slice()?.copy_within(src, dst);
        Ok(())
    }

    /// Copy the first `len` bytes into a fresh heap region.
    pub fn to_heap(&self, len: usize) -> Memory<'static> {
        Memory::Heap(self.as_slice()[..len].to_vec())
    }
}
