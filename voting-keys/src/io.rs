// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Seek, Write};

use crate::crypto::PRIVATE_KEY_SIZE;

/// Backing storage for a key tree: a single seekable byte stream, owned
/// exclusively for the tree's lifetime. All records are fixed-size and
/// little-endian, so every field has a deterministic offset.
pub trait SeekableStream: Read + Write + Seek {}

impl<T: Read + Write + Seek> SeekableStream for T {}

pub fn read_u64(input: &mut impl Read) -> std::io::Result<u64> {
	let mut bytes = [0u8; 8];
	input.read_exact(&mut bytes)?;
	Ok(u64::from_le_bytes(bytes))
}

pub fn write_u64(output: &mut impl Write, value: u64) -> std::io::Result<()> {
	output.write_all(&value.to_le_bytes())
}

pub fn read_array<const N: usize>(input: &mut impl Read) -> std::io::Result<[u8; N]> {
	let mut bytes = [0u8; N];
	input.read_exact(&mut bytes)?;
	Ok(bytes)
}

/// Zero-fills a retired private key slot at the current stream position.
/// Signature bytes that follow the slot carry no secret and are left alone.
pub fn wipe_private_key(output: &mut impl Write) -> std::io::Result<()> {
	output.write_all(&[0u8; PRIVATE_KEY_SIZE])
}
