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

use std::io::{Read, Write};

use zeroize::Zeroizing;

use crate::{
	crypto::{self, KeyPair, PrivateKey, PublicKey, Rng, Signature, PRIVATE_KEY_SIZE, SIGNATURE_SIZE},
	io,
	tree::SignaturePair,
};

/// A leaf private key plus the parent-issued signature binding the leaf's
/// public key to its identifier. The key pair slot becomes `None` once the
/// key is detached; a dead slot keeps only the (non-secret) signature.
pub(crate) struct SignedPrivateKey {
	key_pair: Option<KeyPair>,
	signature: Signature,
}

impl SignedPrivateKey {
	pub const ENTRY_SIZE: u64 = (PRIVATE_KEY_SIZE + SIGNATURE_SIZE) as u64;

	pub fn create_random(parent_key_pair: &KeyPair, identifier: u64, rng: &mut Rng) -> Self {
		let key_pair = KeyPair::generate(rng);
		let signature = crypto::sign(
			parent_key_pair,
			&[key_pair.public_key().as_bytes(), &identifier.to_le_bytes()],
		);
		SignedPrivateKey { key_pair: Some(key_pair), signature }
	}

	pub fn from_stream(input: &mut impl Read) -> std::io::Result<Self> {
		let seed: Zeroizing<[u8; PRIVATE_KEY_SIZE]> = Zeroizing::new(io::read_array(input)?);
		let signature = Signature::from_bytes(io::read_array(input)?);

		Ok(SignedPrivateKey {
			key_pair: Some(KeyPair::from_private(PrivateKey::from_bytes(*seed))),
			signature,
		})
	}

	pub fn write(&self, output: &mut impl Write) -> std::io::Result<()> {
		match &self.key_pair {
			Some(key_pair) => output.write_all(key_pair.private_key().as_bytes())?,
			// A dead slot's on-disk image is the zero pattern.
			None => io::wipe_private_key(output)?,
		}
		output.write_all(self.signature.as_bytes())
	}

	pub fn key_pair(&self) -> Option<&KeyPair> {
		self.key_pair.as_ref()
	}

	pub fn detach_key_pair(&mut self) -> Option<KeyPair> {
		self.key_pair.take()
	}

	pub fn signature(&self) -> &Signature {
		&self.signature
	}
}

/// One layer of the tree: a bounded batch of signed private keys sharing a
/// parent public key and covering the identifier range `[start, end]`.
/// Entry `i` holds identifier `end - i`, so trimming the vector's tail
/// drops the lowest identifiers.
pub(crate) struct Level {
	parent_public_key: PublicKey,
	start_identifier: u64,
	end_identifier: u64,
	entries: Vec<SignedPrivateKey>,
}

impl Level {
	/// Builds fresh random keys for the whole range, each signed by
	/// `key_pair`, which is consumed (and its private half zeroed on drop).
	pub fn create(key_pair: KeyPair, start_identifier: u64, end_identifier: u64, rng: &mut Rng) -> Self {
		let entries = (0..=end_identifier - start_identifier)
			.map(|i| SignedPrivateKey::create_random(&key_pair, end_identifier - i, rng))
			.collect();

		Level {
			parent_public_key: *key_pair.public_key(),
			start_identifier,
			end_identifier,
			entries,
		}
	}

	pub fn from_stream(input: &mut impl Read) -> std::io::Result<Self> {
		let parent_public_key = PublicKey::from_bytes(io::read_array(input)?);
		let start_identifier = io::read_u64(input)?;
		let end_identifier = io::read_u64(input)?;

		let entries = (0..=end_identifier - start_identifier)
			.map(|_| SignedPrivateKey::from_stream(input))
			.collect::<std::io::Result<_>>()?;

		Ok(Level { parent_public_key, start_identifier, end_identifier, entries })
	}

	pub fn write(&self, output: &mut impl Write) -> std::io::Result<()> {
		output.write_all(self.parent_public_key.as_bytes())?;
		io::write_u64(output, self.start_identifier)?;
		io::write_u64(output, self.end_identifier)?;

		for entry in &self.entries {
			entry.write(output)?;
		}
		Ok(())
	}

	pub fn public_key(&self) -> &PublicKey {
		&self.parent_public_key
	}

	pub fn start_identifier(&self) -> u64 {
		self.start_identifier
	}

	pub fn end_identifier(&self) -> u64 {
		self.end_identifier
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// `None` when the identifier is out of range or its entry was trimmed.
	fn index_of(&self, identifier: u64) -> Option<usize> {
		if identifier < self.start_identifier || identifier > self.end_identifier {
			return None;
		}

		let index = (self.end_identifier - identifier) as usize;
		(index < self.entries.len()).then_some(index)
	}

	/// The parent public key and the parent's signature binding `identifier`.
	/// Reads no private material.
	pub fn public_key_signature(&self, identifier: u64) -> Option<SignaturePair> {
		self.index_of(identifier).map(|index| SignaturePair {
			parent_public_key: self.parent_public_key,
			signature: self.entries[index].signature().clone(),
		})
	}

	/// Drops every entry with an identifier at or below `identifier`; the
	/// truncation zeroes the dropped private keys as they drop.
	pub fn wipe(&mut self, identifier: u64) {
		let new_size =
			std::cmp::min(self.entries.len() as u64, self.end_identifier - identifier) as usize;
		self.entries.truncate(new_size);
	}

	pub fn detach_key_pair_at(&mut self, identifier: u64) -> Option<KeyPair> {
		let index = self.index_of(identifier)?;
		self.entries[index].detach_key_pair()
	}

	pub fn key_pair_at(&self, identifier: u64) -> Option<&KeyPair> {
		self.entries[self.index_of(identifier)?].key_pair()
	}
}
