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

mod level;

use std::io::{Read, SeekFrom, Write};

use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
	crypto::{self, KeyPair, PublicKey, Rng, Signature, PUBLIC_KEY_SIZE},
	io::{self, SeekableStream},
	key_id::{KeyIdentifier, KeyTreeOptions},
};
use level::{Level, SignedPrivateKey};

const KEY_IDENTIFIER_SIZE: u64 = 2 * 8;
const OPTIONS_SIZE: u64 = 8 + 2 * KEY_IDENTIFIER_SIZE;
const TREE_HEADER_SIZE: u64 = OPTIONS_SIZE + 2 * KEY_IDENTIFIER_SIZE;
const LAYER_HEADER_SIZE: u64 = PUBLIC_KEY_SIZE as u64 + 2 * 8;

const LAYER_TOP: usize = 0;
const LAYER_LOW: usize = 1;

#[derive(Error, Debug)]
pub enum KeyTreeError {
	/// The identifier failed admission or refers to key material that was
	/// already consumed or wiped. The tree is unchanged.
	#[error("invalid key identifier {0}")]
	InvalidKeyIdentifier(KeyIdentifier),
	/// The backing stream failed. In-memory state may be ahead of disk;
	/// reload the tree from storage before signing again.
	#[error("storage fault: {0}")]
	Storage(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KeyTreeError>;

/// One link of a signature chain: a signing (parent) public key and its
/// signature over the child public key bound to an identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignaturePair {
	pub parent_public_key: PublicKey,
	pub signature: Signature,
}

/// Three-segment signature chain: the root key binds the batch public key,
/// the batch key binds the leaf public key, the leaf key signs the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSignature {
	pub root: SignaturePair,
	pub top: SignaturePair,
	pub bottom: SignaturePair,
}

/// Forward-secure two-level signing key tree over an exclusively owned
/// seekable stream. The top level holds batch keys signed by the root key;
/// the low level holds the current batch's leaf keys and is materialized
/// lazily on the first sign for that batch.
pub struct KeyTree<S: SeekableStream> {
	storage: S,
	options: KeyTreeOptions,
	last_key_identifier: KeyIdentifier,
	last_wipe_key_identifier: KeyIdentifier,
	levels: [Option<Level>; 2],
}

impl<S: SeekableStream> KeyTree<S> {
	fn new(storage: S, options: KeyTreeOptions) -> Self {
		KeyTree {
			storage,
			options,
			last_key_identifier: KeyIdentifier::new(KeyIdentifier::INVALID_ID, 0),
			last_wipe_key_identifier: KeyIdentifier::new(KeyIdentifier::INVALID_ID, 0),
			levels: [None, None],
		}
	}

	/// Initializes the stream with the header and a freshly generated top
	/// level whose batch keys are signed by `key_pair`. The key pair is
	/// consumed; only its public half is retained (as the root public key).
	pub fn create(
		key_pair: KeyPair,
		storage: S,
		options: KeyTreeOptions,
		rng: &mut Rng,
	) -> Result<Self> {
		let mut tree = Self::new(storage, options);
		tree.storage.seek(SeekFrom::Start(0))?;
		write_options(&mut tree.storage, &tree.options)?;
		write_key_identifier(&mut tree.storage, tree.last_key_identifier)?;
		write_key_identifier(&mut tree.storage, tree.last_wipe_key_identifier)?;

		tree.create_level(
			LAYER_TOP,
			key_pair,
			options.start_key_identifier.batch_id,
			options.end_key_identifier.batch_id,
			rng,
		)?;
		tree.storage.flush()?;

		debug!(
			"created key tree: batches [{}, {}], dilution {}",
			options.start_key_identifier.batch_id,
			options.end_key_identifier.batch_id,
			options.dilution
		);
		Ok(tree)
	}

	/// Reloads a tree persisted by [`KeyTree::create`] and the in-place
	/// updates of `sign`/`wipe`.
	pub fn from_stream(mut storage: S) -> Result<Self> {
		storage.seek(SeekFrom::Start(0))?;
		let options = read_options(&mut storage)?;
		let last_key_identifier = read_key_identifier(&mut storage)?;
		let last_wipe_key_identifier = read_key_identifier(&mut storage)?;

		let mut tree = Self::new(storage, options);
		tree.last_key_identifier = last_key_identifier;
		tree.last_wipe_key_identifier = last_wipe_key_identifier;

		tree.levels[LAYER_TOP] = Some(Level::from_stream(&mut tree.storage)?);

		// The low level exists on disk iff some sign() was issued before
		// saving; wiped entries load as zero seeds until trimmed below.
		if KeyIdentifier::INVALID_ID != last_key_identifier.batch_id {
			tree.levels[LAYER_LOW] = Some(Level::from_stream(&mut tree.storage)?);
		}

		// Re-apply the recorded wipe boundary to memory. The disk regions are
		// already zeroed; the trim guarantees zero-seed material cannot sign.
		if KeyIdentifier::INVALID_ID != last_wipe_key_identifier.batch_id {
			if let Some(top) = tree.levels[LAYER_TOP].as_mut() {
				top.wipe(last_wipe_key_identifier.batch_id);
			}
			if last_wipe_key_identifier.batch_id == last_key_identifier.batch_id &&
				KeyIdentifier::INVALID_ID != last_wipe_key_identifier.key_id
			{
				if let Some(low) = tree.levels[LAYER_LOW].as_mut() {
					low.wipe(last_wipe_key_identifier.key_id);
				}
			}
		}

		// The recorded identifier has already signed once. After a restart the
		// produced signature may be public, so its leaf key must not be reused
		// for different data.
		if KeyIdentifier::INVALID_ID != last_key_identifier.batch_id {
			if let Some(low) = tree.levels[LAYER_LOW].as_mut() {
				low.wipe(last_key_identifier.key_id);
			}
		}

		debug!("loaded key tree at {last_key_identifier}");
		Ok(tree)
	}

	fn top_level(&self) -> &Level {
		self.levels[LAYER_TOP].as_ref().expect("top level exists for the tree's lifetime")
	}

	pub fn root_public_key(&self) -> &PublicKey {
		self.top_level().public_key()
	}

	pub fn options(&self) -> &KeyTreeOptions {
		&self.options
	}

	pub fn last_key_identifier(&self) -> KeyIdentifier {
		self.last_key_identifier
	}

	pub fn last_wipe_key_identifier(&self) -> KeyIdentifier {
		self.last_wipe_key_identifier
	}

	pub fn can_sign(&self, key_identifier: KeyIdentifier) -> bool {
		self.check(key_identifier, self.last_key_identifier)
	}

	fn check(&self, key_identifier: KeyIdentifier, reference_key_identifier: KeyIdentifier) -> bool {
		if key_identifier < reference_key_identifier {
			return false;
		}

		if key_identifier < self.options.start_key_identifier ||
			key_identifier > self.options.end_key_identifier
		{
			return false;
		}

		if key_identifier.key_id >= self.options.dilution {
			return false;
		}

		true
	}

	/// Signs `data` with the leaf key at `key_identifier` and returns the
	/// provenance chain. Entering a new batch consumes that batch's top-level
	/// key to materialize a fresh low level, replacing the previous one both
	/// in memory and on disk.
	pub fn sign(&mut self, key_identifier: KeyIdentifier, data: &[u8]) -> Result<TreeSignature> {
		if !self.can_sign(key_identifier) {
			warn!("rejected sign request for {key_identifier}");
			return Err(KeyTreeError::InvalidKeyIdentifier(key_identifier));
		}

		let entering_batch = self.last_key_identifier.batch_id != key_identifier.batch_id;

		// Every failure must precede the storage mutations below. The dead-slot
		// cases are reachable only after wipes or a reload.
		let root = self
			.top_level()
			.public_key_signature(key_identifier.batch_id)
			.ok_or(KeyTreeError::InvalidKeyIdentifier(key_identifier))?;
		let usable = if entering_batch {
			self.top_level().key_pair_at(key_identifier.batch_id).is_some()
		} else {
			self.levels[LAYER_LOW]
				.as_ref()
				.and_then(|low| low.key_pair_at(key_identifier.key_id))
				.is_some()
		};
		if !usable {
			warn!("rejected sign request for consumed key {key_identifier}");
			return Err(KeyTreeError::InvalidKeyIdentifier(key_identifier));
		}

		if entering_batch {
			let batch_key_pair = self.levels[LAYER_TOP]
				.as_mut()
				.expect("top level exists for the tree's lifetime")
				.detach_key_pair_at(key_identifier.batch_id)
				.expect("batch key presence checked above");

			let mut rng = Rng::from_entropy();
			debug!("creating low level for batch {}", key_identifier.batch_id);
			self.create_level(LAYER_LOW, batch_key_pair, 0, self.options.dilution - 1, &mut rng)?;

			// The batch key is consumed; its top-layer slot holds no secret
			// from this point on, in memory or on disk.
			let top_slot_offset = self.level_offset(LAYER_TOP) +
				index_to_offset(self.top_level().end_identifier() - key_identifier.batch_id);
			self.storage.seek(SeekFrom::Start(top_slot_offset))?;
			io::wipe_private_key(&mut self.storage)?;
		}

		let (top, bottom) = {
			let low = self.levels[LAYER_LOW].as_ref().expect("low level materialized above");
			let sub_key_pair = low
				.key_pair_at(key_identifier.key_id)
				.expect("leaf key presence checked above");
			(
				low.public_key_signature(key_identifier.key_id)
					.expect("leaf entry present alongside its key pair"),
				SignaturePair {
					parent_public_key: *sub_key_pair.public_key(),
					signature: crypto::sign(sub_key_pair, &[data]),
				},
			)
		};

		self.last_key_identifier = key_identifier;
		self.storage.seek(SeekFrom::Start(OPTIONS_SIZE))?;
		write_key_identifier(&mut self.storage, self.last_key_identifier)?;
		self.storage.flush()?;

		Ok(TreeSignature { root, top, bottom })
	}

	/// Destroys the private material of every identifier at or below
	/// `key_identifier`, on disk and in memory. A `key_id` of
	/// [`KeyIdentifier::INVALID_ID`] wipes batch keys only, without touching
	/// the low layer.
	pub fn wipe(&mut self, key_identifier: KeyIdentifier) -> Result<()> {
		let normalized_key_id = if KeyIdentifier::INVALID_ID == key_identifier.key_id {
			0
		} else {
			key_identifier.key_id
		};
		if !self.check(
			KeyIdentifier::new(key_identifier.batch_id, normalized_key_id),
			self.last_wipe_key_identifier,
		) {
			warn!("rejected wipe request for {key_identifier}");
			return Err(KeyTreeError::InvalidKeyIdentifier(key_identifier));
		}

		if self.last_wipe_key_identifier.batch_id != key_identifier.batch_id {
			self.wipe_level(LAYER_TOP, key_identifier.batch_id)?;
		}

		if KeyIdentifier::INVALID_ID != key_identifier.key_id {
			self.wipe_level(LAYER_LOW, key_identifier.key_id)?;
		}

		self.last_wipe_key_identifier = key_identifier;
		self.storage.seek(SeekFrom::Start(OPTIONS_SIZE + KEY_IDENTIFIER_SIZE))?;
		write_key_identifier(&mut self.storage, self.last_wipe_key_identifier)?;
		self.storage.flush()?;

		debug!("wiped keys at or below {key_identifier}");
		Ok(())
	}

	fn level_offset(&self, depth: usize) -> u64 {
		let mut offset = TREE_HEADER_SIZE;
		for level in self.levels[..depth].iter().flatten() {
			offset += index_to_offset(level.end_identifier() - level.start_identifier() + 1);
		}
		offset
	}

	fn create_level(
		&mut self,
		depth: usize,
		key_pair: KeyPair,
		start_identifier: u64,
		end_identifier: u64,
		rng: &mut Rng,
	) -> Result<()> {
		let offset = self.level_offset(depth);
		let level = Level::create(key_pair, start_identifier, end_identifier, rng);

		self.storage.seek(SeekFrom::Start(offset))?;
		level.write(&mut self.storage)?;
		self.levels[depth] = Some(level);
		Ok(())
	}

	fn wipe_level(&mut self, depth: usize, identifier: u64) -> Result<()> {
		let (level_start_offset, index, size) = match &self.levels[depth] {
			Some(level) => (
				self.level_offset(depth),
				level.end_identifier() - identifier,
				level.len() as u64,
			),
			None => return Ok(()),
		};

		// Entries above `index` hold identifiers that were already consumed.
		for i in index + 1..size {
			self.storage.seek(SeekFrom::Start(level_start_offset + index_to_offset(i)))?;
			io::wipe_private_key(&mut self.storage)?;
		}

		self.levels[depth]
			.as_mut()
			.expect("level presence checked above")
			.wipe(identifier);

		// The entry at `index` itself is retired by this wipe.
		self.storage.seek(SeekFrom::Start(level_start_offset + index_to_offset(index)))?;
		io::wipe_private_key(&mut self.storage)?;
		Ok(())
	}

	#[cfg(test)]
	pub fn storage(&self) -> &S {
		&self.storage
	}

	#[cfg(test)]
	pub fn into_storage(self) -> S {
		self.storage
	}
}

const fn index_to_offset(index: u64) -> u64 {
	LAYER_HEADER_SIZE + index * SignedPrivateKey::ENTRY_SIZE
}

fn read_key_identifier(input: &mut impl Read) -> std::io::Result<KeyIdentifier> {
	Ok(KeyIdentifier::new(io::read_u64(input)?, io::read_u64(input)?))
}

fn write_key_identifier(
	output: &mut impl Write,
	key_identifier: KeyIdentifier,
) -> std::io::Result<()> {
	io::write_u64(output, key_identifier.batch_id)?;
	io::write_u64(output, key_identifier.key_id)
}

fn read_options(input: &mut impl Read) -> std::io::Result<KeyTreeOptions> {
	Ok(KeyTreeOptions {
		dilution: io::read_u64(input)?,
		start_key_identifier: read_key_identifier(input)?,
		end_key_identifier: read_key_identifier(input)?,
	})
}

fn write_options(output: &mut impl Write, options: &KeyTreeOptions) -> std::io::Result<()> {
	io::write_u64(output, options.dilution)?;
	write_key_identifier(output, options.start_key_identifier)?;
	write_key_identifier(output, options.end_key_identifier)
}

fn verify_bound_signature(pair: &SignaturePair, signed_public_key: &PublicKey, boundary: u64) -> bool {
	crypto::verify(
		&pair.parent_public_key,
		&[signed_public_key.as_bytes(), &boundary.to_le_bytes()],
		&pair.signature,
	)
}

/// Stateless verification of a signature chain: the root key must bind the
/// batch key to its batch, the batch key must bind the leaf key to its key
/// id, and the leaf key must have signed `data`.
pub fn verify(signature: &TreeSignature, key_identifier: KeyIdentifier, data: &[u8]) -> bool {
	if !verify_bound_signature(
		&signature.root,
		&signature.top.parent_public_key,
		key_identifier.batch_id,
	) {
		return false;
	}

	if !verify_bound_signature(
		&signature.top,
		&signature.bottom.parent_public_key,
		key_identifier.key_id,
	) {
		return false;
	}

	crypto::verify(&signature.bottom.parent_public_key, &[data], &signature.bottom.signature)
}
