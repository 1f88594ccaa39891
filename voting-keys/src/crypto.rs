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

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const PRIVATE_KEY_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

// Ideally, we want to use a concrete implementation (like ChaCha20) instead of StdRng
// to prevent it from potentially changing from under us
pub type Rng = rand::rngs::StdRng;

/// Ed25519 seed bytes. Deliberately not `Clone`: every private key is owned
/// by exactly one slot and is zeroed when that slot drops it.
pub struct PrivateKey([u8; PRIVATE_KEY_SIZE]);

impl PrivateKey {
	pub fn generate(rng: &mut Rng) -> Self {
		use rand::RngCore;

		let mut bytes = [0u8; PRIVATE_KEY_SIZE];
		rng.fill_bytes(&mut bytes);
		PrivateKey(bytes)
	}

	pub fn from_bytes(bytes: [u8; PRIVATE_KEY_SIZE]) -> Self {
		PrivateKey(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
		&self.0
	}
}

impl Zeroize for PrivateKey {
	fn zeroize(&mut self) {
		self.0.zeroize();
	}
}

impl Drop for PrivateKey {
	fn drop(&mut self) {
		self.zeroize();
	}
}

impl ZeroizeOnDrop for PrivateKey {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
	pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
		PublicKey(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
		&self.0
	}
}

impl std::fmt::Display for PublicKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
	pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
		Signature(bytes)
	}

	pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
		self.0
	}

	pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
		&self.0
	}
}

impl std::fmt::Display for Signature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

/// A private key together with its derived public key.
pub struct KeyPair {
	private_key: PrivateKey,
	public_key: PublicKey,
}

impl KeyPair {
	pub fn from_private(private_key: PrivateKey) -> Self {
		let public_key =
			PublicKey(SigningKey::from_bytes(private_key.as_bytes()).verifying_key().to_bytes());
		KeyPair { private_key, public_key }
	}

	pub fn generate(rng: &mut Rng) -> Self {
		Self::from_private(PrivateKey::generate(rng))
	}

	pub fn private_key(&self) -> &PrivateKey {
		&self.private_key
	}

	pub fn public_key(&self) -> &PublicKey {
		&self.public_key
	}
}

/// Signs the concatenation of `parts` with deterministic Ed25519.
pub fn sign(key_pair: &KeyPair, parts: &[&[u8]]) -> Signature {
	let signing_key = SigningKey::from_bytes(key_pair.private_key.as_bytes());
	Signature(signing_key.sign(&parts.concat()).to_bytes())
}

/// Returns false on any failure, including an invalid public key encoding.
pub fn verify(public_key: &PublicKey, parts: &[&[u8]], signature: &Signature) -> bool {
	let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
		return false;
	};

	verifying_key
		.verify(&parts.concat(), &ed25519_dalek::Signature::from_bytes(&signature.0))
		.is_ok()
}

#[test]
fn test_sign_and_verify_parts() {
	use rand::SeedableRng;

	let mut rng = Rng::from_seed([0; 32]);
	let key_pair = KeyPair::generate(&mut rng);

	let signature = sign(&key_pair, &[b"voting", b"key"]);

	// Parts are concatenated in order, so any equivalent split verifies.
	assert!(verify(key_pair.public_key(), &[b"voting", b"key"], &signature));
	assert!(verify(key_pair.public_key(), &[b"votingkey"], &signature));

	assert!(!verify(key_pair.public_key(), &[b"voting"], &signature));
	assert!(!verify(key_pair.public_key(), &[b"key", b"voting"], &signature));

	let mut tampered = signature.to_bytes();
	tampered[0] ^= 1;
	assert!(!verify(key_pair.public_key(), &[b"voting", b"key"], &Signature::from_bytes(tampered)));
}

#[test]
fn test_public_key_derivation_is_deterministic() {
	let private_key_bytes = [7u8; PRIVATE_KEY_SIZE];

	let key_pair = KeyPair::from_private(PrivateKey::from_bytes(private_key_bytes));
	let key_pair_again = KeyPair::from_private(PrivateKey::from_bytes(private_key_bytes));

	assert_eq!(key_pair.public_key(), key_pair_again.public_key());
	assert_ne!(key_pair.public_key().as_bytes(), &private_key_bytes);
}

#[test]
fn test_u64_message_parts_are_little_endian() {
	use rand::SeedableRng;

	let mut rng = Rng::from_seed([1; 32]);
	let key_pair = KeyPair::generate(&mut rng);

	let signature = sign(&key_pair, &[b"id", &42u64.to_le_bytes()]);
	assert!(verify(
		key_pair.public_key(),
		&[b"id", &[42, 0, 0, 0, 0, 0, 0, 0]],
		&signature
	));
}
