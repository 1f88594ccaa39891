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

//! Forward-secure hierarchical voting key tree.
//!
//! A two-level hierarchy of short-lived Ed25519 signing keys backed by a
//! seekable byte stream. Every signature carries a chain of sub-signatures
//! proving provenance from the long-lived root public key, and consumed
//! private material is destroyed both in memory and on disk, so compromising
//! a node cannot forge signatures for identifiers that were already used up.

pub use crypto::{KeyPair, PrivateKey, PublicKey, Rng, Signature};
pub use io::SeekableStream;
pub use key_id::{KeyIdentifier, KeyTreeOptions};
pub use tree::{verify, KeyTree, KeyTreeError, Result, SignaturePair, TreeSignature};

/// Ed25519 primitives used by the key tree
mod crypto;
mod io;
mod key_id;
/// The key tree controller and its levels
mod tree;
