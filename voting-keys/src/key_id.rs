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

use serde::{Deserialize, Serialize};

/// Two-part identifier selecting one leaf signing key: the outer batch and
/// the key within that batch.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct KeyIdentifier {
	pub batch_id: u64,
	pub key_id: u64,
}

impl KeyIdentifier {
	/// Sentinel component meaning "nothing yet". A reference identifier with
	/// an invalid batch admits everything; an invalid `key_id` in a wipe
	/// request wipes batch keys only.
	pub const INVALID_ID: u64 = u64::MAX;

	pub const fn new(batch_id: u64, key_id: u64) -> Self {
		KeyIdentifier { batch_id, key_id }
	}
}

// The sentinel must sort below every valid component, not at its numeric
// position at the top of the range.
fn rank(component: u64) -> u64 {
	if KeyIdentifier::INVALID_ID == component {
		0
	} else {
		component + 1
	}
}

impl Ord for KeyIdentifier {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		(rank(self.batch_id), rank(self.key_id)).cmp(&(rank(other.batch_id), rank(other.key_id)))
	}
}

impl PartialOrd for KeyIdentifier {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Display for KeyIdentifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "({}, {})", self.batch_id, self.key_id)
	}
}

/// Construction-time parameters of a key tree. `dilution` is the inclusive
/// size of the low layer, so the legal key range is `[0, dilution - 1]`;
/// only the batch components of start/end bound the top layer.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct KeyTreeOptions {
	pub dilution: u64,
	pub start_key_identifier: KeyIdentifier,
	pub end_key_identifier: KeyIdentifier,
}
