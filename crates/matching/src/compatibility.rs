// Copyright 2025 itscheems
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

//! Donor/recipient blood-group compatibility
//!
//! Rules, first match wins:
//! 1. `O-` donors give to everyone
//! 2. `AB+` recipients receive from everyone
//! 3. identical groups are compatible
//! 4. the fixed table in [`compatible_recipients`]
//! 5. everything else is incompatible

use crate::types::BloodGroup;

/// Recipients a donor group may give to, beyond rules 1-3
fn compatible_recipients(donor: BloodGroup) -> &'static [BloodGroup] {
	use BloodGroup::*;
	match donor {
		OPos => &[OPos, APos, BPos, AbPos],
		ANeg => &[ANeg, APos, AbNeg, AbPos],
		APos => &[AbPos],
		BNeg => &[BNeg, BPos, AbNeg, AbPos],
		BPos => &[AbPos],
		ONeg | AbNeg | AbPos => &[],
	}
}

/// Whether an organ from `donor` may be given to `recipient`
pub fn is_compatible(donor: BloodGroup, recipient: BloodGroup) -> bool {
	if donor == BloodGroup::ONeg {
		return true;
	}
	if recipient == BloodGroup::AbPos {
		return true;
	}
	if donor == recipient {
		return true;
	}
	compatible_recipients(donor).contains(&recipient)
}

/// Compatibility over raw wire strings
///
/// Inputs are trimmed and uppercased. An empty or unknown group on either
/// side fails closed.
pub fn is_compatible_str(donor: &str, recipient: &str) -> bool {
	match (donor.parse::<BloodGroup>(), recipient.parse::<BloodGroup>()) {
		(Ok(d), Ok(r)) => is_compatible(d, r),
		_ => false,
	}
}
