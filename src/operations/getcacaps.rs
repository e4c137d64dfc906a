// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! GetCACaps operation.

/// Capabilities advertised by GetCACaps, one per line (RFC 8894 3.5.2).
pub const CAPABILITIES: &[&str] = &[
    "Renewal",
    "SHA-1",
    "SHA-256",
    "AES",
    "DES3",
    "SCEPStandard",
    "POSTPKIOperation",
];

/// The GetCACaps response body.
pub fn capabilities_text() -> String {
    CAPABILITIES.join("\n")
}

/// Returns true if `capability` is advertised. Keywords are case-insensitive.
pub fn supports(capability: &str) -> bool {
    CAPABILITIES
        .iter()
        .any(|cap| cap.eq_ignore_ascii_case(capability))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_text() {
        let text = capabilities_text();
        assert_eq!(
            text,
            "Renewal\nSHA-1\nSHA-256\nAES\nDES3\nSCEPStandard\nPOSTPKIOperation"
        );
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_supports() {
        assert!(supports("postpkioperation"));
        assert!(supports("SHA-256"));
        assert!(!supports("GetNextCACert"));
    }
}
