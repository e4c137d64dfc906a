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

//! ASN.1 codec for SCEP signed-attribute values.
//!
//! SCEP carries three kinds of values in CMS signed attributes:
//!
//! - `PrintableString` for transactionID, messageType, pkiStatus and failInfo
//! - integers, which SCEP encodes as a `PrintableString` holding the decimal
//!   value (RFC 8894 Section 3.2.1.2)
//! - `OCTET STRING` for senderNonce and recipientNonce

use cms::signed_data::SignedAttributes;
use const_oid::ObjectIdentifier;
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Tag, Tagged};
use x509_cert::attr::Attribute;

use crate::error::{Result, ScepError};

/// Encode a string as a DER `PrintableString` attribute value.
///
/// Only ASCII is accepted. The PrintableString character set itself is not
/// enforced: base64url transaction IDs contain `_`.
pub fn encode_printable_string(value: &str) -> Result<Any> {
    if !value.is_ascii() {
        return Err(ScepError::malformed(format!(
            "Not a PrintableString: {:?}",
            value
        )));
    }
    Ok(Any::new(Tag::PrintableString, value.as_bytes().to_vec())?)
}

/// Decode a string attribute value.
///
/// SCEP mandates `PrintableString`, but some clients send `UTF8String` or
/// `IA5String`; those are accepted as well.
pub fn decode_printable_string(value: &Any) -> Result<String> {
    match value.tag() {
        Tag::PrintableString | Tag::Utf8String | Tag::Ia5String => {
            std::str::from_utf8(value.value())
                .map(str::to_owned)
                .map_err(|e| ScepError::malformed(format!("Invalid string attribute: {}", e)))
        }
        tag => Err(ScepError::malformed(format!(
            "Expected PrintableString, got {}",
            tag
        ))),
    }
}

/// Encode an integer as a SCEP decimal `PrintableString`.
pub fn encode_integer(value: i32) -> Result<Any> {
    encode_printable_string(&value.to_string())
}

/// Decode a SCEP decimal `PrintableString` integer.
pub fn decode_integer(value: &Any) -> Result<i32> {
    let text = decode_printable_string(value)?;
    text.trim()
        .parse::<i32>()
        .map_err(|_| ScepError::malformed(format!("Invalid integer attribute: {:?}", text)))
}

/// Encode raw bytes as a DER `OCTET STRING` attribute value.
pub fn encode_octet_string(value: &[u8]) -> Result<Any> {
    let octets = OctetString::new(value)?;
    Ok(Any::encode_from(&octets)?)
}

/// Decode an `OCTET STRING` attribute value.
pub fn decode_octet_string(value: &Any) -> Result<Vec<u8>> {
    if value.tag() != Tag::OctetString {
        return Err(ScepError::malformed(format!(
            "Expected OCTET STRING, got {}",
            value.tag()
        )));
    }
    Ok(value.value().to_vec())
}

/// Build a single-valued attribute.
pub fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// Find the first value of an attribute within a signed attribute set.
pub(crate) fn find_attribute(attrs: &SignedAttributes, oid: ObjectIdentifier) -> Option<&Any> {
    attrs
        .iter()
        .find(|attr| attr.oid == oid)
        .and_then(|attr| attr.values.iter().next())
}
