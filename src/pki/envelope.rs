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

//! The SCEP `pkcsPKIEnvelope`: CMS EnvelopedData with RSA key transport.
//!
//! Sealing uses the `cms` builder. Opening locates the key-transport
//! recipient whose issuer and serial number match the decrypting
//! certificate, unwraps the content-encryption key with the matching RSA
//! private key and decrypts the CBC content.

use cms::builder::{
    ContentEncryptionAlgorithm, EnvelopedDataBuilder, KeyEncryptionInfo,
    KeyTransRecipientInfoBuilder,
};
use cms::cert::IssuerAndSerialNumber;
use cms::content_info::ContentInfo;
use cms::enveloped_data::{EnvelopedData, RecipientIdentifier, RecipientInfo};
use const_oid::db::rfc5911::{ID_AES_128_CBC, ID_AES_192_CBC, ID_AES_256_CBC, ID_ENVELOPED_DATA};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Decode, Encode};
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use x509_cert::Certificate;

use crate::error::{Result, ScepError};

/// des-ede3-cbc (1.2.840.113549.3.7)
const DES_EDE3_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.7");

/// Content encryption algorithms accepted inside an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// AES-128-CBC
    Aes128Cbc,
    /// AES-192-CBC
    Aes192Cbc,
    /// AES-256-CBC
    Aes256Cbc,
    /// Triple DES (3DES) CBC
    TripleDesCbc,
}

impl EncryptionAlgorithm {
    /// Get the block size in bytes for this algorithm.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
            Self::TripleDesCbc => 8,
        }
    }

    /// Get the algorithm name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes128Cbc => "AES-128-CBC",
            Self::Aes192Cbc => "AES-192-CBC",
            Self::Aes256Cbc => "AES-256-CBC",
            Self::TripleDesCbc => "3DES-CBC",
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == ID_AES_128_CBC {
            Some(Self::Aes128Cbc)
        } else if *oid == ID_AES_192_CBC {
            Some(Self::Aes192Cbc)
        } else if *oid == ID_AES_256_CBC {
            Some(Self::Aes256Cbc)
        } else if *oid == DES_EDE3_CBC {
            Some(Self::TripleDesCbc)
        } else {
            None
        }
    }
}

/// Encrypt `content` for the holders of the `recipients`' private keys.
///
/// The result is a DER `ContentInfo` wrapping EnvelopedData, AES-128-CBC
/// content encryption and one RSA PKCS#1 v1.5 key-transport recipient per
/// certificate, identified by issuer and serial number.
pub fn seal(content: &[u8], recipients: &[Certificate]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(ScepError::signing("Envelope needs at least one recipient"));
    }

    // Each key-transport builder holds its own RNG borrow until build.
    let mut key_rngs = vec![OsRng; recipients.len()];

    let mut builder = EnvelopedDataBuilder::new(
        None,
        content,
        ContentEncryptionAlgorithm::Aes128Cbc,
        None,
    )
    .map_err(|e| ScepError::signing(format!("Failed to create envelope builder: {}", e)))?;

    for (recipient, rng) in recipients.iter().zip(key_rngs.iter_mut()) {
        let rid = RecipientIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: recipient.tbs_certificate.issuer.clone(),
            serial_number: recipient.tbs_certificate.serial_number.clone(),
        });
        let recipient_info = KeyTransRecipientInfoBuilder::new(
            rid,
            KeyEncryptionInfo::Rsa(recipient_public_key(recipient)?),
            rng,
        )
        .map_err(|e| ScepError::signing(format!("Failed to build recipient info: {}", e)))?;

        builder
            .add_recipient_info(recipient_info)
            .map_err(|e| ScepError::signing(format!("Failed to add recipient: {}", e)))?;
    }

    let mut content_rng = OsRng;
    let enveloped = builder
        .build_with_rng(&mut content_rng)
        .map_err(|e| ScepError::signing(format!("Failed to encrypt envelope: {}", e)))?;

    let content_info = ContentInfo {
        content_type: ID_ENVELOPED_DATA,
        content: Any::encode_from(&enveloped)?,
    };

    debug!(
        "Sealed {} content bytes for {} recipient(s)",
        content.len(),
        recipients.len()
    );

    Ok(content_info.to_der()?)
}

/// Decrypt an envelope addressed to `certificate` using `private_key`.
///
/// Returns [`ScepError::NoMatchingRecipient`] when no key-transport recipient
/// carries the certificate's issuer and serial number. Every other failure
/// while opening the envelope is a [`ScepError::DecryptionFailed`].
pub fn open(
    envelope: &[u8],
    certificate: &Certificate,
    private_key: &RsaPrivateKey,
) -> Result<Vec<u8>> {
    debug!("Opening pkcsPKIEnvelope ({} bytes)", envelope.len());

    let content_info = ContentInfo::from_der(envelope)
        .map_err(|e| ScepError::decryption(format!("Invalid envelope ContentInfo: {}", e)))?;

    if content_info.content_type != ID_ENVELOPED_DATA {
        return Err(ScepError::decryption(format!(
            "Expected EnvelopedData OID, got {}",
            content_info.content_type
        )));
    }

    let enveloped = content_info
        .content
        .decode_as::<EnvelopedData>()
        .map_err(|e| ScepError::decryption(format!("Invalid EnvelopedData: {}", e)))?;

    debug!(
        "EnvelopedData version: {:?}, recipients: {}",
        enveloped.version,
        enveloped.recip_infos.0.len()
    );

    let encrypted_key = find_recipient_key(&enveloped, certificate)?;

    let content_key = private_key
        .decrypt(Pkcs1v15Encrypt, encrypted_key)
        .map_err(|e| ScepError::decryption(format!("Key transport failed: {}", e)))?;

    let enc_info = &enveloped.encrypted_content;
    let algorithm = EncryptionAlgorithm::from_oid(&enc_info.content_enc_alg.oid).ok_or_else(|| {
        ScepError::decryption(format!(
            "Unsupported content encryption algorithm {}",
            enc_info.content_enc_alg.oid
        ))
    })?;

    let iv = enc_info
        .content_enc_alg
        .parameters
        .as_ref()
        .ok_or_else(|| ScepError::decryption("EnvelopedData missing IV"))?
        .decode_as::<OctetString>()
        .map_err(|e| ScepError::decryption(format!("Invalid IV parameter: {}", e)))?;

    let ciphertext = enc_info
        .encrypted_content
        .as_ref()
        .ok_or_else(|| ScepError::decryption("EnvelopedData has no encrypted content"))?;

    let decrypted = decrypt_content(
        ciphertext.as_bytes(),
        &content_key,
        iv.as_bytes(),
        algorithm,
    )?;

    debug!(
        "Decrypted {} bytes with {}",
        decrypted.len(),
        algorithm.as_str()
    );

    Ok(decrypted)
}

/// Find the encrypted content-encryption key addressed to `certificate`.
fn find_recipient_key<'a>(
    enveloped: &'a EnvelopedData,
    certificate: &Certificate,
) -> Result<&'a [u8]> {
    let tbs = &certificate.tbs_certificate;

    for recipient in enveloped.recip_infos.0.iter() {
        let RecipientInfo::Ktri(ktri) = recipient else {
            continue;
        };

        if let RecipientIdentifier::IssuerAndSerialNumber(id) = &ktri.rid {
            if id.issuer == tbs.issuer && id.serial_number == tbs.serial_number {
                return Ok(ktri.enc_key.as_bytes());
            }
        }
    }

    Err(ScepError::NoMatchingRecipient)
}

fn recipient_public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()?;
    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| ScepError::certificate_parsing(format!("Recipient key is not RSA: {}", e)))
}

/// Decrypt content using symmetric encryption.
fn decrypt_content(
    encrypted: &[u8],
    key: &[u8],
    iv: &[u8],
    algorithm: EncryptionAlgorithm,
) -> Result<Vec<u8>> {
    let expected_iv_size = algorithm.block_size();
    if iv.len() != expected_iv_size {
        return Err(ScepError::decryption(format!(
            "Invalid IV size: expected {}, got {}",
            expected_iv_size,
            iv.len()
        )));
    }

    match algorithm {
        EncryptionAlgorithm::Aes128Cbc => {
            cbc_decrypt::<cbc::Decryptor<aes::Aes128>>(encrypted, key, iv)
        }
        EncryptionAlgorithm::Aes192Cbc => {
            cbc_decrypt::<cbc::Decryptor<aes::Aes192>>(encrypted, key, iv)
        }
        EncryptionAlgorithm::Aes256Cbc => {
            cbc_decrypt::<cbc::Decryptor<aes::Aes256>>(encrypted, key, iv)
        }
        EncryptionAlgorithm::TripleDesCbc => {
            cbc_decrypt::<cbc::Decryptor<des::TdesEde3>>(encrypted, key, iv)
        }
    }
}

fn cbc_decrypt<C>(encrypted: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>>
where
    C: cbc::cipher::KeyIvInit + cbc::cipher::BlockDecryptMut,
{
    let cipher = C::new_from_slices(key, iv)
        .map_err(|e| ScepError::decryption(format!("Failed to create cipher: {}", e)))?;
    cipher
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(encrypted)
        .map_err(|e| ScepError::decryption(format!("Decryption failed: {}", e)))
}
