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

//! RSA PKCS#1 v1.5 signature algorithms.
//!
//! SCEP is RSA-only: the requester's key both signs the outer message and
//! receives the response key transport. The CA signs issued certificates
//! with one of the algorithms below.

use std::fmt;
use std::str::FromStr;

use const_oid::db::rfc5912::{
    SHA_1_WITH_RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION,
    SHA_512_WITH_RSA_ENCRYPTION,
};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::Null;
use der::Any;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::AlgorithmIdentifierOwned;

use crate::error::{Result, ScepError};

/// Supported certificate signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    /// sha1WithRSAEncryption
    Sha1WithRsa,
    /// sha256WithRSAEncryption
    Sha256WithRsa,
    /// sha384WithRSAEncryption
    Sha384WithRsa,
    /// sha512WithRSAEncryption
    Sha512WithRsa,
}

impl SignatureAlgorithm {
    /// The signature algorithm OID.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::Sha1WithRsa => SHA_1_WITH_RSA_ENCRYPTION,
            Self::Sha256WithRsa => SHA_256_WITH_RSA_ENCRYPTION,
            Self::Sha384WithRsa => SHA_384_WITH_RSA_ENCRYPTION,
            Self::Sha512WithRsa => SHA_512_WITH_RSA_ENCRYPTION,
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            Self::Sha1WithRsa,
            Self::Sha256WithRsa,
            Self::Sha384WithRsa,
            Self::Sha512WithRsa,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }

    /// Resolve the algorithm named by an `AlgorithmIdentifier`.
    pub fn from_algorithm_identifier(alg: &AlgorithmIdentifierOwned) -> Result<Self> {
        Self::from_oid(&alg.oid).ok_or_else(|| {
            ScepError::signing(format!("Unsupported signature algorithm {}", alg.oid))
        })
    }

    /// `AlgorithmIdentifier` with the NULL parameters PKCS#1 requires.
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: Some(Any::encode_from(&Null)?),
        })
    }

    /// Sign `msg` with the given RSA key.
    pub fn sign(&self, key: &RsaPrivateKey, msg: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Sha1WithRsa => sign_with::<Sha1>(key, msg),
            Self::Sha256WithRsa => sign_with::<Sha256>(key, msg),
            Self::Sha384WithRsa => sign_with::<Sha384>(key, msg),
            Self::Sha512WithRsa => sign_with::<Sha512>(key, msg),
        }
    }

    /// Verify a signature over `msg`.
    pub fn verify(&self, key: &RsaPublicKey, msg: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            Self::Sha1WithRsa => verify_with::<Sha1>(key, msg, signature),
            Self::Sha256WithRsa => verify_with::<Sha256>(key, msg, signature),
            Self::Sha384WithRsa => verify_with::<Sha384>(key, msg, signature),
            Self::Sha512WithRsa => verify_with::<Sha512>(key, msg, signature),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1WithRsa => write!(f, "SHA1withRSA"),
            Self::Sha256WithRsa => write!(f, "SHA256withRSA"),
            Self::Sha384WithRsa => write!(f, "SHA384withRSA"),
            Self::Sha512WithRsa => write!(f, "SHA512withRSA"),
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = ScepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1withrsa" | "sha1rsa" => Ok(Self::Sha1WithRsa),
            "sha256withrsa" | "sha256rsa" => Ok(Self::Sha256WithRsa),
            "sha384withrsa" | "sha384rsa" => Ok(Self::Sha384WithRsa),
            "sha512withrsa" | "sha512rsa" => Ok(Self::Sha512WithRsa),
            _ => Err(ScepError::config(format!(
                "Unknown signature algorithm: {}",
                s
            ))),
        }
    }
}

fn sign_with<D>(key: &RsaPrivateKey, msg: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = SigningKey::<D>::new(key.clone());
    let signature = signing_key
        .try_sign(msg)
        .map_err(|e| ScepError::signing(format!("RSA signing failed: {}", e)))?;
    Ok(signature.to_vec())
}

fn verify_with<D>(key: &RsaPublicKey, msg: &[u8], signature: &[u8]) -> Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = VerifyingKey::<D>::new(key.clone());
    let signature = Signature::try_from(signature)
        .map_err(|e| ScepError::invalid_signature(format!("Malformed signature: {}", e)))?;
    verifying_key
        .verify(msg, &signature)
        .map_err(|e| ScepError::invalid_signature(e.to_string()))
}
