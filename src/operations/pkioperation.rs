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

//! PKIOperation.
//!
//! parse -> decrypt -> sign -> CertRep. Any error in that chain becomes a
//! signed CertRep with failInfo `badRequest`; only a failure to sign that
//! response reaches the caller.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::ca::CaMaterial;
use crate::error::{Result, ScepError};
use crate::pki::PkiMessage;
use crate::signer::CsrSigner;

/// Answer one PKIOperation request with the DER of a CertRep.
pub async fn process(
    ca: &CaMaterial,
    signer: &dyn CsrSigner,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let request = match PkiMessage::parse(bytes) {
        Ok(request) => request,
        Err(e) => return reject(ca, None, &e),
    };

    debug!(
        "PKIOperation {} transaction {}",
        request.message_type, request.transaction_id
    );

    match issue(ca, signer, &request, cancel).await {
        Ok(response) => Ok(response.raw),
        Err(e) => reject(ca, Some(&request), &e),
    }
}

async fn issue(
    ca: &CaMaterial,
    signer: &dyn CsrSigner,
    request: &PkiMessage,
    cancel: &CancellationToken,
) -> Result<PkiMessage> {
    let decrypted = request
        .clone()
        .decrypt_envelope(ca.certificate(), ca.private_key())?;

    let csr = decrypted.csr_request.as_ref().ok_or_else(|| {
        ScepError::unsupported_message_type(decrypted.message_type.as_str())
    })?;

    let issued = signer.sign_csr(csr, cancel).await?;
    PkiMessage::build_success_response(&decrypted, ca, &issued)
}

fn reject(ca: &CaMaterial, request: Option<&PkiMessage>, cause: &ScepError) -> Result<Vec<u8>> {
    let transaction = request.map(|r| r.transaction_id.as_str()).unwrap_or("-");
    error!(
        "PKIOperation transaction {} failed: {}",
        transaction, cause
    );

    let response = PkiMessage::build_failure_response(request, ca, cause.fail_info())?;
    Ok(response.raw)
}
