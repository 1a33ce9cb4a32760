// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;

use super::{AuthProvider, Principal};
use crate::error::ApiError;

/// HMAC-SHA256 signed tokens, in place of the original service's
/// `jwt-go`-based scheme. A token is `base64(payload).base64(tag)`,
/// where `payload` is `subject` for vehicle tokens or `subject\0admin`
/// for principals.
pub struct HmacAuth {
    key: hmac::Key,
}

impl HmacAuth {
    pub fn new(signing_key: &[u8]) -> Self {
        Self { key: hmac::Key::new(hmac::HMAC_SHA256, signing_key) }
    }

    fn sign(&self, payload: &str) -> String {
        let tag = hmac::sign(&self.key, payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        )
    }

    fn verify_payload(&self, token: &str) -> Option<String> {
        let (payload_b64, tag_b64) = token.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;
        hmac::verify(&self.key, &payload, &tag).ok()?;
        String::from_utf8(payload).ok()
    }
}

impl AuthProvider for HmacAuth {
    fn authenticate(&self, credential: &str) -> Result<Principal, ApiError> {
        let payload = self
            .verify_payload(credential)
            .ok_or_else(|| ApiError::unauthorized("invalid or tampered credential"))?;
        match payload.split_once('\0') {
            Some((id, "admin")) => Ok(Principal::admin(id)),
            _ => Ok(Principal::user(payload)),
        }
    }

    fn sign_principal(&self, principal: &Principal) -> String {
        if principal.is_admin {
            self.sign(&format!("{}\0admin", principal.id))
        } else {
            self.sign(&principal.id)
        }
    }

    fn mint_vehicle_token(&self, vehicle_id: &str) -> String {
        self.sign(vehicle_id)
    }

    fn verify_vehicle_token(&self, vehicle_id: &str, token: &str) -> bool {
        self.verify_payload(token).as_deref() == Some(vehicle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> HmacAuth {
        HmacAuth::new(b"test-signing-key")
    }

    #[test]
    fn mint_then_verify_round_trips() {
        let a = auth();
        let token = a.mint_vehicle_token("rover-1");
        assert!(a.verify_vehicle_token("rover-1", &token));
    }

    #[test]
    fn verify_rejects_mismatched_vehicle() {
        let a = auth();
        let token = a.mint_vehicle_token("rover-1");
        assert!(!a.verify_vehicle_token("rover-2", &token));
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let a = auth();
        let mut token = a.mint_vehicle_token("rover-1");
        token.push('x');
        assert!(!a.verify_vehicle_token("rover-1", &token));
    }

    #[test]
    fn different_keys_do_not_cross_verify() {
        let a = HmacAuth::new(b"key-one");
        let b = HmacAuth::new(b"key-two");
        let token = a.mint_vehicle_token("rover-1");
        assert!(!b.verify_vehicle_token("rover-1", &token));
    }

    #[test]
    fn principal_round_trips_through_sign_and_authenticate() {
        let a = auth();
        let principal = Principal::admin("user-7");
        let credential = a.sign_principal(&principal);
        let resolved = a.authenticate(&credential).expect("valid credential");
        assert_eq!(resolved, principal);
    }

    #[test]
    fn authenticate_rejects_garbage() {
        let a = auth();
        assert!(a.authenticate("not-a-token").is_err());
    }
}
