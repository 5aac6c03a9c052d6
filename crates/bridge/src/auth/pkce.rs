// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 authorization code + PKCE (RFC 7636) helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a PKCE code verifier: 32 random bytes, base64url no-pad.
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `code_challenge = base64url_nopad(sha256(verifier))`.
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random CSRF-protection `state` value: 16 random bytes.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the vendor's authorization URL with PKCE parameters.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    code_challenge: &str,
    state: &str,
) -> String {
    format!(
        "{auth_url}?client_id={client_id}\
         &response_type=code\
         &redirect_uri={redirect_uri}\
         &scope={scope}\
         &code_challenge={code_challenge}\
         &code_challenge_method=S256\
         &state={state}",
        client_id = urlencoding(client_id),
        redirect_uri = urlencoding(redirect_uri),
        scope = urlencoding(scope),
        code_challenge = urlencoding(code_challenge),
        state = urlencoding(state),
    )
}

/// Extract the `code` query parameter from a redirect URL.
pub fn extract_code_param(redirect_url: &str) -> Option<String> {
    let query = redirect_url.split_once('?')?.1;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        if key == "code" {
            return Some(value.to_owned());
        }
    }
    None
}

fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_challenge_is_deterministic_for_a_given_verifier() {
        let verifier = "abc123";
        assert_eq!(compute_code_challenge(verifier), compute_code_challenge(verifier));
    }

    #[test]
    fn verifier_and_nonce_are_not_empty_and_vary() {
        let a = generate_code_verifier();
        let b = generate_code_verifier();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn extract_code_param_finds_code() {
        let url = "https://app.example.com/callback?state=xyz&code=abc123";
        assert_eq!(extract_code_param(url).as_deref(), Some("abc123"));
    }

    #[test]
    fn extract_code_param_missing_returns_none() {
        let url = "https://app.example.com/callback?state=xyz";
        assert_eq!(extract_code_param(url), None);
    }
}
