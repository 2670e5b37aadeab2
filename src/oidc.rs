//! Identity provider adapter.
//!
//! Speaks the OIDC authorization-code flow with PKCE (S256) against the
//! configured issuer: builds the authorization redirect, exchanges codes
//! for tokens, and exchanges refresh tokens for new ones.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const OIDC_SCOPE: &str = "openid profile email";

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Token endpoint returned status {status}")]
    TokenEndpoint { status: u16 },
    #[error("Identity provider returned a malformed token")]
    MalformedToken,
    #[error("Invalid issuer URL")]
    InvalidIssuer,
    #[error("No redirect domain configured")]
    NoRedirectDomain,
    #[error("Could not gather entropy for PKCE material")]
    Entropy,
}

/// Identity attributes the provider asserts about the caller.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Clone)]
pub struct OidcClient {
    client: reqwest::Client,
    issuer_url: String,
    client_id: String,
    redirect_domains: Vec<String>,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl OidcClient {
    pub fn new(
        issuer_url: String,
        client_id: String,
        redirect_domains: Vec<String>,
    ) -> Result<Self, OidcError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(OidcError::Request)?;

        Ok(Self {
            client,
            issuer_url: issuer_url.trim_end_matches('/').to_string(),
            client_id,
            redirect_domains,
        })
    }

    /// Callback URL on the first configured redirect domain.
    pub fn redirect_uri(&self) -> Result<String, OidcError> {
        let domain = self
            .redirect_domains
            .first()
            .ok_or(OidcError::NoRedirectDomain)?;
        Ok(format!("https://{domain}/api/auth/callback"))
    }

    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String, OidcError> {
        let mut url = Url::parse(&format!("{}/auth", self.issuer_url))
            .map_err(|_| OidcError::InvalidIssuer)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri()?)
            .append_pair("response_type", "code")
            .append_pair("scope", OIDC_SCOPE)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url.into())
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OidcError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri()?),
            ("client_id", &self.client_id),
            ("code_verifier", code_verifier),
        ];
        self.token_request(&params).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, OidcError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, OidcError> {
        let response = self
            .client
            .post(format!("{}/token", self.issuer_url))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OidcError::TokenEndpoint {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<TokenSet>().await?)
    }
}

pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

pub fn generate_pkce() -> Result<PkcePair, OidcError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|_| OidcError::Entropy)?;
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = pkce_challenge(&verifier);
    Ok(PkcePair {
        verifier,
        challenge,
    })
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn generate_state() -> Result<String, OidcError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|_| OidcError::Entropy)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Claims from the id_token payload. The token comes straight from the
/// issuer over TLS, so the signature is not re-verified here.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdentityClaims, OidcError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or(OidcError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OidcError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| OidcError::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vector from RFC 7636 appendix B.
    #[test]
    fn pkce_challenge_matches_rfc_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_pkce_is_consistent() {
        let pair = generate_pkce().unwrap();
        assert_eq!(pkce_challenge(&pair.verifier), pair.challenge);
        assert!(pair.verifier.len() >= 43);
    }

    #[test]
    fn authorize_url_carries_pkce_and_state() {
        let client = OidcClient::new(
            "https://replit.com/oidc".to_string(),
            "client-123".to_string(),
            vec!["app.example.com".to_string()],
        )
        .unwrap();

        let url = client.authorize_url("st4te", "ch4llenge").unwrap();
        assert!(url.starts_with("https://replit.com/oidc/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("code_challenge=ch4llenge"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fapi%2Fauth%2Fcallback"));
    }

    #[test]
    fn authorize_url_without_domains_fails() {
        let client = OidcClient::new(
            "https://replit.com/oidc".to_string(),
            "client-123".to_string(),
            Vec::new(),
        )
        .unwrap();
        assert!(matches!(
            client.authorize_url("s", "c"),
            Err(OidcError::NoRedirectDomain)
        ));
    }

    #[test]
    fn id_token_claims_decode_from_payload() {
        let payload = URL_SAFE_NO_PAD.encode(
            r#"{"sub":"user-1","email":"u@example.com","first_name":"Ada","aud":"x","exp":0}"#,
        );
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{payload}.sig");
        let claims = decode_id_token_claims(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("u@example.com"));
        assert_eq!(claims.first_name.as_deref(), Some("Ada"));
        assert!(claims.last_name.is_none());
    }

    #[test]
    fn garbage_id_token_is_rejected() {
        assert!(decode_id_token_claims("not-a-jwt").is_err());
        assert!(decode_id_token_claims("a.!!!.c").is_err());
    }
}
