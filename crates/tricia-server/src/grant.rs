//! Join credential minting.
//!
//! Credentials are HS256 JWTs signed with the media server's API secret.
//! The issuer is the API key, the subject the participant identity, and the
//! `video` claim grants joining one room with publish and subscribe rights.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tricia_core::constants::JOIN_TOKEN_TTL;
use tricia_settings::ServerSettings;

use crate::errors::ServerError;

/// Room permissions carried in the `video` claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    /// May join `room`.
    pub room_join: bool,
    /// Room the grant applies to.
    pub room: String,
    /// May publish tracks.
    pub can_publish: bool,
    /// May subscribe to tracks.
    pub can_subscribe: bool,
}

/// Claims of a join credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinClaims {
    /// API key.
    pub iss: String,
    /// Participant identity.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Not valid before (unix seconds).
    pub nbf: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Room permissions.
    pub video: VideoGrant,
}

/// Signs join credentials with a fixed key pair.
pub struct TokenSigner {
    api_key: String,
    secret: Vec<u8>,
    server_url: String,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("api_key", &self.api_key)
            .field("server_url", &self.server_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Signer with explicit credentials.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl AsRef<[u8]>,
        server_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret: api_secret.as_ref().to_vec(),
            server_url: server_url.into(),
            ttl,
        }
    }

    /// Signer from the `server` settings section; fails listing every
    /// missing field. A zero TTL means the default six hours.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, ServerError> {
        let missing = settings.missing_signing_fields();
        if !missing.is_empty() {
            return Err(ServerError::Configuration { missing });
        }
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(Self::new(
            field(&settings.livekit_api_key),
            field(&settings.livekit_api_secret),
            field(&settings.livekit_url),
            match settings.token_ttl_secs {
                0 => JOIN_TOKEN_TTL,
                secs => Duration::from_secs(secs),
            },
        ))
    }

    /// Media server URL returned alongside credentials.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Claims for `identity` joining `room`, valid from now.
    pub fn claims(&self, identity: &str, name: &str, room: &str) -> JoinClaims {
        let now = chrono::Utc::now().timestamp();
        JoinClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            name: name.to_string(),
            nbf: now,
            exp: now + self.ttl.as_secs() as i64,
            video: VideoGrant {
                room_join: true,
                room: room.to_string(),
                can_publish: true,
                can_subscribe: true,
            },
        }
    }

    /// Signed credential for `identity` joining `room`.
    pub fn mint(&self, identity: &str, name: &str, room: &str) -> Result<String, ServerError> {
        let claims = self.claims(identity, name, room);
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| ServerError::Signing(e.to_string()))
    }

    /// Check signature, issuer and lifetime of `token`.
    pub fn verify(&self, token: &str) -> Result<JoinClaims, ServerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.set_issuer(&[self.api_key.as_str()]);
        jsonwebtoken::decode::<JoinClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| ServerError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn signer() -> TokenSigner {
        TokenSigner::new("APIkey", "s3cret-s3cret-s3cret", "wss://media.test", Duration::from_secs(3600))
    }

    #[test]
    fn minted_token_verifies_and_carries_grant() {
        let s = signer();
        let token = s.mint("user-1", "Ada", "journal-room").unwrap();
        let claims = s.verify(&token).unwrap();
        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.exp - claims.nbf, 3600);
        assert_eq!(
            claims.video,
            VideoGrant {
                room_join: true,
                room: "journal-room".into(),
                can_publish: true,
                can_subscribe: true,
            }
        );
    }

    #[test]
    fn video_claim_is_camel_case() {
        let v = serde_json::to_value(signer().claims("u", "u", "r")).unwrap();
        assert_eq!(v["video"]["roomJoin"], true);
        assert_eq!(v["video"]["canSubscribe"], true);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = signer().mint("u", "u", "r").unwrap();
        let other = TokenSigner::new("APIkey", "another-secret", "wss://x", Duration::from_secs(60));
        assert_matches!(other.verify(&token), Err(ServerError::Signing(_)));
    }

    #[test]
    fn zero_ttl_uses_default_lifetime() {
        let settings = ServerSettings {
            livekit_url: Some("wss://media.test".into()),
            livekit_api_key: Some("key".into()),
            livekit_api_secret: Some("secret".into()),
            token_ttl_secs: 0,
            ..ServerSettings::default()
        };
        let claims = TokenSigner::from_settings(&settings).unwrap().claims("u", "u", "r");
        assert_eq!(claims.exp - claims.nbf, JOIN_TOKEN_TTL.as_secs() as i64);
    }

    #[test]
    fn settings_without_secret_list_missing_fields() {
        let settings = ServerSettings {
            livekit_url: Some("wss://media.test".into()),
            livekit_api_key: Some("key".into()),
            ..ServerSettings::default()
        };
        assert_matches!(
            TokenSigner::from_settings(&settings),
            Err(ServerError::Configuration { missing }) if missing == vec!["LIVEKIT_API_SECRET"]
        );
    }
}
