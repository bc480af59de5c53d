use std::collections::BTreeSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use super::keys::SigningKeys;
use super::AuthError;
use crate::config::AuthConfig;

/// The decoded payload of an access token.
///
/// `permissions` is `None` when the token carries no such claim at all,
/// which is a different failure from lacking one particular permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub permissions: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

pub struct TokenValidator {
    keys: SigningKeys,
    algorithms: Vec<Algorithm>,
    validation: Validation,
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    // Exactly one space between scheme and token; tabs and runs of spaces
    // are malformed.
    let parts = header.split(' ').collect::<Vec<_>>();

    match parts.as_slice() {
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::MalformedHeader(
            "Authorization header must start with \"Bearer\".",
        )),
        [_] | [_, ""] => Err(AuthError::MalformedHeader("Token not found.")),
        [_, token] => Ok(*token),
        _ => Err(AuthError::MalformedHeader(
            "Authorization header must be bearer token.",
        )),
    }
}

impl TokenValidator {
    pub fn new(keys: SigningKeys, config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[&config.audience]);
        validation.leeway = config.leeway_secs;

        TokenValidator {
            keys,
            algorithms: config.algorithms.clone(),
            validation,
        }
    }

    pub fn keys(&self) -> &SigningKeys {
        &self.keys
    }

    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Undecodable token header: {}", e);
            AuthError::InvalidHeader("Unable to parse authentication token.")
        })?;

        if !self.algorithms.contains(&header.alg) {
            debug!("Token signed with disallowed algorithm {:?}", header.alg);
            return Err(AuthError::InvalidHeader(
                "Unable to parse authentication token.",
            ));
        }

        let kid = header
            .kid
            .as_ref()
            .ok_or(AuthError::InvalidHeader("Authorization malformed."))?;

        let key = self.keys.get(kid).await.ok_or_else(|| {
            debug!("No signing key with kid {:?}", kid);
            AuthError::InvalidHeader("Unable to find the appropriate key.")
        })?;

        // The key family has to agree with every algorithm we validate for.
        let mut validation = self.validation.clone();
        validation.algorithms = vec![header.alg];

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims(
                    "Incorrect claims. Please, check the audience and issuer.",
                ),
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidHeader("Unable to parse authentication token."),
            }
        })?;

        trace!("Validated claims for {:?}", data.claims.sub);
        Ok(data.claims)
    }
}
