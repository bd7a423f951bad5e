//! Bearer credential verification.
//!
//! Credentials are HS256 JWTs carrying the acting user's id and the issue
//! time. [`TokenVerifier`] mints and checks them; [`JwtLayer`] enforces them
//! on routes that require authentication and leaves the verified
//! [`Identity`] in the request extensions for the [`AuthUser`] extractor and
//! for later middleware.
//!
//! # Example
//!
//! ```ignore
//! use trailmark_extras::jwt::{AuthUser, JwtLayer, TokenVerifier};
//!
//! let verifier = TokenVerifier::new("my-secret");
//! let app = App::new()
//!     .layer(JwtLayer::new(verifier).skip_paths(vec!["/health"]))
//!     .route("/me", get(|AuthUser(identity): AuthUser| async move {
//!         format!("actor {}", identity.actor_id)
//!     }));
//! ```

use async_trait::async_trait;
use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use trailmark_core::middleware::{BoxedNext, MiddlewareLayer};
use trailmark_core::{ApiError, FromRequestParts, IntoResponse, Request, Response, Result};

/// Default credential lifetime: 24 hours
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Claims carried by a trailmark credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Acting user id
    #[serde(default)]
    pub user_id: i64,
    /// Issued-at, seconds since the Unix epoch
    pub iat: u64,
    /// Expiry, seconds since the Unix epoch
    pub exp: u64,
}

/// The authenticated actor behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Acting user id
    pub actor_id: i64,
    /// When the credential was issued, seconds since the Unix epoch
    pub issued_at: u64,
}

/// Why a credential was not accepted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// No bearer credential was presented
    #[error("Missing token")]
    Missing,

    /// Malformed, badly signed, or missing an actor id
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Signature is fine but the credential is past its expiry
    #[error("Token has expired")]
    Expired,

    /// A credential could not be signed
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Invalid(err.to_string()),
        }
    }
}

/// Seconds since the Unix epoch
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> std::result::Result<&str, CredentialError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(CredentialError::Missing)?
        .to_str()
        .map_err(|_| CredentialError::Invalid("Invalid Authorization header encoding".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(CredentialError::Missing)
}

/// Signs and verifies credentials with a shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<String>,
    ttl_secs: u64,
}

impl TokenVerifier {
    /// Create a verifier with the default 24h time-to-live
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Set the lifetime of issued credentials
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Lifetime of issued credentials, in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a credential for `actor_id`, valid from now
    pub fn issue(&self, actor_id: i64) -> std::result::Result<String, CredentialError> {
        let now = now_secs();
        self.issue_with_times(actor_id, now, now + self.ttl_secs)
    }

    /// Issue a credential with explicit issue and expiry times
    pub fn issue_with_times(
        &self,
        actor_id: i64,
        issued_at: u64,
        expires_at: u64,
    ) -> std::result::Result<String, CredentialError> {
        let claims = Claims {
            user_id: actor_id,
            iat: issued_at,
            exp: expires_at,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Verify a credential and return the identity it carries
    pub fn verify(&self, token: &str) -> std::result::Result<Identity, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;

        if data.claims.user_id == 0 {
            return Err(CredentialError::Invalid("token carries no user id".into()));
        }

        Ok(Identity {
            actor_id: data.claims.user_id,
            issued_at: data.claims.iat,
        })
    }

    /// Verify the bearer credential of a request
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> std::result::Result<Identity, CredentialError> {
        self.verify(bearer_token(headers)?)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Lookup of the actors a credential may name
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Whether `actor_id` still exists
    async fn contains(&self, actor_id: i64) -> bool;
}

/// Authentication-required middleware layer.
///
/// Requests without a valid bearer credential are answered with 401 before
/// they reach any inner layer or handler. Paths starting with one of the
/// `skip_paths` prefixes pass through unauthenticated. With an
/// [`ActorDirectory`] attached, a valid credential naming an actor that no
/// longer exists is rejected as well.
#[derive(Clone)]
pub struct JwtLayer {
    verifier: TokenVerifier,
    skip_paths: Arc<Vec<String>>,
    actors: Option<Arc<dyn ActorDirectory>>,
}

impl JwtLayer {
    /// Create a new JWT layer around a verifier
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            verifier,
            skip_paths: Arc::new(Vec::new()),
            actors: None,
        }
    }

    /// Reject credentials whose actor is missing from `actors`
    pub fn require_known_actor(mut self, actors: Arc<dyn ActorDirectory>) -> Self {
        self.actors = Some(actors);
        self
    }

    /// Skip validation for paths starting with any of these prefixes
    pub fn skip_paths(mut self, paths: Vec<&str>) -> Self {
        self.skip_paths = Arc::new(paths.into_iter().map(String::from).collect());
        self
    }
}

impl MiddlewareLayer for JwtLayer {
    fn call(
        &self,
        mut req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let verifier = self.verifier.clone();
        let skip_paths = self.skip_paths.clone();
        let actors = self.actors.clone();

        Box::pin(async move {
            let path = req.uri().path();
            if skip_paths.iter().any(|skip| path.starts_with(skip.as_str())) {
                return next(req).await;
            }

            match verifier.authenticate(req.headers()) {
                Ok(identity) => {
                    if let Some(actors) = actors {
                        if !actors.contains(identity.actor_id).await {
                            tracing::debug!(
                                path = %req.path(),
                                actor_id = identity.actor_id,
                                "Rejected credential for unknown actor"
                            );
                            return ApiError::unauthorized("User not found").into_response();
                        }
                    }
                    req.extensions_mut().insert(identity);
                    next(req).await
                }
                Err(err) => {
                    tracing::debug!(path = %req.path(), error = %err, "Rejected unauthenticated request");
                    let message = match err {
                        CredentialError::Missing => "Missing Authorization header",
                        CredentialError::Expired => "Token has expired",
                        _ => "Invalid token",
                    };
                    ApiError::unauthorized(message).into_response()
                }
            }
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

/// Extractor for the identity verified by [`JwtLayer`]
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

impl FromRequestParts for AuthUser {
    fn from_request_parts(req: &Request) -> Result<Self> {
        req.extensions()
            .get::<Identity>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| {
                ApiError::unauthorized(
                    "No authenticated user. Did you forget to add JwtLayer middleware?",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::{BodyExt, Full};
    use proptest::prelude::*;
    use trailmark_core::middleware::LayerStack;

    fn request(auth: Option<&str>, path: &str) -> Request {
        let mut builder = http::Request::builder().method(Method::PUT).uri(path);
        if let Some(auth) = auth {
            builder = builder.header(http::header::AUTHORIZATION, auth);
        }
        Request::from_http_request(builder.body(()).unwrap(), Bytes::new())
    }

    fn ok_handler() -> BoxedNext {
        Arc::new(|req: Request| {
            Box::pin(async move {
                let actor = req
                    .extensions()
                    .get::<Identity>()
                    .map(|id| id.actor_id.to_string())
                    .unwrap_or_default();
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from(actor)))
                    .unwrap()
            }) as Pin<Box<dyn Future<Output = Response> + Send + 'static>>
        })
    }

    async fn run(layer: JwtLayer, req: Request) -> (StatusCode, String) {
        let mut stack = LayerStack::new();
        stack.push(Box::new(layer));
        let response = stack.execute(req, ok_handler()).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(CredentialError::Missing));

        headers.insert(http::header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(CredentialError::Missing));

        headers.insert(http::header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(CredentialError::Missing));

        headers.insert(http::header::AUTHORIZATION, "bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(CredentialError::Missing));

        headers.insert(http::header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc.def"));
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let token = TokenVerifier::new("first-secret").issue(42).unwrap();
        let verifier = TokenVerifier::new("second-secret");
        assert!(matches!(
            verifier.verify(&token),
            Err(CredentialError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let verifier = TokenVerifier::new("secret");
        let now = now_secs();
        let token = verifier.issue_with_times(7, now - 7200, now - 3600).unwrap();
        assert_eq!(verifier.verify(&token), Err(CredentialError::Expired));
    }

    #[test]
    fn test_zero_user_id_is_invalid() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.issue(0).unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(CredentialError::Invalid(_))
        ));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let verifier = TokenVerifier::new("secret");
        assert!(matches!(
            verifier.verify("not-a-jwt"),
            Err(CredentialError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_layer_accepts_valid_token_and_stores_identity() {
        let verifier = TokenVerifier::new("secret");
        let token = verifier.issue(42).unwrap();

        let (status, body) = run(
            JwtLayer::new(verifier),
            request(Some(&format!("Bearer {}", token)), "/api/widgets/1"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "42");
    }

    #[tokio::test]
    async fn test_layer_rejects_expired_token() {
        let verifier = TokenVerifier::new("secret");
        let now = now_secs();
        let token = verifier.issue_with_times(42, now - 100, now - 10).unwrap();

        let (status, body) = run(
            JwtLayer::new(verifier),
            request(Some(&format!("Bearer {}", token)), "/api/widgets/1"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            r#"{"error":{"type":"unauthorized","message":"Token has expired"}}"#
        );
    }

    struct KnownActors(Vec<i64>);

    #[async_trait]
    impl ActorDirectory for KnownActors {
        async fn contains(&self, actor_id: i64) -> bool {
            self.0.contains(&actor_id)
        }
    }

    #[tokio::test]
    async fn test_layer_rejects_unknown_actor() {
        let verifier = TokenVerifier::new("secret");
        let layer = JwtLayer::new(verifier.clone())
            .require_known_actor(Arc::new(KnownActors(vec![42])));

        let known = verifier.issue(42).unwrap();
        let (status, body) = run(
            layer.clone(),
            request(Some(&format!("Bearer {}", known)), "/api/widgets/1"),
        )
        .await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "42"));

        let gone = verifier.issue(43).unwrap();
        let (status, body) = run(
            layer,
            request(Some(&format!("Bearer {}", gone)), "/api/widgets/1"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            r#"{"error":{"type":"unauthorized","message":"User not found"}}"#
        );
    }

    #[tokio::test]
    async fn test_layer_skip_paths() {
        let layer = JwtLayer::new(TokenVerifier::new("secret")).skip_paths(vec!["/health"]);

        let (status, _) = run(layer.clone(), request(None, "/health")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = run(layer, request(None, "/api/logs")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_auth_user_requires_identity() {
        let req = request(None, "/");
        let err = AuthUser::from_request_parts(&req).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_issue_then_verify_returns_actor(
            actor_id in 1i64..i64::MAX,
            secret in "[a-zA-Z0-9]{16,48}",
            other in "[a-zA-Z0-9]{16,48}",
        ) {
            let verifier = TokenVerifier::new(secret.clone());
            let token = verifier.issue(actor_id).unwrap();

            let identity = verifier.verify(&token).unwrap();
            prop_assert_eq!(identity.actor_id, actor_id);

            prop_assume!(secret != other);
            let wrong = TokenVerifier::new(other);
            prop_assert!(matches!(wrong.verify(&token), Err(CredentialError::Invalid(_))));
        }
    }
}
