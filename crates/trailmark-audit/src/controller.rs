//! Audit interception middleware
//!
//! [`AuditLayer`] sits between authentication and the handlers. For every
//! update or delete request it:
//!
//! 1. works out which entity and record the request targets,
//! 2. verifies the caller's bearer credential,
//! 3. loads the record as it is right now through the [`EntityRegistry`],
//! 4. lets the request run untouched,
//! 5. once the response has been fully delivered, diffs the snapshot against
//!    the submitted payload (or synthesizes the deletion marker) and hands the
//!    result to the [`AuditRecorder`].
//!
//! Any step that cannot proceed bypasses auditing for that request. Nothing in
//! this pipeline changes the status, body or latency the client observes.

use crate::diff::{deletion_changes, diff, Snapshot};
use crate::record::{AuditAction, AuditDraft};
use crate::recorder::AuditRecorder;
use crate::registry::EntityRegistry;
use http::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use trailmark_core::{BoxedNext, CompletionHandle, MiddlewareLayer, Request, Response};
use trailmark_extras::{CredentialError, TokenVerifier};

/// Routing conventions the audit layer relies on.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Prefix stripped before taking the entity segment.
    pub api_prefix: String,
    /// Zero-based index of the id segment in the full path.
    pub id_segment: usize,
    /// Paths starting with any of these are never audited.
    pub excluded_prefixes: Vec<String>,
    /// Final statuses that count as a successful mutation.
    pub success_statuses: Vec<StatusCode>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            id_segment: 2,
            excluded_prefixes: vec!["/api/users".to_string()],
            success_statuses: vec![StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT],
        }
    }
}

impl AuditConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API prefix.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Set the position of the id segment.
    pub fn id_segment(mut self, index: usize) -> Self {
        self.id_segment = index;
        self
    }

    /// Add an excluded path prefix.
    pub fn exclude(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_prefixes.push(prefix.into());
        self
    }

    /// Replace the set of success statuses.
    pub fn success_statuses(mut self, statuses: Vec<StatusCode>) -> Self {
        self.success_statuses = statuses;
        self
    }

    /// Audit action for a request method, if the method is audited at all.
    pub fn action_for(&self, method: &Method) -> Option<AuditAction> {
        match *method {
            Method::PUT | Method::PATCH => Some(AuditAction::Update),
            Method::DELETE => Some(AuditAction::Delete),
            _ => None,
        }
    }

    fn is_excluded(&self, path_and_query: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| path_and_query.starts_with(prefix.as_str()))
    }

    fn is_success(&self, status: StatusCode) -> bool {
        self.success_statuses.contains(&status)
    }
}

/// Why a request was not audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// The method is not an update or delete.
    NotAuditable,
    /// The path matches an excluded prefix.
    Excluded,
    /// No entity segment follows the API prefix.
    NoEntity,
    /// The record id is missing or not numeric.
    MalformedTargetId,
    /// No bearer credential was presented.
    MissingCredential,
    /// The credential failed verification.
    InvalidCredential,
    /// The credential has expired.
    ExpiredCredential,
    /// The entity name is not registered.
    UnresolvedEntity,
    /// The targeted record does not exist.
    MissingPriorRecord,
    /// Loading the targeted record failed.
    LookupFailed,
}

impl BypassReason {
    /// Short machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::NotAuditable => "not_auditable",
            BypassReason::Excluded => "excluded",
            BypassReason::NoEntity => "no_entity",
            BypassReason::MalformedTargetId => "malformed_target_id",
            BypassReason::MissingCredential => "missing_credential",
            BypassReason::InvalidCredential => "invalid_credential",
            BypassReason::ExpiredCredential => "expired_credential",
            BypassReason::UnresolvedEntity => "unresolved_entity",
            BypassReason::MissingPriorRecord => "missing_prior_record",
            BypassReason::LookupFailed => "lookup_failed",
        }
    }
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CredentialError> for BypassReason {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Missing => BypassReason::MissingCredential,
            CredentialError::Expired => BypassReason::ExpiredCredential,
            _ => BypassReason::InvalidCredential,
        }
    }
}

/// The entity and record a request mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditTarget {
    /// Lower-case entity name.
    pub entity_name: String,
    /// Record id.
    pub entity_id: i64,
    /// Kind of change.
    pub action: AuditAction,
}

impl AuditTarget {
    /// Work out the target of a request.
    ///
    /// Update-class requests prefer a truthy `id` in the payload and fall back
    /// to the id path segment; delete-class requests only use the path.
    pub fn extract(
        config: &AuditConfig,
        action: AuditAction,
        path: &str,
        payload: Option<&Snapshot>,
    ) -> Result<Self, BypassReason> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let rest = match path.strip_prefix(config.api_prefix.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };
        let entity_name = rest
            .split('/')
            .find(|s| !s.is_empty())
            .ok_or(BypassReason::NoEntity)?
            .to_lowercase();

        let payload_id = match action {
            AuditAction::Update => payload.and_then(|p| p.get("id")).filter(|v| is_truthy(v)),
            _ => None,
        };
        let entity_id = match payload_id {
            Some(id) => parse_leading_int(id),
            None => segments
                .get(config.id_segment)
                .and_then(|s| parse_leading_digits(s)),
        }
        .ok_or(BypassReason::MalformedTargetId)?;

        Ok(Self {
            entity_name,
            entity_id,
            action,
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Integer value of a JSON id, truncating fractions and ignoring trailing
/// garbage in strings (`"42abc"` is 42).
pub fn parse_leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => parse_leading_digits(s),
        _ => None,
    }
}

fn parse_leading_digits(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Everything captured before the handler runs.
struct Capture {
    actor_id: i64,
    target: AuditTarget,
    before: Snapshot,
    submitted: Snapshot,
    label: String,
}

impl Capture {
    fn into_draft(self) -> Option<AuditDraft> {
        let changes = match self.target.action {
            AuditAction::Delete => deletion_changes(),
            _ => diff(&self.before, &self.submitted),
        };
        if changes.is_empty() {
            return None;
        }
        Some(AuditDraft::new(
            self.actor_id,
            &self.target.entity_name,
            self.target.entity_id,
            self.target.action,
            changes,
            self.label,
        ))
    }
}

struct Inner {
    registry: EntityRegistry,
    verifier: TokenVerifier,
    recorder: AuditRecorder,
    config: AuditConfig,
}

/// Middleware that records field-level changes of mutating requests.
#[derive(Clone)]
pub struct AuditLayer {
    inner: Arc<Inner>,
}

impl AuditLayer {
    /// Create the layer from its collaborators.
    pub fn new(
        registry: EntityRegistry,
        verifier: TokenVerifier,
        recorder: AuditRecorder,
        config: AuditConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                verifier,
                recorder,
                config,
            }),
        }
    }

    /// The recorder audit records are written through.
    pub fn recorder(&self) -> &AuditRecorder {
        &self.inner.recorder
    }
}

impl Inner {
    async fn capture(&self, req: &Request) -> Result<Capture, BypassReason> {
        let action = self
            .config
            .action_for(req.method())
            .ok_or(BypassReason::NotAuditable)?;

        let label = format!("{} {}", req.method(), req.path_and_query());
        if self.config.is_excluded(req.path_and_query()) {
            return Err(BypassReason::Excluded);
        }

        let submitted = req
            .body()
            .and_then(|body| serde_json::from_slice::<Value>(body).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        let target = AuditTarget::extract(&self.config, action, req.path(), Some(&submitted))?;
        let identity = self.verifier.authenticate(req.headers())?;

        let accessor = self
            .registry
            .resolve(&target.entity_name)
            .ok_or(BypassReason::UnresolvedEntity)?;

        let before = match accessor.find_by_id(target.entity_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(BypassReason::MissingPriorRecord),
            Err(err) => {
                tracing::error!(
                    entity = %target.entity_name,
                    entity_id = target.entity_id,
                    error = %err,
                    "Failed to load record for audit"
                );
                return Err(BypassReason::LookupFailed);
            }
        };

        Ok(Capture {
            actor_id: identity.actor_id,
            target,
            before,
            submitted,
            label,
        })
    }
}

fn log_bypass(req: &Request, reason: BypassReason) {
    let method = req.method();
    let path = req.path();
    match reason {
        BypassReason::UnresolvedEntity
        | BypassReason::MissingPriorRecord
        | BypassReason::InvalidCredential => {
            tracing::warn!(%method, path, reason = %reason, "Audit bypassed");
        }
        BypassReason::LookupFailed => {
            tracing::error!(%method, path, reason = %reason, "Audit bypassed");
        }
        _ => {
            tracing::debug!(%method, path, reason = %reason, "Audit bypassed");
        }
    }
}

async fn finish(inner: Arc<Inner>, capture: Capture, status: StatusCode) {
    if !inner.config.is_success(status) {
        tracing::debug!(
            status = status.as_u16(),
            operation = %capture.label,
            "Audit capture discarded for unsuccessful response"
        );
        return;
    }

    let label = capture.label.clone();
    match capture.into_draft() {
        Some(draft) => {
            inner.recorder.record(draft).await;
        }
        None => {
            tracing::debug!(operation = %label, "No effective changes, nothing to audit");
        }
    }
}

impl MiddlewareLayer for AuditLayer {
    fn call(
        &self,
        req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let inner = self.inner.clone();

        Box::pin(async move {
            let capture = match inner.capture(&req).await {
                Ok(capture) => capture,
                Err(reason) => {
                    log_bypass(&req, reason);
                    return next(req).await;
                }
            };

            let observer = req
                .extensions()
                .get::<CompletionHandle>()
                .map(CompletionHandle::observe);

            let response = next(req).await;

            match observer {
                Some(observer) => {
                    let guard = inner.recorder.track();
                    let pipeline = inner.clone();
                    observer.on_complete(move |status| async move {
                        finish(pipeline, capture, status).await;
                        drop(guard);
                    });
                }
                None => {
                    tracing::warn!(
                        operation = %capture.label,
                        "No completion signal on request, audit capture dropped"
                    );
                }
            }

            response
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
