// src/policy.rs
//
// Authorization rules. Each rule is a plain predicate over the request
// method, the (optional) requester and, at object level, the author of the
// targeted object. Rules attached to one operation are combined with AND.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::{Role, User},
};

/// Identity and standing of the user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub username: String,
    pub role: Role,
    /// Operator flag.
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&User> for Requester {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}

/// `GET`, `HEAD` and `OPTIONS` never modify state.
pub fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// An authorization rule.
pub trait Permission: Send + Sync {
    /// Collection-level check, before any object is loaded.
    fn has_permission(&self, method: &Method, requester: Option<&Requester>) -> bool;

    /// Object-level check against the author of the targeted object.
    fn has_object_permission(
        &self,
        _method: &Method,
        _requester: Option<&Requester>,
        _author_id: i64,
    ) -> bool {
        true
    }
}

/// Any authenticated requester.
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn has_permission(&self, _method: &Method, requester: Option<&Requester>) -> bool {
        requester.is_some()
    }
}

/// Reads for everyone, writes for authenticated requesters.
pub struct IsAuthenticatedOrReadOnly;

impl Permission for IsAuthenticatedOrReadOnly {
    fn has_permission(&self, method: &Method, requester: Option<&Requester>) -> bool {
        is_read_only(method) || requester.is_some()
    }
}

/// Reads for everyone, writes for admins only.
pub struct AdminOrReadOnly;

impl Permission for AdminOrReadOnly {
    fn has_permission(&self, method: &Method, requester: Option<&Requester>) -> bool {
        is_read_only(method) || requester.is_some_and(|r| r.role.is_admin())
    }
}

/// Admins and operators (staff) only, whatever the method.
pub struct AdminOnly;

impl Permission for AdminOnly {
    fn has_permission(&self, _method: &Method, requester: Option<&Requester>) -> bool {
        requester.is_some_and(|r| r.role.is_admin() || r.is_staff)
    }
}

/// Reads for everyone; changes to an object for its author, moderators,
/// admins and superusers.
pub struct AuthorModeratorAdminOrReadOnly;

impl Permission for AuthorModeratorAdminOrReadOnly {
    fn has_permission(&self, method: &Method, requester: Option<&Requester>) -> bool {
        is_read_only(method) || requester.is_some()
    }

    fn has_object_permission(
        &self,
        method: &Method,
        requester: Option<&Requester>,
        author_id: i64,
    ) -> bool {
        if is_read_only(method) {
            return true;
        }
        requester
            .is_some_and(|r| r.id == author_id || r.role.can_moderate() || r.is_superuser)
    }
}

/// Denial for `requester`: 401 when anonymous, 403 otherwise.
fn deny(requester: Option<&Requester>) -> AppError {
    match requester {
        None => AppError::AuthError("Authentication credentials were not provided.".to_string()),
        Some(_) => {
            AppError::Forbidden("You do not have permission to perform this action.".to_string())
        }
    }
}

/// Evaluates every rule at collection level.
pub fn check(
    rules: &[&dyn Permission],
    method: &Method,
    requester: Option<&Requester>,
) -> Result<(), AppError> {
    if rules.iter().all(|rule| rule.has_permission(method, requester)) {
        Ok(())
    } else {
        Err(deny(requester))
    }
}

/// Evaluates every rule at object level, for an object written by `author_id`.
pub fn check_object(
    rules: &[&dyn Permission],
    method: &Method,
    requester: Option<&Requester>,
    author_id: i64,
) -> Result<(), AppError> {
    if rules
        .iter()
        .all(|rule| rule.has_object_permission(method, requester, author_id))
    {
        Ok(())
    } else {
        Err(deny(requester))
    }
}

fn authorize(rules: &[&dyn Permission], req: &Request<Body>) -> Result<(), AppError> {
    check(rules, req.method(), req.extensions().get::<Requester>())
}

/// Axum Middleware: `AdminOrReadOnly`.
///
/// Must be used AFTER `authenticate`, which injects the `Requester`.
pub async fn admin_or_read_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    authorize(&[&AdminOrReadOnly], &req)?;
    Ok(next.run(req).await)
}

/// Axum Middleware: `IsAuthenticated` AND `AdminOnly`.
pub async fn admin_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    authorize(&[&IsAuthenticated, &AdminOnly], &req)?;
    Ok(next.run(req).await)
}

/// Axum Middleware: `IsAuthenticated`.
pub async fn authenticated(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    authorize(&[&IsAuthenticated], &req)?;
    Ok(next.run(req).await)
}

/// Axum Middleware: `IsAuthenticatedOrReadOnly` AND `AuthorModeratorAdminOrReadOnly`
/// at collection level. Handlers run the object-level half.
pub async fn author_or_read_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    authorize(
        &[&IsAuthenticatedOrReadOnly, &AuthorModeratorAdminOrReadOnly],
        &req,
    )?;
    Ok(next.run(req).await)
}

/// Authenticated requester extractor. Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Requester);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Requester>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| deny(None))
    }
}
