//! Extractors for trailmark
//!
//! Extractors automatically parse data from incoming requests.

use crate::error::{ApiError, Result};
use crate::request::Request;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::str::FromStr;

/// Trait for extracting data from request parts (headers, path, query)
///
/// This is used for extractors that don't need the request body.
pub trait FromRequestParts: Sized {
    /// Extract from request parts
    fn from_request_parts(req: &Request) -> Result<Self>;
}

/// Trait for extracting data from the full request (including body)
///
/// This is used for extractors that consume the request body.
pub trait FromRequest: Sized {
    /// Extract from the full request
    fn from_request(req: &mut Request) -> impl Future<Output = Result<Self>> + Send;
}

// Blanket impl: FromRequestParts -> FromRequest
impl<T: FromRequestParts + Send> FromRequest for T {
    async fn from_request(req: &mut Request) -> Result<Self> {
        T::from_request_parts(req)
    }
}

/// JSON body extractor
///
/// Parses the request body as JSON and deserializes into type `T`. Also
/// usable as a handler return type (200 OK, `application/json`).
///
/// # Example
///
/// ```rust,ignore
/// async fn create_widget(Json(body): Json<NewWidget>) -> impl IntoResponse {
///     // body is already deserialized
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned + Send> FromRequest for Json<T> {
    async fn from_request(req: &mut Request) -> Result<Self> {
        let body = req
            .take_body()
            .ok_or_else(|| ApiError::internal("Body already consumed"))?;

        let value: T = serde_json::from_slice(&body)?;
        Ok(Json(value))
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Query string extractor
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct Pagination {
///     limit: Option<usize>,
///     offset: Option<usize>,
/// }
///
/// async fn list(Query(page): Query<Pagination>) -> impl IntoResponse { /* ... */ }
/// ```
#[derive(Debug, Clone)]
pub struct Query<T>(pub T);

impl<T: DeserializeOwned> FromRequestParts for Query<T> {
    fn from_request_parts(req: &Request) -> Result<Self> {
        let query = req.query_string().unwrap_or("");
        let value: T = serde_urlencoded::from_str(query)
            .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e)))?;
        Ok(Query(value))
    }
}

impl<T> Deref for Query<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Single path parameter extractor
///
/// For a route `/widgets/{id}`:
///
/// ```rust,ignore
/// async fn get_widget(Path(id): Path<i64>) -> impl IntoResponse { /* ... */ }
/// ```
///
/// Routes with more than one parameter use [`PathParams`].
#[derive(Debug, Clone)]
pub struct Path<T>(pub T);

impl<T: FromStr> FromRequestParts for Path<T>
where
    T::Err: std::fmt::Display,
{
    fn from_request_parts(req: &Request) -> Result<Self> {
        let params = req.path_params();
        if params.len() > 1 {
            return Err(ApiError::internal(
                "Path<T> used on a route with several parameters; use PathParams",
            ));
        }

        let (name, value) = params
            .iter()
            .next()
            .ok_or_else(|| ApiError::internal("Missing path parameter"))?;

        value
            .parse::<T>()
            .map(Path)
            .map_err(|e| ApiError::bad_request(format!("Invalid path parameter '{}': {}", name, e)))
    }
}

impl<T> Deref for Path<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// All path parameters of the matched route, looked up by name
#[derive(Debug, Clone, Default)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Raw value of a parameter
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse a parameter, failing with 400 when it is missing or malformed
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self
            .raw(name)
            .ok_or_else(|| ApiError::bad_request(format!("Missing path parameter '{}'", name)))?;
        raw.parse::<T>()
            .map_err(|e| ApiError::bad_request(format!("Invalid path parameter '{}': {}", name, e)))
    }
}

impl FromRequestParts for PathParams {
    fn from_request_parts(req: &Request) -> Result<Self> {
        Ok(PathParams(req.path_params().clone()))
    }
}

/// Shared application state registered with [`App::state`](crate::App::state)
#[derive(Debug, Clone)]
pub struct State<T>(pub T);

impl<T: Clone + Send + Sync + 'static> FromRequestParts for State<T> {
    fn from_request_parts(req: &Request) -> Result<Self> {
        req.state().get::<T>().cloned().map(State).ok_or_else(|| {
            ApiError::internal(format!(
                "State of type {} is not registered",
                std::any::type_name::<T>()
            ))
        })
    }
}

impl<T> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
