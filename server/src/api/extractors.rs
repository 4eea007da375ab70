//! Request extractors

use std::ops::Deref;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::types::ApiError;

/// Header set by the upstream auth proxy after session validation. This
/// service trusts it as the tenant boundary and never reads org ids from
/// request bodies.
pub const ORG_ID_HEADER: &str = "x-organization-id";

/// The authenticated organization scope of a request
#[derive(Debug, Clone)]
pub struct OrgScope(pub String);

impl<S> FromRequestParts<S> for OrgScope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ORG_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if value.is_empty() {
            return Err(ApiError::unauthorized(
                "MISSING_ORG_SCOPE",
                format!("Missing {} header", ORG_ID_HEADER),
            ));
        }
        Ok(OrgScope(value.to_string()))
    }
}

/// JSON body extractor with automatic validation.
///
/// Deserializes the body and checks its `validator` constraints, rejecting
/// with a 400 before the handler runs.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T> Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                ApiError::bad_request("JSON_PARSE_ERROR", rejection.body_text())
            })?;
        value
            .validate()
            .map_err(|errors| {
                ApiError::bad_request("VALIDATION_ERROR", format_validation_errors(&errors))
            })?;
        Ok(Self(value))
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    #[tokio::test]
    async fn present_header_is_extracted() {
        let request = Request::builder()
            .header(ORG_ID_HEADER, "org-42")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let scope = OrgScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(scope.0, "org-42");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let result = OrgScope::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
    }

    #[derive(Debug, serde::Deserialize, Validate)]
    struct Probe {
        #[validate(range(min = 1, max = 10, message = "count must be 1-10"))]
        count: i32,
    }

    fn json_request(body: &str) -> Request<axum::body::Body> {
        Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn validated_json_accepts_valid_body() {
        let result = ValidatedJson::<Probe>::from_request(json_request(r#"{"count": 3}"#), &())
            .await
            .unwrap();
        assert_eq!(result.count, 3);
    }

    #[tokio::test]
    async fn validated_json_rejects_out_of_range() {
        let result =
            ValidatedJson::<Probe>::from_request(json_request(r#"{"count": 99}"#), &()).await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn validated_json_rejects_malformed_body() {
        let result = ValidatedJson::<Probe>::from_request(json_request("not json"), &()).await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }
}
