//! Request body extractors
//!
//! These wrap axum's own extractors so that malformed bodies are answered
//! with the API's JSON error body instead of axum's plain-text rejections.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request};
use axum::http::{header::CONTENT_TYPE, request::Parts};
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// JSON body extractor with API error rejections
///
/// Usage:
/// ```rust,ignore
/// pub async fn create_nota(ApiJson(request): ApiJson<CreateNotaRequest>) -> ApiResult<...> {
///     request.validate()?;
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path parameter extractor with API error rejections
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Id inválido: {}", e.body_text())))?;
        Ok(Self(value))
    }
}

/// Query string extractor with API error rejections
#[derive(Debug, Clone, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Body sent either as `multipart/form-data` or as JSON
///
/// Multipart text fields become JSON strings. File fields become
/// `data:<mime>;base64,...` URLs so that uploads are stored inline; empty
/// file inputs are skipped. The collected fields then deserialize into `T`
/// exactly like a JSON body would.
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
            return Ok(Self(value));
        }

        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e.body_text())))?;
        let fields = collect_multipart(multipart).await?;

        serde_json::from_value(Value::Object(fields))
            .map(Self)
            .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e)))
    }
}

async fn collect_multipart(mut multipart: Multipart) -> Result<Map<String, Value>, ApiError> {
    let mut fields = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e.body_text())))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if field.file_name().is_some() {
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::bad_request(format!("Archivo inválido: {}", e.body_text()))
            })?;
            if !bytes.is_empty() {
                fields.insert(name, Value::String(data_url(&mime, &bytes)));
            }
        } else {
            let text = field.text().await.map_err(|e| {
                ApiError::bad_request(format!("Formulario inválido: {}", e.body_text()))
            })?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok(fields)
}

/// Encode an uploaded file as an inline `data:` URL
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}
