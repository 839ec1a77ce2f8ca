//! HTTP client for the enhancement webhook.
//!
//! Request: `POST <webhook url>` with
//! `{image_data, style_name, product_info: {name, brand, description}}`.
//! Response: JSON carrying the result under `image` (top level or inside
//! `data`), or a bare base64 text body. Either form may use a
//! `data:image/...;base64,` prefix.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

/// Product metadata forwarded to the webhook.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductInfo {
    pub name: String,
    pub brand: String,
    pub description: String,
}

/// Webhook request body.
#[derive(Debug, Clone, Serialize)]
pub struct EnhanceRequest {
    /// Source image, base64 without a data-URL prefix.
    pub image_data: String,
    pub style_name: String,
    pub product_info: ProductInfo,
}

impl EnhanceRequest {
    pub fn new(image: &[u8], style_name: impl Into<String>, product_info: ProductInfo) -> Self {
        Self {
            image_data: STANDARD.encode(image),
            style_name: style_name.into(),
            product_info,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnhanceApiError {
    /// Network, DNS, TLS or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The webhook answered with a non-2xx status.
    #[error("Enhancement webhook error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The body did not contain an image.
    #[error("Invalid webhook response: {0}")]
    InvalidResponse(String),

    #[error("Invalid base64 image: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Longest response body kept in an [`EnhanceApiError::ApiError`].
const MAX_ERROR_BODY: usize = 512;

/// Client for one enhancement webhook.
pub struct EnhanceApi {
    client: reqwest::Client,
    webhook_url: String,
}

impl EnhanceApi {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, EnhanceApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, webhook_url))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Send an image for enhancement and return the enhanced image bytes.
    pub async fn enhance(&self, request: &EnhanceRequest) -> Result<Vec<u8>, EnhanceApiError> {
        tracing::debug!(
            url = %self.webhook_url,
            style = %request.style_name,
            image_len = request.image_data.len(),
            "Calling enhancement webhook",
        );

        let response = self
            .client
            .post(&self.webhook_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        decode_response_body(&body)
    }

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EnhanceApiError> {
        let status = response.status();
        if !status.is_success() {
            let mut body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(EnhanceApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Extract the enhanced image from a webhook response body.
pub fn decode_response_body(body: &str) -> Result<Vec<u8>, EnhanceApiError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(EnhanceApiError::InvalidResponse("empty body".into()));
    }

    let encoded = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) if value.is_object() => {
            let image = value
                .get("image")
                .or_else(|| value.get("data").and_then(|data| data.get("image")))
                .and_then(|image| image.as_str())
                .ok_or_else(|| {
                    EnhanceApiError::InvalidResponse("JSON response has no 'image' field".into())
                })?;
            image.to_string()
        }
        Ok(serde_json::Value::String(image)) => image,
        _ => trimmed.to_string(),
    };

    decode_base64_image(&encoded)
}

/// Decode base64 image data, accepting an optional data-URL prefix.
pub fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, EnhanceApiError> {
    let payload = match encoded.trim().split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded.trim(),
    };
    let bytes = STANDARD.decode(payload)?;
    if bytes.is_empty() {
        return Err(EnhanceApiError::InvalidResponse("image is empty".into()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const PIXELS: &[u8] = b"\x89PNG fake image bytes";

    #[test]
    fn request_encodes_image_and_metadata() {
        let request = EnhanceRequest::new(
            PIXELS,
            "luxury",
            ProductInfo {
                name: "Ring".into(),
                brand: "Aurum".into(),
                description: String::new(),
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["style_name"], "luxury");
        assert_eq!(json["product_info"]["brand"], "Aurum");
        assert_eq!(STANDARD.decode(json["image_data"].as_str().unwrap()).unwrap(), PIXELS);
    }

    #[test]
    fn decodes_json_image_field() {
        let body = serde_json::json!({ "image": STANDARD.encode(PIXELS) }).to_string();
        assert_eq!(decode_response_body(&body).unwrap(), PIXELS);
    }

    #[test]
    fn decodes_nested_data_url() {
        let body = serde_json::json!({
            "data": { "image": format!("data:image/png;base64,{}", STANDARD.encode(PIXELS)) }
        })
        .to_string();
        assert_eq!(decode_response_body(&body).unwrap(), PIXELS);
    }

    #[test]
    fn decodes_raw_base64_body() {
        let body = format!("{}\n", STANDARD.encode(PIXELS));
        assert_eq!(decode_response_body(&body).unwrap(), PIXELS);
    }

    #[test]
    fn json_without_image_is_invalid() {
        let err = decode_response_body(r#"{"status":"ok"}"#).unwrap_err();
        assert_matches!(err, EnhanceApiError::InvalidResponse(_));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert_matches!(
            decode_response_body("not base64 at all!"),
            Err(EnhanceApiError::Decode(_))
        );
        assert_matches!(
            decode_response_body("   "),
            Err(EnhanceApiError::InvalidResponse(_))
        );
    }
}
