//! Client for the external AI enhancement webhook.
//!
//! The webhook receives the source image as base64 together with the style
//! name and product metadata, and answers with the enhanced image.

pub mod api;

pub use api::{EnhanceApi, EnhanceApiError, EnhanceRequest, ProductInfo};
