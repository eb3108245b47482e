// src/verification.rs

//! Webcam verification captures: a selfie plus a photo of the surroundings, sent as base64
//! (optionally as a `data:image/...;base64,` URL).

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use thiserror::Error;

use crate::config::MAX_CAPTURE_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Both selfie and environment images are required.")]
    Missing,
    #[error("{0} image is not valid base64")]
    Encoding(&'static str),
    #[error("{0} image exceeds the {1} byte limit")]
    TooLarge(&'static str, usize),
    #[error("{0} image is not a JPEG, PNG or WebP")]
    UnsupportedFormat(&'static str),
}

#[derive(Debug, Deserialize)]
pub struct PhotoPair {
    #[serde(default)]
    pub selfie: String,
    #[serde(default)]
    pub environment: String,
}

/// A capture that passed validation, re-encoded for storage.
#[derive(Debug, Clone)]
pub struct ValidatedCapture {
    pub format: ImageFormat,
    pub bytes: usize,
    pub data_url: String,
}

#[derive(Debug, Clone)]
pub struct ValidatedPair {
    pub selfie: ValidatedCapture,
    pub environment: ValidatedCapture,
}

impl PhotoPair {
    pub fn validate(&self) -> Result<ValidatedPair, CaptureError> {
        if self.selfie.trim().is_empty() || self.environment.trim().is_empty() {
            return Err(CaptureError::Missing);
        }
        Ok(ValidatedPair {
            selfie: decode_capture("selfie", &self.selfie)?,
            environment: decode_capture("environment", &self.environment)?,
        })
    }
}

fn decode_capture(label: &'static str, raw: &str) -> Result<ValidatedCapture, CaptureError> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };

    // Base64 inflates by 4/3; reject before decoding anything huge.
    if payload.len() / 4 * 3 > MAX_CAPTURE_BYTES + 3 {
        return Err(CaptureError::TooLarge(label, MAX_CAPTURE_BYTES));
    }

    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|_| CaptureError::Encoding(label))?;

    if decoded.is_empty() {
        return Err(CaptureError::Missing);
    }
    if decoded.len() > MAX_CAPTURE_BYTES {
        return Err(CaptureError::TooLarge(label, MAX_CAPTURE_BYTES));
    }

    let format = sniff_format(&decoded).ok_or(CaptureError::UnsupportedFormat(label))?;

    Ok(ValidatedCapture {
        format,
        bytes: decoded.len(),
        data_url: format!("data:{};base64,{}", format.mime(), STANDARD.encode(&decoded)),
    })
}

fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}
