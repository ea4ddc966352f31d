use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use chrono::Utc;

use crate::models::PaymentProof;

const ALLOWED: &[(&str, &[&str])] = &[
    ("jpeg", &["image/jpeg", "image/jpg"]),
    ("jpg", &["image/jpeg", "image/jpg"]),
    ("png", &["image/png"]),
    ("pdf", &["application/pdf"]),
];

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("only .jpeg, .jpg, .png and .pdf files are allowed")]
    UnsupportedType,

    #[error("file data is not valid base64")]
    InvalidEncoding,

    #[error("file is empty")]
    Empty,

    #[error("file exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Returns the lowercased extension when both it and the content type are on
/// the allow list and agree with each other.
pub fn check_type(filename: &str, content_type: &str) -> Result<String, ProofError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or(ProofError::UnsupportedType)?;
    let content_type = content_type.trim().to_lowercase();

    ALLOWED
        .iter()
        .find(|(allowed_ext, types)| *allowed_ext == ext && types.contains(&content_type.as_str()))
        .map(|_| ext)
        .ok_or(ProofError::UnsupportedType)
}

pub fn decode(data: &str, max_bytes: usize) -> Result<Vec<u8>, ProofError> {
    // accept data URLs as sent by a browser FileReader
    let encoded = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };

    // base64 inflates by 4/3, so anything this long can't fit
    if encoded.len() / 4 * 3 > max_bytes + 3 {
        return Err(ProofError::TooLarge(max_bytes));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| ProofError::InvalidEncoding)?;

    if bytes.is_empty() {
        return Err(ProofError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ProofError::TooLarge(max_bytes));
    }
    Ok(bytes)
}

/// Writes the proof under `<upload_dir>/payment-proofs/` and returns its record.
pub async fn store(
    upload_dir: &str,
    booking_id: &str,
    ext: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<PaymentProof, ProofError> {
    let dir = PathBuf::from(upload_dir).join("payment-proofs");
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let now = Utc::now();
    let filename = format!(
        "payment-proof-{}-{}.{ext}",
        now.timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    );
    let path = dir.join(&filename);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(booking_id = %booking_id, path = %path.display(), size = bytes.len(), "payment proof stored");

    Ok(PaymentProof {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        filename,
        path: path.to_string_lossy().into_owned(),
        content_type: content_type.trim().to_lowercase(),
        size_bytes: bytes.len() as i64,
        uploaded_at: now,
    })
}
