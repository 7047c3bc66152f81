use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use url::Url;

/// Prefix of file references handed to us by the upload collaborator
pub const UPLOAD_PREFIX: &str = "/uploads/";

/// Validate that a string is a valid URL with http or https scheme
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    // Only allow http and https schemes
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!(
            "URL must use http or https scheme, got: {}",
            url.scheme()
        ));
    }

    // Must have a host
    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a host"));
    }

    Ok(url)
}

/// Validate a certificate/image reference: either an external http(s) URL or a
/// path under the local upload directory.
pub fn validate_attachment(reference: &str) -> Result<()> {
    if let Some(name) = reference.strip_prefix(UPLOAD_PREFIX) {
        if name.is_empty() || name.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(anyhow!("Invalid upload reference: {}", reference));
        }
        return Ok(());
    }

    validate_url(reference).map(|_| ())
}

/// Reject missing or whitespace-only values
pub fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} is required", field));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| anyhow!("Invalid email address"))?;

    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(anyhow!("Invalid email address"));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(anyhow!("Password must be at least 8 characters"));
    }
    Ok(())
}

pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(anyhow!("End date cannot be before start date"));
        }
    }
    Ok(())
}
