use crate::utils::error::{PipelineError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PipelineError::invalid_value(
            field_name,
            url_str,
            "URL cannot be empty",
        ));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(PipelineError::invalid_value(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(PipelineError::invalid_value(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PipelineError::invalid_value(
            field_name,
            path,
            "Path cannot be empty",
        ));
    }

    if path.contains('\0') {
        return Err(PipelineError::invalid_value(
            field_name,
            path,
            "Path contains null bytes",
        ));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(PipelineError::invalid_value(
            field_name,
            value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

/// Per-level lists must cover every nesting level.
pub fn validate_min_len<T>(field_name: &str, values: &[T], min_len: usize) -> Result<()> {
    if values.len() < min_len {
        return Err(PipelineError::invalid_value(
            field_name,
            format!("{} entries", values.len()),
            format!("Expected at least {} entries, one per nesting level", min_len),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::invalid_value(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PipelineError::invalid_value(
            field_name,
            value.to_string(),
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("retrieval.url", "https://cds.climate.copernicus.eu/api").is_ok());
        assert!(validate_url("retrieval.url", "http://localhost:8080").is_ok());
        assert!(validate_url("retrieval.url", "").is_err());
        assert!(validate_url("retrieval.url", "invalid-url").is_err());
        assert!(validate_url("retrieval.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("execution.num_cores", 4, 1).is_ok());
        assert!(validate_positive_number("execution.num_cores", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("center.lat", 2.05, -90.0, 90.0).is_ok());
        assert!(validate_range("center.lat", 90.5, -90.0, 90.0).is_err());
        assert!(validate_range("center.lon", -180.0, -180.0, 180.0).is_ok());
    }

    #[test]
    fn test_validate_min_len() {
        assert!(validate_min_len("domain.e_we", &[50, 50], 2).is_ok());
        assert!(validate_min_len("domain.e_we", &[50], 2).is_err());
    }
}
