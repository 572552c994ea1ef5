//! Field normalisation for raw tenant records.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn required_path(tenant: &str, field: &'static str, raw: &str) -> ConfigResult<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid_field(
            tenant,
            field,
            "must not be empty",
            Some(raw),
        ));
    }
    Ok(PathBuf::from(trimmed))
}

pub(crate) fn required_text(tenant: &str, field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid_field(
            tenant,
            field,
            "must not be empty",
            Some(raw),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trim whitespace and a single leading dot from each entry. Case is preserved.
pub(crate) fn extensions<'a, I>(tenant: &str, raw: I) -> ConfigResult<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in raw {
        let trimmed = entry.trim();
        let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if bare.is_empty() {
            return Err(ConfigError::invalid_field(
                tenant,
                "extensions",
                "entries must not be empty",
                Some(entry),
            ));
        }
        if !out.iter().any(|existing| existing == bare) {
            out.push(bare.to_string());
        }
    }
    Ok(out)
}

pub(crate) fn rename_suffix(tenant: &str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if bare.is_empty() || bare.contains(['/', '\\']) {
        return Err(ConfigError::invalid_field(
            tenant,
            "rename_suffix",
            "must name an extension",
            Some(raw),
        ));
    }
    Ok(format!(".{bare}"))
}
