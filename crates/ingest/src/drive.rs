use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const DEFAULT_DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc";

static CONFIRM_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"confirm=([0-9A-Za-z_\-]+)").expect("valid regex"));
static CONFIRM_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"name="confirm"\s+value="([0-9A-Za-z_\-]+)""#).expect("valid regex")
});
static UUID_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"name="uuid"\s+value="([0-9A-Za-z_\-]+)""#).expect("valid regex")
});

/// Token pair scraped from the "file too large to scan" interstitial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfirmToken {
    pub confirm: String,
    pub uuid: Option<String>,
}

pub(crate) fn parse_confirm_token(html: &str) -> Option<ConfirmToken> {
    let confirm = CONFIRM_INPUT
        .captures(html)
        .or_else(|| CONFIRM_QUERY.captures(html))
        .map(|caps| caps[1].to_string())?;
    let uuid = UUID_INPUT.captures(html).map(|caps| caps[1].to_string());
    Some(ConfirmToken { confirm, uuid })
}

pub(crate) fn download_query(file_id: &str, token: Option<&ConfirmToken>) -> Vec<(String, String)> {
    let mut query = vec![
        ("export".to_string(), "download".to_string()),
        ("id".to_string(), file_id.to_string()),
    ];
    if let Some(token) = token {
        query.push(("confirm".to_string(), token.confirm.clone()));
        if let Some(uuid) = &token.uuid {
            query.push(("uuid".to_string(), uuid.clone()));
        }
    }
    query
}

/// Final cache location for a resolved drive download.
#[must_use]
pub fn cache_path(cache_dir: &Path, file_id: &str) -> PathBuf {
    cache_dir.join(format!("drive-{file_id}.bin"))
}

pub(crate) fn partial_path(cache_dir: &Path, file_id: &str) -> PathBuf {
    cache_dir.join(format!("drive-{file_id}.part"))
}
