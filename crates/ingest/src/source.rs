use crate::error::FetchError;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const DRIVE_HOSTS: &[&str] = &["drive.google.com", "docs.google.com"];
const DRIVE_SCHEME_PREFIX: &str = "gdrive:";

/// Where an artifact's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Local(PathBuf),
    Http(Url),
    /// Cloud-drive document that needs a resolve step before bytes can be streamed.
    Drive { file_id: String },
}

impl SourceSpec {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Http(_) => "http",
            Self::Drive { .. } => "drive",
        }
    }

    #[must_use]
    pub const fn is_remote(&self) -> bool {
        !matches!(self, Self::Local(_))
    }
}

impl FromStr for SourceSpec {
    type Err = FetchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FetchError::InvalidSource(
                "source must not be empty".to_string(),
            ));
        }

        if let Some(id) = raw.strip_prefix(DRIVE_SCHEME_PREFIX) {
            return drive_from_id(id, raw);
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(raw)
                .map_err(|err| FetchError::InvalidSource(format!("{raw}: {err}")))?;
            let is_drive = url
                .host_str()
                .is_some_and(|host| DRIVE_HOSTS.contains(&host));
            if !is_drive {
                return Ok(Self::Http(url));
            }
            return match drive_file_id(&url) {
                Some(id) => drive_from_id(&id, raw),
                None => Err(FetchError::InvalidSource(format!(
                    "{raw}: cloud-drive link does not carry a file id"
                ))),
            };
        }

        if let Some(path) = raw.strip_prefix("file://") {
            return Ok(Self::Local(PathBuf::from(path)));
        }

        Ok(Self::Local(PathBuf::from(raw)))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Http(url) => write!(f, "{url}"),
            Self::Drive { file_id } => write!(f, "{DRIVE_SCHEME_PREFIX}{file_id}"),
        }
    }
}

fn drive_from_id(id: &str, raw: &str) -> Result<SourceSpec, FetchError> {
    let id = id.trim();
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(FetchError::InvalidSource(format!(
            "{raw}: invalid cloud-drive file id"
        )));
    }
    Ok(SourceSpec::Drive {
        file_id: id.to_string(),
    })
}

// Share links come as `/file/d/<id>/view`, `/open?id=<id>` or `/uc?id=<id>&export=download`.
fn drive_file_id(url: &Url) -> Option<String> {
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
        return Some(id.into_owned());
    }
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "d" {
            return segments.next().map(str::to_string);
        }
    }
    None
}
