use crate::error::LoadError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where a config document comes from. An `http://` / `https://` prefix
/// selects HTTP; anything else is a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Http(String),
}

impl Source {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        let lower = t.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Http(t.to_string())
        } else {
            Source::File(PathBuf::from(t))
        }
    }

    pub async fn fetch(&self, timeout: Duration) -> Result<String, LoadError> {
        match self {
            Source::File(p) => {
                tokio::fs::read_to_string(p)
                    .await
                    .map_err(|e| LoadError::SourceFetch {
                        source_name: self.to_string(),
                        detail: e.to_string(),
                    })
            }
            Source::Http(url) => fetch_http(url, timeout).await.map_err(|detail| {
                LoadError::SourceFetch {
                    source_name: self.to_string(),
                    detail,
                }
            }),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(p) => write!(f, "{}", p.display()),
            Source::Http(u) => f.write_str(u),
        }
    }
}

async fn fetch_http(url: &str, timeout: Duration) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| format!("no pude crear cliente HTTP: {e}"))?;

    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status()));
    }
    resp.text().await.map_err(|e| e.to_string())
}
