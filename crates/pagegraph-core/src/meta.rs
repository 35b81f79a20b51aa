//! Page-level metadata for one build.
//!
//! The engine never reads the environment or the DOM: the caller supplies
//! a `MetaInput` once per build, it is resolved up front into a
//! `ResolvedMeta` snapshot, and that snapshot stays immutable for the
//! build's duration. Every resolver sees the same values.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use url::Url;

use crate::errors::{GraphError, GraphResult};

/// A date supplied either as an already-formatted string or as a datetime
/// to be formatted to RFC 3339.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvableDate {
    Raw(String),
    At(OffsetDateTime),
}

impl ResolvableDate {
    fn resolve(&self) -> GraphResult<String> {
        match self {
            Self::Raw(s) => Ok(s.clone()),
            Self::At(dt) => dt
                .format(&Rfc3339)
                .map_err(|e| GraphError::meta(format!("unformattable date: {e}"))),
        }
    }
}

impl From<&str> for ResolvableDate {
    fn from(s: &str) -> Self {
        Self::Raw(s.to_string())
    }
}

impl From<OffsetDateTime> for ResolvableDate {
    fn from(dt: OffsetDateTime) -> Self {
        Self::At(dt)
    }
}

/// Caller-facing page metadata. Only `host` is required; `url` wins over
/// `path` when both are given.
#[derive(Debug, Clone, Default)]
pub struct MetaInput {
    pub host: String,
    pub url: Option<String>,
    pub path: Option<String>,
    pub trailing_slash: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub currency: Option<String>,
    pub image: Option<String>,
    pub date_published: Option<ResolvableDate>,
    pub date_modified: Option<ResolvableDate>,
}

impl MetaInput {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Resolve caller input into the immutable per-build snapshot.
    pub fn resolve(self) -> GraphResult<ResolvedMeta> {
        let host_url = Url::parse(&self.host)
            .map_err(|e| GraphError::meta(format!("invalid host '{}': {e}", self.host)))?;
        let host = apply_trailing_slash(host_url.to_string(), self.trailing_slash);

        let url = match (self.url, self.path) {
            (Some(url), _) => resolve_against(&host_url, &url, self.trailing_slash)?,
            (None, Some(path)) => resolve_against(&host_url, &path, self.trailing_slash)?,
            (None, None) => host.clone(),
        };

        Ok(ResolvedMeta {
            host,
            url,
            trailing_slash: self.trailing_slash,
            title: self.title,
            description: self.description,
            language: self.language,
            currency: self.currency,
            image: self.image,
            date_published: self.date_published.map(|d| d.resolve()).transpose()?,
            date_modified: self.date_modified.map(|d| d.resolve()).transpose()?,
        })
    }
}

/// The read-mostly snapshot visible to every resolver during one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMeta {
    /// Canonical site origin, without trailing slash unless the policy
    /// requires one.
    pub host: String,
    /// Canonical page address.
    pub url: String,
    pub trailing_slash: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub currency: Option<String>,
    pub image: Option<String>,
    pub date_published: Option<String>,
    pub date_modified: Option<String>,
}

impl ResolvedMeta {
    /// Absolutize a possibly-relative address against the build's host,
    /// applying the trailing-slash policy. Already-absolute addresses only
    /// get the policy applied.
    pub fn absolutize(&self, address: &str) -> GraphResult<String> {
        let base = Url::parse(&self.host)
            .map_err(|e| GraphError::meta(format!("invalid host '{}': {e}", self.host)))?;
        resolve_against(&base, address, self.trailing_slash)
    }

    pub(crate) fn get(&self, key: MetaKey) -> Option<&str> {
        match key {
            MetaKey::Host => Some(&self.host),
            MetaKey::Url => Some(&self.url),
            MetaKey::Title => self.title.as_deref(),
            MetaKey::Description => self.description.as_deref(),
            MetaKey::Language => self.language.as_deref(),
            MetaKey::Currency => self.currency.as_deref(),
            MetaKey::Image => self.image.as_deref(),
            MetaKey::DatePublished => self.date_published.as_deref(),
            MetaKey::DateModified => self.date_modified.as_deref(),
        }
    }
}

/// The page-metadata values a node definition may inherit from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    Host,
    Url,
    Title,
    Description,
    Language,
    Currency,
    Image,
    DatePublished,
    DateModified,
}

impl MetaKey {
    /// Default node field an inherited value lands in when the definition
    /// does not rename it.
    pub fn default_field(&self) -> &'static str {
        match self {
            MetaKey::Host | MetaKey::Url => "url",
            MetaKey::Title => "name",
            MetaKey::Description => "description",
            MetaKey::Language => "inLanguage",
            MetaKey::Currency => "currency",
            MetaKey::Image => "image",
            MetaKey::DatePublished => "datePublished",
            MetaKey::DateModified => "dateModified",
        }
    }
}

fn resolve_against(base: &Url, address: &str, trailing_slash: bool) -> GraphResult<String> {
    let joined = if address.starts_with("http://") || address.starts_with("https://") {
        Url::parse(address)
            .map_err(|e| GraphError::meta(format!("invalid url '{address}': {e}")))?
    } else {
        base.join(address)
            .map_err(|e| GraphError::meta(format!("cannot join '{address}' to host: {e}")))?
    };
    Ok(apply_trailing_slash(joined.to_string(), trailing_slash))
}

fn apply_trailing_slash(mut url: String, trailing_slash: bool) -> String {
    if trailing_slash {
        if !url.ends_with('/') {
            url.push('/');
        }
    } else if let Some(stripped) = url.strip_suffix('/') {
        url = stripped.to_string();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    #[test]
    fn host_only_meta_resolves() {
        let meta = MetaInput::new("https://x.com").resolve().unwrap();
        assert_eq!(meta.host, "https://x.com");
        assert_eq!(meta.url, "https://x.com");
    }

    #[test]
    fn path_joins_onto_host() {
        let mut input = MetaInput::new("https://x.com");
        input.path = Some("/about".to_string());
        let meta = input.resolve().unwrap();
        assert_eq!(meta.url, "https://x.com/about");
    }

    #[test]
    fn explicit_url_wins_over_path() {
        let mut input = MetaInput::new("https://x.com");
        input.path = Some("/about".to_string());
        input.url = Some("https://x.com/contact".to_string());
        let meta = input.resolve().unwrap();
        assert_eq!(meta.url, "https://x.com/contact");
    }

    #[test]
    fn trailing_slash_policy_applies_to_host_and_url() {
        let mut input = MetaInput::new("https://x.com");
        input.path = Some("/about".to_string());
        input.trailing_slash = true;
        let meta = input.resolve().unwrap();
        assert_eq!(meta.host, "https://x.com/");
        assert_eq!(meta.url, "https://x.com/about/");
    }

    #[test]
    fn invalid_host_is_a_meta_error() {
        let err = MetaInput::new("not a url").resolve().unwrap_err();
        assert_matches!(err, GraphError::Meta { .. });
    }

    #[test]
    fn dates_format_to_rfc3339() {
        let mut input = MetaInput::new("https://x.com");
        input.date_published = Some(datetime!(2024-03-01 12:00 UTC).into());
        input.date_modified = Some("2024-04-01".into());
        let meta = input.resolve().unwrap();
        assert_eq!(meta.date_published.as_deref(), Some("2024-03-01T12:00:00Z"));
        assert_eq!(meta.date_modified.as_deref(), Some("2024-04-01"));
    }

    #[test]
    fn absolutize_joins_relative_addresses() {
        let meta = MetaInput::new("https://x.com").resolve().unwrap();
        assert_eq!(meta.absolutize("/logo.png").unwrap(), "https://x.com/logo.png");
        assert_eq!(
            meta.absolutize("https://cdn.x.com/a.png").unwrap(),
            "https://cdn.x.com/a.png"
        );
    }
}
