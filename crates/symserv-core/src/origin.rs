//! Component A: the ordered, read-only registry of symbol origins.

/// Whether an origin can be hit directly over HTTP or requires signed
/// object-storage requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

/// One configured symbol source.
#[derive(Debug, Clone)]
pub struct Origin {
    pub base_url: String,
    pub access: Access,
    pub region: Option<String>,
    pub endpoint_override: Option<String>,
}

impl Origin {
    pub fn public(base_url: impl Into<String>) -> Self {
        Origin {
            base_url: base_url.into(),
            access: Access::Public,
            region: None,
            endpoint_override: None,
        }
    }

    pub fn private(base_url: impl Into<String>) -> Self {
        Origin {
            base_url: base_url.into(),
            access: Access::Private,
            region: None,
            endpoint_override: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// The S3 bucket name for a private origin. `base_url` may be a bare
    /// bucket name or a full endpoint URL with the bucket as its first path
    /// segment (e.g. `http://localstack:4572/testbucket`).
    pub fn bucket_name(&self) -> Option<String> {
        if self.access != Access::Private {
            return None;
        }
        match self.base_url.find("://") {
            Some(idx) => self.base_url[idx + 3..]
                .split('/')
                .nth(1)
                .map(str::to_string),
            None => Some(self.base_url.clone()),
        }
    }

    /// The S3-compatible endpoint to use, if `base_url` embeds one and no
    /// explicit override was configured.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint_override.clone().or_else(|| {
            let idx = self.base_url.find("://")?;
            let after_scheme = &self.base_url[idx + 3..];
            let host = after_scheme.split('/').next()?;
            Some(format!("{}://{host}", &self.base_url[..idx]))
        })
    }

    /// Parses one entry of `SYMBOL_URLS`: a bare URL is private by default;
    /// appending `?access=public` marks it public, mirroring Tecken's
    /// `SYMBOL_URLS` convention ("By default, each URL is assumed to be
    /// private! ... add '?access=public' to the URL.").
    pub fn parse(entry: &str) -> Origin {
        let entry = entry.trim();
        match entry.split_once('?') {
            Some((base, query)) if query_marks_public(query) => Origin::public(base),
            _ => Origin::private(entry),
        }
    }
}

fn query_marks_public(query: &str) -> bool {
    query
        .split('&')
        .any(|pair| pair.eq_ignore_ascii_case("access=public"))
}

/// Immutable, ordered list of [`Origin`]s. Callers iterate it in priority
/// order; the first origin to report presence short-circuits the probe.
#[derive(Debug, Clone)]
pub struct OriginRegistry {
    origins: Vec<Origin>,
}

impl OriginRegistry {
    pub fn new(origins: Vec<Origin>) -> Self {
        OriginRegistry { origins }
    }

    /// Parses a comma-separated `SYMBOL_URLS`-style string.
    pub fn from_env_value(value: &str) -> Self {
        let origins = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Origin::parse)
            .collect();
        OriginRegistry::new(origins)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Origin)> {
        self.origins.iter().enumerate()
    }

    pub fn get(&self, index: usize) -> Option<&Origin> {
        self.origins.get(index)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}
