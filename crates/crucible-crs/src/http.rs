//! Conditional HTTP GET for remote `repo.db.gz` revalidation (spec §4.C, §6.4).

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::error::{Error, Result};

pub enum FetchOutcome {
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
        cache_control: Option<String>,
    },
    Fetched {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
        cache_control: Option<String>,
    },
}

pub fn conditional_get(
    client: &Client,
    url: &str,
    prior_etag: Option<&str>,
    prior_last_modified: Option<&str>,
) -> Result<FetchOutcome> {
    let mut req = client.get(url).header("Accept", "application/gzip");
    if let Some(etag) = prior_etag {
        req = req.header("If-None-Match", etag);
    }
    if let Some(lm) = prior_last_modified {
        req = req.header("If-Modified-Since", lm);
    }

    let response = req
        .send()
        .map_err(|source| Error::Network {
            url: url.to_owned(),
            source,
        })?;

    let headers = response.headers().clone();
    let etag = headers
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let last_modified = headers
        .get("last-modified")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let cache_control = headers
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if response.status() == StatusCode::NOT_MODIFIED {
        return Ok(FetchOutcome::NotModified {
            etag,
            last_modified,
            cache_control,
        });
    }

    if !response.status().is_success() {
        return Err(Error::HttpError {
            url: url.to_owned(),
            status: response.status().as_u16(),
            status_message: response
                .status()
                .canonical_reason()
                .unwrap_or("unknown")
                .to_owned(),
        });
    }

    let body = response
        .bytes()
        .map_err(|source| Error::Network {
            url: url.to_owned(),
            source,
        })?
        .to_vec();

    Ok(FetchOutcome::Fetched {
        body,
        etag,
        last_modified,
        cache_control,
    })
}

/// Parses `max-age=N` out of a `Cache-Control` header value.
pub fn max_age_seconds(cache_control: &str) -> Option<i64> {
    if cache_control.contains("no-cache") {
        return None;
    }
    cache_control.split(',').find_map(|directive| {
        let directive = directive.trim();
        directive
            .strip_prefix("max-age=")
            .and_then(|n| n.parse::<i64>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_max_age() {
        assert_eq!(max_age_seconds("public, max-age=3600"), Some(3600));
    }

    #[test]
    fn no_cache_overrides_max_age() {
        assert_eq!(max_age_seconds("no-cache, max-age=3600"), None);
    }

    #[test]
    fn missing_directive_is_none() {
        assert_eq!(max_age_seconds("public"), None);
    }
}
