//! Cookie encoding of provider sessions.
//!
//! A stored item is written as `base64-<base64url(value)>`. Values longer
//! than [`MAX_CHUNK_SIZE`] are split across `<key>.0`, `<key>.1`, … and
//! reassembled on read. The browser-side provider SDK reads the same format,
//! so the layout is fixed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cookie::Cookie;

use crate::cookies::CookieOptions;
use crate::error::Error;
use crate::types::Session;

pub const MAX_CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";
const VERIFIER_SUFFIX: &str = "-code-verifier";

/// Storage key and cookie attributes for one provider project.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    key: String,
    options: CookieOptions,
}

impl SessionStorage {
    #[must_use]
    pub fn new(key: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            key: key.into(),
            options,
        }
    }

    /// `sb-<project_ref>-auth-token`
    #[must_use]
    pub fn for_project(project_ref: &str, options: CookieOptions) -> Self {
        Self::new(format!("sb-{project_ref}-auth-token"), options)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    fn verifier_key(&self) -> String {
        format!("{}{VERIFIER_SUFFIX}", self.key)
    }

    /// Decode the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSession`] if cookies are present but do not decode.
    pub fn read_session(&self, cookies: &[Cookie<'static>]) -> Result<Option<Session>, Error> {
        let Some(raw) = read_item(&self.key, cookies)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::MalformedSession(e.to_string()))
    }

    /// Cookies that store `session`, plus removals for chunks it no longer uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the session does not serialize.
    pub fn write_session(
        &self,
        session: &Session,
        existing: &[Cookie<'static>],
    ) -> Result<Vec<Cookie<'static>>, Error> {
        let raw = serde_json::to_string(session).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(write_item(&self.key, &raw, existing, &self.options))
    }

    /// Removal cookies for every stored piece of the session.
    #[must_use]
    pub fn clear_session(&self, existing: &[Cookie<'static>]) -> Vec<Cookie<'static>> {
        item_cookie_names(&self.key, existing)
            .map(|name| self.options.removal(name))
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`Error::MalformedSession`] if the verifier cookie does not decode.
    pub fn read_code_verifier(&self, cookies: &[Cookie<'static>]) -> Result<Option<String>, Error> {
        read_item(&self.verifier_key(), cookies)
    }

    #[must_use]
    pub fn write_code_verifier(
        &self,
        verifier: &str,
        existing: &[Cookie<'static>],
    ) -> Vec<Cookie<'static>> {
        write_item(&self.verifier_key(), verifier, existing, &self.options)
    }

    #[must_use]
    pub fn clear_code_verifier(&self, existing: &[Cookie<'static>]) -> Vec<Cookie<'static>> {
        item_cookie_names(&self.verifier_key(), existing)
            .map(|name| self.options.removal(name))
            .collect()
    }
}

fn chunk_name(key: &str, index: usize) -> String {
    format!("{key}.{index}")
}

fn lookup<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value())
}

/// Names of all cookies (whole or chunked) currently holding `key`.
fn item_cookie_names<'a>(
    key: &'a str,
    cookies: &'a [Cookie<'static>],
) -> impl Iterator<Item = String> + 'a {
    cookies
        .iter()
        .filter(|c| !c.value().is_empty())
        .map(|c| c.name())
        .filter(move |name| {
            *name == key
                || name
                    .strip_prefix(key)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|index| index.parse::<usize>().is_ok())
        })
        .map(str::to_string)
}

fn read_item(key: &str, cookies: &[Cookie<'static>]) -> Result<Option<String>, Error> {
    let encoded = match lookup(cookies, key) {
        Some(whole) => whole.to_string(),
        None => {
            let chunks: Vec<&str> = (0..)
                .map_while(|index| lookup(cookies, &chunk_name(key, index)))
                .collect();
            if chunks.is_empty() {
                return Ok(None);
            }
            chunks.concat()
        }
    };
    decode_value(&encoded).map(Some)
}

fn write_item(
    key: &str,
    value: &str,
    existing: &[Cookie<'static>],
    options: &CookieOptions,
) -> Vec<Cookie<'static>> {
    let mut cookies = chunk_cookies(key, encode_value(value), options);

    let stale: Vec<Cookie<'static>> = item_cookie_names(key, existing)
        .filter(|name| cookies.iter().all(|c| c.name() != name.as_str()))
        .map(|name| options.removal(name))
        .collect();
    cookies.extend(stale);
    cookies
}

/// One cookie if `encoded` fits in [`MAX_CHUNK_SIZE`] bytes, else `key.0`, `key.1`, …
fn chunk_cookies(key: &str, encoded: String, options: &CookieOptions) -> Vec<Cookie<'static>> {
    if encoded.len() <= MAX_CHUNK_SIZE {
        return vec![options.build(key.to_string(), encoded)];
    }
    // Encoded values are ASCII, so byte chunks are valid str slices.
    encoded
        .as_bytes()
        .chunks(MAX_CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            options.build(
                chunk_name(key, index),
                String::from_utf8_lossy(chunk).into_owned(),
            )
        })
        .collect()
}

fn encode_value(value: &str) -> String {
    format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(value))
}

fn decode_value(stored: &str) -> Result<String, Error> {
    let Some(encoded) = stored.strip_prefix(BASE64_PREFIX) else {
        if stored.starts_with('{') {
            return Ok(stored.to_string());
        }
        // Raw JSON that was percent-encoded on the way into the cookie.
        return urlencoding::decode(stored)
            .map(|decoded| decoded.into_owned())
            .map_err(|e| Error::MalformedSession(e.to_string()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| Error::MalformedSession(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::MalformedSession(e.to_string()))
}
