use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "live_poll";

/// Basic-auth pair sent with every CouchDB request.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// CouchDB user.
    pub username: String,
    /// Password of that user.
    pub password: String,
}

/// Where the CouchDB room store keeps its documents.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Base URL, without trailing slash.
    pub server: String,
    /// Database holding every room document.
    pub database: String,
    /// Sent only when both parts are configured.
    pub credentials: Option<Credentials>,
}

impl CouchConfig {
    /// Read `COUCH_BASE_URL` (required), `COUCH_DB` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server = non_blank("COUCH_BASE_URL")
            .ok_or(CouchDaoError::Unconfigured("COUCH_BASE_URL"))?
            .trim_end_matches('/')
            .to_string();
        let database = non_blank("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let credentials = non_blank("COUCH_USERNAME")
            .zip(non_blank("COUCH_PASSWORD"))
            .map(|(username, password)| Credentials { username, password });

        Ok(Self {
            server,
            database,
            credentials,
        })
    }

    pub(super) fn database_url(&self) -> String {
        format!("{}/{}", self.server, self.database)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn server_url_is_required() {
        let err = CouchConfig::from_lookup(lookup(&[("COUCH_DB", "polls")])).unwrap_err();
        assert!(matches!(err, CouchDaoError::Unconfigured("COUCH_BASE_URL")));
    }

    #[test]
    fn database_defaults_and_credentials_need_both_halves() {
        let config = CouchConfig::from_lookup(lookup(&[
            ("COUCH_BASE_URL", "http://couch:5984/"),
            ("COUCH_USERNAME", "admin"),
        ]))
        .unwrap();
        assert_eq!(config.database_url(), "http://couch:5984/live_poll");
        assert!(config.credentials.is_none());
    }
}
