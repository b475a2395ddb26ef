//! Username/password pairs for basic authentication.
//!
//! Credentials never live in source. They are passed explicitly, read from
//! `EARTHDATA_USERNAME` / `EARTHDATA_PASSWORD`, or looked up in the user's
//! `.netrc` (the location can be overridden with `NETRC`).

use log::debug;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const USERNAME_VAR: &str = "EARTHDATA_USERNAME";
pub const PASSWORD_VAR: &str = "EARTHDATA_PASSWORD";
const NETRC_VAR: &str = "NETRC";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Environment variable {0} is set but {1} is not")]
    PartialEnvironment(&'static str, &'static str),

    #[error("Failed to read netrc file '{0}'")]
    NetrcRead(PathBuf, #[source] std::io::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Reads `EARTHDATA_USERNAME` and `EARTHDATA_PASSWORD`. Returns `Ok(None)`
    /// when neither is set.
    pub fn from_env() -> Result<Option<Self>, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, CredentialsError> {
        match (lookup(USERNAME_VAR), lookup(PASSWORD_VAR)) {
            (Some(user), Some(pass)) => Ok(Some(Self::new(user, pass))),
            (Some(_), None) => Err(CredentialsError::PartialEnvironment(
                USERNAME_VAR,
                PASSWORD_VAR,
            )),
            (None, Some(_)) => Err(CredentialsError::PartialEnvironment(
                PASSWORD_VAR,
                USERNAME_VAR,
            )),
            (None, None) => Ok(None),
        }
    }

    pub fn netrc_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(NETRC_VAR) {
            return Some(PathBuf::from(path));
        }
        let file = if cfg!(windows) { "_netrc" } else { ".netrc" };
        dirs::home_dir().map(|home| home.join(file))
    }

    /// Looks up `host` in the user's netrc. A missing file is not an error.
    pub fn from_netrc(host: &str) -> Result<Option<Self>, CredentialsError> {
        let Some(path) = Self::netrc_path() else {
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Self::from_netrc_str(&contents, host)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No netrc file at {:?}", path);
                Ok(None)
            }
            Err(e) => Err(CredentialsError::NetrcRead(path, e)),
        }
    }

    /// Parses netrc text; a `machine` entry for `host` wins over `default`.
    pub fn from_netrc_str(contents: &str, host: &str) -> Option<Self> {
        #[derive(Default)]
        struct Entry {
            login: Option<String>,
            password: Option<String>,
        }

        let mut matched: Option<Entry> = None;
        let mut fallback: Option<Entry> = None;
        // 0: ignore, 1: the requested machine, 2: default
        let mut target = 0u8;

        let mut tokens = contents.split_whitespace();
        while let Some(token) = tokens.next() {
            match token {
                "machine" => {
                    let name = tokens.next().unwrap_or_default();
                    target = if name.eq_ignore_ascii_case(host) && matched.is_none() {
                        matched = Some(Entry::default());
                        1
                    } else {
                        0
                    };
                }
                "default" => {
                    target = 2;
                    fallback = Some(Entry::default());
                }
                "login" | "password" | "account" => {
                    let value = tokens.next().map(str::to_string);
                    let entry = match target {
                        1 => matched.as_mut(),
                        2 => fallback.as_mut(),
                        _ => None,
                    };
                    if let Some(entry) = entry {
                        match token {
                            "login" => entry.login = value,
                            "password" => entry.password = value,
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        matched
            .or(fallback)
            .and_then(|e| Some(Self::new(e.login?, e.password?)))
    }

    /// Environment first, then netrc.
    pub fn discover(host: &str) -> Result<Option<Self>, CredentialsError> {
        if let Some(found) = Self::from_env()? {
            return Ok(Some(found));
        }
        Self::from_netrc(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NETRC: &str = "
machine example.org login someone password elsewhere
machine urs.earthdata.nasa.gov
    login earthuser
    password s3cret
default login anonymous password guest
";

    #[test]
    fn netrc_prefers_matching_machine() {
        let creds = Credentials::from_netrc_str(NETRC, "urs.earthdata.nasa.gov").unwrap();
        assert_eq!(creds.username(), "earthuser");
        assert_eq!(creds.password(), "s3cret");
    }

    #[test]
    fn netrc_falls_back_to_default_entry() {
        let creds = Credentials::from_netrc_str(NETRC, "data.example.net").unwrap();
        assert_eq!(creds.username(), "anonymous");
    }

    #[test]
    fn netrc_without_match_or_default_yields_nothing() {
        let text = "machine example.org login a password b";
        assert!(Credentials::from_netrc_str(text, "urs.earthdata.nasa.gov").is_none());
        assert!(Credentials::from_netrc_str("machine x login only", "x").is_none());
    }

    #[test]
    fn debug_output_hides_the_password() {
        let printed = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn environment_needs_both_variables() {
        let vars: HashMap<&str, &str> = [(USERNAME_VAR, "u")].into();
        let err = Credentials::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, CredentialsError::PartialEnvironment(USERNAME_VAR, _)));

        let vars: HashMap<&str, &str> = [(USERNAME_VAR, "u"), (PASSWORD_VAR, "p")].into();
        let creds = Credentials::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(creds, Credentials::new("u", "p"));

        assert!(Credentials::from_lookup(|_| None).unwrap().is_none());
    }
}
