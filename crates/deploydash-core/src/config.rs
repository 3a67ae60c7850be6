use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// CookieConfig
// ---------------------------------------------------------------------------

/// Session cookie settings. `key` signs the cookie value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub key: String,
    pub expiry_days: u32,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// bcrypt hash (`$2b$...`).
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub usernames: BTreeMap<String, Credential>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preauthorized {
    #[serde(default)]
    pub emails: Vec<String>,
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// The dashboard's login configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub cookie: CookieConfig,
    pub credentials: Credentials,
    #[serde(default)]
    pub preauthorized: Option<Preauthorized>,
}

/// Keys that must be present, in the order they are checked.
const REQUIRED_KEYS: &[&[&str]] = &[
    &["cookie", "name"],
    &["cookie", "key"],
    &["cookie", "expiry_days"],
    &["credentials", "usernames"],
];

impl AuthConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeployError::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let config = Self::parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            users = config.credentials.usernames.len(),
            "loaded auth config"
        );
        Ok(config)
    }

    /// Parse a YAML document, reporting the first missing required key by its
    /// dotted path before attempting typed deserialization.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(text)?;

        for path in REQUIRED_KEYS {
            let mut node = &doc;
            for (depth, segment) in path.iter().enumerate() {
                if depth > 0 && !node.is_mapping() {
                    return Err(DeployError::InvalidConfig {
                        key: path[..depth].join("."),
                        reason: "expected a mapping".into(),
                    });
                }
                node = node
                    .get(*segment)
                    .ok_or_else(|| DeployError::MissingConfigKey(path.join(".")))?;
            }
        }

        if !doc["credentials"]["usernames"].is_mapping() {
            return Err(DeployError::InvalidConfig {
                key: "credentials.usernames".into(),
                reason: "expected a mapping of username to credential".into(),
            });
        }

        Ok(serde_yaml::from_value(doc)?)
    }

    pub fn credential(&self, username: &str) -> Option<&Credential> {
        self.credentials.usernames.get(username)
    }

    /// Display name for a user, falling back to the username itself.
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.credential(username)
            .and_then(|c| c.name.as_deref())
            .unwrap_or(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
cookie:
  name: deploy_auth
  key: some-signing-key
  expiry_days: 30
credentials:
  usernames:
    jsmith:
      email: jsmith@example.com
      name: John Smith
      password: "$2b$12$abcdefghijklmnopqrstuv"
preauthorized:
  emails:
    - ops@example.com
"#;

    #[test]
    fn parses_full_config() {
        let cfg = AuthConfig::parse(FULL).unwrap();
        assert_eq!(cfg.cookie.name, "deploy_auth");
        assert_eq!(cfg.cookie.expiry_days, 30);
        assert!(cfg.credential("jsmith").is_some());
        assert_eq!(cfg.display_name("jsmith"), "John Smith");
        assert_eq!(cfg.preauthorized.unwrap().emails, vec!["ops@example.com"]);
    }

    #[test]
    fn preauthorized_is_optional() {
        let text = FULL.split("preauthorized:").next().unwrap();
        let cfg = AuthConfig::parse(text).unwrap();
        assert!(cfg.preauthorized.is_none());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let text = r#"
cookie: { name: c, key: k, expiry_days: 1 }
credentials:
  usernames:
    ops: { password: "$2b$12$x" }
"#;
        let cfg = AuthConfig::parse(text).unwrap();
        assert_eq!(cfg.display_name("ops"), "ops");
    }

    #[test]
    fn each_missing_required_key_is_named() {
        let cases = [
            ("  name: deploy_auth\n", "cookie.name"),
            ("  key: some-signing-key\n", "cookie.key"),
            ("  expiry_days: 30\n", "cookie.expiry_days"),
        ];
        for (line, key) in cases {
            let text = FULL.replacen(line, "", 1);
            let err = AuthConfig::parse(&text).unwrap_err();
            match err {
                DeployError::MissingConfigKey(k) => assert_eq!(k, key),
                other => panic!("expected MissingConfigKey({key}), got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_usernames_is_named() {
        let text = r#"
cookie: { name: c, key: k, expiry_days: 1 }
credentials: {}
"#;
        let err = AuthConfig::parse(text).unwrap_err();
        assert!(matches!(err, DeployError::MissingConfigKey(k) if k == "credentials.usernames"));
    }

    #[test]
    fn missing_cookie_section_is_named() {
        let text = "credentials:\n  usernames: {}\n";
        let err = AuthConfig::parse(text).unwrap_err();
        assert!(err.to_string().contains("cookie.name"), "got: {err}");
    }

    #[test]
    fn empty_document_fails() {
        let err = AuthConfig::parse("").unwrap_err();
        assert!(matches!(err, DeployError::MissingConfigKey(_)));
    }

    #[test]
    fn cookie_must_be_mapping() {
        let text = "cookie: nope\ncredentials:\n  usernames: {}\n";
        let err = AuthConfig::parse(text).unwrap_err();
        assert!(matches!(err, DeployError::InvalidConfig { key, .. } if key == "cookie"));
    }

    #[test]
    fn malformed_yaml_carries_parser_message() {
        let err = AuthConfig::parse("cookie: [unclosed").unwrap_err();
        assert!(matches!(err, DeployError::Yaml(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn load_missing_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let err = AuthConfig::load(&path).unwrap_err();
        assert!(matches!(err, DeployError::ConfigNotFound(p) if p == path));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL).unwrap();
        let cfg = AuthConfig::load(&path).unwrap();
        assert_eq!(cfg.cookie.key, "some-signing-key");
    }
}
