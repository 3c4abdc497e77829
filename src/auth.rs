use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use url::Url;

use crate::error::{RemedyLensError, Result};

const ACCESS_KEY_ENV: &str = "DEVELOCITY_ACCESS_KEY";
const LEGACY_ACCESS_KEY_ENV: &str = "GRADLE_ENTERPRISE_ACCESS_KEY";
const GRADLE_USER_HOME_ENV: &str = "GRADLE_USER_HOME";

/// A Develocity access key.
pub struct AccessKey(String);

impl AccessKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccessKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Resolves the access key for a server from the locations the build tools
/// maintain, later sources winning: Maven storage and Gradle user home
/// `keys.properties` files, then the `GRADLE_ENTERPRISE_ACCESS_KEY` and
/// `DEVELOCITY_ACCESS_KEY` environment variables.
///
/// A missing key is not an error (the server may allow anonymous access)
/// and unreadable key files are skipped with a warning; a malformed
/// environment variable is a configuration error.
pub fn lookup_access_key(server_url: &Url) -> Result<Option<AccessKey>> {
    let Some(host) = server_url.host_str() else {
        return Ok(None);
    };

    let mut keys_by_host = HashMap::new();

    for path in key_file_candidates() {
        match load_keys_file(&path) {
            Ok(keys) => keys_by_host.extend(keys),
            Err(e) => warn!(
                "Error reading access keys from {}: {e}. Will try fetching build data without them.",
                path.display()
            ),
        }
    }

    for env_var in [LEGACY_ACCESS_KEY_ENV, ACCESS_KEY_ENV] {
        if let Ok(value) = std::env::var(env_var) {
            keys_by_host.extend(parse_env_entries(env_var, &value)?);
        }
    }

    Ok(keys_by_host.remove(host).map(AccessKey))
}

fn key_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = dirs::home_dir() {
        for dir in [".gradle-enterprise", ".develocity"] {
            candidates.push(home.join(".m2").join(dir).join("keys.properties"));
        }
    }

    let gradle_user_home = std::env::var(GRADLE_USER_HOME_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".gradle")));
    if let Some(gradle_user_home) = gradle_user_home {
        for dir in ["enterprise", "develocity"] {
            candidates.push(gradle_user_home.join(dir).join("keys.properties"));
        }
    }

    candidates
}

fn load_keys_file(path: &Path) -> std::io::Result<HashMap<String, String>> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    Ok(parse_properties(&fs::read_to_string(path)?))
}

fn parse_properties(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            line.split_once('=')
                .map(|(host, key)| (host.trim().to_string(), key.trim().to_string()))
        })
        .collect()
}

/// Parses `host=key` entries separated by `;`, with `h1,h2=key` fanning one
/// key out to several hosts.
fn parse_env_entries(env_var: &str, value: &str) -> Result<HashMap<String, String>> {
    let mut keys = HashMap::new();
    if value.is_empty() {
        return Ok(keys);
    }

    for entry in value.split(';') {
        let (hosts, key) = entry.split_once('=').ok_or_else(|| malformed(env_var))?;
        let key = key.trim();
        if hosts.trim().is_empty() || key.is_empty() {
            return Err(malformed(env_var));
        }
        for host in hosts.split(',') {
            let host = host.trim();
            if host.is_empty() {
                return Err(malformed(env_var));
            }
            keys.insert(host.to_string(), key.to_string());
        }
    }

    Ok(keys)
}

fn malformed(env_var: &str) -> RemedyLensError {
    RemedyLensError::Config(format!(
        "Environment variable {env_var} is malformed (expected format: \
         'server-host=access-key' or 'server-host1=access-key1;server-host2=access-key2')"
    ))
}
