use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rand::Rng;
use rand::seq::IndexedRandom as _;
use serde::{Deserialize, Serialize};

const ADJECTIVES: [&str; 10] = [
    "Calm", "Clever", "Brave", "Mystic", "Quiet", "Wise", "Sharp", "Bold", "Swift", "Happy",
];
const NOUNS: [&str; 10] = [
    "Trader", "Analyst", "Investor", "Observer", "Broker", "Shark", "Owl", "Fox", "Lion", "Eagle",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    /// Whether the name is stored on disk and will survive a restart.
    pub persisted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    anonymous_user: String,
}

pub fn generate_anonymous_name<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Calm");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Trader");
    let number: u16 = rng.random_range(100..1000);
    format!("{adjective}{noun}{number}")
}

/// Remembers the anonymous display name between runs.
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: any problem with the file falls back to a name that only
    /// lives for this session.
    pub fn load_or_create(&self) -> Identity {
        match std::fs::read(&self.path) {
            Ok(bytes) => match parse(&bytes) {
                Some(name) => {
                    return Identity {
                        name,
                        persisted: true,
                    };
                }
                None => {
                    tracing::warn!(
                        path = %self.path.display(),
                        "identity file is malformed; using a temporary name"
                    );
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let name = generate_anonymous_name(&mut rand::rng());
                return match self.write(&name) {
                    Ok(()) => {
                        tracing::info!(path = %self.path.display(), %name, "created anonymous identity");
                        Identity {
                            name,
                            persisted: true,
                        }
                    }
                    Err(err) => {
                        tracing::warn!("could not store identity: {err:#}; using a temporary name");
                        Identity {
                            name,
                            persisted: false,
                        }
                    }
                };
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "identity file unreadable; using a temporary name"
                );
            }
        }
        Identity {
            name: generate_anonymous_name(&mut rand::rng()),
            persisted: false,
        }
    }

    fn write(&self, name: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let body = serde_json::to_vec_pretty(&IdentityFile {
            anonymous_user: name.to_string(),
        })
        .context("serialize identity")?;
        std::fs::write(&self.path, body).with_context(|| format!("write {}", self.path.display()))
    }
}

fn parse(bytes: &[u8]) -> Option<String> {
    let file: IdentityFile = serde_json::from_slice(bytes).ok()?;
    let name = file.anonymous_user.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn generated_names_follow_the_pattern() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let name = generate_anonymous_name(&mut rng);
            let digits: String = name.chars().rev().take(3).collect();
            assert!(digits.chars().all(|c| c.is_ascii_digit()), "{name}");
            assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)), "{name}");
        }
    }

    #[test]
    fn created_once_then_reused() {
        let tmp = tempdir().unwrap();
        let store = IdentityStore::new(tmp.path().join("nested/identity.json"));
        let first = store.load_or_create();
        assert!(first.persisted);
        let second = store.load_or_create();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_file_is_left_alone() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("identity.json");
        std::fs::write(&path, "{not json").unwrap();
        let identity = IdentityStore::new(&path).load_or_create();
        assert!(!identity.persisted);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn unwritable_location_falls_back_to_ephemeral() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let identity = IdentityStore::new(blocker.join("identity.json")).load_or_create();
        assert!(!identity.persisted);
        assert!(!identity.name.is_empty());
    }
}
