//! Session identity: a stable pseudo-random token correlating all turns of
//! one conversation with the remote agent.
//!
//! The id is persisted on disk (two small files under the store directory)
//! so it survives restarts until its 72-hour expiry. Within the validity
//! window `get_or_create` is idempotent and performs no write.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

/// Session lifetime before a fresh id is minted.
pub const SESSION_TTL_HOURS: i64 = 72;

const ID_FILE: &str = "session_id";
const EXPIRY_FILE: &str = "session_expiry";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_RANDOM_LEN: usize = 9;

/// Mint a new id: `user-` followed by 9 random lowercase base36 characters.
pub fn new_session_id<R: Rng>(rng: &mut R) -> String {
    let mut id = String::with_capacity(5 + ID_RANDOM_LEN);
    id.push_str("user-");
    for _ in 0..ID_RANDOM_LEN {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    id
}

/// File-backed session store scoped to one client installation.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `~/.voice-agent/` (or the working directory if no home
    /// directory is available).
    pub fn default_location() -> Self {
        let dir = dirs::home_dir()
            .map(|h| h.join(".voice-agent"))
            .unwrap_or_else(|| PathBuf::from(".voice-agent"));
        Self::new(dir)
    }

    /// Return the persisted id if it is still valid, otherwise mint a new
    /// one and persist it with expiry `now + 72h`.
    ///
    /// If the store cannot be written, the freshly minted id is returned
    /// for this call only rather than failing the conversation.
    pub fn get_or_create<R: Rng>(&self, now_ms: i64, rng: &mut R) -> String {
        if let (Some(id), Some(expiry)) = (self.read_id(), self.read_expiry()) {
            if now_ms <= expiry {
                debug!("Reusing session id {id} (expires in {}h)", (expiry - now_ms) / 3_600_000);
                return id;
            }
        }

        let id = new_session_id(rng);
        let expiry = now_ms + SESSION_TTL_HOURS * 3_600_000;

        if let Err(e) = self.persist(&id, expiry) {
            warn!("Session store unavailable ({e}), using in-memory id for this run");
        }
        id
    }

    /// Convenience wrapper over the wall clock and thread RNG.
    pub fn get_or_create_session_id(&self) -> String {
        self.get_or_create(chrono::Utc::now().timestamp_millis(), &mut rand::thread_rng())
    }

    fn read_id(&self) -> Option<String> {
        let id = fs::read_to_string(self.dir.join(ID_FILE)).ok()?;
        let id = id.trim().to_string();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    fn read_expiry(&self) -> Option<i64> {
        fs::read_to_string(self.dir.join(EXPIRY_FILE))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    fn persist(&self, id: &str, expiry_ms: i64) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(ID_FILE), id)?;
        fs::write(self.dir.join(EXPIRY_FILE), expiry_ms.to_string())?;
        debug!("Persisted session id {id} to {}", self.dir.display());
        Ok(())
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;

    fn temp_store(tag: &str) -> SessionStore {
        let dir = std::env::temp_dir().join(format!(
            "voice-agent-session-test-{}-{tag}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        SessionStore::new(dir)
    }

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    fn assert_id_shape(id: &str) {
        let suffix = id.strip_prefix("user-").expect("missing user- prefix");
        assert_eq!(suffix.len(), 9);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn mints_id_with_expected_shape() {
        let id = new_session_id(&mut rng());
        assert_id_shape(&id);
    }

    #[test]
    fn reuses_valid_id_without_write() {
        let store = temp_store("reuse");
        let now = 1_000_000;
        let first = store.get_or_create(now, &mut rng());

        // Second read within the window returns the same id and does not
        // touch the expiry file.
        let expiry_before = fs::read_to_string(store.dir().join(EXPIRY_FILE)).unwrap();
        let second = store.get_or_create(now + 1_000, &mut StepRng::new(7, 13));
        let expiry_after = fs::read_to_string(store.dir().join(EXPIRY_FILE)).unwrap();

        assert_eq!(first, second);
        assert_eq!(expiry_before, expiry_after);
    }

    #[test]
    fn expired_id_is_replaced() {
        let store = temp_store("expired");
        let now = 1_000_000;
        let first = store.get_or_create(now, &mut rng());

        let later = now + (SESSION_TTL_HOURS * 3_600_000) + 1;
        let second = store.get_or_create(later, &mut rand::rngs::StdRng::seed_from_u64(7));

        assert_ne!(first, second);
        assert_id_shape(&second);

        let expiry: i64 = fs::read_to_string(store.dir().join(EXPIRY_FILE))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(expiry, later + SESSION_TTL_HOURS * 3_600_000);
    }

    #[test]
    fn unavailable_store_yields_in_memory_id() {
        // Point the store at a path that cannot be a directory.
        let file = std::env::temp_dir().join(format!(
            "voice-agent-session-test-{}-blocker",
            std::process::id()
        ));
        fs::write(&file, "not a directory").unwrap();

        let store = SessionStore::new(file.join("nested"));
        let id = store.get_or_create(1_000_000, &mut rng());
        assert_id_shape(&id);
    }
}
