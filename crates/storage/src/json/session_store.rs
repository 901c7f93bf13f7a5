use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flash_core::model::{CardResult, SessionState};
use uuid::Uuid;

use super::{io, ser};
use crate::repository::{DeckSessions, SessionStore, StorageError};

/// Stores each deck's sessions as one JSON document inside a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(io)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the sessions of `deck_title`.
    #[must_use]
    pub fn path_for(&self, deck_title: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(deck_title)))
    }

    fn read(&self, deck_title: &str) -> Result<DeckSessions, StorageError> {
        let path = self.path_for(deck_title);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(ser),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeckSessions::default()),
            Err(e) => Err(io(e)),
        }
    }

    fn write(&self, deck_title: &str, sessions: &DeckSessions) -> Result<(), StorageError> {
        let path = self.path_for(deck_title);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(sessions).map_err(ser)?;
        fs::write(&tmp, bytes).map_err(io)?;
        fs::rename(&tmp, &path).map_err(io)?;
        Ok(())
    }

    fn update(
        &self,
        deck_title: &str,
        f: impl FnOnce(&mut DeckSessions),
    ) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut sessions = self.read(deck_title)?;
        f(&mut sessions);
        self.write(deck_title, &sessions)
    }
}

impl SessionStore for JsonFileSessionStore {
    fn load(&self, deck_title: &str) -> Result<Option<SessionState>, StorageError> {
        Ok(self.read(deck_title)?.active().cloned())
    }

    fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        self.update(state.deck_title(), |sessions| sessions.save(state))?;
        tracing::debug!(
            deck = state.deck_title(),
            session_id = %state.session_id(),
            "session saved"
        );
        Ok(())
    }

    fn clear(&self, deck_title: &str) -> Result<(), StorageError> {
        if !self.path_for(deck_title).exists() {
            return Ok(());
        }
        self.update(deck_title, DeckSessions::clear)?;
        tracing::debug!(deck = deck_title, "active session cleared");
        Ok(())
    }

    fn deck_results(&self, deck_title: &str) -> Result<Vec<CardResult>, StorageError> {
        Ok(self.read(deck_title)?.graded_results())
    }
}

/// Longest stem written verbatim; file systems cap names at 255 bytes.
const MAX_STEM_LEN: usize = 120;
/// Readable prefix kept in front of the digest of an over-long stem.
const HASHED_PREFIX_LEN: usize = 80;

/// Maps a deck title to a file stem. ASCII letters, digits and `-` pass
/// through; every other byte becomes `_xx`, so distinct titles never collide.
/// Stems longer than `MAX_STEM_LEN` are cut and suffixed with `~` and a
/// name-based UUID of the full title. `~` never appears in a verbatim stem.
fn encode_key(deck_title: &str) -> String {
    let mut out = String::with_capacity(deck_title.len());
    for b in deck_title.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    if out.len() <= MAX_STEM_LEN {
        return out;
    }
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, deck_title.as_bytes()).simple();
    out.truncate(HASHED_PREFIX_LEN);
    format!("{out}~{digest}")
}
