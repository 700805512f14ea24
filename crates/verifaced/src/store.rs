use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;
use veriface_core::{Embedding, EmbeddingError, IdentityRecord, EMBEDDING_DIM};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

const EMBEDDING_BYTE_LEN: usize = EMBEDDING_DIM * 4;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("embedding encryption failed")]
    EncryptionFailed,
    #[error("embedding decryption failed — key mismatch or corrupted data")]
    DecryptionFailed,
    #[error("invalid embedding blob size: {0} bytes")]
    InvalidBlob(usize),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("encryption key I/O error: {0}")]
    KeyIo(#[source] std::io::Error),
}

/// SQLite-backed identity store with AES-256-GCM embedding encryption.
///
/// One row per registered identity, keyed by the caller-assigned
/// `external_id`. Embeddings are encrypted before storage and decrypted
/// on retrieval. A per-installation 32-byte key is generated at first
/// use and stored at `{db_dir}/.key` (mode 0600).
///
/// Identification reads the whole table as a point-in-time snapshot; a
/// record registered mid-scan may or may not be included, which is
/// acceptable (eventual consistency).
#[derive(Clone)]
pub struct IdentityStore {
    conn: Connection,
    enc_key: [u8; 32],
}

impl IdentityStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let enc_key = if db_path == Path::new(":memory:") {
            // In-memory DB (tests): use a fixed all-zeros key
            [0u8; 32]
        } else {
            let key_path = db_path
                .parent()
                .unwrap_or(Path::new("/var/lib/veriface"))
                .join(".key");
            load_or_generate_key(&key_path)?
        };

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS faces (
                     id TEXT PRIMARY KEY,
                     external_id TEXT NOT NULL UNIQUE,
                     kind TEXT NOT NULL,
                     embedding BLOB NOT NULL,
                     created_at TEXT NOT NULL,
                     updated_at TEXT
                 );",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, enc_key })
    }

    /// Register an identity, replacing the embedding and kind if the
    /// `external_id` is already enrolled. Returns the row id.
    pub async fn upsert(
        &self,
        external_id: &str,
        kind: &str,
        embedding: &Embedding,
    ) -> Result<String, StoreError> {
        let blob = self.encrypt_embedding(embedding)?;
        let new_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let external_id = external_id.to_string();
        let kind = kind.to_string();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO faces (id, external_id, kind, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(external_id) DO UPDATE SET
                         kind = excluded.kind,
                         embedding = excluded.embedding,
                         updated_at = ?5",
                    rusqlite::params![new_id, external_id, kind, blob, now],
                )?;
                let id: String = conn.query_row(
                    "SELECT id FROM faces WHERE external_id = ?1",
                    [&external_id],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;

        Ok(id)
    }

    /// Read every registered identity — the identification snapshot.
    pub async fn list_all(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        // Fetch raw rows from SQLite; decrypt outside the blocking closure
        let rows: Vec<(String, String, Vec<u8>)> = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT external_id, kind, embedding FROM faces")?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (external_id, kind, blob) in rows {
            let embedding = self.decrypt_embedding(&blob)?;
            records.push(IdentityRecord {
                external_id,
                kind,
                embedding,
            });
        }
        Ok(records)
    }

    /// Remove an identity. Returns whether a row was deleted.
    pub async fn delete(&self, external_id: &str) -> Result<bool, StoreError> {
        let external_id = external_id.to_string();
        self.conn
            .call(move |conn| {
                let affected =
                    conn.execute("DELETE FROM faces WHERE external_id = ?1", [&external_id])?;
                Ok(affected > 0)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Count registered identities.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM faces", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    // ── Encryption helpers ────────────────────────────────────────────────────

    /// Encrypt an embedding with AES-256-GCM.
    ///
    /// Output: 12-byte random nonce || ciphertext || 16-byte GCM tag.
    fn encrypt_embedding(&self, embedding: &Embedding) -> Result<Vec<u8>, StoreError> {
        let plaintext = embedding_to_bytes(embedding);

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| StoreError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt an embedding blob and re-validate it strictly.
    fn decrypt_embedding(&self, blob: &[u8]) -> Result<Embedding, StoreError> {
        const NONCE_LEN: usize = 12;

        if blob.len() <= NONCE_LEN {
            return Err(StoreError::InvalidBlob(blob.len()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| StoreError::DecryptionFailed)?;

        bytes_to_embedding(&plaintext)
    }
}

// ── Key management ────────────────────────────────────────────────────────────

/// Load the encryption key from disk, or generate and persist a new one.
/// Written with mode 0600 (owner-readable only).
fn load_or_generate_key(key_path: &Path) -> Result<[u8; 32], StoreError> {
    if key_path.exists() {
        let bytes = std::fs::read(key_path).map_err(StoreError::KeyIo)?;
        if bytes.len() != 32 {
            return Err(StoreError::KeyIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "encryption key file has wrong length ({} bytes, expected 32)",
                    bytes.len()
                ),
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        tracing::debug!(path = %key_path.display(), "loaded encryption key");
        Ok(key)
    } else {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(key_path)
            .map_err(StoreError::KeyIo)?;
        f.write_all(&key).map_err(StoreError::KeyIo)?;

        tracing::info!(path = %key_path.display(), "generated new AES-256 encryption key");
        Ok(key)
    }
}

// ── Serialization helpers ─────────────────────────────────────────────────────

fn embedding_to_bytes(embedding: &Embedding) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(EMBEDDING_BYTE_LEN);
    for &v in embedding.values() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> Result<Embedding, StoreError> {
    if bytes.len() != EMBEDDING_BYTE_LEN {
        return Err(StoreError::InvalidBlob(bytes.len()));
    }

    let mut values = Vec::with_capacity(EMBEDDING_DIM);
    for chunk in bytes.chunks_exact(4) {
        let arr: [u8; 4] = chunk
            .try_into()
            .map_err(|_| StoreError::InvalidBlob(bytes.len()))?;
        values.push(f32::from_le_bytes(arr));
    }

    // Embedding::new re-checks dimension and finiteness
    Ok(Embedding::new(values)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(f: impl Fn(usize) -> f32) -> Embedding {
        Embedding::new((0..EMBEDDING_DIM).map(f).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let store = IdentityStore::open(Path::new(":memory:")).await.unwrap();

        let emb = embedding(|i| i as f32 / EMBEDDING_DIM as f32);
        let id = store.upsert("user-42", "USER", &emb).await.unwrap();
        assert!(!id.is_empty());

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, "user-42");
        assert_eq!(records[0].kind, "USER");
        assert_eq!(records[0].embedding, emb);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let store = IdentityStore::open(Path::new(":memory:")).await.unwrap();

        let first = embedding(|_| 0.25);
        let second = embedding(|i| (i as f32).sin());

        let id_a = store.upsert("admin-1", "USER", &first).await.unwrap();
        let id_b = store.upsert("admin-1", "ADMIN", &second).await.unwrap();
        // Same row retained; kind and embedding replaced
        assert_eq!(id_a, id_b);

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "ADMIN");
        assert_eq!(records[0].embedding, second);
        assert_eq!(store.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = IdentityStore::open(Path::new(":memory:")).await.unwrap();
        let emb = embedding(|_| 1.0);

        store.upsert("user-1", "USER", &emb).await.unwrap();
        assert!(store.delete("user-1").await.unwrap());
        assert!(!store.delete("user-1").await.unwrap());
        assert_eq!(store.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_byte_fidelity() {
        // Interesting values at specific positions survive the f32 trip
        let mut values = vec![0.5f32; EMBEDDING_DIM];
        values[0] = 0.0;
        values[1] = -0.0;
        values[2] = 1.0;
        values[3] = -1.0;
        values[4] = f32::MIN_POSITIVE;
        values[5] = f32::EPSILON;
        values[6] = std::f32::consts::PI;
        values[7] = 0.123456789;
        let emb = Embedding::new(values).unwrap();

        let bytes = embedding_to_bytes(&emb);
        let recovered = bytes_to_embedding(&bytes).unwrap();
        for (orig, rec) in emb.values().iter().zip(recovered.values()) {
            assert_eq!(orig.to_bits(), rec.to_bits(), "mismatch: {orig} vs {rec}");
        }
    }

    #[tokio::test]
    async fn test_rejects_truncated_blob() {
        let err = bytes_to_embedding(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidBlob(100)));
    }

    #[tokio::test]
    async fn test_encryption_roundtrip() {
        let store = IdentityStore::open(Path::new(":memory:")).await.unwrap();

        let emb = embedding(|i| i as f32 / 512.0);
        store.upsert("user-9", "USER", &emb).await.unwrap();

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        for (orig, rec) in emb.values().iter().zip(records[0].embedding.values()) {
            assert_eq!(orig.to_bits(), rec.to_bits());
        }
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        // Encrypt with one key, try to decrypt with another — must fail
        let store1 = IdentityStore {
            conn: tokio_rusqlite::Connection::open(Path::new(":memory:"))
                .await
                .unwrap(),
            enc_key: [1u8; 32],
        };
        let store2 = IdentityStore {
            conn: store1.conn.clone(),
            enc_key: [2u8; 32],
        };

        let emb = embedding(|i| i as f32 / EMBEDDING_DIM as f32);
        let blob = store1.encrypt_embedding(&emb).unwrap();
        assert!(store2.decrypt_embedding(&blob).is_err());
    }
}
