//! Response entries stored inside a generation.
//!
//! Entries are keyed by (generation, method, normalized URL). They are never
//! mutated in place; a second put for the same key replaces the whole row.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: String,
    /// Header names with their raw value bytes, in response order.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Listing row for [`CacheDb::entry_keys`]; omits the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_type: String,
    pub size: u64,
    pub stored_at: String,
}

impl StoredEntry {
    pub fn new(
        method: &str, url: &str, status: u16, status_text: &str, response_type: &str,
        headers: Vec<(String, Vec<u8>)>, body: Vec<u8>,
    ) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            status,
            status_text: status_text.to_string(),
            response_type: response_type.to_string(),
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub(crate) fn upsert(&self, conn: &rusqlite::Connection, generation: &str) -> Result<(), Error> {
        let key = compute_cache_key(generation, &self.method, &self.url);
        let headers_json = encode_headers(&self.headers)?;
        conn.execute(
            "INSERT INTO entries (
                generation, key_hash, method, url, status, status_text,
                response_type, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(generation, key_hash) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                status_text = excluded.status_text,
                response_type = excluded.response_type,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                generation,
                key,
                &self.method,
                &self.url,
                self.status,
                &self.status_text,
                &self.response_type,
                headers_json,
                &self.body,
                &self.stored_at,
            ],
        )?;
        Ok(())
    }
}

/// Header values may carry obs-text bytes, so they are stored hex-encoded
/// inside the JSON column.
fn encode_headers(headers: &[(String, Vec<u8>)]) -> Result<String, Error> {
    let encoded: Vec<(&str, String)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), hex::encode(value)))
        .collect();
    serde_json::to_string(&encoded).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))
}

fn decode_headers(json: &str) -> Result<Vec<(String, Vec<u8>)>, String> {
    let encoded: Vec<(String, String)> = serde_json::from_str(json).map_err(|e| e.to_string())?;
    encoded
        .into_iter()
        .map(|(name, value)| {
            let bytes = hex::decode(&value).map_err(|e| format!("{name}: {e}"))?;
            Ok((name, bytes))
        })
        .collect()
}

impl CacheDb {
    /// Store `entry` in `generation`, replacing any entry with the same key.
    ///
    /// Fails if the generation does not exist (for example because a newer
    /// generation activated and deleted it in the meantime).
    pub async fn put_entry(&self, generation: &str, entry: &StoredEntry) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { entry.upsert(conn, &generation) })
            .await
            .map_err(Error::from)
    }

    /// Look up `method url` in `generation`.
    ///
    /// Returns None on a miss.
    pub async fn match_entry(&self, generation: &str, method: &str, url: &str) -> Result<Option<StoredEntry>, Error> {
        let generation = generation.to_string();
        let key = compute_cache_key(&generation, method, url);
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let row = conn
                    .query_row(
                        "SELECT method, url, status, status_text, response_type, headers_json, body, stored_at
                        FROM entries WHERE generation = ?1 AND key_hash = ?2",
                        params![generation, key],
                        |row| {
                            Ok((
                                StoredEntry {
                                    method: row.get(0)?,
                                    url: row.get(1)?,
                                    status: row.get(2)?,
                                    status_text: row.get(3)?,
                                    response_type: row.get(4)?,
                                    headers: Vec::new(),
                                    body: row.get(6)?,
                                    stored_at: row.get(7)?,
                                },
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                match row {
                    Some((mut entry, headers_json)) => {
                        entry.headers = decode_headers(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("headers of {}: {e}", entry.url)))?;
                        Ok(Some(entry))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in `generation`.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries of `generation` without bodies, ordered by URL.
    pub async fn entry_keys(&self, generation: &str) -> Result<Vec<EntrySummary>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, response_type, length(body), stored_at
                    FROM entries WHERE generation = ?1 ORDER BY url, method",
                )?;
                let rows = stmt.query_map(params![generation], |row| {
                    Ok(EntrySummary {
                        method: row.get(0)?,
                        url: row.get(1)?,
                        status: row.get(2)?,
                        response_type: row.get(3)?,
                        size: row.get::<_, i64>(4)? as u64,
                        stored_at: row.get(5)?,
                    })
                })?;
                Ok(rows.collect::<Result<_, _>>()?)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, body: &[u8]) -> StoredEntry {
        StoredEntry::new(
            "get",
            url,
            200,
            "OK",
            "basic",
            vec![("content-type".to_string(), b"text/css".to_vec())],
            body.to_vec(),
        )
    }

    async fn db_with_generation(name: &str) -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation(name).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_put_and_match_entry() {
        let db = db_with_generation("v1").await;
        let stored = entry("http://localhost:5000/a.css", b"body { }");
        db.put_entry("v1", &stored).await.unwrap();

        let found = db
            .match_entry("v1", "GET", "http://localhost:5000/a.css")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, stored);
        assert_eq!(found.method, "GET");
        assert_eq!(found.headers[0].1, b"text/css");
    }

    #[tokio::test]
    async fn test_header_bytes_survive_storage() {
        let db = db_with_generation("v1").await;
        let mut stored = entry("http://localhost:5000/a.css", b"x");
        stored.headers.push(("x-name".to_string(), vec![b'c', b'a', b'f', 0xE9]));
        db.put_entry("v1", &stored).await.unwrap();

        let found = db
            .match_entry("v1", "GET", "http://localhost:5000/a.css")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.headers, stored.headers);
        assert_eq!(found.headers[1].1, vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_decode_headers_rejects_bad_hex() {
        assert!(decode_headers(r#"[["x-name","zz"]]"#).is_err());
        assert!(decode_headers("not json").is_err());
    }

    #[tokio::test]
    async fn test_match_missing_entry() {
        let db = db_with_generation("v1").await;
        let result = db.match_entry("v1", "GET", "http://localhost:5000/nope").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_match_is_generation_scoped() {
        let db = db_with_generation("v1").await;
        db.open_generation("v2").await.unwrap();
        db.put_entry("v1", &entry("http://localhost:5000/a.css", b"x")).await.unwrap();

        assert!(
            db.match_entry("v2", "GET", "http://localhost:5000/a.css")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_put_replaces_same_key() {
        let db = db_with_generation("v1").await;
        db.put_entry("v1", &entry("http://localhost:5000/a.css", b"old")).await.unwrap();
        db.put_entry("v1", &entry("http://localhost:5000/a.css", b"new")).await.unwrap();

        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
        let found = db
            .match_entry("v1", "GET", "http://localhost:5000/a.css")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, b"new");
    }

    #[tokio::test]
    async fn test_put_into_missing_generation_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.put_entry("gone", &entry("http://localhost:5000/a.css", b"x")).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_entry_keys_listing() {
        let db = db_with_generation("v1").await;
        db.put_entry("v1", &entry("http://localhost:5000/b.js", b"12345")).await.unwrap();
        db.put_entry("v1", &entry("http://localhost:5000/a.css", b"1")).await.unwrap();

        let keys = db.entry_keys("v1").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].url, "http://localhost:5000/a.css");
        assert_eq!(keys[1].size, 5);
    }
}
