//! Generation and entry operations.
//!
//! A generation is a named bucket of stored responses. Entries belong to
//! exactly one generation and disappear with it (`ON DELETE CASCADE`).

use super::connection::CacheDb;
use super::hash::compute_key_hash;
use crate::Error;
use crate::http::{RequestKey, Response, ResponseType};
use bytes::Bytes;
use std::collections::BTreeMap;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Create a generation if it doesn't exist yet.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all existing generations, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the entry for `key` in generation `name`.
    ///
    /// The generation is created if missing, so a write never fails just
    /// because the generation was not opened first.
    pub async fn put_entry(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let name = name.to_string();
        let key_hash = compute_key_hash(key);
        let method = key.method.as_str().to_string();
        let url = key.url.clone();
        let status = response.status;
        let status_text = response.status_text.clone();
        let response_type = response.response_type.as_str();
        let response_url = response.url.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, stored_at],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    generation, key_hash, method, url, status, status_text,
                    response_type, response_url, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(generation, key_hash) DO UPDATE SET
                    status = excluded.status,
                    status_text = excluded.status_text,
                    response_type = excluded.response_type,
                    response_url = excluded.response_url,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        name,
                        key_hash,
                        method,
                        url,
                        status,
                        status_text,
                        response_type,
                        response_url,
                        headers_json,
                        body,
                        stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for `key` in generation `name`.
    ///
    /// Returns None if the generation or the entry doesn't exist.
    pub async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let name = name.to_string();
        let key_hash = compute_key_hash(key);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, response_type, response_url, headers_json, body
                    FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key_hash], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                    ))
                });

                match result {
                    Ok((status, status_text, response_type, url, headers_json, body)) => {
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;
                        Ok(Some(Response {
                            status,
                            status_text,
                            response_type: ResponseType::parse(&response_type),
                            url,
                            headers,
                            body: Bytes::from(body),
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in generation `name`, sorted.
    pub async fn entry_urls(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Total number of entries across all generations.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&Url::parse(url).unwrap())
    }

    fn audio_response() -> Response {
        Response::new(200, &b"ID3\x04\x00episode-bytes"[..])
            .with_header("Content-Type", "audio/mpeg")
            .with_type(ResponseType::Cors)
            .with_url("https://cdn.example.com/song.mp3")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = audio_response();
        db.put_entry("dougcast-v1", &key("https://cdn.example.com/song.mp3"), &response)
            .await
            .unwrap();

        let stored = db
            .match_entry("dougcast-v1", &key("https://cdn.example.com/song.mp3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, response);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.match_entry("dougcast-v1", &key("https://example.com/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("dougcast-v0", &key("https://example.com/app.js"), &Response::new(200, "old"))
            .await
            .unwrap();

        let result = db.match_entry("dougcast-v1", &key("https://example.com/app.js")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let k = key("https://example.com/art.jpg");
        db.put_entry("g", &k, &Response::new(200, "first")).await.unwrap();
        db.put_entry("g", &k, &Response::new(200, "second")).await.unwrap();

        let stored = db.match_entry("g", &k).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"second"));
        assert_eq!(db.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_generation_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("old", &key("https://example.com/a"), &Response::new(200, "a"))
            .await
            .unwrap();
        db.put_entry("new", &key("https://example.com/b"), &Response::new(200, "b"))
            .await
            .unwrap();

        assert!(db.delete_generation("old").await.unwrap());
        assert!(!db.delete_generation("old").await.unwrap());
        assert_eq!(db.generation_names().await.unwrap(), vec!["new".to_string()]);
        assert_eq!(db.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_generation_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("dougcast-v1").await.unwrap();
        db.open_generation("dougcast-v1").await.unwrap();
        assert_eq!(db.generation_names().await.unwrap(), vec!["dougcast-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_entry_urls() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("g", &key("https://example.com/b"), &Response::new(200, "")).await.unwrap();
        db.put_entry("g", &key("https://example.com/a"), &Response::new(200, "")).await.unwrap();
        assert_eq!(
            db.entry_urls("g").await.unwrap(),
            vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()]
        );
    }
}
