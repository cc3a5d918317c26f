//! Store operations: CRUD, transactional upsert, k-NN search

use super::schema::SqliteStore;
use super::vectors::{bytes_to_embedding, cosine_distance, embedding_to_bytes};
use super::{ChunkInput, ChunkRecord, FileInput, FileRecord, SearchResult, StoreRecord, StoreStats};
use crate::error::{LgrepError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Inner k requested before post-filtering by store, and its cap.
const OVERSAMPLE_FACTOR: usize = 10;
const MAX_INNER_K: usize = 1000;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn map_store_row(row: &Row<'_>) -> rusqlite::Result<StoreRecord> {
    Ok(StoreRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        root_path: row.get(2)?,
        embedding_provider: row.get(3)?,
        embedding_model: row.get(4)?,
        embedding_dimensions: row.get::<_, i64>(5)? as usize,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_file_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        store_id: row.get(1)?,
        external_id: row.get(2)?,
        path: row.get(3)?,
        relative_path: row.get(4)?,
        hash: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        indexed_at: row.get(7)?,
    })
}

const STORE_COLUMNS: &str = "id, name, root_path, embedding_provider, embedding_model, embedding_dimensions, created_at, updated_at";
const FILE_COLUMNS: &str =
    "id, store_id, external_id, path, relative_path, hash, file_size, indexed_at";

impl SqliteStore {
    /// Create a new store record, pinning the vector index to
    /// `dimensions` on first use. Fails on duplicate name or a
    /// dimension mismatch with the existing vector index.
    pub fn create_store(
        &self,
        name: &str,
        root_path: &str,
        provider: &str,
        model: &str,
        dimensions: usize,
    ) -> Result<StoreRecord> {
        if dimensions == 0 {
            return Err(LgrepError::InvalidInput(
                "embedding dimensions must be positive".to_string(),
            ));
        }

        let conn = self.lock()?;
        Self::ensure_vector_index(&conn, dimensions)?;

        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO stores (name, root_path, embedding_provider, embedding_model, embedding_dimensions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![name, root_path, provider, model, dimensions as i64, now],
        )?;

        let id = conn.last_insert_rowid();
        Ok(StoreRecord {
            id,
            name: name.to_string(),
            root_path: root_path.to_string(),
            embedding_provider: provider.to_string(),
            embedding_model: model.to_string(),
            embedding_dimensions: dimensions,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Look up a store by name; absent is not an error.
    pub fn get_store(&self, name: &str) -> Result<Option<StoreRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM stores WHERE name = ?1", STORE_COLUMNS),
                params![name],
                map_store_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Look up a store by id; absent is not an error.
    pub fn get_store_by_id(&self, id: i64) -> Result<Option<StoreRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM stores WHERE id = ?1", STORE_COLUMNS),
                params![id],
                map_store_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All stores, ordered by name ascending.
    pub fn list_stores(&self) -> Result<Vec<StoreRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM stores ORDER BY name", STORE_COLUMNS))?;
        let stores = stmt
            .query_map([], map_store_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stores)
    }

    /// Delete a store and everything it owns. Missing name is success.
    pub fn delete_store(&self, name: &str) -> Result<()> {
        let mut conn = self.lock()?;

        let store_id: Option<i64> = conn
            .query_row("SELECT id FROM stores WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(store_id) = store_id else {
            return Ok(());
        };

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (
                SELECT c.id FROM chunks c
                JOIN files f ON f.id = c.file_id
                WHERE f.store_id = ?1
            )",
            params![store_id],
        )?;
        // Store row cascades to files and chunks
        tx.execute("DELETE FROM stores WHERE id = ?1", params![store_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Remove all files (and their chunks/vectors) from a store while
    /// keeping the store row. `updated_at` is left unchanged.
    pub fn clear_store(&self, store_id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (
                SELECT c.id FROM chunks c
                JOIN files f ON f.id = c.file_id
                WHERE f.store_id = ?1
            )",
            params![store_id],
        )?;
        tx.execute("DELETE FROM files WHERE store_id = ?1", params![store_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Set a store's `updated_at` to now.
    pub fn update_store_timestamp(&self, store_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE stores SET updated_at = ?1 WHERE id = ?2",
            params![now_rfc3339(), store_id],
        )?;
        Ok(())
    }

    /// Atomically replace a file's chunks and vectors.
    ///
    /// Requires `chunks.len() == vectors.len()` and every vector to be
    /// exactly the store's pinned width. On any error the file's prior
    /// state is preserved.
    pub fn upsert_file(
        &self,
        store_id: i64,
        file: &FileInput,
        chunks: &[ChunkInput],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(LgrepError::InvalidInput(format!(
                "chunks and vectors count mismatch: {} != {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut conn = self.lock()?;

        let dimensions: i64 = conn
            .query_row(
                "SELECT embedding_dimensions FROM stores WHERE id = ?1",
                params![store_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LgrepError::StoreNotFound(format!("store id {}", store_id)))?;

        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions as usize {
                return Err(LgrepError::Store(format!(
                    "vector {} has width {}, store requires {}",
                    i,
                    vector.len(),
                    dimensions
                )));
            }
        }

        let tx = conn.transaction()?;
        let now = now_rfc3339();

        let existing_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM files WHERE store_id = ?1 AND external_id = ?2",
                params![store_id, file.external_id],
                |row| row.get(0),
            )
            .optional()?;

        let file_id = match existing_id {
            Some(file_id) => {
                tx.execute(
                    "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE file_id = ?1)",
                    params![file_id],
                )?;
                tx.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;
                tx.execute(
                    "UPDATE files SET path = ?1, relative_path = ?2, hash = ?3, file_size = ?4, indexed_at = ?5
                     WHERE id = ?6",
                    params![
                        file.path,
                        file.relative_path,
                        file.hash,
                        file.file_size as i64,
                        now,
                        file_id
                    ],
                )?;
                file_id
            }
            None => {
                tx.execute(
                    "INSERT INTO files (store_id, external_id, path, relative_path, hash, file_size, indexed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        store_id,
                        file.external_id,
                        file.path,
                        file.relative_path,
                        file.hash,
                        file.file_size as i64,
                        now
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            tx.execute(
                "INSERT INTO chunks (file_id, chunk_index, content, start_line, end_line)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    file_id,
                    chunk.chunk_index as i64,
                    chunk.content,
                    chunk.start_line as i64,
                    chunk.end_line as i64
                ],
            )?;
            let chunk_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?1, ?2)",
                params![chunk_id, embedding_to_bytes(vector)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a file with its chunks and vectors. Missing is success.
    pub fn delete_file(&self, store_id: i64, external_id: &str) -> Result<()> {
        let mut conn = self.lock()?;

        let file_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM files WHERE store_id = ?1 AND external_id = ?2",
                params![store_id, external_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(file_id) = file_id else {
            return Ok(());
        };

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE file_id = ?1)",
            params![file_id],
        )?;
        // File row cascades to chunks
        tx.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Point lookup by external id; absent is not an error.
    pub fn get_file_by_external_id(
        &self,
        store_id: i64,
        external_id: &str,
    ) -> Result<Option<FileRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE store_id = ?1 AND external_id = ?2",
                    FILE_COLUMNS
                ),
                params![store_id, external_id],
                map_file_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Point lookup by content hash; absent is not an error.
    pub fn get_file_by_hash(&self, store_id: i64, hash: &str) -> Result<Option<FileRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM files WHERE store_id = ?1 AND hash = ?2",
                    FILE_COLUMNS
                ),
                params![store_id, hash],
                map_file_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Files of a store, ordered by relative path ascending.
    pub fn list_files(
        &self,
        store_id: i64,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<FileRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE store_id = ?1 ORDER BY relative_path LIMIT ?2 OFFSET ?3",
            FILE_COLUMNS
        ))?;
        let files = stmt
            .query_map(
                params![
                    store_id,
                    limit.map(|l| l as i64).unwrap_or(-1),
                    offset.unwrap_or(0) as i64
                ],
                map_file_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Chunks of a file, ordered by chunk index.
    pub fn list_chunks(&self, file_id: i64) -> Result<Vec<ChunkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_id, chunk_index, content, start_line, end_line
             FROM chunks WHERE file_id = ?1 ORDER BY chunk_index",
        )?;
        let chunks = stmt
            .query_map(params![file_id], |row| {
                Ok(ChunkRecord {
                    id: row.get(0)?,
                    file_id: row.get(1)?,
                    chunk_index: row.get::<_, i64>(2)? as usize,
                    content: row.get(3)?,
                    start_line: row.get::<_, i64>(4)? as usize,
                    end_line: row.get::<_, i64>(5)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    /// k-NN cosine search within one store.
    ///
    /// The vector index ranks globally, so an over-sized inner k
    /// (`min(top_k * 10, 1000)`) is ranked first and the store filter
    /// applied afterwards, truncating to `top_k`.
    pub fn search(
        &self,
        store_id: i64,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        if !Self::has_vector_index(&conn)? {
            return Ok(Vec::new());
        }

        // Rank every stored vector by distance to the query
        let mut candidates: Vec<(i64, f64)> = {
            let mut stmt = conn.prepare("SELECT chunk_id, embedding FROM chunk_vectors")?;
            let rows = stmt.query_map([], |row| {
                let chunk_id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((chunk_id, blob))
            })?;

            let mut candidates = Vec::new();
            for row in rows {
                let (chunk_id, blob) = row?;
                let embedding = bytes_to_embedding(&blob);
                let distance = cosine_distance(query_embedding, &embedding) as f64;
                candidates.push((chunk_id, distance));
            }
            candidates
        };

        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let inner_k = (top_k * OVERSAMPLE_FACTOR).min(MAX_INNER_K);
        candidates.truncate(inner_k);

        let mut stmt = conn.prepare(&format!(
            "SELECT c.id, c.file_id, c.chunk_index, c.content, c.start_line, c.end_line,
                    {}
             FROM chunks c
             JOIN files f ON f.id = c.file_id
             WHERE c.id = ?1 AND f.store_id = ?2",
            FILE_COLUMNS
                .split(", ")
                .map(|col| format!("f.{}", col))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;

        let mut results = Vec::new();
        for (chunk_id, distance) in candidates {
            if results.len() >= top_k {
                break;
            }

            let row = stmt
                .query_row(params![chunk_id, store_id], |row| {
                    let chunk = ChunkRecord {
                        id: row.get(0)?,
                        file_id: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)? as usize,
                        content: row.get(3)?,
                        start_line: row.get::<_, i64>(4)? as usize,
                        end_line: row.get::<_, i64>(5)? as usize,
                    };
                    let file = FileRecord {
                        id: row.get(6)?,
                        store_id: row.get(7)?,
                        external_id: row.get(8)?,
                        path: row.get(9)?,
                        relative_path: row.get(10)?,
                        hash: row.get(11)?,
                        file_size: row.get::<_, i64>(12)? as u64,
                        indexed_at: row.get(13)?,
                    };
                    Ok((chunk, file))
                })
                .optional()?;

            if let Some((chunk, file)) = row {
                results.push(SearchResult {
                    chunk,
                    file,
                    distance,
                    score: 1.0 - distance,
                });
            }
        }

        Ok(results)
    }

    /// Counts and total file size for a store.
    pub fn get_stats(&self, store_id: i64) -> Result<StoreStats> {
        let conn = self.lock()?;

        let store_name: String = conn
            .query_row(
                "SELECT name FROM stores WHERE id = ?1",
                params![store_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LgrepError::StoreNotFound(format!("store id {}", store_id)))?;

        let (file_count, total_size): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM files WHERE store_id = ?1",
            params![store_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let chunk_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks c
             JOIN files f ON f.id = c.file_id
             WHERE f.store_id = ?1",
            params![store_id],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            store_id,
            store_name,
            file_count: file_count as usize,
            chunk_count: chunk_count as usize,
            total_size: total_size as u64,
        })
    }

    fn has_vector_index(conn: &Connection) -> Result<bool> {
        let exists: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'chunk_vectors'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn make_store(db: &SqliteStore, name: &str, dims: usize) -> StoreRecord {
        db.create_store(name, &format!("/tmp/{}", name), "ollama", "nomic-embed-text", dims)
            .unwrap()
    }

    fn chunk(index: usize, content: &str) -> ChunkInput {
        ChunkInput {
            content: content.to_string(),
            start_line: index * 10 + 1,
            end_line: index * 10 + 5,
            chunk_index: index,
        }
    }

    fn file_input(name: &str, hash: &str) -> FileInput {
        FileInput {
            external_id: name.to_string(),
            path: format!("/tmp/root/{}", name),
            relative_path: name.to_string(),
            hash: hash.to_string(),
            file_size: 100,
        }
    }

    #[test]
    fn test_create_and_get_store_roundtrip() {
        let db = open();
        let created = make_store(&db, "proj", 4);

        let fetched = db.get_store("proj").unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.name, "proj");
        assert_eq!(fetched.root_path, "/tmp/proj");
        assert_eq!(fetched.embedding_provider, "ollama");
        assert_eq!(fetched.embedding_dimensions, 4);
        assert_eq!(fetched.created_at, created.created_at);

        let by_id = db.get_store_by_id(created.id).unwrap().unwrap();
        assert_eq!(by_id.name, "proj");

        assert!(db.get_store("nope").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_store_name_fails() {
        let db = open();
        make_store(&db, "proj", 4);
        let err = db.create_store("proj", "/other", "ollama", "nomic-embed-text", 4);
        assert!(err.is_err());
    }

    #[test]
    fn test_dimension_mismatch_refused() {
        let db = open();
        make_store(&db, "first", 4);
        let err = db
            .create_store("second", "/tmp/second", "ollama", "other-model", 8)
            .unwrap_err();
        assert!(matches!(err, LgrepError::InvalidInput(_)));
    }

    #[test]
    fn test_zero_dimensions_refused() {
        let db = open();
        let err = db
            .create_store("bad", "/tmp/bad", "ollama", "m", 0)
            .unwrap_err();
        assert!(matches!(err, LgrepError::InvalidInput(_)));
    }

    #[test]
    fn test_list_stores_ordered_by_name() {
        let db = open();
        make_store(&db, "zeta", 4);
        make_store(&db, "alpha", 4);
        let names: Vec<String> = db.list_stores().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_upsert_file_roundtrip() {
        let db = open();
        let store = make_store(&db, "proj", 4);

        let chunks = vec![chunk(0, "first chunk"), chunk(1, "second chunk")];
        let vectors = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]];
        db.upsert_file(store.id, &file_input("a.go", "h1"), &chunks, &vectors)
            .unwrap();

        let files = db.list_files(store.id, None, None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].external_id, "a.go");
        assert_eq!(files[0].hash, "h1");

        let stored = db.list_chunks(files[0].id).unwrap();
        assert_eq!(stored.len(), 2);
        for (got, want) in stored.iter().zip(chunks.iter()) {
            assert_eq!(got.chunk_index, want.chunk_index);
            assert_eq!(got.content, want.content);
            assert_eq!(got.start_line, want.start_line);
            assert_eq!(got.end_line, want.end_line);
        }
    }

    #[test]
    fn test_upsert_replaces_old_chunks() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        let v = vec![vec![1.0, 0.0, 0.0, 0.0]];

        db.upsert_file(store.id, &file_input("a.go", "h1"), &[chunk(0, "old")], &v)
            .unwrap();
        db.upsert_file(
            store.id,
            &file_input("a.go", "h2"),
            &[chunk(0, "new a"), chunk(1, "new b")],
            &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
        )
        .unwrap();

        let files = db.list_files(store.id, None, None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hash, "h2");

        let chunks = db.list_chunks(files[0].id).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "new a");

        // Exactly one vector per chunk remains
        let stats = db.get_stats(store.id).unwrap();
        assert_eq!(stats.chunk_count, 2);
    }

    #[test]
    fn test_upsert_count_mismatch() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        let err = db
            .upsert_file(
                store.id,
                &file_input("a.go", "h1"),
                &[chunk(0, "one")],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, LgrepError::InvalidInput(_)));
    }

    #[test]
    fn test_upsert_vector_width_mismatch() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        let err = db
            .upsert_file(
                store.id,
                &file_input("a.go", "h1"),
                &[chunk(0, "one")],
                &[vec![1.0, 0.0]],
            )
            .unwrap_err();
        assert!(matches!(err, LgrepError::Store(_)));

        // Aborted upsert left no partial state
        assert!(db.list_files(store.id, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_file_idempotent_and_cascades() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        db.upsert_file(
            store.id,
            &file_input("a.go", "h1"),
            &[chunk(0, "content")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        db.delete_file(store.id, "a.go").unwrap();
        assert!(db.get_file_by_external_id(store.id, "a.go").unwrap().is_none());
        assert_eq!(db.get_stats(store.id).unwrap().chunk_count, 0);

        // Deleting again succeeds
        db.delete_file(store.id, "a.go").unwrap();
    }

    #[test]
    fn test_delete_store_removes_everything() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        db.upsert_file(
            store.id,
            &file_input("a.go", "h1"),
            &[chunk(0, "content")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        db.delete_store("proj").unwrap();
        assert!(db.get_store("proj").unwrap().is_none());

        // No orphans in any table
        let conn = db.lock().unwrap();
        let files: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        let chunks: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
            .unwrap();
        let vectors: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunk_vectors", [], |r| r.get(0))
            .unwrap();
        assert_eq!((files, chunks, vectors), (0, 0, 0));
    }

    #[test]
    fn test_delete_missing_store_is_success() {
        let db = open();
        db.delete_store("ghost").unwrap();
    }

    #[test]
    fn test_clear_store_keeps_record_and_timestamp() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        db.upsert_file(
            store.id,
            &file_input("a.go", "h1"),
            &[chunk(0, "content")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        db.clear_store(store.id).unwrap();

        let kept = db.get_store("proj").unwrap().unwrap();
        assert_eq!(kept.updated_at, store.updated_at);
        let stats = db.get_stats(store.id).unwrap();
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.chunk_count, 0);
    }

    #[test]
    fn test_get_file_by_hash() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        db.upsert_file(
            store.id,
            &file_input("a.go", "cafebabe"),
            &[chunk(0, "content")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        let found = db.get_file_by_hash(store.id, "cafebabe").unwrap().unwrap();
        assert_eq!(found.external_id, "a.go");
        assert!(db.get_file_by_hash(store.id, "deadbeef").unwrap().is_none());
    }

    #[test]
    fn test_list_files_order_and_paging() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        for name in ["c.go", "a.go", "b.go"] {
            db.upsert_file(
                store.id,
                &file_input(name, name),
                &[chunk(0, "content")],
                &[vec![1.0, 0.0, 0.0, 0.0]],
            )
            .unwrap();
        }

        let all: Vec<String> = db
            .list_files(store.id, None, None)
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(all, vec!["a.go", "b.go", "c.go"]);

        let page: Vec<String> = db
            .list_files(store.id, Some(1), Some(1))
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(page, vec!["b.go"]);
    }

    #[test]
    fn test_knn_ordering() {
        let db = open();
        let store = make_store(&db, "proj", 4);

        let inputs = [
            ("file1", vec![1.0, 0.0, 0.0, 0.0]),
            ("file2", vec![0.0, 1.0, 0.0, 0.0]),
            ("file3", vec![0.7, 0.7, 0.0, 0.0]),
        ];
        for (name, v) in &inputs {
            db.upsert_file(
                store.id,
                &file_input(name, name),
                &[chunk(0, *name)],
                &[v.clone()],
            )
            .unwrap();
        }

        let results = db.search(store.id, &[0.9, 0.1, 0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].file.external_id, "file1");

        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
            assert!(pair[0].score >= pair[1].score);
        }
        for r in &results {
            assert_eq!(r.file.store_id, store.id);
            assert!((r.score - (1.0 - r.distance)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_search_filters_by_store() {
        let db = open();
        let store_a = make_store(&db, "a", 4);
        let store_b = make_store(&db, "b", 4);

        db.upsert_file(
            store_a.id,
            &file_input("a.go", "ha"),
            &[chunk(0, "in a")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();
        db.upsert_file(
            store_b.id,
            &file_input("b.go", "hb"),
            &[chunk(0, "in b")],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        let results = db.search(store_a.id, &[1.0, 0.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file.external_id, "a.go");
    }

    #[test]
    fn test_search_respects_top_k() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        for i in 0..5 {
            db.upsert_file(
                store.id,
                &file_input(&format!("f{}.go", i), &format!("h{}", i)),
                &[chunk(0, "content")],
                &[vec![1.0, i as f32 * 0.1, 0.0, 0.0]],
            )
            .unwrap();
        }

        let results = db.search(store.id, &[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_empty_store() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        let results = db.search(store.id, &[1.0, 0.0, 0.0, 0.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_stats() {
        let db = open();
        let store = make_store(&db, "proj", 4);
        db.upsert_file(
            store.id,
            &file_input("a.go", "h1"),
            &[chunk(0, "one"), chunk(1, "two")],
            &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
        )
        .unwrap();

        let stats = db.get_stats(store.id).unwrap();
        assert_eq!(stats.store_name, "proj");
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.total_size, 100);

        let err = db.get_stats(9999).unwrap_err();
        assert!(matches!(err, LgrepError::StoreNotFound(_)));
    }
}
