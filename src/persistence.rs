//! Persistence sink for dispersed data blocks, fragments, and node status.
//!
//! Grounded on the teacher's `database.rs` (rusqlite, schema-on-open) and on
//! the original's `core/Database.go`, whose `StoreDataBlock` deletes any
//! existing row by hash before inserting — the idempotency contract this
//! trait documents.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DfsResult;
use crate::models::{DataBlock, Fragment, NodeMetadata};

/// Storage sink for the dispersal protocol's receiving side.
///
/// `store_block` / `store_fragment` must be idempotent: storing the same
/// hash twice must not create duplicate rows or error.
pub trait StorageSink: Send + Sync {
    fn store_block(&self, block: &DataBlock) -> DfsResult<()>;
    fn get_block(&self, hash: &str) -> DfsResult<Option<DataBlock>>;
    fn delete_block(&self, hash: &str) -> DfsResult<()>;

    fn store_fragment(&self, fragment: &Fragment) -> DfsResult<()>;
    fn get_fragments(&self, hash: &str) -> DfsResult<Vec<Fragment>>;
    fn delete_fragments(&self, hash: &str) -> DfsResult<()>;

    fn upsert_node(&self, node: &NodeMetadata) -> DfsResult<()>;
}

/// `rusqlite`-backed implementation, the teacher crate's persistence engine
/// of choice.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> DfsResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let sink = SqliteSink {
            conn: Mutex::new(conn),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    pub fn open_in_memory() -> DfsResult<Self> {
        let conn = Connection::open_in_memory()?;
        let sink = SqliteSink {
            conn: Mutex::new(conn),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    fn init_schema(&self) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS data_blocks (
                hash TEXT PRIMARY KEY,
                cipher TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fragments (
                hash TEXT NOT NULL,
                x INTEGER NOT NULL,
                share TEXT NOT NULL,
                threshold INTEGER NOT NULL,
                total INTEGER NOT NULL,
                PRIMARY KEY (hash, x)
            );
            CREATE TABLE IF NOT EXISTS nodes (
                node_id TEXT PRIMARY KEY,
                address TEXT NOT NULL,
                status TEXT NOT NULL,
                storage_used INTEGER NOT NULL,
                last_ping TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl StorageSink for SqliteSink {
    fn store_block(&self, block: &DataBlock) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO data_blocks (hash, cipher) VALUES (?1, ?2)
             ON CONFLICT(hash) DO UPDATE SET cipher = excluded.cipher",
            params![block.hash, block.cipher],
        )?;
        Ok(())
    }

    fn get_block(&self, hash: &str) -> DfsResult<Option<DataBlock>> {
        let conn = self.conn.lock().unwrap();
        let block = conn
            .query_row(
                "SELECT hash, cipher FROM data_blocks WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok(DataBlock {
                        hash: row.get(0)?,
                        cipher: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(block)
    }

    fn delete_block(&self, hash: &str) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM data_blocks WHERE hash = ?1", params![hash])?;
        Ok(())
    }

    fn store_fragment(&self, fragment: &Fragment) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO fragments (hash, x, share, threshold, total) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(hash, x) DO UPDATE SET share = excluded.share",
            params![
                fragment.hash,
                fragment.x,
                fragment.share,
                fragment.threshold,
                fragment.total
            ],
        )?;
        Ok(())
    }

    fn get_fragments(&self, hash: &str) -> DfsResult<Vec<Fragment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT hash, share, x, threshold, total FROM fragments WHERE hash = ?1 ORDER BY x",
        )?;
        let fragments = stmt
            .query_map(params![hash], |row| {
                Ok(Fragment {
                    hash: row.get(0)?,
                    share: row.get(1)?,
                    x: row.get(2)?,
                    threshold: row.get(3)?,
                    total: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fragments)
    }

    fn delete_fragments(&self, hash: &str) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM fragments WHERE hash = ?1", params![hash])?;
        Ok(())
    }

    fn upsert_node(&self, node: &NodeMetadata) -> DfsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO nodes (node_id, address, status, storage_used, last_ping)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(node_id) DO UPDATE SET
                address = excluded.address,
                status = excluded.status,
                storage_used = excluded.storage_used,
                last_ping = excluded.last_ping",
            params![
                node.node_id,
                node.address,
                node.status,
                node.storage_used,
                node.last_ping.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storing_a_block_twice_is_idempotent() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let block = DataBlock {
            hash: "hash-a".into(),
            cipher: "Y2lwaGVy".into(),
        };
        sink.store_block(&block).unwrap();
        sink.store_block(&block).unwrap();

        assert_eq!(sink.get_block("hash-a").unwrap(), Some(block));
    }

    #[test]
    fn fragments_roundtrip_by_hash() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let fragment = Fragment {
            hash: "hash-b".into(),
            share: "c2hhcmU".into(),
            x: 1,
            threshold: 3,
            total: 5,
        };
        sink.store_fragment(&fragment).unwrap();
        sink.store_fragment(&fragment).unwrap();

        let fragments = sink.get_fragments("hash-b").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0], fragment);
    }
}
