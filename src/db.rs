use crate::error::StoreError;
use crate::models::{ContractRow, PoolCreationRecord};
use rusqlite::{params, Connection, ErrorCode};
use std::sync::{Mutex, MutexGuard};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS contracts (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  contract_address TEXT UNIQUE NOT NULL,
  creator_address  TEXT NOT NULL,
  transaction_hash TEXT UNIQUE NOT NULL,
  block_number     INTEGER NOT NULL,
  symbol           TEXT NOT NULL,
  bytecode         BLOB NOT NULL,
  total_supply     TEXT NOT NULL, -- U256 stored as decimal string
  decimals         INTEGER NOT NULL,
  blacklisted      INTEGER NOT NULL DEFAULT 0,
  created_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_contracts_creator ON contracts (creator_address);

CREATE TABLE IF NOT EXISTS pools (
  id                   INTEGER PRIMARY KEY AUTOINCREMENT,
  exchange             TEXT NOT NULL,
  created_coin_address TEXT NOT NULL,
  backing_coin_address TEXT NOT NULL,
  pool_address         TEXT NOT NULL,
  transaction_hash     TEXT,
  block_number         INTEGER,
  log_index            INTEGER,
  created_at           TEXT NOT NULL DEFAULT (datetime('now')),
  UNIQUE(exchange, created_coin_address, backing_coin_address)
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

fn insert_error(e: rusqlite::Error, what: String) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Duplicate(what)
        }
        other => StoreError::Sqlite(other),
    }
}

/// SQLite integers are signed; anything above i64::MAX is refused, not wrapped.
fn sql_int(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(format!("{} {}", what, value)))
}

/// Durable store shared by every task. Uniqueness is enforced by the schema.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = connect(path)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Plain insert: a repeated address or transaction hash is reported as
    /// `StoreError::Duplicate` and leaves the existing row untouched.
    pub fn insert_contract(&self, row: &ContractRow, bytecode: &[u8]) -> Result<(), StoreError> {
        let block_number = sql_int(row.block_number, "block number")?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO contracts (
                contract_address, creator_address, transaction_hash,
                block_number, symbol, bytecode,
                total_supply, decimals, blacklisted, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                row.contract_address,
                row.creator_address,
                row.transaction_hash,
                block_number,
                row.symbol,
                bytecode,
                row.total_supply,
                row.decimals,
                row.blacklisted,
                row.discovered_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            insert_error(
                e,
                format!("contract {} (tx {})", row.contract_address, row.transaction_hash),
            )
        })?;
        Ok(())
    }

    pub fn insert_pool(&self, pool: &PoolCreationRecord) -> Result<(), StoreError> {
        let block_number = pool
            .block_number
            .map(|n| sql_int(n, "block number"))
            .transpose()?;
        let log_index = pool
            .log_index
            .map(|n| sql_int(n, "log index"))
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO pools (
                exchange, created_coin_address, backing_coin_address,
                pool_address, transaction_hash, block_number, log_index
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                pool.exchange,
                pool.created_coin.to_checksum(None),
                pool.backing_coin.to_checksum(None),
                pool.pool.to_checksum(None),
                pool.transaction_hash.map(|h| h.to_string()),
                block_number,
                log_index,
            ],
        )
        .map_err(|e| insert_error(e, format!("{} pool {}", pool.exchange, pool.pool)))?;
        Ok(())
    }

    pub fn contract_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM contracts", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    pub fn pool_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM pools", [], |r| r.get(0))?;
        Ok(n as u64)
    }
}
