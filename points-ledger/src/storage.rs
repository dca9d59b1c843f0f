//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `aggregates` - Balance aggregates (key: user_id)
//! - `entries` - Append-only ledger entries (key: entry_id, UUIDv7)
//! - `indices` - Secondary index user_id -> entry ids, in creation order
//!
//! Every balance change commits the mutated aggregate, the new entry, and
//! its index row in a single `WriteBatch`, so a reader can never observe a
//! balance without its ledger entry or vice versa.

use crate::{
    error::{Error, Result},
    types::{
        BalanceAggregate, Direction, HistoryPage, HistoryQuery, LedgerEntry, LedgerTotals, UserId,
    },
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction as IterDirection,
    IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_AGGREGATES: &str = "aggregates";
const CF_ENTRIES: &str = "entries";
const CF_INDICES: &str = "indices";

/// Separator between the user id and the entry id in index keys.
/// The engine rejects user ids containing NUL, so the prefix is unambiguous.
const INDEX_SEPARATOR: u8 = 0;

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy entry log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_AGGREGATES, Self::cf_options_aggregates()),
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_aggregates() -> Options {
        let mut opts = Options::default();
        // Aggregates are read on every call, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Aggregate operations

    /// Get a user's balance aggregate, if one exists
    pub fn get_aggregate(&self, user_id: &UserId) -> Result<Option<BalanceAggregate>> {
        let cf = self.cf_handle(CF_AGGREGATES)?;

        match self.db.get_cf(cf, user_id.as_bytes())? {
            Some(value) => {
                let aggregate: BalanceAggregate = bincode::deserialize(&value)?;
                Ok(Some(aggregate))
            }
            None => Ok(None),
        }
    }

    /// Put a balance aggregate (outside an entry commit; first-write only)
    pub fn put_aggregate(&self, aggregate: &BalanceAggregate) -> Result<()> {
        let cf = self.cf_handle(CF_AGGREGATES)?;
        let value = bincode::serialize(aggregate)?;
        self.db.put_cf(cf, aggregate.user_id.as_bytes(), &value)?;
        Ok(())
    }

    // Entry operations

    /// Get entry by ID
    pub fn get_entry(&self, entry_id: Uuid) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let value = self
            .db
            .get_cf(cf, entry_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("entry {}", entry_id)))?;

        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Commit a balance change: mutated aggregate + new entry + index (atomic)
    pub fn append_entry_atomic(
        &self,
        aggregate: &BalanceAggregate,
        entry: &LedgerEntry,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Aggregate
        let cf_aggregates = self.cf_handle(CF_AGGREGATES)?;
        let aggregate_value = bincode::serialize(aggregate)?;
        batch.put_cf(cf_aggregates, aggregate.user_id.as_bytes(), &aggregate_value);

        // 2. Entry
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let entry_value = bincode::serialize(entry)?;
        batch.put_cf(cf_entries, entry.entry_id.as_bytes(), &entry_value);

        // 3. Index: user_id || SEP || entry_id -> empty
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let index_key = Self::index_key(&entry.user_id, Some(entry.entry_id));
        batch.put_cf(cf_indices, &index_key, &[]);

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            entry_id = %entry.entry_id,
            user_id = %entry.user_id,
            direction = %entry.direction,
            amount = entry.amount,
            "Ledger entry committed"
        );

        Ok(())
    }

    /// All of a user's entries, in creation order
    ///
    /// UUIDv7 entry ids sort chronologically, so a forward scan over the
    /// user's index prefix yields creation order.
    pub fn entries_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let prefix = Self::index_key(user_id, None);
        let iter = self.db.iterator_cf(
            cf_indices,
            IteratorMode::From(prefix.as_slice(), IterDirection::Forward),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;

            if !key.starts_with(&prefix) {
                break;
            }

            // Entry id is the final 16 bytes of the key
            if key.len() >= prefix.len() + 16 {
                let entry_id_bytes: [u8; 16] =
                    key[key.len() - 16..].try_into().expect("sliced 16 bytes");
                let entry_id = Uuid::from_bytes(entry_id_bytes);
                entries.push(self.get_entry(entry_id)?);
            }
        }

        Ok(entries)
    }

    /// Filtered, paginated history for a user
    pub fn history(&self, user_id: &UserId, query: &HistoryQuery) -> Result<HistoryPage> {
        let all = self.entries_for_user(user_id)?;

        let matched: Vec<LedgerEntry> = all
            .into_iter()
            .filter(|e| Self::matches(e, query))
            .collect();
        let total_matched = matched.len();

        let entries: Vec<LedgerEntry> = matched
            .into_iter()
            .skip(query.offset)
            .take(if query.limit == 0 {
                usize::MAX
            } else {
                query.limit
            })
            .collect();

        Ok(HistoryPage {
            entries,
            total_matched,
        })
    }

    fn matches(entry: &LedgerEntry, query: &HistoryQuery) -> bool {
        if let Some(source) = query.source {
            if entry.source != Some(source) {
                return false;
            }
        }
        if let Some(direction) = query.direction {
            if entry.direction != direction {
                return false;
            }
        }
        if let Some(from) = query.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = query.to {
            if entry.created_at >= to {
                return false;
            }
        }
        true
    }

    /// Aggregate sums over a user's entries (dashboard surface)
    pub fn totals_for_user(&self, user_id: &UserId) -> Result<LedgerTotals> {
        let entries = self.entries_for_user(user_id)?;

        let mut totals = LedgerTotals::default();
        for entry in &entries {
            match entry.direction {
                Direction::Earned => {
                    let amount = entry.amount.unsigned_abs();
                    totals.total_earned += amount;
                    if let Some(source) = entry.source {
                        *totals.earned_by_source.entry(source).or_insert(0) += amount;
                    }
                }
                Direction::Spent => {
                    totals.total_spent += entry.amount.unsigned_abs();
                }
            }
        }
        totals.entry_count = entries.len();

        Ok(totals)
    }

    // Index key helpers

    fn index_key(user_id: &UserId, entry_id: Option<Uuid>) -> Vec<u8> {
        let mut key = user_id.as_bytes().to_vec();
        key.push(INDEX_SEPARATOR);
        if let Some(eid) = entry_id {
            key.extend_from_slice(eid.as_bytes());
        }
        key
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;
    use chrono::Utc;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_entry(user_id: &UserId, amount: i64, source: Option<Source>) -> LedgerEntry {
        let direction = if amount >= 0 {
            Direction::Earned
        } else {
            Direction::Spent
        };
        LedgerEntry {
            entry_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            direction,
            source,
            amount,
            balance_before: 0,
            balance_after: amount.max(0) as u64,
            reason: "test".to_string(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_round_trip() {
        let (storage, _temp) = test_storage();
        let user = UserId::new("u-1");

        assert!(storage.get_aggregate(&user).unwrap().is_none());

        let aggregate = BalanceAggregate::new(user.clone());
        storage.put_aggregate(&aggregate).unwrap();

        let loaded = storage.get_aggregate(&user).unwrap().unwrap();
        assert_eq!(loaded, aggregate);
    }

    #[test]
    fn test_atomic_append_and_get() {
        let (storage, _temp) = test_storage();
        let user = UserId::new("u-2");

        let mut aggregate = BalanceAggregate::new(user.clone());
        aggregate.total_balance = 50;
        let entry = test_entry(&user, 50, Some(Source::Game));

        storage.append_entry_atomic(&aggregate, &entry).unwrap();

        let loaded_entry = storage.get_entry(entry.entry_id).unwrap();
        assert_eq!(loaded_entry.amount, 50);

        let loaded_aggregate = storage.get_aggregate(&user).unwrap().unwrap();
        assert_eq!(loaded_aggregate.total_balance, 50);
    }

    #[test]
    fn test_entries_in_creation_order() {
        let (storage, _temp) = test_storage();
        let user = UserId::new("u-3");
        let mut aggregate = BalanceAggregate::new(user.clone());

        let mut ids = Vec::new();
        for i in 0..5 {
            let entry = test_entry(&user, 10 + i, Some(Source::Game));
            ids.push(entry.entry_id);
            storage.append_entry_atomic(&aggregate, &entry).unwrap();
            aggregate.total_balance += (10 + i) as u64;
        }

        let entries = storage.entries_for_user(&user).unwrap();
        assert_eq!(entries.len(), 5);
        let got_ids: Vec<Uuid> = entries.iter().map(|e| e.entry_id).collect();
        assert_eq!(got_ids, ids);
    }

    #[test]
    fn test_user_prefix_does_not_leak() {
        // "u-4" must not pick up entries for "u-41"
        let (storage, _temp) = test_storage();
        let short = UserId::new("u-4");
        let long = UserId::new("u-41");

        let aggregate = BalanceAggregate::new(long.clone());
        storage
            .append_entry_atomic(&aggregate, &test_entry(&long, 10, Some(Source::Ads)))
            .unwrap();

        assert!(storage.entries_for_user(&short).unwrap().is_empty());
        assert_eq!(storage.entries_for_user(&long).unwrap().len(), 1);
    }

    #[test]
    fn test_history_filters_and_pagination() {
        let (storage, _temp) = test_storage();
        let user = UserId::new("u-5");
        let aggregate = BalanceAggregate::new(user.clone());

        for _ in 0..3 {
            storage
                .append_entry_atomic(&aggregate, &test_entry(&user, 10, Some(Source::Game)))
                .unwrap();
        }
        storage
            .append_entry_atomic(&aggregate, &test_entry(&user, 25, Some(Source::Ads)))
            .unwrap();
        storage
            .append_entry_atomic(&aggregate, &test_entry(&user, -15, None))
            .unwrap();

        // Filter by source
        let page = storage
            .history(
                &user,
                &HistoryQuery {
                    source: Some(Source::Game),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.total_matched, 3);

        // Filter by direction
        let page = storage
            .history(
                &user,
                &HistoryQuery {
                    direction: Some(Direction::Spent),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.total_matched, 1);
        assert_eq!(page.entries[0].amount, -15);

        // Pagination
        let page = storage
            .history(
                &user,
                &HistoryQuery {
                    offset: 1,
                    limit: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.total_matched, 5);
        assert_eq!(page.entries.len(), 2);
    }

    #[test]
    fn test_totals() {
        let (storage, _temp) = test_storage();
        let user = UserId::new("u-6");
        let aggregate = BalanceAggregate::new(user.clone());

        storage
            .append_entry_atomic(&aggregate, &test_entry(&user, 50, Some(Source::Game)))
            .unwrap();
        storage
            .append_entry_atomic(&aggregate, &test_entry(&user, 25, Some(Source::Ads)))
            .unwrap();
        storage
            .append_entry_atomic(&aggregate, &test_entry(&user, -30, None))
            .unwrap();

        let totals = storage.totals_for_user(&user).unwrap();
        assert_eq!(totals.total_earned, 75);
        assert_eq!(totals.total_spent, 30);
        assert_eq!(totals.earned_by_source.get(&Source::Game), Some(&50));
        assert_eq!(totals.entry_count, 3);
    }
}
