//! LMDB-backed instance store

use crate::{CorrelationId, InstanceStore, SagaInstance, SagaState, StoreError};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Where and how to open the LMDB environment
#[derive(Clone, Debug)]
pub struct LmdbConfig {
    /// Environment directory; created if missing
    pub path: PathBuf,
    /// Maximum size of the memory map, in bytes
    pub map_size: usize,
    /// Maximum number of named databases in the environment
    pub max_dbs: u32,
    /// Database holding the instances
    pub db_name: Box<str>,
}

impl Default for LmdbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("saga-instances"),
            map_size: 64 * 1024 * 1024,
            max_dbs: 8,
            db_name: "saga_instances".into(),
        }
    }
}

impl LmdbConfig {
    /// Default settings rooted at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Envelope written for each instance; `data` is the archived saga data.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct StoredRecord {
    state_code: i32,
    created_at_millis: u64,
    data: Vec<u8>,
}

/// Durable instance store. Instances survive a restart.
///
/// Keys are the 16 raw bytes of the correlation id; values are rkyv
/// archives. `create` checks and writes inside one write transaction, which
/// LMDB serializes.
pub struct LmdbStore<D> {
    env: Env,
    db: Database<Bytes, Bytes>,
    _data: PhantomData<fn() -> D>,
}

impl<D> LmdbStore<D> {
    /// Open (or create) the environment and database described by `config`
    pub fn open(config: &LmdbConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.path).map_err(|e| StoreError::Storage(e.to_string().into()))?;

        // SAFETY: the environment directory is owned by this store; it is not
        // opened twice in the same process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_dbs(config.max_dbs)
                .open(&config.path)
        }
        .map_err(storage)?;

        let mut wtxn = env.write_txn().map_err(storage)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(config.db_name.as_ref()))
            .map_err(storage)?;
        wtxn.commit().map_err(storage)?;

        tracing::debug!(path = %config.path.display(), db = %config.db_name, "Opened LMDB instance store");

        Ok(Self {
            env,
            db,
            _data: PhantomData,
        })
    }
}

fn storage(e: heed::Error) -> StoreError {
    StoreError::Storage(e.to_string().into())
}

fn codec(e: rancor::Error) -> StoreError {
    StoreError::Codec(e.to_string().into())
}

fn aligned(bytes: &[u8]) -> AlignedVec {
    let mut buf = AlignedVec::new();
    buf.extend_from_slice(bytes);
    buf
}

impl<D> InstanceStore<D> for LmdbStore<D>
where
    D: rkyv::Archive
        + for<'a> rkyv::Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, rancor::Error>>
        + Send
        + Sync
        + 'static,
    D::Archived: for<'a> CheckBytes<HighValidator<'a, rancor::Error>>
        + rkyv::Deserialize<D, HighDeserializer<rancor::Error>>,
{
    fn get(&self, correlation_id: CorrelationId) -> Result<Option<SagaInstance<D>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        let Some(raw) = self.db.get(&rtxn, correlation_id.as_bytes()).map_err(storage)? else {
            return Ok(None);
        };

        let record = rkyv::from_bytes::<StoredRecord, rancor::Error>(&aligned(raw)).map_err(codec)?;
        let state = SagaState::try_from(record.state_code)
            .map_err(|e| StoreError::Codec(e.to_string().into()))?;
        let data = rkyv::from_bytes::<D, rancor::Error>(&aligned(&record.data)).map_err(codec)?;

        Ok(Some(SagaInstance::restore(
            correlation_id,
            state,
            record.created_at_millis,
            data,
        )))
    }

    fn create(&self, instance: SagaInstance<D>) -> Result<(), StoreError> {
        let correlation_id = instance.correlation_id();
        let data = rkyv::to_bytes::<rancor::Error>(instance.data()).map_err(codec)?;
        let record = StoredRecord {
            state_code: instance.current_state().code(),
            created_at_millis: instance.created_at_millis(),
            data: data.to_vec(),
        };
        let bytes = rkyv::to_bytes::<rancor::Error>(&record).map_err(codec)?;

        let mut wtxn = self.env.write_txn().map_err(storage)?;
        if self
            .db
            .get(&wtxn, correlation_id.as_bytes())
            .map_err(storage)?
            .is_some()
        {
            return Err(StoreError::AlreadyExists(correlation_id));
        }
        self.db
            .put(&mut wtxn, correlation_id.as_bytes(), &bytes)
            .map_err(storage)?;
        wtxn.commit().map_err(storage)
    }

    fn contains(&self, correlation_id: CorrelationId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        Ok(self
            .db
            .get(&rtxn, correlation_id.as_bytes())
            .map_err(storage)?
            .is_some())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        Ok(self.db.len(&rtxn).map_err(storage)? as usize)
    }

    fn correlation_ids(&self) -> Result<Vec<CorrelationId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(storage)?;
        let mut ids = Vec::new();
        for entry in self.db.iter(&rtxn).map_err(storage)? {
            let (key, _) = entry.map_err(storage)?;
            let bytes: [u8; 16] = key
                .try_into()
                .map_err(|_| StoreError::Codec(format!("bad key length {}", key.len()).into()))?;
            ids.push(CorrelationId::from_bytes(bytes));
        }
        Ok(ids)
    }
}
