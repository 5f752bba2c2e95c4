//! Read-only queries against committed ledger state.
//!
//! | Path       | `data`                 | Value on success          |
//! |------------|------------------------|---------------------------|
//! | `/account` | 32-byte public key     | `QueryValue::Account`     |
//! | `/kv`      | UTF-8 key              | `QueryValue::KeyValue`    |
//!
//! Queries always read through [`LedgerStore`], never through an open batch,
//! so they observe the last committed block even mid-finalize.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::abci::{QueryRequest, QueryResponse};
use crate::codec::{self, CodecError};
use crate::config::{MAX_QUERY_SIZE_BYTES, PUBLIC_KEY_LENGTH, QUERY_PATH_ACCOUNT, QUERY_PATH_KV};
use crate::storage::{AccountRecord, KvRecord, LedgerStore, LedgerView, StoreError};
use crate::transaction::ResultCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryValue {
    Account(AccountRecord),
    KeyValue(KvRecord),
}

impl QueryValue {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unsupported query path: {0:?}")]
    UnsupportedQuery(String),

    #[error("malformed query data: {0}")]
    Decode(String),

    #[error("not found")]
    NotFound,

    #[error("ledger read failed: {0}")]
    Storage(#[from] StoreError),
}

impl QueryError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            QueryError::UnsupportedQuery(_) | QueryError::Decode(_) => ResultCode::InvalidRequest,
            QueryError::NotFound => ResultCode::NotFound,
            QueryError::Storage(_) => ResultCode::Internal,
        }
    }
}

impl QueryRequest {
    pub fn account(public_key: impl AsRef<[u8]>) -> Self {
        Self {
            path: QUERY_PATH_ACCOUNT.to_string(),
            data: public_key.as_ref().to_vec(),
        }
    }

    pub fn kv(key: &str) -> Self {
        Self {
            path: QUERY_PATH_KV.to_string(),
            data: key.as_bytes().to_vec(),
        }
    }
}

pub fn query_account<V: LedgerView + ?Sized>(
    view: &V,
    public_key: &[u8],
) -> Result<AccountRecord, QueryError> {
    if public_key.len() != PUBLIC_KEY_LENGTH {
        return Err(QueryError::Decode(format!(
            "account query needs a {}-byte public key, got {} bytes",
            PUBLIC_KEY_LENGTH,
            public_key.len()
        )));
    }
    view.get_account(public_key)?.ok_or(QueryError::NotFound)
}

pub fn query_kv<V: LedgerView + ?Sized>(view: &V, key: &str) -> Result<KvRecord, QueryError> {
    view.get_kv(key)?.ok_or(QueryError::NotFound)
}

/// Dispatch a query by path.
pub fn handle_query(store: &LedgerStore, request: &QueryRequest) -> Result<QueryValue, QueryError> {
    if request.data.len() > MAX_QUERY_SIZE_BYTES {
        return Err(QueryError::Decode(format!(
            "query data of {} bytes exceeds the {} byte limit",
            request.data.len(),
            MAX_QUERY_SIZE_BYTES
        )));
    }

    match request.path.as_str() {
        QUERY_PATH_ACCOUNT => Ok(QueryValue::Account(query_account(store, &request.data)?)),
        QUERY_PATH_KV => {
            let key = std::str::from_utf8(&request.data)
                .map_err(|e| QueryError::Decode(format!("kv key is not UTF-8: {e}")))?;
            Ok(QueryValue::KeyValue(query_kv(store, key)?))
        }
        other => Err(QueryError::UnsupportedQuery(other.to_string())),
    }
}

/// [`handle_query`] folded into a response: errors become a code and log.
pub fn respond(store: &LedgerStore, request: &QueryRequest, height: u64) -> QueryResponse {
    let outcome = handle_query(store, request).and_then(|value| {
        value
            .to_bytes()
            .map_err(|e| QueryError::Decode(e.to_string()))
    });

    match outcome {
        Ok(value) => QueryResponse {
            code: ResultCode::Ok.as_u32(),
            log: String::new(),
            value,
            height,
        },
        Err(err) => QueryResponse {
            code: err.result_code().as_u32(),
            log: err.to_string(),
            value: Vec::new(),
            height,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> LedgerStore {
        let store = LedgerStore::in_memory();
        let mut batch = store.begin_batch().unwrap();
        batch.put_account(AccountRecord::new(vec![4u8; 32], 44)).unwrap();
        batch
            .put_kv(KvRecord {
                key: "cometbft".into(),
                value: "rocks".into(),
            })
            .unwrap();
        batch.commit().unwrap();
        store
    }

    #[test]
    fn account_lookup() {
        let store = seeded_store();
        let value = handle_query(&store, &QueryRequest::account([4u8; 32])).unwrap();
        assert_eq!(value, QueryValue::Account(AccountRecord::new(vec![4u8; 32], 44)));
    }

    #[test]
    fn kv_lookup() {
        let store = seeded_store();
        let record = query_kv(&store, "cometbft").unwrap();
        assert_eq!(record.value, "rocks");
    }

    #[test]
    fn missing_records_are_not_found() {
        let store = seeded_store();
        let err = handle_query(&store, &QueryRequest::kv("absent")).unwrap_err();
        assert!(matches!(err, QueryError::NotFound));
        assert_eq!(err.result_code(), ResultCode::NotFound);

        assert!(matches!(
            query_account(&store, &[9u8; 32]),
            Err(QueryError::NotFound)
        ));
    }

    #[test]
    fn unknown_path_is_unsupported() {
        let store = seeded_store();
        let request = QueryRequest {
            path: "/validators".into(),
            data: vec![],
        };
        let err = handle_query(&store, &request).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedQuery(_)));
        assert_eq!(err.result_code(), ResultCode::InvalidRequest);
    }

    #[test]
    fn bad_arguments_are_decode_errors() {
        let store = seeded_store();
        assert!(matches!(
            handle_query(&store, &QueryRequest::account([1u8; 7])),
            Err(QueryError::Decode(_))
        ));

        let request = QueryRequest {
            path: QUERY_PATH_KV.into(),
            data: vec![0xFF, 0xFE],
        };
        assert!(matches!(
            handle_query(&store, &request),
            Err(QueryError::Decode(_))
        ));

        let request = QueryRequest {
            path: QUERY_PATH_KV.into(),
            data: vec![b'a'; MAX_QUERY_SIZE_BYTES + 1],
        };
        assert!(matches!(
            handle_query(&store, &request),
            Err(QueryError::Decode(_))
        ));
    }

    #[test]
    fn respond_encodes_value_or_error() {
        let store = seeded_store();

        let ok = respond(&store, &QueryRequest::kv("cometbft"), 7);
        assert_eq!(ok.code, 0);
        assert_eq!(ok.height, 7);
        assert_eq!(
            QueryValue::from_bytes(&ok.value).unwrap(),
            QueryValue::KeyValue(KvRecord {
                key: "cometbft".into(),
                value: "rocks".into(),
            })
        );

        let missing = respond(&store, &QueryRequest::kv("nope"), 7);
        assert_eq!(missing.code, ResultCode::NotFound.as_u32());
        assert!(missing.value.is_empty());
        assert!(!missing.log.is_empty());
    }
}
