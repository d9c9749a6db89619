// src/test_support.rs
//
// Shared fixtures for unit and service tests.

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use crate::db::{create_connection_pool, get_connection, initialize_database, ConnectionPool};
use crate::domain::DatasetBlob;

/// A migrated file database that lives as long as the value.
pub struct TestDb {
    _dir: TempDir,
    pub pool: Arc<ConnectionPool>,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pool = create_connection_pool(dir.path()).expect("create pool");
        {
            let conn = get_connection(&pool).expect("get connection");
            initialize_database(&conn).expect("initialize schema");
        }
        Self {
            _dir: dir,
            pool: Arc::new(pool),
        }
    }
}

/// Small dataset used by reconciliation tests.
///
/// LEA: Lightning Bolt (U1, hint E1, #162, priced), Black Lotus (U2, #232),
/// Llanowar Elves (U4, #"12a").
/// M10: Lightning Bolt (U3, #146).
pub fn sample_dataset(version: &str) -> Value {
    json!({
        "meta": { "version": version, "date": "2024-06-01" },
        "data": {
            "LEA": {
                "name": "Limited Edition Alpha",
                "code": "LEA",
                "cards": [
                    {
                        "uuid": "U1",
                        "name": "Lightning Bolt",
                        "setCode": "LEA",
                        "number": "162",
                        "rarity": "common",
                        "identifiers": { "externalIdHint": "E1" },
                        "prices": { "2024-05-01": 410.5, "2024-06-01": 420.0 }
                    },
                    {
                        "uuid": "U2",
                        "name": "Black Lotus",
                        "setCode": "LEA",
                        "number": "232",
                        "rarity": "rare"
                    },
                    {
                        "uuid": "U4",
                        "name": "Llanowar Elves",
                        "setCode": "LEA",
                        "number": "12a",
                        "rarity": "common"
                    }
                ]
            },
            "M10": {
                "name": "Magic 2010",
                "code": "M10",
                "cards": [
                    {
                        "uuid": "U3",
                        "name": "Lightning Bolt",
                        "setCode": "M10",
                        "number": "146",
                        "rarity": "common"
                    }
                ]
            }
        }
    })
}

/// One set `TST` holding `count` cards `uuid-NN` / `Test Card NN`.
pub fn numbered_dataset(version: &str, count: usize) -> Value {
    let cards: Vec<Value> = (0..count)
        .map(|n| {
            json!({
                "uuid": format!("uuid-{:02}", n),
                "name": format!("Test Card {:02}", n),
                "setCode": "TST",
                "number": format!("{:02}", n),
                "rarity": "common"
            })
        })
        .collect();

    json!({
        "meta": { "version": version, "date": "2024-06-01" },
        "data": {
            "TST": { "name": "Test Set", "code": "TST", "cards": cards }
        }
    })
}

pub fn to_bytes(dataset: &Value) -> Vec<u8> {
    serde_json::to_vec(dataset).expect("serialize dataset")
}

pub fn parse_blob(dataset: &Value) -> DatasetBlob {
    DatasetBlob::parse(&to_bytes(dataset)).expect("valid blob")
}
