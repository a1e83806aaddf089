// Transaction Integration Tests
//
// Atomicity, nesting, visibility across connections and configuration.

use std::thread;

use anyhow::{Result, anyhow};
use bayun_crud::common::EventCategory;
use bayun_crud::transaction::TransactionState;
use bayun_crud::{Database, DatabaseConfig, JournalMode, Policy, QueryError, col};

#[path = "../common/mod.rs"]
mod common;
use common::{TestTable1, get_logged_test_db, get_test_db, populate, temp_db_config};

#[test]
fn test_body_value_is_returned_on_commit() -> Result<()> {
    let db = get_test_db()?;
    let id = db.run_in_transaction(|| -> Result<i64> {
        db.table::<TestTable1>()?.insert(&[TestTable1::new(2000, "New One", 40)])?;
        Ok(2000)
    })?;
    assert_eq!(id, 2000);
    assert_eq!(db.table::<TestTable1>()?.filter(col("id").eq(id)).count()?, 1);
    assert_eq!(db.transactions().state(), TransactionState::Idle);
    Ok(())
}

#[test]
fn test_failure_rolls_back_every_write() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    let result = db.run_in_transaction(|| -> Result<()> {
        t1.insert(&[TestTable1::new(2000, "first", 1)])?;
        t1.clone().filter(col("id").eq(1)).delete()?;
        Err(anyhow!("body failed"))
    });
    assert_eq!(result.unwrap_err().to_string(), "body failed");
    assert_eq!(t1.clone().filter(col("id").eq(2000)).count()?, 0);
    assert_eq!(t1.count()?, 5);
    Ok(())
}

#[test]
fn test_engine_failure_inside_body_rolls_back() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    let result = db.run_in_transaction(|| -> Result<(), QueryError> {
        t1.insert(&[TestTable1::new(2000, "first", 1)])?;
        t1.insert(&[TestTable1::new(1, "duplicate", 1)])?;
        Ok(())
    });
    assert!(matches!(result, Err(QueryError::ExecutionError { .. })));
    assert_eq!(t1.clone().filter(col("id").eq(2000)).count()?, 0);
    Ok(())
}

#[test]
fn test_nested_failure_rolls_back_outer_unit() -> Result<()> {
    let db = get_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    let result = db.run_in_transaction(|| -> Result<(), QueryError> {
        t1.insert(&[TestTable1::new(2000, "outer", 1)])?;
        let inner = db.run_in_transaction(|| -> Result<(), QueryError> {
            t1.insert(&[TestTable1::new(2001, "inner", 1)])?;
            Err(QueryError::MalformedExpression("inner failure".into()))
        });
        assert!(inner.is_err());
        assert_eq!(db.transactions().state(), TransactionState::RollbackOnly);
        Ok(())
    });
    assert!(matches!(result, Err(QueryError::TransactionError(_))));
    assert_eq!(t1.clone().filter(col("id").is_in([2000, 2001])).count()?, 0);

    // The handle is usable again afterwards
    t1.insert(&[TestTable1::new(2002, "after", 1)])?;
    assert_eq!(t1.count()?, 6);
    Ok(())
}

#[test]
fn test_nested_success_joins_outer_transaction() -> Result<()> {
    let (db, log) = get_logged_test_db()?;
    let t1 = db.table::<TestTable1>()?;
    log.drain();
    db.run_in_transaction(|| -> Result<()> {
        db.run_in_transaction(|| -> Result<()> {
            t1.insert(&[TestTable1::new(2000, "nested", 1)])?;
            Ok(())
        })?;
        Ok(())
    })?;
    assert_eq!(t1.count()?, 6);
    // One BEGIN and one COMMIT for the whole nest
    let boundaries = log.drain().into_iter()
        .filter(|e| e.category == EventCategory::Transaction)
        .count();
    assert_eq!(boundaries, 2);
    Ok(())
}

#[test]
fn test_uncommitted_writes_are_invisible_to_other_connections() -> Result<()> {
    let (_dir, config) = temp_db_config()?;
    let writer = Database::open(&config)?;
    populate(&writer)?;
    let reader = Database::open(&config)?;
    let read_count = || -> Result<u64> { Ok(reader.table::<TestTable1>()?.count()?) };

    writer.run_in_transaction(|| -> Result<()> {
        writer.table::<TestTable1>()?.insert(&[TestTable1::new(2000, "pending", 1)])?;
        assert_eq!(writer.table::<TestTable1>()?.count()?, 6);
        assert_eq!(read_count()?, 5);
        Ok(())
    })?;
    assert_eq!(read_count()?, 6);

    let _ = writer.run_in_transaction(|| -> Result<()> {
        writer.table::<TestTable1>()?.insert(&[TestTable1::new(2001, "doomed", 1)])?;
        Err(anyhow!("abandon"))
    });
    assert_eq!(read_count()?, 6);
    Ok(())
}

#[test]
fn test_one_handle_per_thread() -> Result<()> {
    let (_dir, config) = temp_db_config()?;
    let db = Database::open(&config)?;
    db.create::<TestTable1>(Policy::DROP_TABLE)?;

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let config = config.clone();
            thread::spawn(move || -> Result<()> {
                let db = Database::open(&config)?;
                let t1 = db.table::<TestTable1>()?;
                for i in 0..10 {
                    let id = worker * 100 + i;
                    t1.insert(&[TestTable1::new(id, "threaded", i)])?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| anyhow!("worker panicked"))??;
    }
    assert_eq!(db.table::<TestTable1>()?.count()?, 40);

    // A handle may move between threads
    let moved = thread::spawn(move || db.table::<TestTable1>().and_then(|t| t.count())).join();
    assert_eq!(moved.map_err(|_| anyhow!("panicked"))??, 40);
    Ok(())
}

#[test]
fn test_config_from_json() -> Result<()> {
    let (dir, _) = temp_db_config()?;
    let json = format!(
        r#"{{"path": {}, "busy_timeout_ms": 250, "journal_mode": "delete"}}"#,
        serde_json::to_string(&dir.path().join("json.db"))?
    );
    let config: DatabaseConfig = serde_json::from_str(&json)?;
    assert_eq!(config.journal_mode, JournalMode::Delete);
    assert!(config.foreign_keys);

    let db = Database::open(&config)?;
    populate(&db)?;
    assert_eq!(db.table::<TestTable1>()?.count()?, 5);
    Ok(())
}

#[test]
fn test_log_events_carry_statements() -> Result<()> {
    let (db, log) = get_logged_test_db()?;
    log.drain();
    db.table::<TestTable1>()?.filter(col("id").eq(3)).select()?;
    let events = log.drain();
    let query = events.iter()
        .find(|e| e.category == EventCategory::Query)
        .expect("select is logged");
    assert!(query.sql.as_deref().unwrap_or("").starts_with("SELECT"));
    assert_eq!(query.params, vec!["3".to_string()]);

    db.table::<TestTable1>()?.count()?;
    assert!(!log.is_empty());
    db.flush_log();
    assert!(log.is_empty());
    Ok(())
}
