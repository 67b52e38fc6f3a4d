use std::sync::Arc;
use rustwidedb::facade::{CreateTableRequest, GetRowRequest, RowChange};
use rustwidedb::{
    Cell, ColumnValue, PrimaryKey, PrimaryKeyType, RowExistence, RowUpdate, StoreConfig,
    TableMeta, WideColumnDB,
};

fn pk(id: i64) -> PrimaryKey {
    PrimaryKey::builder().add("id", id).build()
}

async fn setup_db() -> WideColumnDB {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    let meta = TableMeta::new("kv").with_primary_key("id", PrimaryKeyType::Integer);
    db.create_table(CreateTableRequest::new(meta)).await.unwrap();
    db
}

#[tokio::test]
async fn test_batch_write_reports_each_row() {
    let db = setup_db().await;
    db.put_row("kv", &pk(1), &[Cell::new("v", 1_i64)], RowExistence::Ignore)
        .await
        .unwrap();

    let changes = vec![
        RowChange::put("kv", pk(2), vec![Cell::new("v", 2_i64)]),
        RowChange::put("kv", pk(1), vec![Cell::new("v", 9_i64)])
            .with_condition(RowExistence::ExpectNotExist),
        RowChange::update("kv", pk(1), RowUpdate::new().put(Cell::new("w", true))),
        RowChange::delete("missing", pk(1)),
        RowChange::delete("kv", pk(3)).with_condition(RowExistence::ExpectExist),
    ];
    let results = db.batch_write_row(changes).await.unwrap();
    let codes: Vec<Option<&str>> = results
        .iter()
        .map(|r| r.as_ref().err().map(|e| e.code()))
        .collect();
    assert_eq!(
        codes,
        vec![
            None,
            Some("OTSConditionCheckFail"),
            None,
            Some("OTSObjectNotExist"),
            Some("OTSConditionCheckFail"),
        ]
    );

    let row = db.get_row(&GetRowRequest::new("kv", pk(1))).await.unwrap().unwrap();
    assert_eq!(row.latest_value("v"), Some(&ColumnValue::Integer(1)));
    assert_eq!(row.latest_value("w"), Some(&ColumnValue::Boolean(true)));
}

#[tokio::test]
async fn test_batch_get_keeps_request_order() {
    let db = setup_db().await;
    for id in [1_i64, 3] {
        db.put_row("kv", &pk(id), &[Cell::new("v", id)], RowExistence::Ignore)
            .await
            .unwrap();
    }

    let requests = vec![
        GetRowRequest::new("kv", pk(3)),
        GetRowRequest::new("kv", pk(2)),
        GetRowRequest::new("nope", pk(1)),
        GetRowRequest::new("kv", pk(1)),
    ];
    let results = db.batch_get_row(requests).await.unwrap();
    assert_eq!(results.len(), 4);
    let first = results[0].as_ref().unwrap().as_ref().unwrap();
    assert_eq!(first.primary_key, pk(3));
    assert!(results[1].as_ref().unwrap().is_none());
    assert_eq!(results[2].as_ref().unwrap_err().code(), "OTSObjectNotExist");
    let last = results[3].as_ref().unwrap().as_ref().unwrap();
    assert_eq!(last.latest_value("v"), Some(&ColumnValue::Integer(1)));
}

#[tokio::test]
async fn test_batch_size_limits() {
    let db = setup_db().await;

    let err = db.batch_write_row(Vec::new()).await.unwrap_err();
    assert_eq!(err.message(), "No row specified in the request of BatchWriteRow.");
    let err = db.batch_get_row(Vec::new()).await.unwrap_err();
    assert_eq!(err.message(), "No row specified in the request of BatchGetRow.");

    let writes: Vec<RowChange> = (0..201)
        .map(|i| RowChange::put("kv", pk(i), vec![Cell::new("v", i)]))
        .collect();
    let err = db.batch_write_row(writes).await.unwrap_err();
    assert_eq!(err.message(), "Rows count exceeds the upper limit: 200.");

    let writes: Vec<RowChange> = (0..200)
        .map(|i| RowChange::put("kv", pk(i), vec![Cell::new("v", i)]))
        .collect();
    assert!(db.batch_write_row(writes).await.unwrap().iter().all(|r| r.is_ok()));

    let reads: Vec<GetRowRequest> = (0..101).map(|i| GetRowRequest::new("kv", pk(i))).collect();
    let err = db.batch_get_row(reads).await.unwrap_err();
    assert_eq!(err.message(), "Rows count exceeds the upper limit: 100.");

    let reads: Vec<GetRowRequest> = (0..100).map(|i| GetRowRequest::new("kv", pk(i))).collect();
    let results = db.batch_get_row(reads).await.unwrap();
    assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));

    let config = StoreConfig::new().batch_limits(2, 1);
    let small = WideColumnDB::new(config).unwrap();
    let err = small
        .batch_get_row(vec![GetRowRequest::new("kv", pk(1)), GetRowRequest::new("kv", pk(2))])
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Rows count exceeds the upper limit: 1.");
}

#[tokio::test]
async fn test_concurrent_writers_on_disjoint_keys() {
    let db = Arc::new(setup_db().await);

    let mut handles = vec![];
    for worker in 0..8_i64 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50_i64 {
                let id = worker * 1000 + i;
                db.put_row("kv", &pk(id), &[Cell::new("v", id)], RowExistence::Ignore)
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let request = rustwidedb::facade::GetRangeRequest::new(
        "kv",
        PrimaryKey::builder().inf_min("id").build(),
        PrimaryKey::builder().inf_max("id").build(),
    );
    let rows = db.range_scanner(request).collect_all().await.unwrap();
    assert_eq!(rows.len(), 400);
    assert!(rows.windows(2).all(|w| w[0].primary_key < w[1].primary_key));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_row_writes_are_atomic() {
    let db = Arc::new(setup_db().await);
    db.put_row("kv", &pk(1), &[Cell::new("a", 0_i64), Cell::new("b", 0_i64)], RowExistence::Ignore)
        .await
        .unwrap();

    let mut writers = vec![];
    for worker in 0..4_i64 {
        let db = db.clone();
        writers.push(tokio::spawn(async move {
            for i in 0..100_i64 {
                let value = worker * 1000 + i;
                let cells = [Cell::new("a", value), Cell::new("b", value)];
                db.put_row("kv", &pk(1), &cells, RowExistence::Ignore).await.unwrap();
            }
        }));
    }

    let reader = {
        let db = db.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let row = db.get_row(&GetRowRequest::new("kv", pk(1))).await.unwrap().unwrap();
                assert_eq!(row.latest_value("a"), row.latest_value("b"));
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();
}

#[tokio::test]
async fn test_calls_after_shutdown_are_rejected() {
    let db = setup_db().await;
    db.put_row("kv", &pk(1), &[Cell::new("v", 1_i64)], RowExistence::Ignore)
        .await
        .unwrap();

    db.shutdown().await;
    assert!(db.is_shut_down());

    let err = db.get_row(&GetRowRequest::new("kv", pk(1))).await.unwrap_err();
    assert_eq!(err.code(), "OTSServerUnavailable");
    let err = db.list_table().await.unwrap_err();
    assert_eq!(err.code(), "OTSServerUnavailable");
    let err = db.execute_sql("SHOW TABLES").await.unwrap_err();
    assert_eq!(err.code(), "OTSServerUnavailable");

    db.shutdown().await;
}
