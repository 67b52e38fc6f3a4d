use rustwidedb::facade::CreateTimeseriesTableRequest;
use rustwidedb::timeseries::{AnalyticalStore, TimeseriesTableMeta};
use rustwidedb::{ColumnValue, StoreConfig, WideColumnDB};

fn create_mapping(name: &str, store: &str) -> String {
    format!(
        "CREATE TABLE `{}` (`_m_name` VARCHAR(1024), `_data_source` VARCHAR(1024), \
         `_tags` VARCHAR(1024), `_time` BIGINT, `load` DOUBLE) \
         ENGINE=AnalyticalStore \
         ENGINE_ATTRIBUTE='{{\"timeseries_table_name\": \"ts\", \"analytical_store_name\": \"{}\"}}'",
        name, store
    )
}

async fn setup_db() -> WideColumnDB {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    db.create_timeseries_table(CreateTimeseriesTableRequest::new(TimeseriesTableMeta::new("ts")))
        .await
        .unwrap();
    db
}

async fn show_tables(db: &WideColumnDB) -> Vec<String> {
    let result = db.execute_sql("SHOW TABLES").await.unwrap();
    assert_eq!(result.columns, vec!["Tables".to_string()]);
    result
        .column("Tables")
        .unwrap()
        .into_iter()
        .map(|v| match v {
            ColumnValue::String(s) => s.clone(),
            other => panic!("unexpected value {:?}", other),
        })
        .collect()
}

#[tokio::test]
async fn test_create_and_show_mapping_tables() {
    let db = setup_db().await;
    assert!(show_tables(&db).await.is_empty());

    db.execute_sql(&create_mapping("cpu_b", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap();
    db.execute_sql(&create_mapping("cpu_a", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap();
    assert_eq!(show_tables(&db).await, vec!["cpu_a", "cpu_b"]);

    let description = db
        .describe_timeseries_analytical_store("ts", AnalyticalStore::DEFAULT_NAME)
        .await
        .unwrap();
    assert_eq!(description.mapping_tables, vec!["cpu_a", "cpu_b"]);

    let err = db
        .execute_sql(&create_mapping("cpu_a", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSObjectAlreadyExist");

    let sql = create_mapping("cpu_a", AnalyticalStore::DEFAULT_NAME)
        .replacen("CREATE TABLE", "CREATE TABLE IF NOT EXISTS", 1);
    db.execute_sql(&sql).await.unwrap();
    assert_eq!(show_tables(&db).await.len(), 2);
}

#[tokio::test]
async fn test_mapping_requires_existing_store() {
    let db = setup_db().await;

    let err = db.execute_sql(&create_mapping("m", "nope")).await.unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");
    assert_eq!(err.message(), "Analytical store 'nope' does not exist.");

    let sql = create_mapping("m", AnalyticalStore::DEFAULT_NAME).replace("\"ts\"", "\"other\"");
    let err = db.execute_sql(&sql).await.unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");

    assert!(show_tables(&db).await.is_empty());
}

#[tokio::test]
async fn test_deleting_store_with_mappings() {
    let db = setup_db().await;
    db.execute_sql(&create_mapping("m1", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap();

    let err = db
        .delete_timeseries_analytical_store("ts", AnalyticalStore::DEFAULT_NAME, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");
    assert!(err.message().contains("m1"));
    assert_eq!(show_tables(&db).await, vec!["m1"]);

    db.delete_timeseries_analytical_store("ts", AnalyticalStore::DEFAULT_NAME, true)
        .await
        .unwrap();
    assert!(show_tables(&db).await.is_empty());
    assert!(db.describe_timeseries_table("ts").await.unwrap().analytical_stores.is_empty());

    let err = db
        .delete_timeseries_analytical_store("ts", AnalyticalStore::DEFAULT_NAME, true)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");
}

#[tokio::test]
async fn test_deleting_timeseries_table_drops_mappings() {
    let db = setup_db().await;
    db.execute_sql(&create_mapping("m1", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap();

    db.delete_timeseries_table("ts").await.unwrap();
    assert!(show_tables(&db).await.is_empty());
}

#[tokio::test]
async fn test_drop_table() {
    let db = setup_db().await;
    db.execute_sql(&create_mapping("m1", AnalyticalStore::DEFAULT_NAME))
        .await
        .unwrap();

    db.execute_sql("DROP TABLE m1").await.unwrap();
    assert!(show_tables(&db).await.is_empty());

    db.execute_sql("DROP TABLE IF EXISTS m1").await.unwrap();
    let err = db.execute_sql("DROP TABLE m1").await.unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");
}

#[tokio::test]
async fn test_unsupported_sql() {
    let db = setup_db().await;

    let err = db.execute_sql("SELECT * FROM ts").await.unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");

    let err = db.execute_sql("CREATE TABLE t (a BIGINT)").await.unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");

    let err = db.execute_sql("SHOW TABLES; SHOW TABLES").await.unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");

    let err = db.execute_sql("CREATE TABLE (((").await.unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");
}
