/// Timeseries tests
///
/// Data points written through the timeseries API and read back through
/// both the timeseries and the row APIs.
/// Run with: cargo test --test timeseries_tests

use rustwidedb::facade::{
    CreateTimeseriesTableRequest, GetRangeRequest, GetTimeseriesDataRequest,
    QueryTimeseriesMetaRequest, ScanTimeseriesDataRequest, UpdateAnalyticalStoreRequest,
    UpdateTableRequest, UpdateTimeseriesTableRequest,
};
use rustwidedb::timeseries::{
    AnalyticalStore, MetaQueryCondition, SingleOperator, SyncOption, TimeseriesKey,
    TimeseriesMeta, TimeseriesRow, TimeseriesTableMeta,
};
use rustwidedb::{
    Cell, ColumnValue, PrimaryKey, PrimaryKeySchema, PrimaryKeyType, PrimaryKeyValue,
    RowExistence, StoreConfig, TableOptions, WideColumnDB,
};

fn hangzhou() -> TimeseriesKey {
    TimeseriesKey::new("cpu", "host_0")
        .with_tag("region", "hangzhou")
        .with_tag("os", "intel")
}

fn point(key: TimeseriesKey, time_in_us: i64, load: f64) -> TimeseriesRow {
    TimeseriesRow::new(key, time_in_us)
        .with_field("load", load)
        .with_field("cores", 8_i64)
}

async fn db_with_points() -> WideColumnDB {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    db.create_timeseries_table(CreateTimeseriesTableRequest::new(TimeseriesTableMeta::new("ts")))
        .await
        .unwrap();

    let rows = vec![
        point(hangzhou(), 1_000_000, 0.1),
        point(hangzhou(), 2_000_000, 0.2),
        point(hangzhou(), 3_000_000, 0.3),
        point(TimeseriesKey::new("cpu", "host_1").with_tag("region", "beijing"), 1_500_000, 0.9),
    ];
    let failed = db.put_timeseries_data("ts", rows).await.unwrap();
    assert!(failed.is_empty());
    db
}

fn times(rows: &[TimeseriesRow]) -> Vec<i64> {
    rows.iter().map(|r| r.time_in_us).collect()
}

#[tokio::test]
async fn test_get_timeseries_data_forward_and_backward() {
    let db = db_with_points().await;

    let response = db
        .get_timeseries_data("ts", &GetTimeseriesDataRequest::new(hangzhou()))
        .await
        .unwrap();
    assert_eq!(times(&response.rows), vec![1_000_000, 2_000_000, 3_000_000]);
    assert!(response.next_token.is_none());
    let first = &response.rows[0];
    assert_eq!(first.key, hangzhou());
    assert_eq!(first.fields.get("load"), Some(&ColumnValue::Double(0.1)));
    assert_eq!(first.fields.get("cores"), Some(&ColumnValue::Integer(8)));

    let window = GetTimeseriesDataRequest::new(hangzhou()).time_range(1_000_000, 3_000_000);
    let response = db.get_timeseries_data("ts", &window).await.unwrap();
    assert_eq!(times(&response.rows), vec![1_000_000, 2_000_000]);

    let backward = GetTimeseriesDataRequest::new(hangzhou()).backward().limit(2);
    let response = db.get_timeseries_data("ts", &backward).await.unwrap();
    assert_eq!(times(&response.rows), vec![3_000_000, 2_000_000]);
    let token = response.next_token.unwrap();

    let rest = db
        .get_timeseries_data("ts", &backward.clone().next_token(token))
        .await
        .unwrap();
    assert_eq!(times(&rest.rows), vec![1_000_000]);
    assert!(rest.next_token.is_none());

    let projected = GetTimeseriesDataRequest::new(hangzhou()).fields(["load"]);
    let response = db.get_timeseries_data("ts", &projected).await.unwrap();
    assert_eq!(response.rows[0].fields.len(), 1);
    assert_eq!(response.rows[0].key, hangzhou());
}

#[tokio::test]
async fn test_scan_timeseries_data_pages() {
    let db = db_with_points().await;

    let mut request = ScanTimeseriesDataRequest {
        limit: Some(3),
        ..Default::default()
    };
    let first = db.scan_timeseries_data("ts", &request).await.unwrap();
    assert_eq!(first.rows.len(), 3);
    request.next_token = first.next_token.clone();
    assert!(request.next_token.is_some());

    let second = db.scan_timeseries_data("ts", &request).await.unwrap();
    assert_eq!(second.rows.len(), 1);
    assert!(second.next_token.is_none());

    let mut keys: Vec<TimeseriesKey> = first.rows.iter().chain(&second.rows).map(|r| r.key.clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 2);

    let err = db
        .scan_timeseries_data(
            "ts",
            &ScanTimeseriesDataRequest {
                next_token: Some("not a token".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Invalid next token.");
}

#[tokio::test]
async fn test_base_table_is_readable_with_row_api() {
    let db = db_with_points().await;

    let schema = db.describe_table("ts").await.unwrap().meta.primary_key;
    let names: Vec<&str> = schema.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["_#h", "_m_name", "_data_source", "_tags", "_time"]);

    let request = GetRangeRequest::new("ts", PrimaryKey::inf_min(&schema), PrimaryKey::inf_max(&schema));
    let page = db.get_range(&request).await.unwrap();
    assert_eq!(page.rows.len(), 4);

    let row = page
        .rows
        .iter()
        .find(|r| r.primary_key.get("_time") == Some(&PrimaryKeyValue::Integer(2_000_000)))
        .unwrap();
    assert_eq!(
        row.primary_key.get("_tags"),
        Some(&PrimaryKeyValue::from("[os=intel,region=hangzhou]"))
    );
    assert_eq!(row.primary_key.get("_m_name"), Some(&PrimaryKeyValue::from("cpu")));
    let bucket = row.primary_key.get("_#h").unwrap().as_string().unwrap().to_string();
    assert_eq!(bucket.len(), 4);
    assert_eq!(row.latest("load").unwrap().timestamp, Some(2_000));

    let err = db
        .put_row("ts", &row.primary_key, &[Cell::new("load", 1.0)], RowExistence::Ignore)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");

    assert!(db.list_table().await.unwrap().is_empty());
    assert!(db.delete_table("ts").await.is_err());
}

#[tokio::test]
async fn test_rejected_rows_are_reported() {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    db.create_timeseries_table(CreateTimeseriesTableRequest::new(TimeseriesTableMeta::new("ts")))
        .await
        .unwrap();

    let rows = vec![
        point(hangzhou(), 1_000_000, 0.5),
        TimeseriesRow::new(hangzhou(), 2_000_000),
        point(TimeseriesKey::new("", "host"), 1_000_000, 0.5),
        point(hangzhou(), 3_000_000, 0.7),
    ];
    let failed = db.put_timeseries_data("ts", rows).await.unwrap();
    let indexes: Vec<usize> = failed.iter().map(|f| f.row_index).collect();
    assert_eq!(indexes, vec![1, 2]);
    assert!(failed.iter().all(|f| f.error.code() == "OTSParameterInvalid"));

    let response = db
        .get_timeseries_data("ts", &GetTimeseriesDataRequest::new(hangzhou()))
        .await
        .unwrap();
    assert_eq!(times(&response.rows), vec![1_000_000, 3_000_000]);

    let err = db.put_timeseries_data("missing", vec![point(hangzhou(), 1, 0.1)]).await.unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");
}

#[tokio::test]
async fn test_custom_keys_and_field_primary_keys() {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    let meta = TimeseriesTableMeta::new("custom")
        .with_timeseries_key("region")
        .with_field_primary_key(PrimaryKeySchema::new("seq", PrimaryKeyType::Integer));
    db.create_timeseries_table(CreateTimeseriesTableRequest::new(meta))
        .await
        .unwrap();

    let key = TimeseriesKey::new("cpu", "host_9")
        .with_tag("region", "hangzhou")
        .with_tag("os", "intel");
    let rows = vec![
        TimeseriesRow::new(key.clone(), 1_000).with_field("seq", 2_i64).with_field("v", 1.0),
        TimeseriesRow::new(key.clone(), 1_000).with_field("seq", 1_i64).with_field("v", 2.0),
    ];
    assert!(db.put_timeseries_data("custom", rows).await.unwrap().is_empty());

    let schema = db.describe_table("custom").await.unwrap().meta.primary_key;
    let names: Vec<&str> = schema.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["_#h", "_m_name", "region", "_time", "seq"]);

    let response = db
        .get_timeseries_data("custom", &GetTimeseriesDataRequest::new(key.clone()))
        .await
        .unwrap();
    assert_eq!(response.rows.len(), 2);
    assert_eq!(response.rows[0].fields.get("seq"), Some(&ColumnValue::Integer(1)));
    assert_eq!(response.rows[0].key, key);

    let missing_tag = TimeseriesRow::new(TimeseriesKey::new("cpu", "h"), 1).with_field("seq", 1_i64).with_field("v", 1.0);
    let failed = db.put_timeseries_data("custom", vec![missing_tag]).await.unwrap();
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn test_timeseries_meta_lifecycle() {
    let db = db_with_points().await;

    let all = db
        .query_timeseries_meta("ts", &QueryTimeseriesMetaRequest::default())
        .await
        .unwrap();
    assert_eq!(all.metas.len(), 2);
    assert!(all.metas.iter().all(|m| m.update_time_in_us > 0));

    let meta = TimeseriesMeta::new(hangzhou()).with_attribute("owner", "ops");
    assert!(db.update_timeseries_meta("ts", vec![meta]).await.unwrap().is_empty());

    let by_tag = QueryTimeseriesMetaRequest {
        condition: Some(MetaQueryCondition::and(vec![
            MetaQueryCondition::measurement(SingleOperator::Equal, "cpu"),
            MetaQueryCondition::tag(SingleOperator::Equal, "region", "hangzhou"),
        ])),
        ..Default::default()
    };
    let found = db.query_timeseries_meta("ts", &by_tag).await.unwrap();
    assert_eq!(found.metas.len(), 1);
    assert_eq!(found.metas[0].attributes.get("owner").map(String::as_str), Some("ops"));

    let paged = QueryTimeseriesMetaRequest {
        limit: Some(1),
        ..Default::default()
    };
    let first = db.query_timeseries_meta("ts", &paged).await.unwrap();
    assert_eq!(first.metas.len(), 1);
    let second = db
        .query_timeseries_meta(
            "ts",
            &QueryTimeseriesMetaRequest {
                next_token: first.next_token.clone(),
                ..paged.clone()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.metas.len(), 1);
    assert_ne!(first.metas[0].key, second.metas[0].key);
    assert!(second.next_token.is_none());

    let failed = db
        .delete_timeseries_meta("ts", vec![hangzhou(), TimeseriesKey::new("nope", "")])
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].row_index, 1);
    assert_eq!(failed[0].error.code(), "OTSObjectNotExist");

    let remaining = db
        .query_timeseries_meta("ts", &QueryTimeseriesMetaRequest::default())
        .await
        .unwrap();
    assert_eq!(remaining.metas.len(), 1);
}

#[tokio::test]
async fn test_attribute_updates_can_be_disabled() {
    let db = db_with_points().await;
    let mut options = db.describe_timeseries_table("ts").await.unwrap().meta.meta_options;
    options.allow_update_attributes = false;
    db.update_timeseries_table(
        "ts",
        UpdateTimeseriesTableRequest {
            time_to_live: None,
            meta_options: Some(options),
        },
    )
    .await
    .unwrap();

    let meta = TimeseriesMeta::new(hangzhou()).with_attribute("owner", "ops");
    let failed = db.update_timeseries_meta("ts", vec![meta]).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.code(), "OTSParameterInvalid");
}

#[tokio::test]
async fn test_table_and_analytical_store_lifecycle() {
    let db = db_with_points().await;

    let schema = db.describe_timeseries_table("ts").await.unwrap();
    assert_eq!(schema.analytical_stores.len(), 1);
    assert_eq!(schema.analytical_stores[0].name, AnalyticalStore::DEFAULT_NAME);

    let listed = db.list_timeseries_table().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "ts");

    db.create_timeseries_analytical_store(
        "ts",
        AnalyticalStore::new("incr").with_sync_option(SyncOption::Incremental),
    )
    .await
    .unwrap();
    let err = db
        .create_timeseries_analytical_store("ts", AnalyticalStore::new("incr"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSObjectAlreadyExist");

    db.update_timeseries_analytical_store(
        "ts",
        "incr",
        UpdateAnalyticalStoreRequest {
            time_to_live: Some(86_400),
            sync_option: Some(SyncOption::Full),
        },
    )
    .await
    .unwrap();
    let described = db.describe_timeseries_analytical_store("ts", "incr").await.unwrap();
    assert_eq!(described.store.time_to_live, 86_400);
    assert_eq!(described.store.sync_option, SyncOption::Full);
    assert!(described.mapping_tables.is_empty());

    db.delete_timeseries_analytical_store("ts", "incr", false).await.unwrap();
    let err = db
        .describe_timeseries_analytical_store("ts", "incr")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");

    db.update_timeseries_table(
        "ts",
        UpdateTimeseriesTableRequest {
            time_to_live: Some(86_400 * 365 * 100),
            meta_options: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        db.describe_timeseries_table("ts").await.unwrap().meta.options.time_to_live,
        86_400 * 365 * 100
    );

    db.delete_timeseries_table("ts").await.unwrap();
    assert!(db.list_timeseries_table().await.unwrap().is_empty());
    let err = db
        .get_timeseries_data("ts", &GetTimeseriesDataRequest::new(hangzhou()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTSObjectNotExist");
}

#[tokio::test]
async fn test_default_store_can_be_skipped() {
    let db = WideColumnDB::new(StoreConfig::default()).unwrap();
    let request = CreateTimeseriesTableRequest::new(TimeseriesTableMeta::new("plain")).without_analytical_store();
    db.create_timeseries_table(request).await.unwrap();
    assert!(db.describe_timeseries_table("plain").await.unwrap().analytical_stores.is_empty());

    let config = StoreConfig::new().provision_default_analytical_store(false);
    let db = WideColumnDB::new(config).unwrap();
    db.create_timeseries_table(CreateTimeseriesTableRequest::new(TimeseriesTableMeta::new("plain")))
        .await
        .unwrap();
    assert!(db.describe_timeseries_table("plain").await.unwrap().analytical_stores.is_empty());
}

#[tokio::test]
async fn test_row_table_options_cannot_change_timeseries_table() {
    let db = db_with_points().await;
    let update = UpdateTableRequest {
        options: Some(TableOptions::new(-1, 3)),
        stream_spec: None,
    };
    let err = db.update_table("ts", update).await.unwrap_err();
    assert_eq!(err.code(), "OTSParameterInvalid");
    assert_eq!(
        err.message(),
        "Table 'ts' is a timeseries table; use update_timeseries_table."
    );
    assert_eq!(db.describe_table("ts").await.unwrap().options.max_versions, 1);
}
