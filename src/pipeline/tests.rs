use super::*;
use crate::database::{Dialect, EmbeddingValue};
use crate::embeddings::ZeroEmbedder;
use crate::test_support::{
    MemoryDatabase, RecordingEmbedder, products_request, products_rows, row,
};

#[tokio::test]
async fn inserts_one_row_per_source_row_in_order() {
    let database = MemoryDatabase::new("PostgreSQL").with_rows(products_rows());
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::PostgreSql,
        target: &target,
    };
    let embedder = RecordingEmbedder::new(4);

    let processed = run(&session, &embedder).await.expect("pipeline should succeed");

    assert_eq!(processed, 3);
    assert_eq!(database.inserted_keys(), vec![1, 2, 3]);
    assert_eq!(
        embedder.texts(),
        vec!["Widget A small widget", "Gadget ", " Unnamed thing"]
    );

    let state = database.state();
    assert_eq!(
        state.streamed,
        vec![
            "SELECT CAST(\"id\" AS BIGINT), CAST(\"name\" AS TEXT), CAST(\"description\" AS TEXT) FROM \"products\""
        ]
    );
    let (sql, _, value) = &state.inserts[2];
    assert_eq!(
        sql,
        "INSERT INTO \"products_vector\" (\"fk_products_id\", embedding) VALUES ($1, $2)"
    );
    assert_eq!(value, &EmbeddingValue::FloatArray(vec![2.0, 0.0, 0.0, 0.0]));
}

#[tokio::test]
async fn mysql_receives_bracket_text() {
    let database = MemoryDatabase::new("MySQL").with_rows(vec![row(7, &[Some("a"), Some("b")])]);
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::MySql,
        target: &target,
    };

    run(&session, &ZeroEmbedder::new(3))
        .await
        .expect("pipeline should succeed");

    let state = database.state();
    assert_eq!(
        state.inserts[0].0,
        "INSERT INTO `products_vector` (`fk_products_id`, embedding) VALUES (?, ?)"
    );
    assert_eq!(state.inserts[0].1, 7);
    assert_eq!(
        state.inserts[0].2,
        EmbeddingValue::Text("[0.0, 0.0, 0.0]".to_string())
    );
}

#[tokio::test]
async fn oracle_receives_packed_floats() {
    let database = MemoryDatabase::new("Oracle").with_rows(vec![row(1, &[Some("x"), None])]);
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::Oracle,
        target: &target,
    };

    run(&session, &ZeroEmbedder::new(2))
        .await
        .expect("pipeline should succeed");

    let state = database.state();
    assert_eq!(state.inserts[0].0.matches(":1").count(), 1);
    assert_eq!(state.inserts[0].2, EmbeddingValue::Bytes(vec![0; 8]));
}

#[tokio::test]
async fn empty_table_processes_nothing() {
    let database = MemoryDatabase::new("PostgreSQL");
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::PostgreSql,
        target: &target,
    };

    let processed = run(&session, &ZeroEmbedder::new(4)).await.expect("no rows");

    assert_eq!(processed, 0);
    assert!(database.state().inserts.is_empty());
}

#[tokio::test]
async fn insert_failure_keeps_earlier_rows() {
    let database = MemoryDatabase::new("PostgreSQL")
        .with_rows(products_rows())
        .failing_insert_at(1);
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::PostgreSql,
        target: &target,
    };
    let embedder = RecordingEmbedder::new(4);

    let err = run(&session, &embedder).await.expect_err("second insert fails");

    assert!(matches!(err, ProvisionError::Sql(_)));
    assert_eq!(database.inserted_keys(), vec![1]);
    assert_eq!(embedder.texts().len(), 2);
}

#[tokio::test]
async fn embedding_failure_stops_the_run() {
    let database = MemoryDatabase::new("PostgreSQL").with_rows(products_rows());
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::PostgreSql,
        target: &target,
    };
    let embedder = RecordingEmbedder::new(4).failing_on("Gadget ");

    let err = run(&session, &embedder).await.expect_err("provider fails");

    assert!(matches!(err, ProvisionError::Embedding(_)));
    assert_eq!(database.inserted_keys(), vec![1]);
}

#[tokio::test]
async fn wrong_vector_length_is_rejected() {
    let database = MemoryDatabase::new("PostgreSQL").with_rows(products_rows());
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::PostgreSql,
        target: &target,
    };
    let embedder = RecordingEmbedder::new(4).returning_len(3);

    let err = run(&session, &embedder).await.expect_err("length mismatch");

    assert!(
        matches!(err, ProvisionError::Embedding(ref msg) if msg.contains("expected 4")),
        "unexpected error: {err:?}"
    );
    assert!(database.inserted_keys().is_empty());
}

#[tokio::test]
async fn non_finite_values_never_reach_mysql() {
    let database = MemoryDatabase::new("MySQL").with_rows(products_rows());
    let target = products_request().validate().expect("valid request");
    let session = Session {
        database: &database,
        dialect: Dialect::MySql,
        target: &target,
    };

    for fill in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let embedder = RecordingEmbedder::new(4).filled_with(fill);

        let err = run(&session, &embedder).await.expect_err("non-finite value");

        assert!(
            matches!(err, ProvisionError::Embedding(ref msg) if msg.contains("non-finite value for row 1")),
            "unexpected error: {err:?}"
        );
        assert!(database.inserted_keys().is_empty());
    }
}
