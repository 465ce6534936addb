use crate::helpers::spawn_test_database;
use crate::test_data::{TEST_SUBSCRIBER_NAME, UPDATED_SUBSCRIBER_NAME};
use claims::{assert_none, assert_ok, assert_some};
use sqlx::Connection;
use subscriber_db::domain::{SubscriberName, SubscriberStatus};
use subscriber_db::subscriber_store::{
    StoreError, delete_subscriber, delete_subscribers_matching, find_subscriber_by_email,
    insert_subscriber, list_subscribers_matching, update_name, update_status,
};

#[tokio::test]
async fn inserting_a_fresh_email_then_selecting_returns_it() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("1");
    let new_subscriber = db.new_subscriber("1", Some(TEST_SUBSCRIBER_NAME));

    // Act
    let id = assert_ok!(insert_subscriber(&mut db.connection, &new_subscriber).await);
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to fetch saved subscriber.");

    // Assert
    let saved = assert_some!(saved);
    assert_eq!(saved.id, id);
    assert_eq!(saved.email, email);
    assert_eq!(saved.name.as_deref(), Some(TEST_SUBSCRIBER_NAME));

    db.teardown().await;
}

#[tokio::test]
async fn a_new_subscriber_is_active_by_default() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("1");
    let new_subscriber = db.new_subscriber("1", None);

    // Act
    insert_subscriber(&mut db.connection, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to fetch saved subscriber.")
        .expect("Subscriber was not saved.");
    assert_eq!(saved.status, SubscriberStatus::Active);
    assert_none!(saved.name);

    db.teardown().await;
}

#[tokio::test]
async fn updating_the_status_is_reflected_on_select() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("2");
    let new_subscriber = db.new_subscriber("2", None);
    insert_subscriber(&mut db.connection, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");

    // Act
    update_status(&mut db.connection, &email, SubscriberStatus::Inactive)
        .await
        .expect("Failed to update status.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to fetch subscriber.")
        .expect("Subscriber disappeared.");
    assert_eq!(saved.status, SubscriberStatus::Inactive);

    db.teardown().await;
}

#[tokio::test]
async fn updating_the_name_is_reflected_on_select() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("2");
    let new_subscriber = db.new_subscriber("2", Some(TEST_SUBSCRIBER_NAME));
    insert_subscriber(&mut db.connection, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");
    let new_name = SubscriberName::parse(UPDATED_SUBSCRIBER_NAME.to_string()).unwrap();

    // Act
    update_name(&mut db.connection, &email, Some(&new_name))
        .await
        .expect("Failed to update name.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to fetch subscriber.")
        .expect("Subscriber disappeared.");
    assert_eq!(saved.name.as_deref(), Some(UPDATED_SUBSCRIBER_NAME));

    // Act - clear the name again
    update_name(&mut db.connection, &email, None)
        .await
        .expect("Failed to clear name.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to fetch subscriber.")
        .expect("Subscriber disappeared.");
    assert_none!(saved.name);

    db.teardown().await;
}

#[tokio::test]
async fn deleting_then_selecting_returns_nothing() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("3");
    let new_subscriber = db.new_subscriber("3", None);
    insert_subscriber(&mut db.connection, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");

    // Act
    delete_subscriber(&mut db.connection, &email)
        .await
        .expect("Failed to delete subscriber.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to query subscribers.");
    assert_none!(saved);

    db.teardown().await;
}

#[tokio::test]
async fn inserting_the_same_email_twice_is_an_integrity_violation() {
    // Arrange
    let mut db = spawn_test_database().await;
    let new_subscriber = db.new_subscriber("dup", None);
    insert_subscriber(&mut db.connection, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");

    // Act
    let outcome = insert_subscriber(&mut db.connection, &new_subscriber).await;

    // Assert
    match outcome {
        Err(StoreError::DuplicateEmail(email)) => assert_eq!(email, db.email("dup")),
        other => panic!("Expected a duplicate email error, got {:?}", other),
    }
    let pattern = db.email_pattern();
    let rows = list_subscribers_matching(&mut db.connection, &pattern)
        .await
        .expect("Failed to list subscribers.");
    assert_eq!(rows.len(), 1);

    db.teardown().await;
}

#[tokio::test]
async fn listing_matching_rows_returns_exactly_the_inserted_set_in_email_order() {
    // Arrange
    let mut db = spawn_test_database().await;
    for label in ["c", "a", "b"] {
        let new_subscriber = db.new_subscriber(label, None);
        insert_subscriber(&mut db.connection, &new_subscriber)
            .await
            .expect("Failed to insert subscriber.");
    }

    // Act
    let pattern = db.email_pattern();
    let rows = list_subscribers_matching(&mut db.connection, &pattern)
        .await
        .expect("Failed to list subscribers.");

    // Assert
    let emails: Vec<String> = rows.into_iter().map(|row| row.email).collect();
    assert_eq!(emails, vec![db.email("a"), db.email("b"), db.email("c")]);

    db.teardown().await;
}

#[tokio::test]
async fn updating_or_deleting_a_missing_subscriber_returns_not_found() {
    // Arrange
    let mut db = spawn_test_database().await;
    let missing = db.email("missing");

    // Act
    let update_outcome =
        update_status(&mut db.connection, &missing, SubscriberStatus::Inactive).await;
    let rename_outcome = update_name(&mut db.connection, &missing, None).await;
    let delete_outcome = delete_subscriber(&mut db.connection, &missing).await;

    // Assert
    assert!(matches!(update_outcome, Err(StoreError::NotFound(_))));
    assert!(matches!(rename_outcome, Err(StoreError::NotFound(_))));
    assert!(matches!(delete_outcome, Err(StoreError::NotFound(_))));

    db.teardown().await;
}

#[tokio::test]
async fn deleting_matching_rows_reports_how_many_were_removed() {
    // Arrange
    let mut db = spawn_test_database().await;
    for label in ["1", "2"] {
        let new_subscriber = db.new_subscriber(label, None);
        insert_subscriber(&mut db.connection, &new_subscriber)
            .await
            .expect("Failed to insert subscriber.");
    }
    let pattern = db.email_pattern();

    // Act
    let removed = delete_subscribers_matching(&mut db.connection, &pattern)
        .await
        .expect("Failed to delete subscribers.");

    // Assert
    assert_eq!(removed, 2);
    let rows = list_subscribers_matching(&mut db.connection, &pattern)
        .await
        .expect("Failed to list subscribers.");
    assert!(rows.is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn an_insert_rolled_back_in_a_transaction_is_not_persisted() {
    // Arrange
    let mut db = spawn_test_database().await;
    let email = db.email("tx");
    let new_subscriber = db.new_subscriber("tx", None);

    // Act
    let mut transaction = db
        .connection
        .begin()
        .await
        .expect("Failed to begin transaction.");
    insert_subscriber(&mut *transaction, &new_subscriber)
        .await
        .expect("Failed to insert subscriber.");
    transaction
        .rollback()
        .await
        .expect("Failed to roll back transaction.");

    // Assert
    let saved = find_subscriber_by_email(&mut db.connection, &email)
        .await
        .expect("Failed to query subscribers.");
    assert_none!(saved);

    db.teardown().await;
}
