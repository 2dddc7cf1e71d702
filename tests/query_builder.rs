mod common;

use std::sync::Arc;

use common::{result_set, session_for, tenant_session, MockDriver};
use quarry::{Error, Operator, Session, Tenant, Value};

fn setup() -> (Arc<MockDriver>, Session) {
    let driver = Arc::new(MockDriver::new());
    let session = tenant_session(&driver);
    (driver, session)
}

// ==================== Constraints and operators ====================

#[tokio::test]
async fn equality_constraint_reaches_sql() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_constraint("username", "=", "alice").unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(sql.contains("person.username = 'alice'"), "{}", sql);
    assert!(sql.starts_with("SELECT person.guid FROM person WHERE "), "{}", sql);
}

#[tokio::test]
async fn string_values_are_escaped() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_constraint("lastname", "=", "o'hara").unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.last_sql().contains("person.lastname = 'o\\'hara'"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn unknown_property_leaves_builder_unchanged() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    let err = query.add_constraint("shoesize", "=", 44u32).unwrap_err();
    assert!(matches!(err, Error::PropertyNotFound(_)));

    // the builder is still usable and carries no trace of the failure
    query.add_constraint("username", "=", "alice").unwrap();
    query.list_guids().await.unwrap();
    let sql = driver.last_sql();
    assert!(!sql.contains("shoesize"), "{}", sql);
    assert!(sql.contains("person.username = 'alice'"), "{}", sql);
}

#[tokio::test]
async fn operator_whitelist_is_closed() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    let err = query
        .add_constraint("username", "= 1; DROP TABLE person; --", "x")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperator(_)));
    assert!(!Operator::is_valid("BETWEEN"));
    assert!(Operator::is_valid("NOT LIKE"));
    assert!(driver.issued().is_empty());
}

#[tokio::test]
async fn value_coercion_is_strict() {
    let (_, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    // id is unsigned; a garbage string must fail, not silently become 0
    let err = query.add_constraint("id", "=", "twelve").unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
    let err = query.add_constraint("id", "=", 1.5f64).unwrap_err();
    assert!(matches!(err, Error::Conversion(_)));
}

#[tokio::test]
async fn in_list_keeps_caller_order() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query
        .add_constraint("id", "IN", vec![3u32, 1, 2])
        .unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.last_sql().contains("person.id IN (3,1,2)"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn empty_in_list_is_rejected() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    let err = query
        .add_constraint("id", "IN", Vec::<u32>::new())
        .unwrap_err();
    assert!(matches!(err, Error::ValueShape(_)));

    query.list_guids().await.unwrap();
    assert!(!driver.last_sql().contains("person.id IN"), "{}", driver.last_sql());
}

#[tokio::test]
async fn metadata_properties_resolve_with_prefix() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_constraint("hidden", "=", false).unwrap();
    query.add_constraint("metadata.revision", ">", 3u32).unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(sql.contains("person.metadata_hidden = 0"), "{}", sql);
    assert!(sql.contains("person.metadata_revision > 3"), "{}", sql);
}

#[tokio::test]
async fn link_hop_pulls_in_target_table() {
    let (driver, session) = setup();
    let mut query = session.query_builder("member").unwrap();
    query
        .add_constraint("person.username", "=", "alice")
        .unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(sql.contains("FROM member, person"), "{}", sql);
    assert!(sql.contains("person.username = 'alice'"), "{}", sql);
}

#[tokio::test]
async fn property_to_property_comparison() {
    let (driver, session) = setup();
    let mut query = session.query_builder("member").unwrap();
    query
        .add_constraint_with_property("person", "=", "person.id")
        .unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.last_sql().contains("member.person = person.id"),
        "{}",
        driver.last_sql()
    );
}

// ==================== Grouping ====================

#[tokio::test]
async fn groups_nest_and_parenthesize() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_constraint("username", "=", "alice").unwrap();
    query.begin_group("OR").unwrap();
    query.add_constraint("firstname", "=", "Bob").unwrap();
    query.begin_group("AND").unwrap();
    query.add_constraint("firstname", "=", "Eve").unwrap();
    query.add_constraint("lastname", "=", "Stone").unwrap();
    query.end_group().unwrap();
    query.end_group().unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(
        sql.contains(
            "person.username = 'alice' AND ( person.firstname = 'Bob' OR \
             ( person.firstname = 'Eve' AND person.lastname = 'Stone' ) )"
        ),
        "{}",
        sql
    );
}

#[tokio::test]
async fn empty_group_is_omitted() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_constraint("username", "=", "alice").unwrap();
    query.begin_group("OR").unwrap();
    query.end_group().unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(!sql.contains("( )"), "{}", sql);
    assert!(!sql.contains("OR"), "{}", sql);
}

#[tokio::test]
async fn stray_end_group_is_an_error() {
    let (_, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    assert!(matches!(
        query.end_group().unwrap_err(),
        Error::UnbalancedGrouping
    ));
}

#[tokio::test]
async fn open_group_blocks_execution() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.begin_group("AND").unwrap();
    query.add_constraint("username", "=", "alice").unwrap();

    assert!(matches!(
        query.execute().await.unwrap_err(),
        Error::UnbalancedGrouping
    ));
    assert!(driver.issued().is_empty());

    // closing the group makes the same builder executable
    query.end_group().unwrap();
    query.execute().await.unwrap();
    assert_eq!(driver.issued().len(), 1);
}

// ==================== Tenancy and visibility ====================

#[tokio::test]
async fn tenant_filter_admits_shared_rows() {
    let (driver, session) = setup();
    let query = session.query_builder("person").unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.last_sql().contains("person.sitegroup IN (0, 7)"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn root_tenant_is_unfiltered() {
    let driver = Arc::new(MockDriver::new());
    let session = session_for(&driver, Tenant::root(1));
    let query = session.query_builder("person").unwrap();
    query.list_guids().await.unwrap();

    assert!(!driver.last_sql().contains("sitegroup IN"), "{}", driver.last_sql());
}

#[tokio::test]
async fn deleted_rows_are_hidden_by_default() {
    let (driver, session) = setup();
    let query = session.query_builder("person").unwrap();
    query.list_guids().await.unwrap();
    assert!(
        driver.last_sql().contains("person.metadata_deleted = 0"),
        "{}",
        driver.last_sql()
    );

    let mut query = session.query_builder("person").unwrap();
    query.include_deleted();
    query.list_guids().await.unwrap();
    assert!(
        !driver.last_sql().contains("metadata_deleted"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn protected_class_needs_root() {
    let (driver, session) = setup();
    let query = session.query_builder("sitegroup").unwrap();
    assert!(matches!(
        query.list_guids().await.unwrap_err(),
        Error::AccessDenied(_)
    ));
    assert!(driver.issued().is_empty());

    let root = session_for(&driver, Tenant::root(1));
    let query = root.query_builder("sitegroup").unwrap();
    query.list_guids().await.unwrap();
    assert_eq!(driver.issued().len(), 1);
}

// ==================== Ordering and paging ====================

#[tokio::test]
async fn order_terms_keep_their_sequence() {
    let (driver, session) = setup();
    let mut query = session.query_builder("person").unwrap();
    query.add_order("lastname", "ASC").unwrap();
    query.add_order("id", "desc").unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver
            .last_sql()
            .ends_with(" ORDER BY person.lastname ASC, person.id DESC"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn limit_and_offset_tail() {
    let (driver, session) = setup();

    let mut query = session.query_builder("person").unwrap();
    query.set_limit(10);
    query.list_guids().await.unwrap();
    assert!(driver.last_sql().ends_with(" LIMIT 10"), "{}", driver.last_sql());

    let mut query = session.query_builder("person").unwrap();
    query.set_limit(10);
    query.set_offset(5);
    query.list_guids().await.unwrap();
    assert!(
        driver.last_sql().ends_with(" LIMIT 10 OFFSET 5"),
        "{}",
        driver.last_sql()
    );

    // MySQL cannot express offset without limit
    let mut query = session.query_builder("person").unwrap();
    query.set_offset(5);
    query.list_guids().await.unwrap();
    assert!(
        driver
            .last_sql()
            .ends_with(" LIMIT 18446744073709551615 OFFSET 5"),
        "{}",
        driver.last_sql()
    );
}

// ==================== INTREE ====================

#[tokio::test]
async fn intree_expands_to_descendant_ids() {
    let (driver, session) = setup();
    driver.push(result_set(&["id"], &[&[Some("2")], &[Some("3")]]));
    driver.push(result_set(&["id"], &[]));

    let mut query = session.query_builder("topic").unwrap();
    query.add_constraint("up", "INTREE", 1u32).unwrap();
    query.list_guids().await.unwrap();

    let issued = driver.issued();
    assert_eq!(issued[0], "SELECT id FROM topic WHERE up IN (1)");
    assert_eq!(issued[1], "SELECT id FROM topic WHERE up IN (2,3)");
    assert!(issued[2].contains("topic.up IN (1,2,3)"), "{}", issued[2]);
}

#[tokio::test]
async fn intree_childless_root_matches_itself() {
    let (driver, session) = setup();
    driver.push(result_set(&["id"], &[]));

    let mut query = session.query_builder("topic").unwrap();
    query.add_constraint("up", "INTREE", 9u32).unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.issued()[1].contains("topic.up IN (9)"),
        "{}",
        driver.issued()[1]
    );
}

#[tokio::test]
async fn intree_only_applies_to_tree_linkage() {
    let (_, session) = setup();
    let mut query = session.query_builder("topic").unwrap();
    assert!(matches!(
        query.add_constraint("name", "INTREE", 1u32).unwrap_err(),
        Error::ValueShape(_)
    ));

    // person has no tree linkage at all
    let mut query = session.query_builder("person").unwrap();
    assert!(matches!(
        query.add_constraint("id", "INTREE", 1u32).unwrap_err(),
        Error::ValueShape(_)
    ));
}

// ==================== Language handling ====================

#[tokio::test]
async fn multilang_class_joins_instance_table() {
    let (driver, session) = setup();
    let session = session.with_language(2);
    let query = session.query_builder("article").unwrap();
    query.list_guids().await.unwrap();

    let sql = driver.last_sql();
    assert!(sql.contains("FROM article, article_i"), "{}", sql);
    assert!(sql.contains("article.id = article_i.sid"), "{}", sql);
    assert!(sql.contains("article_i.lang IN (0, 2)"), "{}", sql);
}

#[tokio::test]
async fn default_language_needs_no_fallback() {
    let (driver, session) = setup();
    let query = session.query_builder("article").unwrap();
    query.list_guids().await.unwrap();

    assert!(
        driver.last_sql().contains("article_i.lang = 0"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn unset_languages_drops_the_join() {
    let (driver, session) = setup();
    let mut query = session.query_builder("article").unwrap();
    query.unset_languages();
    query.list_guids().await.unwrap();

    assert!(!driver.last_sql().contains("article_i"), "{}", driver.last_sql());
}

#[tokio::test]
async fn language_fallback_prefers_requested_row() {
    let (driver, session) = setup();
    let session = session.with_language(2);
    let columns = &["guid", "sitegroup", "id", "topic", "title", "content", "sid", "lang"];
    driver.push(result_set(
        columns,
        &[
            &[Some("g1"), Some("7"), Some("1"), Some("0"), Some("Hello"), Some(""), Some("1"), Some("0")],
            &[Some("g1"), Some("7"), Some("1"), Some("0"), Some("Bonjour"), Some(""), Some("1"), Some("2")],
            &[Some("g2"), Some("7"), Some("2"), Some("0"), Some("Solo"), Some(""), Some("2"), Some("0")],
        ],
    ));

    let query = session.query_builder("article").unwrap();
    let records = query.execute().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].guid, "g1");
    assert_eq!(records[0].lang, Some(2));
    assert_eq!(records[0].get("title"), Some(&Value::from("Bonjour")));
    assert_eq!(records[1].guid, "g2");
    assert_eq!(records[1].lang, Some(0));
}

// ==================== Materialization ====================

#[tokio::test]
async fn object_rows_materialize_typed() {
    let (driver, session) = setup();
    driver.push(result_set(
        &[
            "guid",
            "sitegroup",
            "id",
            "username",
            "firstname",
            "lastname",
            "metadata_creator",
            "metadata_created",
            "metadata_revised",
            "metadata_revision",
            "metadata_hidden",
        ],
        &[&[
            Some("a1b2"),
            Some("7"),
            Some("12"),
            Some("alice"),
            Some("Alice"),
            None,
            Some("c0ffee"),
            Some("0000-00-00 00:00:00"),
            Some("2007-03-01 10:00:00"),
            Some("4"),
            Some("1"),
        ]],
    ));

    let query = session.query_builder("person").unwrap();
    let records = query.execute().await.unwrap();
    assert_eq!(records.len(), 1);

    let person = &records[0];
    assert_eq!(person.class, "person");
    assert_eq!(person.guid, "a1b2");
    assert_eq!(person.sitegroup, 7);
    assert_eq!(person.lang, None);
    assert_eq!(person.get("id"), Some(&Value::Uint(12)));
    assert_eq!(person.get("username"), Some(&Value::from("alice")));
    // NULL cell falls back to the declared type's zero value
    assert_eq!(person.get("lastname"), Some(&Value::from("")));
    assert_eq!(person.metadata.creator, "c0ffee");
    assert_eq!(person.metadata.created, None); // zero datetime
    assert!(person.metadata.revised.is_some());
    assert_eq!(person.metadata.revision, 4);
    assert!(person.metadata.hidden);
}

#[tokio::test]
async fn raw_rows_keep_cells_verbatim() {
    let (driver, session) = setup();
    driver.push(result_set(
        &["guid", "sitegroup", "id", "username"],
        &[&[Some("a1b2"), Some("7"), Some("12"), Some("alice")]],
    ));

    let query = session.query_builder("person").unwrap();
    let rows = query.execute_raw().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].guid, "a1b2");
    assert_eq!(rows[0].sitegroup, 7);
    assert_eq!(rows[0].cell("username"), Some("alice"));
    assert_eq!(rows[0].cell("nosuchcolumn"), None);
}

#[tokio::test]
async fn count_wraps_the_guid_query() {
    let (driver, session) = setup();
    driver.push(result_set(&["COUNT(*)"], &[&[Some("5")]]));

    let query = session.query_builder("person").unwrap();
    let total = query.count().await.unwrap();
    assert_eq!(total, 5);

    let sql = driver.last_sql();
    assert!(
        sql.starts_with("SELECT COUNT(*) FROM (SELECT person.guid FROM person"),
        "{}",
        sql
    );
    assert!(sql.ends_with(") AS qbcount"), "{}", sql);
}

#[tokio::test]
async fn field_mode_decodes_declared_types() {
    let (driver, session) = setup();
    driver.push(result_set(
        &["id", "username", "guid"],
        &[&[Some("12"), Some("alice"), Some("a1b2")]],
    ));

    let mut query = session.query_builder("person").unwrap();
    let rows = query
        .execute_fields(&["id".to_string(), "username".to_string()])
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&Value::Uint(12)));
    assert_eq!(rows[0].get("username"), Some(&Value::from("alice")));
    assert!(
        driver
            .last_sql()
            .starts_with("SELECT person.id AS id, person.username AS username, person.guid FROM person"),
        "{}",
        driver.last_sql()
    );
}

#[tokio::test]
async fn driver_failure_surfaces_as_error() {
    let (driver, session) = setup();
    driver.push_failure("server has gone away");

    let query = session.query_builder("person").unwrap();
    assert!(matches!(
        query.execute().await.unwrap_err(),
        Error::Driver(_)
    ));
}

#[tokio::test]
async fn unknown_class_is_rejected_up_front() {
    let (_, session) = setup();
    assert!(matches!(
        session.query_builder("no_such_class").unwrap_err(),
        Error::UnknownClass(_)
    ));
}
