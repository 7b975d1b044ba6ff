use std::collections::HashSet;

use ravel::{GraphDB, GraphError, Properties, PropertyValue, Result, Value};
use tempfile::tempdir;

/// Alice (30, SF), Bob (25, NY), Charlie (35, SF); Alice-KNOWS->Bob and
/// Bob-KNOWS->Charlie.
fn seed(db: &GraphDB) -> Result<()> {
    for (name, age, city) in [("Alice", 30, "SF"), ("Bob", 25, "NY"), ("Charlie", 35, "SF")] {
        db.add_node(
            "Person",
            Properties::from([
                ("name".to_owned(), PropertyValue::from(name)),
                ("age".to_owned(), PropertyValue::Int(age)),
                ("city".to_owned(), PropertyValue::from(city)),
            ]),
        )?;
    }
    db.add_edge(1, 2, "KNOWS", Properties::new())?;
    db.add_edge(2, 3, "KNOWS", Properties::new())?;
    Ok(())
}

fn names(rows: &[ravel::Row], column: &str) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| match row.get(column) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn filter_query_returns_matching_people() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let result = db.execute_query("MATCH (n:Person) WHERE n.age > 28 RETURN n.name")?;

    assert_eq!(result.columns, vec!["n.name"]);
    assert_eq!(
        names(&result.rows, "n.name"),
        HashSet::from(["Alice".into(), "Charlie".into()])
    );
    Ok(())
}

#[test]
fn expand_query_returns_knows_pairs() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let result = db.execute_query("MATCH (a:Person)-[:KNOWS]->(b) RETURN a.name, b.name")?;

    assert_eq!(result.columns, vec!["a.name", "b.name"]);
    let pairs: HashSet<(String, String)> = result
        .rows
        .iter()
        .map(|row| match (row.get("a.name"), row.get("b.name")) {
            (Some(Value::String(a)), Some(Value::String(b))) => (a.clone(), b.clone()),
            other => panic!("unexpected row shape: {other:?}"),
        })
        .collect();
    assert_eq!(
        pairs,
        HashSet::from([
            ("Alice".into(), "Bob".into()),
            ("Bob".into(), "Charlie".into())
        ])
    );
    Ok(())
}

#[test]
fn queries_observe_recovered_state() -> Result<()> {
    let dir = tempdir().unwrap();
    {
        let db = GraphDB::open(dir.path())?;
        seed(&db)?;
        db.snapshot()?;
        db.set_node_property(2, "age", PropertyValue::Int(29))?;
    }

    let db = GraphDB::open(dir.path())?;
    let result = db.execute_query("MATCH (n:Person) WHERE n.age >= 29 RETURN n.name")?;
    assert_eq!(
        names(&result.rows, "n.name"),
        HashSet::from(["Alice".into(), "Bob".into(), "Charlie".into()])
    );
    Ok(())
}

#[test]
fn limit_applies_after_projection() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let result = db.execute_query("MATCH (n:Person) RETURN n.name LIMIT 1")?;
    assert_eq!(result.rows.len(), 1);
    Ok(())
}

#[test]
fn query_row_set_is_stable_across_runs() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let text = r#"MATCH (n:Person) WHERE n.city = "SF" RETURN n.name"#;
    let first = db.execute_query(text)?;
    for _ in 0..5 {
        let again = db.execute_query(text)?;
        assert_eq!(names(&first.rows, "n.name"), names(&again.rows, "n.name"));
    }
    Ok(())
}

#[test]
fn parse_errors_do_not_affect_state() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let err = db.execute_query("MATCH (n:Person RETURN n.name").unwrap_err();
    assert!(matches!(err, GraphError::Parse(_)));

    assert_eq!(db.node_count(), 3);
    let result = db.execute_query("MATCH (n:Person) RETURN n.name")?;
    assert_eq!(result.rows.len(), 3);
    Ok(())
}

#[test]
fn execution_errors_surface_cleanly() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;

    let err = db
        .execute_query("MATCH (n:Person) WHERE missing.age > 1 RETURN n.name")
        .unwrap_err();
    assert!(matches!(err, GraphError::Execution(_)));
    Ok(())
}

#[test]
fn bidirectional_expand_with_edge_type() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;
    seed(&db)?;
    // An edge of a different type must not leak into a typed Both expansion.
    db.add_edge(2, 1, "BLOCKS", Properties::new())?;

    let result =
        db.execute_query(r#"MATCH (a {name: "Bob"})-[:KNOWS]-(b) RETURN b.name"#)?;
    assert_eq!(
        names(&result.rows, "b.name"),
        HashSet::from(["Alice".into(), "Charlie".into()])
    );
    Ok(())
}
