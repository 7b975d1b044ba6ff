use ravel::algorithms::{bfs, page_rank, PageRankConfig};
use ravel::{GraphDB, Properties, Result};
use tempfile::tempdir;

#[test]
fn page_rank_on_three_node_cycle() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;

    let a = db.add_node("Page", Properties::new())?.id;
    let b = db.add_node("Page", Properties::new())?.id;
    let c = db.add_node("Page", Properties::new())?.id;
    db.add_edge(a, b, "LINKS", Properties::new())?;
    db.add_edge(b, c, "LINKS", Properties::new())?;
    db.add_edge(c, a, "LINKS", Properties::new())?;

    let scores = page_rank(db.graph(), PageRankConfig::default());

    for id in [a, b, c] {
        let score = scores[&id];
        assert!(
            (score - 1.0 / 3.0).abs() < 0.001,
            "node {id} converged to {score}, expected ~1/3"
        );
    }
    Ok(())
}

#[test]
fn page_rank_survives_restart() -> Result<()> {
    let dir = tempdir().unwrap();
    {
        let db = GraphDB::open(dir.path())?;
        let a = db.add_node("Page", Properties::new())?.id;
        let b = db.add_node("Page", Properties::new())?.id;
        let c = db.add_node("Page", Properties::new())?.id;
        db.add_edge(a, b, "LINKS", Properties::new())?;
        db.add_edge(b, c, "LINKS", Properties::new())?;
        db.add_edge(c, a, "LINKS", Properties::new())?;
    }

    let db = GraphDB::open(dir.path())?;
    let scores = page_rank(db.graph(), PageRankConfig::default());
    for id in [1u64, 2, 3] {
        assert!((scores[&id] - 1.0 / 3.0).abs() < 0.001);
    }
    Ok(())
}

#[test]
fn bfs_shortest_path_over_durable_graph() -> Result<()> {
    let dir = tempdir().unwrap();
    let db = GraphDB::open(dir.path())?;

    for _ in 0..4 {
        db.add_node("Stop", Properties::new())?;
    }
    db.add_edge(1, 2, "NEXT", Properties::new())?;
    db.add_edge(2, 3, "NEXT", Properties::new())?;
    db.add_edge(3, 4, "NEXT", Properties::new())?;
    db.add_edge(1, 4, "EXPRESS", Properties::new())?;

    let result = bfs(db.graph(), 1, Some(4), 0)?;
    assert!(result.found);
    // The express hop wins over the three-stop chain.
    assert_eq!(result.path, vec![1, 4]);
    assert_eq!(result.distance, 1);
    Ok(())
}
