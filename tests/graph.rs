use kadedb::engine::graph::{Edge, GraphStore, Node};
use kadedb::value::Value;
use rustc_hash::FxHashMap;

fn knows_graph() -> GraphStore {
    let g = GraphStore::new();
    g.create_graph("g").unwrap();
    for id in 1..=4 {
        g.add_node("g", Node { id, label: "Person".into(), properties: FxHashMap::default() }).unwrap();
    }
    g.put_edge("g", Edge { id: 1, from: 1, to: 2, edge_type: "KNOWS".into(), properties: FxHashMap::default() }).unwrap();
    g.put_edge("g", Edge { id: 2, from: 2, to: 3, edge_type: "KNOWS".into(), properties: FxHashMap::default() }).unwrap();
    g.put_edge("g", Edge { id: 3, from: 3, to: 4, edge_type: "LIKES".into(), properties: FxHashMap::default() }).unwrap();
    g
}

#[test]
fn scenario_s4_shortest_path_and_connectivity_via_dialect() {
    let g = knows_graph();

    let rs = g.execute_query("SHORTEST_PATH g FROM 1 TO 4").unwrap();
    let path: Vec<i64> = (0..rs.row_count()).map(|i| rs.cell(i, 1).unwrap().as_int().unwrap()).collect();
    assert_eq!(path, vec![1, 2, 3, 4]);

    let rs = g.execute_query("CONNECTED g FROM 4 TO 1").unwrap();
    assert_eq!(rs.cell(0, 0).unwrap(), &Value::boolean(false));
}

#[test]
fn traverse_dialect_bfs_matches_direct_call() {
    let g = knows_graph();
    let direct = g.bfs("g", 1, 0).unwrap();
    let rs = g.execute_query("TRAVERSE g FROM 1 BFS").unwrap();
    let via_query: Vec<i64> = (0..rs.row_count()).map(|i| rs.cell(i, 0).unwrap().as_int().unwrap()).collect();
    assert_eq!(direct, via_query);
}

#[test]
fn deleting_a_node_detaches_its_edges() {
    let g = knows_graph();
    g.delete_node("g", 2).unwrap();
    assert!(g.get_edge("g", 1).is_err());
    assert!(g.get_edge("g", 2).is_err());
    assert!(g.get_edge("g", 3).is_ok());
}
