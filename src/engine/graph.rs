//! In-memory labeled property graph engine (spec §4.G).
//!
//! The tiny query dialect (`TRAVERSE`/`MATCH`/`SHORTEST_PATH`/`CONNECTED`) is
//! grounded on `original_source/cpp/src/core/graph_query.cpp`'s
//! whitespace tokenizer and per-verb exec functions, translated from
//! `Result<ResultSet>`-returning free functions into methods on
//! [`GraphStore`] with the same case-insensitive keyword matching.

use crate::resultset::{ColumnMeta, ResultSet};
use crate::status::{KdbResult, Status};
use crate::value::{DataType, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

pub type NodeId = i64;
pub type EdgeId = i64;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub properties: FxHashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: String,
    pub properties: FxHashMap<String, Value>,
}

#[derive(Default)]
struct GraphData {
    nodes: FxHashMap<NodeId, Node>,
    edges: FxHashMap<EdgeId, Edge>,
    out_adj: FxHashMap<NodeId, Vec<EdgeId>>,
    in_adj: FxHashMap<NodeId, Vec<EdgeId>>,
}

impl GraphData {
    fn detach_edge(&mut self, edge_id: EdgeId) {
        if let Some(e) = self.edges.get(&edge_id).cloned() {
            if let Some(list) = self.out_adj.get_mut(&e.from) {
                list.retain(|x| *x != edge_id);
            }
            if let Some(list) = self.in_adj.get_mut(&e.to) {
                list.retain(|x| *x != edge_id);
            }
        }
    }
}

#[derive(Default)]
pub struct GraphStore {
    graphs: Mutex<FxHashMap<String, GraphData>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_graph(&self, name: &str) -> KdbResult<()> {
        let mut graphs = self.graphs.lock();
        if graphs.contains_key(name) {
            return Err(Status::already_exists(format!("graph '{}' already exists", name)));
        }
        graphs.insert(name.to_string(), GraphData::default());
        Ok(())
    }

    fn with_graph<T>(&self, name: &str, f: impl FnOnce(&GraphData) -> KdbResult<T>) -> KdbResult<T> {
        let graphs = self.graphs.lock();
        let g = graphs
            .get(name)
            .ok_or_else(|| Status::not_found(format!("graph '{}' not found", name)))?;
        f(g)
    }

    fn with_graph_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut GraphData) -> KdbResult<T>,
    ) -> KdbResult<T> {
        let mut graphs = self.graphs.lock();
        let g = graphs
            .get_mut(name)
            .ok_or_else(|| Status::not_found(format!("graph '{}' not found", name)))?;
        f(g)
    }

    pub fn add_node(&self, graph: &str, node: Node) -> KdbResult<()> {
        self.with_graph_mut(graph, |g| {
            if g.nodes.contains_key(&node.id) {
                return Err(Status::already_exists(format!("node {} already exists", node.id)));
            }
            g.nodes.insert(node.id, node);
            Ok(())
        })
    }

    pub fn get_node(&self, graph: &str, id: NodeId) -> KdbResult<Node> {
        self.with_graph(graph, |g| {
            g.nodes
                .get(&id)
                .cloned()
                .ok_or_else(|| Status::not_found(format!("node {} not found", id)))
        })
    }

    /// Deleting a node collects all incident edges, detaches and erases
    /// each, then removes the node.
    pub fn delete_node(&self, graph: &str, id: NodeId) -> KdbResult<()> {
        self.with_graph_mut(graph, |g| {
            if !g.nodes.contains_key(&id) {
                return Err(Status::not_found(format!("node {} not found", id)));
            }
            let mut incident: Vec<EdgeId> = g.out_adj.get(&id).cloned().unwrap_or_default();
            incident.extend(g.in_adj.get(&id).cloned().unwrap_or_default());
            for eid in incident {
                g.detach_edge(eid);
                g.edges.remove(&eid);
            }
            g.nodes.remove(&id);
            g.out_adj.remove(&id);
            g.in_adj.remove(&id);
            Ok(())
        })
    }

    /// Endpoints must exist. Updating an existing edge id first detaches its
    /// old adjacency entries.
    pub fn put_edge(&self, graph: &str, edge: Edge) -> KdbResult<()> {
        self.with_graph_mut(graph, |g| {
            if !g.nodes.contains_key(&edge.from) || !g.nodes.contains_key(&edge.to) {
                return Err(Status::invalid_argument("edge endpoints must exist"));
            }
            if g.edges.contains_key(&edge.id) {
                g.detach_edge(edge.id);
            }
            g.out_adj.entry(edge.from).or_default().push(edge.id);
            g.in_adj.entry(edge.to).or_default().push(edge.id);
            g.edges.insert(edge.id, edge);
            Ok(())
        })
    }

    pub fn get_edge(&self, graph: &str, id: EdgeId) -> KdbResult<Edge> {
        self.with_graph(graph, |g| {
            g.edges
                .get(&id)
                .cloned()
                .ok_or_else(|| Status::not_found(format!("edge {} not found", id)))
        })
    }

    pub fn delete_edge(&self, graph: &str, id: EdgeId) -> KdbResult<()> {
        self.with_graph_mut(graph, |g| {
            if !g.edges.contains_key(&id) {
                return Err(Status::not_found(format!("edge {} not found", id)));
            }
            g.detach_edge(id);
            g.edges.remove(&id);
            Ok(())
        })
    }

    fn neighbors_out(&self, g: &GraphData, node: NodeId) -> Vec<NodeId> {
        g.out_adj
            .get(&node)
            .map(|edges| edges.iter().filter_map(|e| g.edges.get(e).map(|e| e.to)).collect())
            .unwrap_or_default()
    }

    /// BFS visit order starting at `start`; `max_nodes > 0` caps the output
    /// length.
    pub fn bfs(&self, graph: &str, start: NodeId, max_nodes: usize) -> KdbResult<Vec<NodeId>> {
        self.with_graph(graph, |g| {
            let mut visited = vec![start];
            let mut seen = std::collections::HashSet::new();
            seen.insert(start);
            let mut queue = VecDeque::from([start]);
            while let Some(cur) = queue.pop_front() {
                if max_nodes > 0 && visited.len() >= max_nodes {
                    break;
                }
                for next in self.neighbors_out(g, cur) {
                    if seen.insert(next) {
                        visited.push(next);
                        queue.push_back(next);
                        if max_nodes > 0 && visited.len() >= max_nodes {
                            break;
                        }
                    }
                }
            }
            if max_nodes > 0 {
                visited.truncate(max_nodes);
            }
            Ok(visited)
        })
    }

    /// DFS visit order starting at `start`; `max_nodes > 0` caps the output
    /// length.
    pub fn dfs(&self, graph: &str, start: NodeId, max_nodes: usize) -> KdbResult<Vec<NodeId>> {
        self.with_graph(graph, |g| {
            let mut visited = Vec::new();
            let mut seen = std::collections::HashSet::new();
            let mut stack = vec![start];
            while let Some(cur) = stack.pop() {
                if !seen.insert(cur) {
                    continue;
                }
                visited.push(cur);
                if max_nodes > 0 && visited.len() >= max_nodes {
                    break;
                }
                let mut neighbors = self.neighbors_out(g, cur);
                neighbors.reverse();
                for n in neighbors {
                    if !seen.contains(&n) {
                        stack.push(n);
                    }
                }
            }
            if max_nodes > 0 {
                visited.truncate(max_nodes);
            }
            Ok(visited)
        })
    }

    /// Unweighted BFS shortest path with parent pointers; empty on
    /// disconnect.
    pub fn shortest_path(&self, graph: &str, start: NodeId, goal: NodeId) -> KdbResult<Vec<NodeId>> {
        self.with_graph(graph, |g| Ok(shortest_path_in(self, g, start, goal)))
    }

    pub fn connected(&self, graph: &str, start: NodeId, goal: NodeId) -> KdbResult<bool> {
        Ok(!self.shortest_path(graph, start, goal)?.is_empty())
    }

    /// `MATCH g (a)-[:TYPE]->(b) WHERE a = n RETURN b`: returns the
    /// out-neighbors of `start` reachable by an edge of the given type
    /// (empty type = any).
    pub fn match_pattern(&self, graph: &str, start: NodeId, edge_type: &str) -> KdbResult<Vec<NodeId>> {
        self.with_graph(graph, |g| {
            let out = g.out_adj.get(&start).cloned().unwrap_or_default();
            let mut result = Vec::new();
            for eid in out {
                if let Some(e) = g.edges.get(&eid) {
                    if edge_type.is_empty() || e.edge_type.eq_ignore_ascii_case(edge_type) {
                        result.push(e.to);
                    }
                }
            }
            Ok(result)
        })
    }

    /// Execute the tiny whitespace-tokenized query dialect: `TRAVERSE`,
    /// `MATCH`, `SHORTEST_PATH`, `CONNECTED`.
    pub fn execute_query(&self, query: &str) -> KdbResult<ResultSet> {
        let toks: Vec<&str> = query.split_whitespace().collect();
        let Some(verb) = toks.first() else {
            return Err(Status::invalid_argument("empty graph query"));
        };
        if ieq(verb, "TRAVERSE") {
            self.exec_traverse(&toks)
        } else if ieq(verb, "MATCH") {
            self.exec_match(&toks)
        } else if ieq(verb, "SHORTEST_PATH") {
            self.exec_shortest_path(&toks)
        } else if ieq(verb, "CONNECTED") {
            self.exec_connected(&toks)
        } else {
            Err(Status::invalid_argument(format!("unknown graph query verb: {}", verb)))
        }
    }

    fn exec_traverse(&self, toks: &[&str]) -> KdbResult<ResultSet> {
        if toks.len() < 5 {
            return Err(Status::invalid_argument(
                "TRAVERSE syntax: TRAVERSE <graph> FROM <start> (BFS|DFS) [LIMIT <n>]",
            ));
        }
        let graph = toks[1];
        expect_keyword(toks[2], "FROM")?;
        let start = parse_int(toks[3])?;
        let mode = toks[4];
        let mut limit = 0usize;
        if toks.len() >= 7 && ieq(toks[5], "LIMIT") {
            let n = parse_int(toks[6])?;
            if n < 0 {
                return Err(Status::invalid_argument("LIMIT must be >= 0"));
            }
            limit = n as usize;
        }
        let nodes = if ieq(mode, "BFS") {
            self.bfs(graph, start, limit)?
        } else if ieq(mode, "DFS") {
            self.dfs(graph, start, limit)?
        } else {
            return Err(Status::invalid_argument("expected BFS or DFS"));
        };
        Ok(node_list_result(&nodes))
    }

    fn exec_connected(&self, toks: &[&str]) -> KdbResult<ResultSet> {
        if toks.len() < 6 {
            return Err(Status::invalid_argument(
                "CONNECTED syntax: CONNECTED <graph> FROM <a> TO <b>",
            ));
        }
        let graph = toks[1];
        expect_keyword(toks[2], "FROM")?;
        let a = parse_int(toks[3])?;
        expect_keyword(toks[4], "TO")?;
        let b = parse_int(toks[5])?;
        let connected = self.connected(graph, a, b)?;
        let mut rs = ResultSet::new(vec![ColumnMeta {
            name: "value".into(),
            data_type: DataType::Boolean,
        }]);
        rs.push_row(vec![Value::boolean(connected)]);
        Ok(rs)
    }

    fn exec_shortest_path(&self, toks: &[&str]) -> KdbResult<ResultSet> {
        if toks.len() < 6 {
            return Err(Status::invalid_argument(
                "SHORTEST_PATH syntax: SHORTEST_PATH <graph> FROM <a> TO <b>",
            ));
        }
        let graph = toks[1];
        expect_keyword(toks[2], "FROM")?;
        let a = parse_int(toks[3])?;
        expect_keyword(toks[4], "TO")?;
        let b = parse_int(toks[5])?;
        let path = self.shortest_path(graph, a, b)?;
        let mut rs = ResultSet::new(vec![
            ColumnMeta { name: "step".into(), data_type: DataType::Integer },
            ColumnMeta { name: "node_id".into(), data_type: DataType::Integer },
        ]);
        for (i, n) in path.iter().enumerate() {
            rs.push_row(vec![Value::integer(i as i64), Value::integer(*n)]);
        }
        Ok(rs)
    }

    fn exec_match(&self, toks: &[&str]) -> KdbResult<ResultSet> {
        // MATCH <graph> (a)-[:TYPE]->(b) WHERE a = <id> RETURN b
        if toks.len() < 8 {
            return Err(Status::invalid_argument(
                "MATCH syntax: MATCH <graph> (a)-[:TYPE]->(b) WHERE a = <id> RETURN b",
            ));
        }
        let graph = toks[1];
        let pattern = toks[2];

        let where_idx = toks
            .iter()
            .position(|t| ieq(t, "WHERE"))
            .ok_or_else(|| Status::invalid_argument("expected WHERE"))?;
        if where_idx == 0 || where_idx + 4 >= toks.len() {
            return Err(Status::invalid_argument("invalid WHERE clause"));
        }
        if !ieq(toks[where_idx + 1], "a") {
            return Err(Status::invalid_argument("expected 'a' in WHERE"));
        }
        if toks[where_idx + 2] != "=" {
            return Err(Status::invalid_argument("expected '=' in WHERE"));
        }
        let start = parse_int(toks[where_idx + 3])?;

        let ret_idx = where_idx + 4;
        if ret_idx + 1 >= toks.len() || !ieq(toks[ret_idx], "RETURN") {
            return Err(Status::invalid_argument("expected RETURN"));
        }
        if !ieq(toks[ret_idx + 1], "b") {
            return Err(Status::invalid_argument("only RETURN b is supported"));
        }

        let edge_type = pattern
            .find("[:")
            .and_then(|p| pattern[p + 2..].find(']').map(|e| pattern[p + 2..p + 2 + e].to_string()))
            .unwrap_or_default();

        let nodes = self.match_pattern(graph, start, &edge_type)?;
        Ok(node_list_result(&nodes))
    }
}

fn shortest_path_in(_store: &GraphStore, g: &GraphData, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    if start == goal {
        return vec![start];
    }
    let mut seen = std::collections::HashSet::new();
    let mut parent: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut queue = VecDeque::from([start]);
    seen.insert(start);
    while let Some(cur) = queue.pop_front() {
        let neighbors: Vec<NodeId> = g
            .out_adj
            .get(&cur)
            .map(|edges| edges.iter().filter_map(|e| g.edges.get(e).map(|e| e.to)).collect())
            .unwrap_or_default();
        for next in neighbors {
            if !seen.insert(next) {
                continue;
            }
            parent.insert(next, cur);
            if next == goal {
                let mut path = vec![next];
                let mut x = next;
                while let Some(&p) = parent.get(&x) {
                    path.push(p);
                    x = p;
                    if x == start {
                        break;
                    }
                }
                path.reverse();
                return path;
            }
            queue.push_back(next);
        }
    }
    Vec::new()
}

fn node_list_result(nodes: &[NodeId]) -> ResultSet {
    let mut rs = ResultSet::new(vec![ColumnMeta {
        name: "node_id".into(),
        data_type: DataType::Integer,
    }]);
    for n in nodes {
        rs.push_row(vec![Value::integer(*n)]);
    }
    rs
}

fn ieq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn expect_keyword(tok: &str, word: &str) -> KdbResult<()> {
    if ieq(tok, word) {
        Ok(())
    } else {
        Err(Status::invalid_argument(format!("expected {}", word)))
    }
}

fn parse_int(s: &str) -> KdbResult<i64> {
    s.parse::<i64>()
        .map_err(|_| Status::invalid_argument(format!("invalid integer: {}", s)))
}
