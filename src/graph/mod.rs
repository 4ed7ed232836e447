use crate::graph::property_value::PropertyValue;
use hashbrown::HashMap;
use std::convert::TryFrom;

pub mod property_value;

pub type VertexId = u32;
pub type EdgeId = u32;
pub type Properties = HashMap<String, PropertyValue>;

#[derive(Debug, Clone, Serialize, Deserialize, new)]
pub struct Vertex {
    pub label: String,
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize, new)]
pub struct Edge {
    pub label: String,
    pub src: VertexId,
    pub dst: VertexId,
    pub properties: Properties,
}

/// The storage collaborator consumed by both the traversal pipeline and the graph computer.
///
/// The contract is intentionally narrow: vertex/edge iteration (optionally index-accelerated by an
/// equality lookup on a property key), property access, and transaction-style demarcation. Neither
/// execution layer reaches past this trait into storage internals.
pub trait GraphStore {
    fn vertex_count(&self) -> usize;
    fn edge_count(&self) -> usize;
    fn vertex_ids(&self) -> Box<dyn Iterator<Item = VertexId> + '_>;
    /// Vertices whose property `key` equals `value`. Uses the property index when one has been
    /// built for `key`, otherwise falls back to a full scan.
    fn vertex_ids_by(
        &self,
        key: &str,
        value: &PropertyValue,
    ) -> Box<dyn Iterator<Item = VertexId> + '_>;
    fn vertex_label(&self, vertex_id: VertexId) -> Option<&str>;
    fn vertex_property(&self, vertex_id: VertexId, key: &str) -> Option<&PropertyValue>;
    fn set_vertex_property(&mut self, vertex_id: VertexId, key: &str, value: PropertyValue);
    fn edges(&self) -> Box<dyn Iterator<Item = &Edge> + '_>;
    fn out_vertex_ids(&self, vertex_id: VertexId) -> Vec<VertexId>;
    fn in_vertex_ids(&self, vertex_id: VertexId) -> Vec<VertexId>;
    fn out_degree(&self, vertex_id: VertexId) -> usize;
    /// Read/write demarcation. The in-memory store commits every mutation immediately, so these
    /// are observation points for transactional backends only.
    fn begin(&self) {}
    fn commit(&self) {}
}

/// In-memory reference implementation of [`GraphStore`]. Vertices and edges are identified by
/// their insertion index.
#[derive(Default, Debug, Clone)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    out_adjacency: Vec<Vec<EdgeId>>,
    in_adjacency: Vec<Vec<EdgeId>>,
    index: HashMap<String, HashMap<PropertyValue, Vec<VertexId>>>,
}

impl Graph {
    pub fn add_vertex(&mut self, label: &str, properties: Properties) -> VertexId {
        self.vertices.push(Vertex::new(label.to_owned(), properties));
        self.out_adjacency.push(Vec::new());
        self.in_adjacency.push(Vec::new());
        let id = element_id(self.vertices.len() - 1);
        for (key, value) in &self.vertices[id as usize].properties {
            if let Some(entries) = self.index.get_mut(key) {
                entries.entry(value.clone()).or_insert_with(Vec::new).push(id);
            }
        }
        id
    }

    pub fn add_edge(&mut self, label: &str, src: VertexId, dst: VertexId) -> EdgeId {
        self.edges.push(Edge::new(label.to_owned(), src, dst, Properties::new()));
        let id = element_id(self.edges.len() - 1);
        self.out_adjacency[src as usize].push(id);
        self.in_adjacency[dst as usize].push(id);
        id
    }

    /// Builds an equality index over `key` for all current and future vertices.
    pub fn create_index(&mut self, key: &str) {
        let mut entries: HashMap<PropertyValue, Vec<VertexId>> = HashMap::new();
        for (id, vertex) in self.vertices.iter().enumerate() {
            if let Some(value) = vertex.properties.get(key) {
                entries
                    .entry(value.clone())
                    .or_insert_with(Vec::new)
                    .push(element_id(id));
            }
        }
        self.index.insert(key.to_owned(), entries);
    }
}

fn element_id(index: usize) -> u32 {
    u32::try_from(index).expect("Ran out of element ids")
}

impl GraphStore for Graph {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn vertex_ids(&self) -> Box<dyn Iterator<Item = VertexId> + '_> {
        Box::new((0..self.vertices.len()).map(element_id))
    }

    fn vertex_ids_by(
        &self,
        key: &str,
        value: &PropertyValue,
    ) -> Box<dyn Iterator<Item = VertexId> + '_> {
        if let Some(entries) = self.index.get(key) {
            let ids = entries.get(value).cloned().unwrap_or_default();
            Box::new(ids.into_iter())
        } else {
            let value = value.clone();
            let key = key.to_owned();
            Box::new(self.vertices.iter().enumerate().filter_map(move |(id, vertex)| {
                if vertex.properties.get(&key) == Some(&value) {
                    Some(element_id(id))
                } else {
                    None
                }
            }))
        }
    }

    fn vertex_label(&self, vertex_id: VertexId) -> Option<&str> {
        self.vertices.get(vertex_id as usize).map(|vertex| vertex.label.as_str())
    }

    fn vertex_property(&self, vertex_id: VertexId, key: &str) -> Option<&PropertyValue> {
        self.vertices.get(vertex_id as usize).and_then(|vertex| vertex.properties.get(key))
    }

    fn set_vertex_property(&mut self, vertex_id: VertexId, key: &str, value: PropertyValue) {
        let previous =
            self.vertices[vertex_id as usize].properties.insert(key.to_owned(), value.clone());
        if let Some(entries) = self.index.get_mut(key) {
            if let Some(previous) = previous {
                if let Some(ids) = entries.get_mut(&previous) {
                    ids.retain(|&id| id != vertex_id);
                }
            }
            let ids = entries.entry(value).or_insert_with(Vec::new);
            if !ids.contains(&vertex_id) {
                ids.push(vertex_id);
            }
        }
    }

    fn edges(&self) -> Box<dyn Iterator<Item = &Edge> + '_> {
        Box::new(self.edges.iter())
    }

    fn out_vertex_ids(&self, vertex_id: VertexId) -> Vec<VertexId> {
        self.out_adjacency[vertex_id as usize]
            .iter()
            .map(|&edge_id| self.edges[edge_id as usize].dst)
            .collect()
    }

    fn in_vertex_ids(&self, vertex_id: VertexId) -> Vec<VertexId> {
        self.in_adjacency[vertex_id as usize]
            .iter()
            .map(|&edge_id| self.edges[edge_id as usize].src)
            .collect()
    }

    fn out_degree(&self, vertex_id: VertexId) -> usize {
        self.out_adjacency[vertex_id as usize].len()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::classic_graph;
    use super::GraphStore;
    use crate::graph::property_value::PropertyValue;

    #[test]
    fn adjacency() {
        let graph = classic_graph();
        assert_eq!(graph.vertex_count(), 6);
        assert_eq!(graph.edge_count(), 6);
        assert_eq!(graph.out_vertex_ids(0), vec![1, 3, 2]);
        assert_eq!(graph.in_vertex_ids(2), vec![0, 3, 5]);
        assert_eq!(graph.out_degree(4), 0);
    }

    #[test]
    fn index_follows_property_updates() {
        let mut graph = classic_graph();
        graph.create_index("name");
        graph.set_vertex_property(0, "name", PropertyValue::String("mark".to_owned()));
        let old_name = PropertyValue::String("marko".to_owned());
        assert_eq!(graph.vertex_ids_by("name", &old_name).count(), 0);
        let new_name = PropertyValue::String("mark".to_owned());
        assert_eq!(graph.vertex_ids_by("name", &new_name).collect::<Vec<_>>(), vec![0]);
        // Rewriting the same value must not duplicate the index entry.
        graph.set_vertex_property(0, "name", PropertyValue::String("mark".to_owned()));
        assert_eq!(graph.vertex_ids_by("name", &new_name).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn index_and_scan_lookups_agree() {
        let mut graph = classic_graph();
        let name = PropertyValue::String("lop".to_owned());
        let scanned: Vec<_> = graph.vertex_ids_by("name", &name).collect();
        graph.create_index("name");
        let indexed: Vec<_> = graph.vertex_ids_by("name", &name).collect();
        assert_eq!(scanned, indexed);
        assert_eq!(indexed, vec![2]);
    }
}
