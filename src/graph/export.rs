//! Diagnostic views of a batch graph: petgraph conversion, Graphviz DOT
//! and a plain-text edge table.

use std::fmt;
use std::fmt::Write as _;

use burn::prelude::*;
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;

use super::batch::BatchGraph;
use super::relation::RelationTypeMap;
use crate::error::{Error, Result};

/// Node payload: where the utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceNode {
    pub dialogue: usize,
    pub position: usize,
}

impl fmt::Display for UtteranceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}:u{}", self.dialogue, self.position)
    }
}

/// Edge payload: relation label and attention weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationEdge {
    pub relation: usize,
    pub weight: f32,
}

impl fmt::Display for RelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{} w={:.3}", self.relation, self.weight)
    }
}

/// Copy the batch graph to the host as a petgraph `DiGraph`.
///
/// Node indices match the batch graph's global node indices.
pub fn to_petgraph<B: Backend>(graph: &BatchGraph<B>) -> Result<DiGraph<UtteranceNode, RelationEdge>> {
    let weights = graph
        .edge_weights
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))?;

    let mut g = DiGraph::with_capacity(graph.num_nodes, graph.num_edges());
    let mut nodes = Vec::with_capacity(graph.num_nodes);
    for node in 0..graph.num_nodes {
        let dialogue = graph.dialogue_of(node).unwrap_or(0);
        let position = node - graph.node_offsets[dialogue];
        nodes.push(g.add_node(UtteranceNode { dialogue, position }));
    }
    for ((&(s, t), &relation), &weight) in graph.edges.iter().zip(&graph.relations).zip(&weights) {
        g.add_edge(nodes[s], nodes[t], RelationEdge { relation, weight });
    }
    Ok(g)
}

/// Graphviz DOT text for the batch graph.
pub fn to_dot<B: Backend>(graph: &BatchGraph<B>) -> Result<String> {
    let g = to_petgraph(graph)?;
    Ok(format!("{}", Dot::new(&g)))
}

/// One line per edge: endpoints, relation label and what it encodes.
pub fn edge_table<B: Backend>(graph: &BatchGraph<B>, relations: &RelationTypeMap) -> String {
    let mut out = String::new();
    for (&(s, t), &label) in graph.edges.iter().zip(&graph.relations) {
        let _ = match relations.triple(label) {
            Some((from, to, direction)) => writeln!(
                out,
                "{} -> {}  r{} (speaker {} -> {}, {:?})",
                s, t, label, from, to, direction
            ),
            None => writeln!(out, "{} -> {}  r{}", s, t, label),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch::{DialogueBatch, SpeakerMasks};
    use crate::graph::batch::assemble;
    use crate::graph::window::WindowSpec;
    use crate::model::edge_attention::ScalarEdgeAttentionConfig;
    use burn::backend::NdArray;
    use petgraph::algo::connected_components;

    type B = NdArray;

    fn graph(lengths: &[usize], speakers: &[Vec<usize>], past: i64, future: i64) -> BatchGraph<B> {
        let device = Default::default();
        let seq_len = lengths.iter().copied().max().unwrap();
        let features = Tensor::<B, 3>::ones([seq_len, lengths.len(), 4], &device);
        let masks = SpeakerMasks::from_indices(speakers, seq_len, 2).unwrap();
        let batch = DialogueBatch::new(features, masks, lengths.to_vec()).unwrap();
        let scorer = ScalarEdgeAttentionConfig::new(4, 8).init::<B>(&device);
        assemble(
            &batch,
            WindowSpec::try_new(past, future).unwrap(),
            &RelationTypeMap::new(2),
            &scorer,
        )
        .unwrap()
    }

    #[test]
    fn one_component_per_dialogue() {
        let g = graph(&[3, 2, 4], &[vec![0, 1, 0], vec![1, 0], vec![0, 0, 1, 1]], 1, 1);
        let pg = to_petgraph(&g).unwrap();
        assert_eq!(pg.node_count(), 9);
        assert_eq!(pg.edge_count(), g.num_edges());
        assert_eq!(connected_components(&pg), 3);
    }

    #[test]
    fn node_payload_tracks_origin() {
        let g = graph(&[2, 3], &[vec![0, 1], vec![1, 0, 1]], 0, 0);
        let pg = to_petgraph(&g).unwrap();
        let node = pg[petgraph::graph::NodeIndex::new(3)];
        assert_eq!(node, UtteranceNode { dialogue: 1, position: 1 });
    }

    #[test]
    fn dot_lists_every_edge() {
        let g = graph(&[2], &[vec![0, 1]], 1, 1);
        let dot = to_dot(&g).unwrap();
        assert!(dot.starts_with("digraph"));
        assert_eq!(dot.matches("->").count(), 4);
        assert!(dot.contains("d0:u1"));
    }

    #[test]
    fn edge_table_for_three_utterances() {
        let g = graph(&[3], &[vec![0, 1, 0]], 1, 1);
        let table = edge_table(&g, &RelationTypeMap::new(2));
        insta::assert_snapshot!(table.trim_end(), @r"
        0 -> 0  r1 (speaker 0 -> 0, Backward)
        0 -> 1  r2 (speaker 0 -> 1, Forward)
        1 -> 0  r5 (speaker 1 -> 0, Backward)
        1 -> 1  r7 (speaker 1 -> 1, Backward)
        1 -> 2  r4 (speaker 1 -> 0, Forward)
        2 -> 1  r3 (speaker 0 -> 1, Backward)
        2 -> 2  r1 (speaker 0 -> 0, Backward)
        ");
    }
}
