use tracing::info;

use crate::config::TransportRates;
use crate::error::Result;
use crate::graph::Graph;

/// Assign `rate(quality) * length_km` to every edge without a cost.
///
/// Edges that already carry a cost (precomputed or synthetic) are left
/// untouched. Each direction is annotated independently. Returns the number of
/// edges annotated.
pub fn annotate_costs(graph: &mut Graph, rates: &TransportRates) -> Result<usize> {
    let mut annotated = 0;
    for edge in graph.edges_mut() {
        if edge.cost.is_some() {
            continue;
        }
        // Lengths are stored in meters, rates are per km.
        edge.cost = Some(rates.rate(&edge.quality)? * edge.length / 1000.0);
        annotated += 1;
    }

    info!(annotated, "costs added to graph");
    Ok(annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKey, QualityClass};

    #[test]
    fn annotates_each_direction_independently() {
        let mut graph = Graph::new();
        let a = NodeKey::new(0.0, 0.0, "AAA");
        let b = NodeKey::new(1.0, 0.0, "AAA");
        graph.connect(a.clone(), b.clone(), QualityClass::Rank(1), 2000.0, None);
        graph.connect(b.clone(), a.clone(), QualityClass::Rank(2), 2000.0, None);
        let rates = TransportRates::from_pairs([("1", 3.0), ("2", 0.5)]);

        assert_eq!(annotate_costs(&mut graph, &rates).unwrap(), 2);
        assert_eq!(graph.edge_between(&a, &b).unwrap().cost, Some(6.0));
        assert_eq!(graph.edge_between(&b, &a).unwrap().cost, Some(1.0));
    }

    #[test]
    fn existing_costs_are_kept() {
        let mut graph = Graph::new();
        let a = NodeKey::new(0.0, 0.0, "AAA");
        let b = NodeKey::new(0.0, 0.0, "BBB");
        graph.connect(a.clone(), b.clone(), QualityClass::BorderCrossing, 0.0, Some(7.5));
        let rates = TransportRates::default();

        assert_eq!(annotate_costs(&mut graph, &rates).unwrap(), 0);
        assert_eq!(graph.edge_between(&a, &b).unwrap().cost, Some(7.5));
    }

    #[test]
    fn unknown_class_aborts() {
        let mut graph = Graph::new();
        graph.connect(
            NodeKey::new(0.0, 0.0, "AAA"),
            NodeKey::new(1.0, 0.0, "AAA"),
            QualityClass::Rank(4),
            10.0,
            None,
        );
        let rates = TransportRates::from_pairs([("1", 3.0)]);
        assert!(annotate_costs(&mut graph, &rates).is_err());
    }
}
