use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use std::hint::black_box;
use tradecost_lib::{
    compose_network, compute_cost_matrix, match_settlements, prepare_graph, BorderCost,
    BorderCosts, BorderInput, CostMode, Graph, ModelConfig, Network, NetworkMatcher, NodeKey,
    Parameters, QualityClass, Settlement, Tariffs, TieBreak, TransportRates,
};

const GRID: usize = 40;

/// Grid position, skewed slightly so no two columns or rows share an axis value.
fn position(x: usize, y: usize) -> (f64, f64) {
    (x as f64 + y as f64 * 1e-3, y as f64 + x as f64 * 1e-3)
}

/// Two countries sharing the middle column of a `GRID` x `GRID` road grid.
fn grid_network() -> Network {
    let mid = GRID / 2;
    let mut road = Graph::new();
    let mut link = |a: (usize, usize), b: (usize, usize), region: &str| {
        let (ax, ay) = position(a.0, a.1);
        let (bx, by) = position(b.0, b.1);
        let from = NodeKey::new(ax, ay, region);
        let to = NodeKey::new(bx, by, region);
        let quality = QualityClass::Rank(1 + ((a.0 + a.1) % 3) as i64);
        road.connect(from.clone(), to.clone(), quality.clone(), 1000.0, None);
        road.connect(to, from, quality, 1000.0, None);
    };
    for x in 0..GRID {
        for y in 0..GRID {
            if x + 1 < GRID {
                link((x, y), (x + 1, y), if x < mid { "AAA" } else { "BBB" });
            }
            if y + 1 < GRID {
                if x <= mid {
                    link((x, y), (x, y + 1), "AAA");
                }
                if x >= mid {
                    link((x, y), (x, y + 1), "BBB");
                }
            }
        }
    }
    compose_network(road, Graph::new(), Graph::new()).expect("grid composes")
}

fn config() -> ModelConfig {
    let rates = TransportRates::from_pairs([("1", 1.0), ("2", 0.8), ("3", 0.5)]);
    let mut border_costs = BorderCosts::default();
    border_costs.insert_exporter("AAA", BorderCost { fee: 5.0, time: 1.0 });
    border_costs.insert_exporter("BBB", BorderCost { fee: 7.0, time: 1.0 });
    let tariffs = Tariffs::from_pairs([("AAA", 0.05), ("BBB", 0.08)]);
    let params = Parameters::from_pairs([("shipment_value", 100.0), ("port_fee", 1.0)]);
    ModelConfig::from_parts(CostMode::Freight, rates, border_costs, tariffs, &params)
        .expect("complete parameters")
}

static FIXTURE: Lazy<(Graph, Vec<Settlement>, ModelConfig)> = Lazy::new(|| {
    let network = grid_network();
    let config = config();
    let mut settlements: Vec<Settlement> = (0..GRID)
        .step_by(4)
        .flat_map(|x| (0..GRID).step_by(4).map(move |y| (x, y)))
        .map(|(x, y)| {
            let region = if x <= GRID / 2 { "AAA" } else { "BBB" };
            let (px, py) = position(x, y);
            Settlement::new(format!("{x}-{y}"), px, py, region)
        })
        .collect();
    let matcher = NetworkMatcher::new(&network, 0.05, TieBreak::InputOrder);
    match_settlements(&mut settlements, &matcher, false).expect("settlements match");
    let (graph, _) =
        prepare_graph(&network, &[], &BorderInput::Auto, &config).expect("graph prepares");
    (graph, settlements, config)
});

fn benchmark_cost_matrix(c: &mut Criterion) {
    let (graph, settlements, config) = &*FIXTURE;

    c.bench_function("cost_matrix_grid_100", |b| {
        b.iter(|| {
            let matrix = compute_cost_matrix(graph, settlements, config).expect("matrix");
            black_box(matrix.unreachable_count())
        });
    });
}

criterion_group!(benches, benchmark_cost_matrix);
criterion_main!(benches);
