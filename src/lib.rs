pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod octi;
pub mod optim;

#[cfg(test)]
mod tests {
    use crate::color::WebColor;
    use crate::config::{ConfigBuilder, OptimMethod};
    use crate::error::Error;
    use crate::geometry::Point;
    use crate::graph::{LineDir, LineGraph};
    use crate::octi::octilinearize;
    use crate::optim::optimize_lines;

    /// A junction `m` with three corridors: two carrying {U1, U2} and a
    /// branch carrying {U2, U3}.
    fn demo_network() -> LineGraph {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", "#E3000F".parse().unwrap());
        let l2 = g.add_line("u2", "U2", "#0078BF".parse().unwrap());
        let l3 = g.add_line("u3", "U3", WebColor::default());

        let a = g.add_node(Point::new(0.0, 0.0));
        let m = g.add_node(Point::new(1.0, 0.0));
        let b = g.add_node(Point::new(2.0, 0.0));
        let c = g.add_node(Point::new(1.0, 1.0));

        let am = g.add_edge(a, m).unwrap();
        let mb = g.add_edge(m, b).unwrap();
        let mc = g.add_edge(m, c).unwrap();

        for e in [am, mb] {
            g.add_line_on_edge(e, l1, LineDir::Undirected).unwrap();
            g.add_line_on_edge(e, l2, LineDir::Undirected).unwrap();
        }
        g.add_line_on_edge(mc, l2, LineDir::Undirected).unwrap();
        g.add_line_on_edge(mc, l3, LineDir::Undirected).unwrap();

        // U1 and U2 continue straight through m
        for l in [l1, l2] {
            g.conn_occurs(l, am, mb);
        }

        g
    }

    fn orderings(g: &LineGraph) -> Vec<Vec<usize>> {
        g.edge_ids()
            .map(|e| g.edge(e).geoms()[0].ordering().to_vec())
            .collect()
    }

    #[test]
    fn pipeline_orders_and_embeds() {
        let mut g = demo_network();

        let cfg = ConfigBuilder::default()
            .optim(OptimMethod::Exhaustive)
            .grid_size(1.0)
            .border_rad(1.0)
            .build()
            .unwrap();

        let stats = optimize_lines(&mut g, &cfg).unwrap();
        assert_eq!(stats.score, 0.0);
        assert!(!stats.cancelled);

        // every geom got a full permutation of its line set
        for e in g.edge_ids().collect::<Vec<_>>() {
            let etg = &g.edge(e).geoms()[0];
            let mut ordering = etg.ordering().to_vec();
            ordering.sort();
            assert_eq!(ordering, (0..etg.cardinality()).collect::<Vec<_>>());
        }

        let drawing = octilinearize(&mut g, &cfg, &[]).unwrap();
        assert_eq!(drawing.edges.len(), 3);

        // settled positions are distinct grid cells
        let mut cells: Vec<_> = drawing.cells.values().collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn pipeline_is_deterministic_under_seed() {
        let cfg = ConfigBuilder::default()
            .optim(OptimMethod::Annealing)
            .seed(42)
            .grid_size(1.0)
            .border_rad(1.0)
            .build()
            .unwrap();

        let run = || {
            let mut g = demo_network();
            optimize_lines(&mut g, &cfg).unwrap();
            let drawing = octilinearize(&mut g, &cfg, &[]).unwrap();
            (orderings(&g), drawing)
        };

        let (orders_a, drawing_a) = run();
        let (orders_b, drawing_b) = run();

        assert_eq!(orders_a, orders_b);
        assert_eq!(drawing_a, drawing_b);
    }

    #[test]
    fn optimizer_results_survive_embedding_failure() {
        let mut g = demo_network();

        let cfg = ConfigBuilder::default()
            .optim(OptimMethod::Hillclimb)
            // a grid far too coarse to give each node its own cell
            .grid_size(1000.0)
            .border_rad(0.0)
            .max_grid_dist(0.0)
            .build()
            .unwrap();

        optimize_lines(&mut g, &cfg).unwrap();
        let before = orderings(&g);

        let err = octilinearize(&mut g, &cfg, &[]);
        assert!(matches!(err, Err(Error::NoEmbeddingFound { .. })));

        // the ordering pass outcome is untouched
        assert_eq!(orderings(&g), before);
    }

    #[test]
    fn bad_input_surfaces_the_offending_line() {
        let mut g = LineGraph::new(20.0, 10.0);
        let l1 = g.add_line("u1", "U1", WebColor::default());
        let a = g.add_node(Point::new(0.0, 0.0));
        let b = g.add_node(Point::new(1.0, 0.0));
        let e = g.add_edge(a, b).unwrap();

        let err = g.add_line_on_edge(e, l1, LineDir::Forward).and_then(|_| {
            g.add_line_on_edge(e, l1, LineDir::Forward)
        });

        match err {
            Err(Error::BadInput { id, .. }) => assert_eq!(id, "u1"),
            other => panic!("expected BadInput, got {:?}", other),
        }
    }

    #[test]
    fn ilp_and_exhaustive_agree_on_the_optimum() {
        let run = |method: OptimMethod| {
            let mut g = demo_network();
            let cfg = ConfigBuilder::default().optim(method).build().unwrap();
            optimize_lines(&mut g, &cfg).unwrap().score
        };

        assert_eq!(run(OptimMethod::Exhaustive), run(OptimMethod::Ilp));
    }

    #[test]
    fn unavailable_ilp_backend_falls_back() {
        let mut g = demo_network();
        let cfg = ConfigBuilder::default()
            .optim(OptimMethod::Ilp)
            .ilp_solver("gurobi".to_string())
            .build()
            .unwrap();

        // hill climbing takes over; the run still succeeds
        let stats = optimize_lines(&mut g, &cfg).unwrap();
        assert_eq!(stats.score, 0.0);
    }
}
