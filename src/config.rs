//! Pipeline configuration.
//!
//! One flat object covering both passes; every knob has a default so the
//! builder can be used with only the fields under test set.

use derive_builder::Builder;
use derive_more::Display;
use std::path::PathBuf;

/// Which line-ordering optimizer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OptimMethod {
    /// Odometer enumeration of all permutation tuples; provably optimal.
    #[display(fmt = "exhaustive")]
    Exhaustive,
    /// Strict-improvement local search on single-edge transpositions.
    #[display(fmt = "hillclimb")]
    Hillclimb,
    /// Hill climbing with geometric-cooling acceptance of worse moves.
    #[display(fmt = "annealing")]
    Annealing,
    /// Integer-linear-programming translation, solved by a back-end.
    #[display(fmt = "ilp")]
    Ilp,
    /// Writes the initial sorted configuration unchanged.
    #[display(fmt = "null")]
    Null,
}

/// Directions usable by the base grid graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BaseGraphKind {
    /// All eight compass directions.
    #[display(fmt = "octigrid")]
    Octigrid,
    /// Four compass directions; diagonal hops are infinite.
    #[display(fmt = "grid")]
    Grid,
}

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct Config {
    /// Render width of a single line ribbon.
    pub line_width: f64,
    /// Gap between two adjacent ribbons on the same edge.
    pub line_spacing: f64,

    /// Weight of a crossing between lines whose continuation is a
    /// registered connection at the node.
    pub crossing_penalty_same_seg: f64,
    /// Weight of a crossing not witnessed by any registered connection.
    /// Must be at least `crossing_penalty_same_seg`.
    pub crossing_penalty_diff_seg: f64,
    /// Enables the splitting term of the scorer.
    pub splitting_opt: bool,
    /// Weight of separating two adjacent lines.
    pub splitting_penalty: f64,

    pub optim: OptimMethod,

    /// Geometric cooling factor, in `(0, 1)`.
    pub annealing_alpha: f64,
    /// Temperature below which annealing stops.
    pub annealing_t_floor: f64,
    /// Start temperature.
    pub annealing_start: f64,

    /// Side length of a grid cell, in input coordinate units.
    pub grid_size: f64,
    /// Padding added around the input bounding box before gridding.
    pub border_rad: f64,
    /// Candidate search radius around a node's desired position, in cells.
    pub max_grid_dist: f64,
    /// Weight of the penalty for deviating from the input geometry's
    /// course; `0` disables geo penalties.
    pub enf_geo_course: f64,
    pub base_graph: BaseGraphKind,

    /// Collapse degree-2 chains before optimizing.
    pub deg2_heur: bool,
    /// Restrict the octilinearizer's local search to nodes whose edges
    /// were drawn with bends.
    pub restr_loc_search: bool,

    /// ILP back-end name; `"bb"` selects the built-in branch-and-bound.
    pub ilp_solver: String,
    /// Back-end time limit in seconds; `0` means none.
    pub ilp_time_limit_sec: u64,
    /// Write the LP file without invoking the back-end.
    pub ilp_no_solve: bool,
    /// Where to write the LP file, if anywhere.
    pub ilp_path: Option<PathBuf>,

    /// Seed for every shuffle and every annealing draw.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line_width: 20.0,
            line_spacing: 10.0,
            crossing_penalty_same_seg: 1.0,
            crossing_penalty_diff_seg: 3.0,
            splitting_opt: false,
            splitting_penalty: 1.0,
            optim: OptimMethod::Hillclimb,
            annealing_alpha: 0.95,
            annealing_t_floor: 1e-3,
            annealing_start: 10.0,
            grid_size: 100.0,
            border_rad: 100.0,
            max_grid_dist: 3.0,
            enf_geo_course: 0.0,
            base_graph: BaseGraphKind::Octigrid,
            deg2_heur: true,
            restr_loc_search: false,
            ilp_solver: "bb".to_string(),
            ilp_time_limit_sec: 0,
            ilp_no_solve: false,
            ilp_path: None,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ConfigBuilder::default().build().unwrap();

        assert_eq!(cfg.optim, OptimMethod::Hillclimb);
        assert_eq!(cfg.base_graph, BaseGraphKind::Octigrid);
        assert!(cfg.crossing_penalty_diff_seg >= cfg.crossing_penalty_same_seg);
    }

    #[test]
    fn builder_overrides() {
        let cfg = ConfigBuilder::default()
            .optim(OptimMethod::Exhaustive)
            .grid_size(0.5)
            .seed(42)
            .build()
            .unwrap();

        assert_eq!(cfg.optim, OptimMethod::Exhaustive);
        assert_eq!(cfg.grid_size, 0.5);
        assert_eq!(cfg.seed, 42);
    }
}
