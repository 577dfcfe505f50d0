use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The input line graph violates an invariant. Fatal at load; `id`
    /// names the offending line, node or edge.
    #[error("bad input: {reason} (at `{id}`)")]
    BadInput { id: String, reason: String },

    /// The octilinearizer exhausted its candidate orderings without
    /// routing every edge.
    #[error("no octilinear embedding found after {attempts} ordering attempts")]
    NoEmbeddingFound { attempts: usize },

    /// The ILP back-end is unavailable, the program is infeasible, or the
    /// time limit expired without a feasible solution.
    #[error("ILP backend `{backend}`: {reason}")]
    SolverBackend { backend: String, reason: String },

    #[error("I/O failure")]
    Io(#[from] io::Error),
}
