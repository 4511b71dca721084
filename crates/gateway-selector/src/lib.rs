//! Model selection (C5): capability/modality filtering over the catalogue,
//! an external scoring call, and a cost/score-normalized utility pick.

pub mod scoring;
pub mod selector;

pub use scoring::{ScoredCandidate, ScoringClientKind};
pub use selector::{select_model, SelectedModel};
