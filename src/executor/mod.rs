pub mod confirm;
pub mod rows;

pub use confirm::{
    ActionOutcome, ConfirmColor, ConfirmDialog, ConfirmationPolicy, ConfirmationRequest, RowAction,
};
pub use rows::{RowMutationEngine, next_decrement_id, resolve_id_strategy};
