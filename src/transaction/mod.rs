pub mod change;

pub use change::RowDelta;
