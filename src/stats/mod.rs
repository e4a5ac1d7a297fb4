pub mod mode;

pub use mode::{mode, ReadMode, TieBreak};
