pub mod atomic;
pub mod parallel;
pub mod progress;
