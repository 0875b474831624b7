pub mod accumulator;
pub mod controller;

pub use accumulator::SessionAccumulator;
pub use controller::SessionEngine;
