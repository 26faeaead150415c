pub mod energy;
pub mod model;
pub mod predict;
pub mod train;
pub mod weather;
