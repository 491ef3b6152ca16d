pub mod audit;
pub mod election;
