pub mod action;
pub mod ai;
pub mod context;
pub mod engine;
pub mod phase;
pub mod rewards;
pub mod state;
pub mod turn_order;

#[cfg(test)]
pub(crate) mod tests;
