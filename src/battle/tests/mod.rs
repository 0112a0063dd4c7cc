pub mod common;

#[cfg(test)]
mod test_battler_model;

#[cfg(test)]
mod test_targeting;

#[cfg(test)]
mod test_flow;
