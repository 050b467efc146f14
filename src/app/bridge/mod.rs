pub mod channel;
pub mod parse;
pub mod paths;
pub mod runner;

#[cfg(test)]
pub mod fake;
