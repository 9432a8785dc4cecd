pub mod completion;
pub mod property_map;
pub mod protocol_graph;
pub mod rewrite_context;
pub mod rewrite_system;
pub mod rule;
pub mod symbol;
pub mod term;

#[cfg(test)]
mod tests;
