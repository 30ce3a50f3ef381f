pub mod lattice;
pub mod sweep;
