pub mod config;
pub mod consts;
pub mod containers;
pub mod primitives;

mod container_impls;
