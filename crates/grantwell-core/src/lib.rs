pub mod engine;
pub mod inheritance;
pub mod kind;
pub mod legacy;
pub mod model;
