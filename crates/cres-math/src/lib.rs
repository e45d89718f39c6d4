//! Mathematical primitives for the CRES track core.

pub mod elliptic;
pub mod kdtree;
pub mod vec3;
