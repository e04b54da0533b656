//! Common utilities shared by the tests and the experiment binaries.
//!
//! - **`problems`**: generators for sparse symmetric test operators whose spectrum is
//!   known in closed form (diagonal, 1-D Laplacian, Clement and its shifted variant).

pub mod problems;
