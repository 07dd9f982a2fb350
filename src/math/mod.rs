//! Small linear-algebra kernel: [`Vector3`], [`Vector4`] and a column-major
//! [`Matrix4`].
//!
//! The types convert losslessly to and from their `glam` counterparts for
//! callers that want the wider API.

mod matrix;
mod vector;

pub use matrix::Matrix4;
pub use vector::{Vector3, Vector4};
