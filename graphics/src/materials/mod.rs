//! Material system.
//!
//! A [`Material`] pairs a shared [`Shader`](crate::shader::Shader) with the
//! values and textures one kind of surface needs:
//!
//! - named uniform values ([`MaterialProperty`]), uploaded on [`Material::upload`]
//! - named textures ([`MaterialTexture`]), bound to consecutive slots on
//!   [`Material::bind`] in the order they were first set
//! - [`MaterialFlags`] describing the render state the material expects
//!
//! Materials never change pipeline state themselves; passes read the flags.

mod material;

pub use material::{Material, MaterialFlags, MaterialProperty, MaterialTexture};
