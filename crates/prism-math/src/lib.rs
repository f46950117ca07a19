// SPDX-License-Identifier: CEPL-1.0
//! Camera, projection and light animation for the frame loop.
//!
//! Everything here is a pure function of explicit state: the caller owns the
//! previous [`CameraState`] and [`LightRig`] and feeds them back each frame
//! together with the [`InputState`] collected from the window.
pub mod camera;
pub mod input;
pub mod lights;
pub mod projection;

pub use camera::{integrate, CameraState};
pub use glam;
pub use input::{InputState, MoveKeys};
pub use lights::{Light, LightRig, MAX_LIGHTS};
pub use projection::Projection;
