// SPDX-License-Identifier: CEPL-1.0
pub mod input;

pub use input::{Action, InputTracker, ShadingKey};
pub use winit;
