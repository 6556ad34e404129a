// lib.rs — 室内漫游核心 (无 GPU 依赖)

pub mod config;
pub mod cursor;
pub mod error;
pub mod guard;
pub mod hotspots;
pub mod manifest;
pub mod motion;
pub mod pick;
pub mod rig;
pub mod scene;
pub mod textures;
pub mod tour;
pub mod transition;
pub mod tween;
pub mod view;

pub use config::TourConfig;
pub use error::{Result, TourError};
pub use manifest::Manifest;
pub use rig::{CameraRig, OrbitRig, ViewRig};
pub use textures::{ResourceCache, TextureCatalog, TextureHandle};
pub use tour::{FrameParams, HouseTour, Tour};
pub use transition::TransitionKind;
pub use view::{ChangeOptions, ChangeOutcome, ViewMode};
