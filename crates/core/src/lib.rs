//! Temporary XR session gate.
//!
//! Lets an application enter an immersive AR/VR session the moment the
//! platform grants it, shows a lightweight placeholder scene while the main
//! application is still loading, and then hands the live session over
//! without ending it and without a second permission prompt.
//!
//! ```ignore
//! let gate = SessionGate::new(platform, GateConfig::default());
//!
//! // On the user's "Enter AR" click, before the app bundle has loaded:
//! gate.start(SessionMode::ImmersiveAr, SessionInit::new().with_optional("hit-test")).await;
//!
//! // Once the main application is ready:
//! if let Some(descriptor) = gate.handoff().await {
//!     main_app.resume_in(descriptor);
//! }
//! ```
//!
//! The gate never errors across its public API: every failure is logged with
//! `tracing` and reported as `None`.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod loading_card;
pub mod math;
pub mod scene;
pub mod session;

pub use config::GateConfig;
pub use descriptor::SessionDescriptor;
pub use error::{ContentionReason, Error, Result};
pub use gate::SessionGate;
pub use session::{InstanceId, SessionPhase, TemporarySession};

pub use xr_interim_protocol::{FrameTiming, SessionInit, SessionMode, ViewerPose};
pub use xr_interim_runtime::{PlatformError, PlatformSession, SessionHandle, SessionId, XrPlatform};
