//! Platform primitives consumed by the interim session gate.
//!
//! The gate never talks to an XR runtime directly. It goes through the traits
//! in [`platform`], which a host implements on top of WebXR, OpenXR, or
//! whatever its backend is. [`fake`] provides an in-memory implementation
//! used by tests and by the headless CLI demo.

pub mod error;
pub mod fake;
pub mod platform;
pub mod subscription;

pub use error::{PlatformError, Result};
pub use platform::{EndCallback, EndReason, FrameCallback, FrameScheduler, PlatformSession, RenderContext, SessionHandle, SessionId, XrPlatform};
pub use subscription::Subscription;
