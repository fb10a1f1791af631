//! Ductline Core Library
//!
//! Platform-agnostic snap detection and centerline drawing for duct layout.
//! The embedding application feeds pointer positions into a
//! [`CenterlineDrawingManager`], which consults its [`SnapDetectionService`]
//! and reports progress through typed [`DrawingEvent`]s.

pub mod centerline;
pub mod config;
pub mod error;
pub mod snap;
pub mod validation;

pub use centerline::{
    Centerline, CenterlineDrawingConfig, CenterlineDrawingManager, CenterlinePoint, CenterlineType,
    DrawingEvent, DrawingMode, DrawingPhase, DrawingState, EventKind, SubscriptionId,
};
pub use config::EngineConfig;
pub use error::{ConfigError, ConfigResult};
pub use snap::{
    AreaQuery, DetectionStatistics, ElementType, SnapDetectionConfig, SnapDetectionService, SnapMetadata,
    SnapPoint, SnapPointType, SnapPriority, SnapQueryOptions, SnapResult, SnapZone,
};
pub use validation::{NoopValidator, ValidationReport, ValidationWarning, Validator, WarningSeverity};
