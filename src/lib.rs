//! # ofiq-bridge
//!
//! Async client for the OFIQ face image quality engine.
//!
//! The engine runs as a separate process and is reached over a local ZeroMQ
//! request/reply socket. This crate re-exports:
//! - [`protocol`]: the binary wire format and decoded result records
//! - [`client`]: the session, engine supervision and the [`Client`] facade
//!
//! ```no_run
//! use ofiq_bridge::{Client, ClientConfig, RgbImage};
//!
//! # async fn run() -> Result<(), ofiq_bridge::ClientError> {
//! let mut client = Client::new(&ClientConfig::new("/opt/OFIQ-Project"))?;
//! let image = RgbImage::new(1, 1, vec![0u8, 0, 0])?;
//! if let Some(assessment) = client.process_image(&image).await? {
//!     println!("{:?}", assessment.quality_assessments);
//! }
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub use ofiq_bridge_client as client;
pub use ofiq_bridge_protocol as protocol;

pub use ofiq_bridge_client::{
    Client, ClientConfig, ClientError, ConfigError, EngineLauncher, Installation, Launcher,
    Session, SessionState,
};
pub use ofiq_bridge_protocol::{
    Assessment, BoundingBox, EulerAngles, FaceLandmarks, MeasureResult, MeasureStatus,
    ProtocolError, QualityAssessments, QualityMeasure, RgbImage, TypedImage,
};
