//! # ofiq-bridge-protocol
//!
//! Binary wire protocol spoken with the OFIQ quality-assessment engine.
//!
//! This crate provides:
//! - Fixed-width big-endian scalar codec and count-prefixed sequences
//! - The 9-byte frame header and command types
//! - Request/reply schemas, including the optional-matrix encoding
//! - Decoded result records (bounding boxes, quality measures, landmarks, ...)
//!
//! It performs no I/O.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod types;

pub use codec::{Decoder, Encoder, Scalar, ScalarKind, WireFormat};
pub use error::ProtocolError;
pub use frame::{CommandType, Header, HEADER_SIZE};
pub use message::{Assessment, Decoded, ProcessImageReply, Reply, Request};
pub use types::{
    BoundingBox, ElementDepth, EulerAngles, FaceDetector, FaceLandmarks, ImageChannels,
    LandmarkKind, LandmarkPoint, Matrix, MatrixData, MeasureResult, MeasureStatus,
    QualityAssessments, QualityMeasure, RgbImage, TypedImage,
};

/// Message format version written into, and required in, every frame header.
pub const MESSAGE_FORMAT_VERSION: u64 = 1;

/// Default engine endpoint.
pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:40411";
