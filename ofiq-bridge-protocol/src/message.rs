//! Request and reply schemas.
//!
//! PING and SHUTDOWN are header-only in both directions. PROCESS_IMAGE
//! carries an image id and an RGB image; its reply echoes the id, then a
//! success flag, then (only on success) the eleven assessment fields.

use crate::codec::{Decoder, Encoder, WireFormat};
use crate::error::ProtocolError;
use crate::frame::{CommandType, Header, HEADER_SIZE};
use crate::types::{
    BoundingBox, EulerAngles, FaceLandmarks, Matrix, QualityAssessments, RgbImage, TypedImage,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Requests sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Shutdown,
    ProcessImage { image_id: u32, image: RgbImage },
}

impl Request {
    pub fn command(&self) -> CommandType {
        match self {
            Request::Ping => CommandType::Ping,
            Request::Shutdown => CommandType::Shutdown,
            Request::ProcessImage { .. } => CommandType::ProcessImage,
        }
    }

    /// Encodes the request as one frame.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let capacity = match self {
            Request::ProcessImage { image, .. } => HEADER_SIZE + 8 + image.pixels().len(),
            _ => HEADER_SIZE,
        };
        let mut enc = Encoder::with_capacity(capacity);
        Header::new(self.command()).encode(&mut enc);
        if let Request::ProcessImage { image_id, image } = self {
            enc.put(*image_id);
            image.encode(&mut enc)?;
        }
        Ok(enc.finish())
    }

    /// Decodes a request frame.
    pub fn decode(frame: Bytes) -> Result<Decoded<Self>, ProtocolError> {
        let mut dec = Decoder::new(frame);
        let header = Header::decode(&mut dec)?;
        let message = match header.command {
            CommandType::Ping => Request::Ping,
            CommandType::Shutdown => Request::Shutdown,
            CommandType::ProcessImage => Request::ProcessImage {
                image_id: dec.get()?,
                image: RgbImage::decode(&mut dec)?,
            },
            CommandType::ProcessingFailed => {
                return Err(ProtocolError::unknown("request command type", 255u8))
            }
        };
        Ok(Decoded::finish(message, &dec))
    }
}

/// Everything the engine reports for a successfully processed image.
///
/// Fields follow wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub bounding_box: BoundingBox,
    pub quality_assessments: QualityAssessments,
    pub detected_faces: Vec<BoundingBox>,
    pub pose: EulerAngles,
    pub landmarks: FaceLandmarks,
    pub aligned_face_landmarks: FaceLandmarks,
    pub aligned_face_transformation: Option<Matrix>,
    pub aligned_face: Option<TypedImage>,
    pub aligned_face_landmarked_region: Option<TypedImage>,
    pub face_parsing_image: Option<TypedImage>,
    pub face_occlusion_segmentation_image: Option<TypedImage>,
}

impl WireFormat for Assessment {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put_value(&self.bounding_box)?;
        enc.put_value(&self.quality_assessments)?;
        enc.put_value(&self.detected_faces)?;
        enc.put_value(&self.pose)?;
        enc.put_value(&self.landmarks)?;
        enc.put_value(&self.aligned_face_landmarks)?;
        enc.put_value(&self.aligned_face_transformation)?;
        enc.put_value(&self.aligned_face)?;
        enc.put_value(&self.aligned_face_landmarked_region)?;
        enc.put_value(&self.face_parsing_image)?;
        enc.put_value(&self.face_occlusion_segmentation_image)?;
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        Ok(Self {
            bounding_box: dec.get_value()?,
            quality_assessments: dec.get_value()?,
            detected_faces: dec.get_value()?,
            pose: dec.get_value()?,
            landmarks: dec.get_value()?,
            aligned_face_landmarks: dec.get_value()?,
            aligned_face_transformation: dec.get_value()?,
            aligned_face: dec.get_value()?,
            aligned_face_landmarked_region: dec.get_value()?,
            face_parsing_image: dec.get_value()?,
            face_occlusion_segmentation_image: dec.get_value()?,
        })
    }
}

/// Reply to a PROCESS_IMAGE request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessImageReply {
    pub image_id: u32,
    /// `None` when the engine reported failure (success flag 0).
    pub assessment: Option<Assessment>,
}

/// Replies received from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ping,
    Shutdown,
    ProcessImage(ProcessImageReply),
}

impl Reply {
    pub fn command(&self) -> CommandType {
        match self {
            Reply::Ping => CommandType::Ping,
            Reply::Shutdown => CommandType::Shutdown,
            Reply::ProcessImage(_) => CommandType::ProcessImage,
        }
    }

    /// Encodes the reply as one frame.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut enc = Encoder::new();
        Header::new(self.command()).encode(&mut enc);
        if let Reply::ProcessImage(reply) = self {
            enc.put(reply.image_id);
            match &reply.assessment {
                None => enc.put(0u8),
                Some(assessment) => {
                    enc.put(1u8);
                    assessment.encode(&mut enc)?;
                }
            }
        }
        Ok(enc.finish())
    }

    /// Decodes a reply frame that must answer a request of type `expected`.
    ///
    /// The image id of a PROCESS_IMAGE reply is returned as sent; use
    /// [`Reply::decode_for`] to check it against the request.
    pub fn decode(frame: Bytes, expected: CommandType) -> Result<Decoded<Self>, ProtocolError> {
        Self::decode_checked(frame, expected, None)
    }

    /// Decodes the reply to `request`.
    ///
    /// For PROCESS_IMAGE the echoed image id is compared right after it is
    /// read, so a desynchronized reply fails as a mismatch before any of its
    /// payload is decoded.
    pub fn decode_for(frame: Bytes, request: &Request) -> Result<Decoded<Self>, ProtocolError> {
        let image_id = match request {
            Request::ProcessImage { image_id, .. } => Some(*image_id),
            _ => None,
        };
        Self::decode_checked(frame, request.command(), image_id)
    }

    fn decode_checked(
        frame: Bytes,
        expected: CommandType,
        expected_image_id: Option<u32>,
    ) -> Result<Decoded<Self>, ProtocolError> {
        let mut dec = Decoder::new(frame);
        Header::decode_expecting(&mut dec, expected)?;
        let message = match expected {
            CommandType::Ping => Reply::Ping,
            CommandType::Shutdown => Reply::Shutdown,
            CommandType::ProcessImage => {
                let image_id = dec.get::<u32>()?;
                if let Some(sent) = expected_image_id {
                    if image_id != sent {
                        return Err(ProtocolError::ImageIdMismatch {
                            sent,
                            received: image_id,
                        });
                    }
                }
                let assessment = match dec.get::<u8>()? {
                    0 => None,
                    _ => Some(Assessment::decode(&mut dec)?),
                };
                Reply::ProcessImage(ProcessImageReply {
                    image_id,
                    assessment,
                })
            }
            CommandType::ProcessingFailed => {
                return Err(ProtocolError::unknown("reply command type", 255u8))
            }
        };
        Ok(Decoded::finish(message, &dec))
    }
}

/// A decoded message plus the number of bytes left unread after it.
///
/// Trailing bytes do not make decoding fail; callers decide how to report them.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub message: T,
    pub trailing_bytes: usize,
}

impl<T> Decoded<T> {
    fn finish(message: T, dec: &Decoder) -> Self {
        Self {
            message,
            trailing_bytes: dec.remaining(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.trailing_bytes == 0
    }
}
