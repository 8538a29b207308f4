//! Records produced by the quality-assessment engine and their wire grammar.

use crate::codec::{Decoder, Encoder, Scalar, WireFormat};
use crate::error::ProtocolError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column count that marks an absent matrix.
pub const ABSENT_MATRIX_COLS: i32 = -1;

/// Face detector that produced a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceDetector {
    OpenCvSsd = 0,
    NotSet = 1,
}

impl TryFrom<u8> for FaceDetector {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FaceDetector::OpenCvSsd),
            1 => Ok(FaceDetector::NotSet),
            _ => Err(ProtocolError::unknown("face detector", value)),
        }
    }
}

/// Face region reported by a detector. Coordinates may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i16,
    pub top: i16,
    pub width: i16,
    pub height: i16,
    pub detector: FaceDetector,
}

impl WireFormat for BoundingBox {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put(self.left);
        enc.put(self.top);
        enc.put(self.width);
        enc.put(self.height);
        enc.put(self.detector as u8);
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        Ok(Self {
            left: dec.get()?,
            top: dec.get()?,
            width: dec.get()?,
            height: dec.get()?,
            detector: FaceDetector::try_from(dec.get::<u8>()?)?,
        })
    }
}

impl WireFormat for Vec<BoundingBox> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put_count_u16(self.len())?;
        for face in self {
            face.encode(enc)?;
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let count = dec.get_count_u16()?;
        (0..count).map(|_| BoundingBox::decode(dec)).collect()
    }
}

/// Quality measure identifiers.
///
/// Negative values name measures whose implementation is shared by several
/// positive-valued measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum QualityMeasure {
    UnifiedQualityScore = 0x41,
    BackgroundUniformity = 0x42,
    IlluminationUniformity = 0x43,
    Luminance = -0x44,
    LuminanceMean = 0x44,
    LuminanceVariance = 0x45,
    UnderExposurePrevention = 0x46,
    OverExposurePrevention = 0x47,
    DynamicRange = 0x48,
    Sharpness = 0x49,
    CompressionArtifacts = 0x4a,
    NaturalColour = 0x4b,
    SingleFacePresent = 0x4c,
    EyesOpen = 0x4d,
    MouthClosed = 0x4e,
    EyesVisible = 0x4f,
    MouthOcclusionPrevention = 0x50,
    FaceOcclusionPrevention = 0x51,
    InterEyeDistance = 0x52,
    HeadSize = 0x53,
    CropOfTheFaceImage = -0x54,
    LeftwardCropOfTheFaceImage = 0x54,
    RightwardCropOfTheFaceImage = 0x55,
    DownwardCropOfTheFaceImage = 0x56,
    UpwardCropOfTheFaceImage = 0x57,
    HeadPose = -0x58,
    HeadPoseYaw = 0x58,
    HeadPosePitch = 0x59,
    HeadPoseRoll = 0x5a,
    ExpressionNeutrality = 0x5b,
    NoHeadCoverings = 0x5c,
    NotSet = -1,
}

impl QualityMeasure {
    /// Every defined measure, in wire-value order.
    pub const ALL: [QualityMeasure; 32] = [
        QualityMeasure::HeadPose,
        QualityMeasure::CropOfTheFaceImage,
        QualityMeasure::Luminance,
        QualityMeasure::NotSet,
        QualityMeasure::UnifiedQualityScore,
        QualityMeasure::BackgroundUniformity,
        QualityMeasure::IlluminationUniformity,
        QualityMeasure::LuminanceMean,
        QualityMeasure::LuminanceVariance,
        QualityMeasure::UnderExposurePrevention,
        QualityMeasure::OverExposurePrevention,
        QualityMeasure::DynamicRange,
        QualityMeasure::Sharpness,
        QualityMeasure::CompressionArtifacts,
        QualityMeasure::NaturalColour,
        QualityMeasure::SingleFacePresent,
        QualityMeasure::EyesOpen,
        QualityMeasure::MouthClosed,
        QualityMeasure::EyesVisible,
        QualityMeasure::MouthOcclusionPrevention,
        QualityMeasure::FaceOcclusionPrevention,
        QualityMeasure::InterEyeDistance,
        QualityMeasure::HeadSize,
        QualityMeasure::LeftwardCropOfTheFaceImage,
        QualityMeasure::RightwardCropOfTheFaceImage,
        QualityMeasure::DownwardCropOfTheFaceImage,
        QualityMeasure::UpwardCropOfTheFaceImage,
        QualityMeasure::HeadPoseYaw,
        QualityMeasure::HeadPosePitch,
        QualityMeasure::HeadPoseRoll,
        QualityMeasure::ExpressionNeutrality,
        QualityMeasure::NoHeadCoverings,
    ];

    /// Whether this id names a shared implementation rather than a single measure.
    pub fn is_common(self) -> bool {
        matches!(
            self,
            QualityMeasure::Luminance
                | QualityMeasure::CropOfTheFaceImage
                | QualityMeasure::HeadPose
        )
    }
}

impl TryFrom<i16> for QualityMeasure {
    type Error = ProtocolError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        QualityMeasure::ALL
            .into_iter()
            .find(|measure| *measure as i16 == value)
            .ok_or_else(|| ProtocolError::unknown("quality measure", value))
    }
}

/// Outcome of a single quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MeasureStatus {
    Success = 0,
    FailureToAssess = 1,
    NotInitialized = 2,
}

impl TryFrom<u8> for MeasureStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MeasureStatus::Success),
            1 => Ok(MeasureStatus::FailureToAssess),
            2 => Ok(MeasureStatus::NotInitialized),
            _ => Err(ProtocolError::unknown("measure status", value)),
        }
    }
}

/// Result of one quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureResult {
    pub status: MeasureStatus,
    /// In `[0, 100]`, or -1 when unavailable.
    pub scalar_score: i32,
    pub raw_score: f64,
}

impl MeasureResult {
    pub const UNAVAILABLE: i32 = -1;

    pub fn is_available(&self) -> bool {
        self.scalar_score != Self::UNAVAILABLE
    }
}

/// The engine sends scalar scores as doubles; only exact integers are valid.
fn score_from_wire(value: f64) -> Result<i32, ProtocolError> {
    if !value.is_finite()
        || value.fract() != 0.0
        || value < i32::MIN as f64
        || value > i32::MAX as f64
    {
        return Err(ProtocolError::InexactScore(value));
    }
    Ok(value as i32)
}

/// Results keyed by measure.
pub type QualityAssessments = BTreeMap<QualityMeasure, MeasureResult>;

impl WireFormat for QualityAssessments {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put_count_u16(self.len())?;
        for (measure, result) in self {
            enc.put(*measure as i16);
            enc.put(result.status as u8);
            enc.put(result.scalar_score as f64);
            enc.put(result.raw_score);
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let count = dec.get_count_u16()?;
        let mut assessments = BTreeMap::new();
        for _ in 0..count {
            let measure = QualityMeasure::try_from(dec.get::<i16>()?)?;
            let status = MeasureStatus::try_from(dec.get::<u8>()?)?;
            let scalar_score = score_from_wire(dec.get::<f64>()?)?;
            let raw_score = dec.get::<f64>()?;
            assessments.insert(
                measure,
                MeasureResult {
                    status,
                    scalar_score,
                    raw_score,
                },
            );
        }
        Ok(assessments)
    }
}

/// Head pose angles in degrees, positional on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl WireFormat for EulerAngles {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put(self.yaw);
        enc.put(self.pitch);
        enc.put(self.roll);
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        Ok(Self {
            yaw: dec.get()?,
            pitch: dec.get()?,
            roll: dec.get()?,
        })
    }
}

/// Landmark detector flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LandmarkKind {
    /// 98-point landmarks.
    Lm98 = 0,
    NotSet = 1,
}

impl TryFrom<u8> for LandmarkKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LandmarkKind::Lm98),
            1 => Ok(LandmarkKind::NotSet),
            _ => Err(ProtocolError::unknown("landmark kind", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: i16,
    pub y: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub kind: LandmarkKind,
    pub points: Vec<LandmarkPoint>,
}

impl WireFormat for FaceLandmarks {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put(self.kind as u8);
        enc.put_count_u32(self.points.len())?;
        for point in &self.points {
            enc.put(point.x);
            enc.put(point.y);
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let kind = LandmarkKind::try_from(dec.get::<u8>()?)?;
        let count = dec.get_count_u32()?;
        let coords = dec.get_many::<i16>(count.saturating_mul(2))?;
        let points = coords
            .chunks_exact(2)
            .map(|xy| LandmarkPoint { x: xy[0], y: xy[1] })
            .collect();
        Ok(Self { kind, points })
    }
}

/// Element type code of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementDepth {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    I32 = 4,
    F32 = 5,
    F64 = 6,
    /// IEEE binary16, kept as raw bit patterns.
    F16 = 7,
}

impl ElementDepth {
    /// Encoded width of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            ElementDepth::U8 | ElementDepth::I8 => 1,
            ElementDepth::U16 | ElementDepth::I16 | ElementDepth::F16 => 2,
            ElementDepth::I32 | ElementDepth::F32 => 4,
            ElementDepth::F64 => 8,
        }
    }
}

impl TryFrom<u8> for ElementDepth {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ElementDepth::U8),
            1 => Ok(ElementDepth::I8),
            2 => Ok(ElementDepth::U16),
            3 => Ok(ElementDepth::I16),
            4 => Ok(ElementDepth::I32),
            5 => Ok(ElementDepth::F32),
            6 => Ok(ElementDepth::F64),
            7 => Ok(ElementDepth::F16),
            _ => Err(ProtocolError::unknown("element depth", value)),
        }
    }
}

/// Row-major, channel-interleaved matrix elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatrixData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    F16(Vec<u16>),
}

impl MatrixData {
    pub fn depth(&self) -> ElementDepth {
        match self {
            MatrixData::U8(_) => ElementDepth::U8,
            MatrixData::I8(_) => ElementDepth::I8,
            MatrixData::U16(_) => ElementDepth::U16,
            MatrixData::I16(_) => ElementDepth::I16,
            MatrixData::I32(_) => ElementDepth::I32,
            MatrixData::F32(_) => ElementDepth::F32,
            MatrixData::F64(_) => ElementDepth::F64,
            MatrixData::F16(_) => ElementDepth::F16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MatrixData::U8(v) => v.len(),
            MatrixData::I8(v) => v.len(),
            MatrixData::U16(v) | MatrixData::F16(v) => v.len(),
            MatrixData::I16(v) => v.len(),
            MatrixData::I32(v) => v.len(),
            MatrixData::F32(v) => v.len(),
            MatrixData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(dec: &mut Decoder, depth: ElementDepth, count: usize) -> Result<Self, ProtocolError> {
        Ok(match depth {
            ElementDepth::U8 => MatrixData::U8(dec.get_many(count)?),
            ElementDepth::I8 => MatrixData::I8(dec.get_many(count)?),
            ElementDepth::U16 => MatrixData::U16(dec.get_many(count)?),
            ElementDepth::I16 => MatrixData::I16(dec.get_many(count)?),
            ElementDepth::I32 => MatrixData::I32(dec.get_many(count)?),
            ElementDepth::F32 => MatrixData::F32(dec.get_many(count)?),
            ElementDepth::F64 => MatrixData::F64(dec.get_many(count)?),
            ElementDepth::F16 => MatrixData::F16(dec.get_many(count)?),
        })
    }

    fn write(&self, enc: &mut Encoder) {
        fn put_all<T: Scalar>(enc: &mut Encoder, values: &[T]) {
            for value in values {
                enc.put(*value);
            }
        }

        match self {
            MatrixData::U8(v) => enc.put_slice(v),
            MatrixData::I8(v) => put_all(enc, v),
            MatrixData::U16(v) | MatrixData::F16(v) => put_all(enc, v),
            MatrixData::I16(v) => put_all(enc, v),
            MatrixData::I32(v) => put_all(enc, v),
            MatrixData::F32(v) => put_all(enc, v),
            MatrixData::F64(v) => put_all(enc, v),
        }
    }
}

/// A dense matrix as sent by the engine.
///
/// The element count always matches the shape, also when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedMatrix")]
pub struct Matrix {
    rows: i32,
    cols: i32,
    channels: i32,
    data: MatrixData,
}

#[derive(Deserialize)]
struct UncheckedMatrix {
    rows: i32,
    cols: i32,
    channels: i32,
    data: MatrixData,
}

impl TryFrom<UncheckedMatrix> for Matrix {
    type Error = ProtocolError;

    fn try_from(m: UncheckedMatrix) -> Result<Self, Self::Error> {
        Matrix::new(m.rows, m.cols, m.channels, m.data)
    }
}

fn element_count(rows: i32, cols: i32, channels: i32) -> Result<usize, ProtocolError> {
    let shape_err = || ProtocolError::InvalidMatrixShape {
        rows,
        cols,
        channels,
    };
    let dims = [rows, cols, channels]
        .into_iter()
        .map(|d| usize::try_from(d).map_err(|_| shape_err()))
        .collect::<Result<Vec<_>, _>>()?;
    dims.into_iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(d))
        .ok_or_else(shape_err)
}

impl Matrix {
    /// Creates a matrix, checking the element count matches the shape.
    pub fn new(
        rows: i32,
        cols: i32,
        channels: i32,
        data: MatrixData,
    ) -> Result<Self, ProtocolError> {
        let count = element_count(rows, cols, channels)?;
        if count != data.len() {
            return Err(ProtocolError::InvalidMatrixShape {
                rows,
                cols,
                channels,
            });
        }
        Ok(Self {
            rows,
            cols,
            channels,
            data,
        })
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn channels(&self) -> i32 {
        self.channels
    }

    pub fn depth(&self) -> ElementDepth {
        self.data.depth()
    }

    pub fn data(&self) -> &MatrixData {
        &self.data
    }

    pub fn into_data(self) -> MatrixData {
        self.data
    }
}

fn write_optional_matrix(enc: &mut Encoder, matrix: Option<&Matrix>) {
    match matrix {
        None => enc.put(ABSENT_MATRIX_COLS),
        Some(m) => {
            enc.put(m.cols);
            enc.put(m.rows);
            enc.put(m.channels);
            enc.put(m.depth() as u8);
            m.data.write(enc);
        }
    }
}

/// Optional matrix: a column count of -1 stands for "absent" and ends the field.
impl WireFormat for Option<Matrix> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        write_optional_matrix(enc, self.as_ref());
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let cols = dec.get::<i32>()?;
        if cols == ABSENT_MATRIX_COLS {
            return Ok(None);
        }
        let rows = dec.get::<i32>()?;
        let channels = dec.get::<i32>()?;
        let depth = ElementDepth::try_from(dec.get::<u8>()?)?;
        let count = element_count(rows, cols, channels)?;
        let data = MatrixData::read(dec, depth, count)?;
        Ok(Some(Matrix {
            rows,
            cols,
            channels,
            data,
        }))
    }
}

/// Channel layout of an image-valued matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageChannels {
    Gray,
    /// Blue, green, red interleaved.
    Bgr,
}

/// A matrix interpreted as an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedImage {
    pub channels: ImageChannels,
    pub matrix: Matrix,
}

impl TypedImage {
    pub fn from_matrix(matrix: Matrix) -> Result<Self, ProtocolError> {
        let channels = match matrix.channels {
            1 => ImageChannels::Gray,
            3 => ImageChannels::Bgr,
            n => return Err(ProtocolError::UnsupportedChannels(n)),
        };
        Ok(Self { channels, matrix })
    }

    pub fn width(&self) -> i32 {
        self.matrix.cols
    }

    pub fn height(&self) -> i32 {
        self.matrix.rows
    }
}

impl WireFormat for Option<TypedImage> {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        write_optional_matrix(enc, self.as_ref().map(|image| &image.matrix));
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        Option::<Matrix>::decode(dec)?
            .map(TypedImage::from_matrix)
            .transpose()
    }
}

/// 8-bit RGB input image, row-major with no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: u16,
    height: u16,
    pixels: Bytes,
}

impl RgbImage {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u16, height: u16, pixels: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let pixels = pixels.into();
        let expected = width as usize * height as usize * Self::CHANNELS;
        if pixels.len() != expected {
            return Err(ProtocolError::PixelBufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }
}

impl WireFormat for RgbImage {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError> {
        enc.put(self.width);
        enc.put(self.height);
        enc.put_slice(&self.pixels);
        Ok(())
    }

    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let width = dec.get::<u16>()?;
        let height = dec.get::<u16>()?;
        let pixels = dec.take(width as usize * height as usize * Self::CHANNELS)?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}
