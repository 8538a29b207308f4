//! High-level client API.

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::image_id::ImageIdCounter;
use crate::session::Session;
use crate::supervisor::{EngineLauncher, Installation, Launcher};
use crate::transport::{Connector, ZmqConnector};
use ofiq_bridge_protocol::{Assessment, ProtocolError, Reply, Request, RgbImage};

/// Client for a locally running OFIQ engine.
///
/// The engine is started on demand: the first operation opens a session and
/// launches the engine, later operations probe it first and relaunch it only
/// when the probe goes unanswered. Operations take `&mut self`, so one client
/// never has two requests in flight.
pub struct Client<C: Connector = ZmqConnector, L: Launcher = EngineLauncher> {
    session: Session<C>,
    launcher: L,
    image_ids: ImageIdCounter,
}

impl Client {
    /// Creates a client from configuration. `engine_path` must be set.
    ///
    /// Locates the installation immediately but starts nothing.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let engine_path = config
            .engine_path
            .as_ref()
            .ok_or(ConfigError::MissingEnginePath)?;
        let installation = Installation::locate(engine_path)?;

        tracing::info!(
            "Using engine {} (endpoint {})",
            installation.executable().display(),
            config.endpoint
        );

        let session = Session::from_config(ZmqConnector::from_config(config), config);
        Ok(Self::with_parts(session, EngineLauncher::new(installation)))
    }

    /// Creates a client with default settings for the engine at `engine_path`.
    pub fn from_engine_path(engine_path: impl Into<std::path::PathBuf>) -> Result<Self, ClientError> {
        Self::new(&ClientConfig::new(engine_path))
    }

    pub fn installation(&self) -> &Installation {
        self.launcher.installation()
    }
}

impl<C: Connector, L: Launcher> Client<C, L> {
    pub fn with_parts(session: Session<C>, launcher: L) -> Self {
        Self {
            session,
            launcher,
            image_ids: ImageIdCounter::new(),
        }
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Makes sure an engine is, or is about to be, listening.
    ///
    /// A freshly opened session always launches the engine. An existing one
    /// is probed and the engine relaunched if the probe fails. A launch does
    /// not wait for the engine; the following exchange blocks until it
    /// answers.
    pub async fn ensure_started(&mut self) -> Result<(), ClientError> {
        self.start_unless_alive().await.map(|_| ())
    }

    /// Returns `true` if a probe found the engine alive, `false` if it was
    /// launched instead.
    async fn start_unless_alive(&mut self) -> Result<bool, ClientError> {
        let newly_opened = self.session.open();
        if !newly_opened && self.session.probe().await? {
            return Ok(true);
        }
        self.launcher.launch()?;
        Ok(false)
    }

    /// Returns whether the engine answers a probe, starting it first if needed.
    ///
    /// An engine already confirmed alive while starting is not probed again.
    pub async fn ping(&mut self) -> Result<bool, ClientError> {
        if self.start_unless_alive().await? {
            return Ok(true);
        }
        self.session.probe().await
    }

    /// Runs quality assessment on one image.
    ///
    /// Returns `None` when the engine reports that processing failed.
    pub async fn process_image(
        &mut self,
        image: &RgbImage,
    ) -> Result<Option<Assessment>, ClientError> {
        self.ensure_started().await?;

        let image_id = self.image_ids.next();
        tracing::debug!(
            "Processing image {} ({}x{})",
            image_id,
            image.width(),
            image.height()
        );
        let request = Request::ProcessImage {
            image_id,
            image: image.clone(),
        };

        let reply = match self.session.exchange(&request).await? {
            Reply::ProcessImage(reply) => reply,
            other => {
                return Err(ProtocolError::UnexpectedCommand {
                    expected: request.command(),
                    actual: other.command(),
                }
                .into())
            }
        };

        if reply.assessment.is_none() {
            tracing::info!("Engine could not process image {}", image_id);
        }
        Ok(reply.assessment)
    }

    /// Asks the engine to exit and closes the session.
    ///
    /// If no engine is running one is started first, so that it can be told
    /// to shut down.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.ensure_started().await?;
        self.session.exchange(&Request::Shutdown).await?;
        self.session.close();
        tracing::info!("Engine shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::testing::{FakeConnector, FakeEngine, FakeLauncher};
    use ofiq_bridge_protocol::{
        BoundingBox, EulerAngles, FaceDetector, FaceLandmarks, LandmarkKind, LandmarkPoint,
        MeasureResult, MeasureStatus, ProcessImageReply, QualityAssessments, QualityMeasure,
    };
    use std::time::Duration;

    fn client(engine: &FakeEngine) -> Client<FakeConnector, FakeLauncher> {
        let session = Session::new(
            engine.connector(),
            "tcp://127.0.0.1:40411",
            Duration::from_millis(50),
        );
        Client::with_parts(session, engine.launcher())
    }

    fn image() -> RgbImage {
        RgbImage::new(2, 2, vec![128u8; 12]).unwrap()
    }

    fn assessment() -> Assessment {
        let mut quality_assessments = QualityAssessments::new();
        quality_assessments.insert(
            QualityMeasure::UnifiedQualityScore,
            MeasureResult {
                status: MeasureStatus::Success,
                scalar_score: 57,
                raw_score: 57.25,
            },
        );
        let bounding_box = BoundingBox {
            left: 10,
            top: 12,
            width: 80,
            height: 96,
            detector: FaceDetector::OpenCvSsd,
        };
        Assessment {
            bounding_box,
            quality_assessments,
            detected_faces: vec![bounding_box],
            pose: EulerAngles {
                yaw: 1.5,
                pitch: -2.0,
                roll: 0.25,
            },
            landmarks: FaceLandmarks {
                kind: LandmarkKind::Lm98,
                points: vec![LandmarkPoint { x: 30, y: 40 }],
            },
            aligned_face_landmarks: FaceLandmarks {
                kind: LandmarkKind::Lm98,
                points: vec![],
            },
            aligned_face_transformation: None,
            aligned_face: None,
            aligned_face_landmarked_region: None,
            face_parsing_image: None,
            face_occlusion_segmentation_image: None,
        }
    }

    #[tokio::test]
    async fn test_first_use_launches_without_probe() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);

        client.ensure_started().await.unwrap();
        assert_eq!(engine.launches(), 1);
        assert!(engine.requests().is_empty());
        assert_eq!(client.session().state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_live_engine_is_not_relaunched() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);

        assert!(client.ping().await.unwrap());
        assert_eq!(engine.requests().len(), 1);
        assert!(client.ping().await.unwrap());
        assert_eq!(engine.requests().len(), 2);
        assert_eq!(engine.launches(), 1);
        assert_eq!(engine.channels_opened(), 1);
    }

    #[tokio::test]
    async fn test_dead_engine_is_relaunched() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);
        client.ensure_started().await.unwrap();

        engine.set_responsive(false);
        client.ensure_started().await.unwrap();
        assert_eq!(engine.launches(), 2);
        assert_eq!(engine.channels_opened(), 2);
        assert_eq!(engine.requests(), vec![Request::Ping]);
        assert_eq!(client.session().state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_process_image_success() {
        let engine = FakeEngine::new();
        engine.set_assessment(Some(assessment()));
        let mut client = client(&engine);

        let result = client.process_image(&image()).await.unwrap();
        assert_eq!(result, Some(assessment()));
        match &engine.requests()[0] {
            Request::ProcessImage { image_id, image } => {
                assert_eq!(*image_id, 1);
                assert_eq!(image.width(), 2);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_image_failure_is_none() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);

        assert_eq!(client.process_image(&image()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_image_ids_increment_per_request() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);

        client.process_image(&image()).await.unwrap();
        client.process_image(&image()).await.unwrap();
        let ids: Vec<u32> = engine
            .requests()
            .into_iter()
            .filter_map(|request| match request {
                Request::ProcessImage { image_id, .. } => Some(image_id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_image_id_mismatch() {
        let engine = FakeEngine::new();
        engine.set_assessment(Some(assessment()));
        engine.set_id_offset(1);
        let mut client = client(&engine);

        let err = client.process_image(&image()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::ImageIdMismatch {
                sent: 1,
                received: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_image_id_mismatch_wins_over_truncated_body() {
        let engine = FakeEngine::new();
        // Header, id 99, success flag 1, and no assessment fields.
        let mut frame = Reply::ProcessImage(ProcessImageReply {
            image_id: 99,
            assessment: None,
        })
        .encode()
        .unwrap()
        .to_vec();
        *frame.last_mut().unwrap() = 1;
        engine.push_raw_reply(frame.into());
        let mut client = client(&engine);

        let err = client.process_image(&image()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::ImageIdMismatch {
                sent: 1,
                received: 99
            })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let engine = FakeEngine::new();
        let mut client = client(&engine);
        client.ensure_started().await.unwrap();

        client.shutdown().await.unwrap();
        assert_eq!(client.session().state(), SessionState::Unopened);
        assert_eq!(engine.requests(), vec![Request::Ping, Request::Shutdown]);

        // A later operation starts over with a new engine.
        client.ensure_started().await.unwrap();
        assert_eq!(engine.launches(), 2);
    }

    #[test]
    fn test_new_requires_engine_path() {
        let err = match Client::new(&ClientConfig::default()) {
            Err(err) => err,
            Ok(_) => panic!("client created without engine path"),
        };
        assert!(matches!(
            err,
            ClientError::Config(ConfigError::MissingEnginePath)
        ));
    }
}
