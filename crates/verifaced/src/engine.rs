use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use veriface_core::{ExtractError, FaceExtractor, Frame, FrameObservation};

#[derive(Error, Debug)]
pub enum EngineError {
    /// The extractor reported a precondition failure — the whole batch
    /// fails, unlike ordinary per-frame misses.
    #[error("embedding extractor not ready")]
    ModelUnavailable,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    ExtractBatch {
        frames: Vec<Frame>,
        reply: oneshot::Sender<Result<Vec<FrameObservation>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run detection + embedding extraction over a frame batch.
    ///
    /// The result is aligned with the input: one observation per frame.
    /// Per-frame inference failures are absorbed as
    /// [`FrameObservation::Failed`] — callers submit redundant frames
    /// precisely to tolerate them. Only an unavailable model fails the
    /// whole batch.
    pub async fn extract_batch(
        &self,
        frames: Vec<Frame>,
    ) -> Result<Vec<FrameObservation>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ExtractBatch {
                frames,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the extractor on a dedicated OS thread.
///
/// The model is owned by that thread for its lifetime; requests are
/// serialized through an mpsc channel, so the extractor needs no
/// internal locking.
pub fn spawn_engine(mut extractor: Box<dyn FaceExtractor + Send>) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("veriface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::ExtractBatch { frames, reply } => {
                        let result = run_batch(extractor.as_mut(), &frames);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

fn run_batch(
    extractor: &mut dyn FaceExtractor,
    frames: &[Frame],
) -> Result<Vec<FrameObservation>, EngineError> {
    let mut observations = Vec::with_capacity(frames.len());

    for frame in frames {
        let obs = match extractor.extract(frame) {
            Ok(Some(detection)) => FrameObservation::Face(detection),
            Ok(None) => FrameObservation::NoFace,
            Err(ExtractError::ModelUnavailable) => return Err(EngineError::ModelUnavailable),
            Err(ExtractError::Inference(reason)) => FrameObservation::Failed(reason),
        };
        observations.push(obs);
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriface_core::{DetectionResult, Embedding, EMBEDDING_DIM};

    /// Scripted extractor: one canned response per frame, in order.
    struct Scripted {
        responses: Vec<Result<Option<DetectionResult>, ExtractError>>,
        next: usize,
    }

    impl FaceExtractor for Scripted {
        fn extract(&mut self, _frame: &Frame) -> Result<Option<DetectionResult>, ExtractError> {
            let i = self.next;
            self.next += 1;
            match &self.responses[i] {
                Ok(Some(d)) => Ok(Some(d.clone())),
                Ok(None) => Ok(None),
                Err(ExtractError::ModelUnavailable) => Err(ExtractError::ModelUnavailable),
                Err(ExtractError::Inference(r)) => Err(ExtractError::Inference(r.clone())),
            }
        }
    }

    fn detection(confidence: f32) -> DetectionResult {
        DetectionResult {
            embedding: Embedding::new(vec![0.5; EMBEDDING_DIM]).unwrap(),
            confidence,
            sharpness: None,
        }
    }

    fn frame() -> Frame {
        Frame::from_rgb(8, 8, vec![0u8; 8 * 8 * 3]).unwrap()
    }

    #[tokio::test]
    async fn batch_preserves_order_and_absorbs_inference_failures() {
        let engine = spawn_engine(Box::new(Scripted {
            responses: vec![
                Ok(Some(detection(0.8))),
                Ok(None),
                Err(ExtractError::Inference("tensor shape".into())),
            ],
            next: 0,
        }));

        let obs = engine
            .extract_batch(vec![frame(), frame(), frame()])
            .await
            .unwrap();
        assert_eq!(obs.len(), 3);
        assert!(matches!(obs[0], FrameObservation::Face(_)));
        assert!(matches!(obs[1], FrameObservation::NoFace));
        assert!(matches!(obs[2], FrameObservation::Failed(_)));
    }

    #[tokio::test]
    async fn unavailable_model_fails_whole_batch() {
        let engine = spawn_engine(Box::new(Scripted {
            responses: vec![Ok(Some(detection(0.9))), Err(ExtractError::ModelUnavailable)],
            next: 0,
        }));

        let err = engine
            .extract_batch(vec![frame(), frame()])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelUnavailable));
    }
}
