//! MJPEG Stream Route
//!
//! Serves annotated frames as `multipart/x-mixed-replace`. Every client gets
//! its own subscription to the frame feed and receives the newest frame it
//! has not seen; slow clients skip frames rather than queue them.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::IntoResponse,
};
use futures_util::stream;
use status_publisher::EncodedFrame;
use tracing::debug;

use crate::SharedState;

/// Multipart boundary separating frames
pub const BOUNDARY: &str = "frame";

/// Content type of the stream response
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", BOUNDARY)
}

/// Wrap one JPEG as a multipart part
pub fn multipart_part(frame: &EncodedFrame) -> Bytes {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + frame.jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(&frame.jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Stream annotated frames until acquisition stops
pub async fn video_feed(State(state): State<SharedState>) -> impl IntoResponse {
    let subscription = state.frames.subscribe();
    debug!("Streaming client connected");

    let parts = stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.next_frame().await?;
        Some((Ok::<_, Infallible>(multipart_part(&frame)), subscription))
    });

    (
        [
            (header::CONTENT_TYPE, content_type()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(parts),
    )
}
