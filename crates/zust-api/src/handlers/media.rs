//! Media handler
//!
//! Serves profile images behind the opaque IDs of their public links.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::assets::{MediaFile, MediaLinks};
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

/// Handler for `/media/{id}`.
#[derive(Debug, Clone)]
pub struct MediaHandlers {
    state: Arc<ApiState>,
}

impl MediaHandlers {
    /// Create the handler.
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }

    /// `GET /media/{id}`
    ///
    /// The embedding server writes [`MediaFile::bytes`] as the response body
    /// with its content type; errors render through
    /// [`ApiResponse`](crate::ApiResponse) as usual.
    #[instrument(skip(self))]
    pub async fn get_media(&self, id: &str) -> ApiResult<MediaFile> {
        let Some(key) = MediaLinks::resolve(id.trim()) else {
            return Err(ApiError::bad_request("Invalid media ID"));
        };
        let Some(media) = self.state.media() else {
            warn!(key = %key, "No media store configured");
            return Err(ApiError::internal());
        };

        match media.get(&key).await {
            Ok(Some(bytes)) => Ok(MediaFile::png(bytes)),
            Ok(None) => {
                debug!(key = %key, "Media file missing");
                Err(ApiError::not_found("Media not found"))
            }
            Err(e) => Err(ApiError::media(&key, e)),
        }
    }
}
