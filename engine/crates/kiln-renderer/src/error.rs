use kiln_gfx::error::GfxError;
use kiln_render_interface::{resource_manager::ResourceError, resource_pool::PoolError};

/// Everything `render()` and the renderer's constructors can fail with.
///
/// All variants are fatal except `Pool(StaleHandle)`, which reports a render list the caller
/// built from destroyed resources; nothing has been recorded when it is returned.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Resource(ResourceError),

    #[error("failed to start the recording workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("recording task {0} ended without handing back its command buffer")]
    TaskLost(usize),

    #[error("frame {frame_id} submitted on slot {slot} while it is still in flight")]
    SlotInFlight { frame_id: u64, slot: usize },
}

/// Keeps pool and gfx failures under their own variants so callers can match on them.
impl From<ResourceError> for RendererError {
    fn from(e: ResourceError) -> Self {
        match e {
            ResourceError::Pool(e) => Self::Pool(e),
            ResourceError::Gfx(e) => Self::Gfx(e),
            e => Self::Resource(e),
        }
    }
}

pub type RendererResult<T> = Result<T, RendererError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_error_flattens() {
        let stale = PoolError::StaleHandle {
            kind: "Texture",
            index: 3,
            generation: 1,
        };
        let err: RendererError = ResourceError::Pool(stale.clone()).into();
        assert!(matches!(err, RendererError::Pool(e) if e == stale));

        let err: RendererError = ResourceError::Destroyed.into();
        assert!(matches!(err, RendererError::Resource(ResourceError::Destroyed)));
    }
}
