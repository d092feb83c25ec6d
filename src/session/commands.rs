//! User actions against a shared session. Each one catches its own errors
//! into session state, so callers only ever render the resulting view.

use std::path::Path;
use std::sync::Arc;

use super::manager::ModeKind;
use super::SessionState;
use crate::ai::llm::detect_with;
use crate::ai::AmountExtractor;
use crate::capture::select_image;
use crate::error::AppError;

pub fn switch_mode(state: &SessionState, kind: ModeKind) {
    state.lock().switch_mode(kind);
}

pub fn set_rate(state: &SessionState, input: &str) {
    let rate = state.lock().set_rate(input);
    log::debug!("Rate set to {}", rate.value());
}

pub fn convert_manual(state: &SessionState, input: &str) {
    let mut session = state.lock();
    session.switch_mode(ModeKind::Manual);
    if let Err(e) = session.submit_manual(input) {
        log::debug!("Rejected manual input {:?}: {}", input, e);
    }
}

pub fn clear(state: &SessionState) {
    state.lock().clear();
}

/// Reads the file without holding the lock, then swaps it in.
pub async fn load_image(state: &SessionState, path: &Path, max_bytes: u64) {
    state.lock().switch_mode(ModeKind::Photo);

    match select_image(path, max_bytes).await {
        Ok(image) => {
            let mut session = state.lock();
            // The user may have left photo mode while the file was loading.
            if let Err(e) = session.select_image(image) {
                log::debug!("Discarding loaded image: {}", e);
            }
        }
        Err(e) => {
            log::warn!("{}", e);
            state.lock().fail_image(&e);
        }
    }
}

/// Runs one detection for the current image. The lock is released for the
/// network call; the result only lands if the request is still current.
pub async fn detect(state: &SessionState, extractor: Arc<dyn AmountExtractor>) -> Result<(), AppError> {
    let (request, image) = state.lock().begin_detection()?;

    let outcome = detect_with(extractor.as_ref(), image).await;

    let applied = state.lock().complete_detection(request, outcome);
    if !applied {
        log::info!("Detection {} finished after its image was replaced", request);
    }
    Ok(())
}
