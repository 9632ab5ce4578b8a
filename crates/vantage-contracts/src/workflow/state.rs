use std::path::PathBuf;

use crate::analysis::{ImagePayload, SecurityAnalysis};
use crate::errors::ErrorKind;

pub const MIN_ZOOM: u8 = 17;
pub const MAX_ZOOM: u8 = 21;
pub const DEFAULT_ZOOM: u8 = 20;

pub fn clamp_zoom(zoom: i64) -> u8 {
    zoom.clamp(i64::from(MIN_ZOOM), i64::from(MAX_ZOOM)) as u8
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkflowState {
    Input,
    FetchingImage,
    Analyzing,
    Complete,
    Error,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::FetchingImage => "FETCHING_IMAGE",
            Self::Analyzing => "ANALYZING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        }
    }

    pub fn can_restart(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Everything one analysis session owns. Created at session start and rebuilt
/// on reset; only the controller mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub workflow: WorkflowState,
    pub address: String,
    pub image: Option<ImagePayload>,
    pub analysis: Option<SecurityAnalysis>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub zoom: u8,
    pub is_loading: bool,
    pub is_image_loading: bool,
    pub is_exporting: bool,
    pub epoch: u64,
    pub hovered_marker: Option<usize>,
    pub selected_marker: Option<usize>,
    pub last_report: Option<PathBuf>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            workflow: WorkflowState::Input,
            address: String::new(),
            image: None,
            analysis: None,
            error: None,
            error_kind: None,
            zoom: DEFAULT_ZOOM,
            is_loading: false,
            is_image_loading: false,
            is_exporting: false,
            epoch: 0,
            hovered_marker: None,
            selected_marker: None,
            last_report: None,
        }
    }
}

impl SessionState {
    pub fn placement_count(&self) -> usize {
        self.analysis
            .as_ref()
            .map(|analysis| analysis.placements.len())
            .unwrap_or(0)
    }

    /// Marker drawn emphasised: the hovered one wins over the selected one.
    pub fn highlighted_marker(&self) -> Option<usize> {
        self.hovered_marker.or(self.selected_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_zoom, SessionState, WorkflowState, DEFAULT_ZOOM};

    #[test]
    fn default_state_is_empty_input() {
        let state = SessionState::default();
        assert_eq!(state.workflow, WorkflowState::Input);
        assert_eq!(state.zoom, DEFAULT_ZOOM);
        assert!(state.image.is_none());
        assert!(state.analysis.is_none());
        assert_eq!(state.placement_count(), 0);
    }

    #[test]
    fn zoom_clamps_to_satellite_range() {
        assert_eq!(clamp_zoom(3), 17);
        assert_eq!(clamp_zoom(19), 19);
        assert_eq!(clamp_zoom(40), 21);
    }

    #[test]
    fn only_terminal_states_restart() {
        assert!(WorkflowState::Complete.can_restart());
        assert!(WorkflowState::Error.can_restart());
        assert!(!WorkflowState::Analyzing.can_restart());
        assert_eq!(WorkflowState::FetchingImage.as_str(), "FETCHING_IMAGE");
    }
}
