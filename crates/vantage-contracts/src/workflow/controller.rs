use std::path::PathBuf;

use crate::address::normalize_address;
use crate::analysis::{ImagePayload, SecurityAnalysis};
use crate::errors::ServiceError;

use super::state::{SessionState, WorkflowState, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};

/// Issued when a submission starts; carries what the imagery fetch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTicket {
    pub epoch: u64,
    pub address: String,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub epoch: u64,
    pub address: String,
    pub image: ImagePayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomTicket {
    pub epoch: u64,
    pub address: String,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportTicket {
    pub epoch: u64,
    pub address: String,
    pub image: ImagePayload,
    pub analysis: SecurityAnalysis,
    pub selected_marker: Option<usize>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Applied {
    Updated,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Next(T),
    Done,
    Stale,
}

/// Owns the session record and every transition on it.
///
/// Each asynchronous action is split into a guarded `begin_*`, which returns
/// `None` when the action is not allowed right now, and a `finish_*` that only
/// lands if the ticket's epoch still matches. Submit and reset bump the epoch,
/// so late responses from an earlier submission are dropped.
#[derive(Debug, Clone)]
pub struct SessionController {
    state: SessionState,
    origin: String,
}

impl SessionController {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            state: SessionState::default(),
            origin: origin.into(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn begin_submit(&mut self, address: &str) -> Option<ImageTicket> {
        let address = normalize_address(address)?;
        if self.state.is_loading {
            return None;
        }
        let epoch = self.state.epoch + 1;
        self.state = SessionState {
            workflow: WorkflowState::FetchingImage,
            address: address.clone(),
            zoom: DEFAULT_ZOOM,
            is_loading: true,
            epoch,
            ..SessionState::default()
        };
        Some(ImageTicket {
            epoch,
            address,
            zoom: DEFAULT_ZOOM,
        })
    }

    pub fn finish_image(
        &mut self,
        ticket: &ImageTicket,
        result: Result<ImagePayload, ServiceError>,
    ) -> Step<AnalysisTicket> {
        if !self.is_current(ticket.epoch) || self.state.workflow != WorkflowState::FetchingImage {
            return Step::Stale;
        }
        match result {
            Ok(image) => {
                self.state.image = Some(image.clone());
                self.state.workflow = WorkflowState::Analyzing;
                Step::Next(AnalysisTicket {
                    epoch: ticket.epoch,
                    address: ticket.address.clone(),
                    image,
                })
            }
            Err(err) => {
                self.fail(&err);
                Step::Done
            }
        }
    }

    pub fn finish_analysis(
        &mut self,
        ticket: &AnalysisTicket,
        result: Result<SecurityAnalysis, ServiceError>,
    ) -> Applied {
        if !self.is_current(ticket.epoch) || self.state.workflow != WorkflowState::Analyzing {
            return Applied::Stale;
        }
        match result {
            Ok(analysis) => {
                self.state.analysis = Some(analysis);
                self.state.workflow = WorkflowState::Complete;
                self.state.is_loading = false;
            }
            Err(err) => self.fail(&err),
        }
        Applied::Updated
    }

    pub fn begin_zoom(&mut self, delta: i64) -> Option<ZoomTicket> {
        if self.state.workflow != WorkflowState::Complete
            || self.state.is_loading
            || self.state.is_image_loading
            || delta == 0
        {
            return None;
        }
        let target = i64::from(self.state.zoom) + delta;
        if target < i64::from(MIN_ZOOM) || target > i64::from(MAX_ZOOM) {
            return None;
        }
        self.state.is_image_loading = true;
        Some(ZoomTicket {
            epoch: self.state.epoch,
            address: self.state.address.clone(),
            zoom: target as u8,
        })
    }

    pub fn finish_zoom(
        &mut self,
        ticket: &ZoomTicket,
        result: Result<ImagePayload, ServiceError>,
    ) -> Applied {
        if !self.is_current(ticket.epoch) || !self.state.is_image_loading {
            return Applied::Stale;
        }
        self.state.is_image_loading = false;
        match result {
            Ok(image) => {
                self.state.image = Some(image);
                self.state.zoom = ticket.zoom;
            }
            Err(err) => self.record_error(&err),
        }
        Applied::Updated
    }

    pub fn begin_export(&mut self) -> Option<ExportTicket> {
        if self.state.workflow != WorkflowState::Complete || self.state.is_exporting {
            return None;
        }
        let image = self.state.image.clone()?;
        let analysis = self.state.analysis.clone()?;
        self.state.is_exporting = true;
        Some(ExportTicket {
            epoch: self.state.epoch,
            address: self.state.address.clone(),
            image,
            analysis,
            selected_marker: self.state.selected_marker,
        })
    }

    pub fn finish_export(
        &mut self,
        ticket: &ExportTicket,
        result: Result<PathBuf, ServiceError>,
    ) -> Applied {
        if !self.is_current(ticket.epoch) || !self.state.is_exporting {
            return Applied::Stale;
        }
        self.state.is_exporting = false;
        match result {
            Ok(path) => self.state.last_report = Some(path),
            Err(err) => self.record_error(&err),
        }
        Applied::Updated
    }

    /// Back to an empty INPUT state. Only COMPLETE and ERROR can restart.
    pub fn reset(&mut self) -> bool {
        if !self.state.workflow.can_restart() {
            return false;
        }
        self.state = SessionState {
            epoch: self.state.epoch + 1,
            ..SessionState::default()
        };
        true
    }

    /// "Try again" from ERROR: back to INPUT with the address kept for editing.
    pub fn retry(&mut self) -> bool {
        if self.state.workflow != WorkflowState::Error {
            return false;
        }
        self.state = SessionState {
            address: std::mem::take(&mut self.state.address),
            epoch: self.state.epoch + 1,
            ..SessionState::default()
        };
        true
    }

    pub fn dismiss_error(&mut self) -> bool {
        if self.state.workflow != WorkflowState::Complete || self.state.error.is_none() {
            return false;
        }
        self.state.error = None;
        self.state.error_kind = None;
        true
    }

    pub fn hover_marker(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(idx) if idx >= self.state.placement_count() => false,
            _ => {
                self.state.hovered_marker = index;
                true
            }
        }
    }

    /// Selects a marker, or deselects it when it is already selected.
    pub fn toggle_marker(&mut self, index: usize) -> bool {
        if index >= self.state.placement_count() {
            return false;
        }
        self.state.selected_marker = if self.state.selected_marker == Some(index) {
            None
        } else {
            Some(index)
        };
        true
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.epoch == epoch
    }

    fn fail(&mut self, err: &ServiceError) {
        self.record_error(err);
        self.state.workflow = WorkflowState::Error;
        self.state.is_loading = false;
    }

    fn record_error(&mut self, err: &ServiceError) {
        self.state.error = Some(err.display_message(&self.origin));
        self.state.error_kind = Some(err.kind);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::analysis::{
        CameraPlacement, CameraSummaryItem, ImagePayload, MarkerCoordinates, SecurityAnalysis,
    };
    use crate::errors::{ErrorKind, ServiceError};
    use crate::workflow::{WorkflowState, DEFAULT_ZOOM};

    use super::{Applied, SessionController, Step};

    const ORIGIN: &str = "https://cams.example.com";

    fn image(tag: &str) -> ImagePayload {
        ImagePayload::new("image/png", tag)
    }

    fn analysis() -> SecurityAnalysis {
        SecurityAnalysis {
            overview: "Two-storey terrace.".to_string(),
            placements: vec![
                CameraPlacement {
                    location: "North entrance".to_string(),
                    reason: "covers driveway".to_string(),
                    camera_type: "Dome".to_string(),
                    coordinates: MarkerCoordinates { x: 50.0, y: 20.0 },
                },
                CameraPlacement {
                    location: "Rear garden".to_string(),
                    reason: "covers back gate".to_string(),
                    camera_type: "Bullet".to_string(),
                    coordinates: MarkerCoordinates { x: 30.0, y: 80.0 },
                },
            ],
            camera_summary: Some(vec![CameraSummaryItem {
                camera_type: "Dome".to_string(),
                quantity: 1,
            }]),
        }
    }

    fn completed() -> SessionController {
        let mut controller = SessionController::new(ORIGIN);
        let ticket = controller.begin_submit("221B Baker Street").unwrap();
        let Step::Next(next) = controller.finish_image(&ticket, Ok(image("B"))) else {
            panic!("expected analysis ticket");
        };
        assert_eq!(controller.finish_analysis(&next, Ok(analysis())), Applied::Updated);
        controller
    }

    #[test]
    fn submit_requires_non_blank_address() {
        let mut controller = SessionController::new(ORIGIN);
        assert!(controller.begin_submit("   ").is_none());
        assert_eq!(controller.state().workflow, WorkflowState::Input);
    }

    #[test]
    fn submit_while_loading_is_noop() {
        let mut controller = SessionController::new(ORIGIN);
        let first = controller.begin_submit("221B Baker Street").unwrap();
        assert!(controller.begin_submit("10 Downing Street").is_none());
        assert_eq!(controller.state().address, "221B Baker Street");
        assert_eq!(controller.state().epoch, first.epoch);
    }

    #[test]
    fn full_flow_reaches_complete_with_exact_analysis() {
        let controller = completed();
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Complete);
        assert_eq!(state.analysis, Some(analysis()));
        assert_eq!(state.image, Some(image("B")));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn image_failure_moves_to_error_without_image() {
        let mut controller = SessionController::new(ORIGIN);
        let ticket = controller.begin_submit("nowhere").unwrap();
        let step = controller.finish_image(
            &ticket,
            Err(ServiceError::from_geocode_status("ZERO_RESULTS")),
        );
        assert_eq!(step, Step::Done);
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Error);
        assert!(state.image.is_none());
        assert_eq!(state.error_kind, Some(ErrorKind::GeocodeZeroResults));
        assert!(state.error.as_deref().unwrap_or_default().starts_with("No location found"));
        assert_eq!(state.address, "nowhere");
    }

    #[test]
    fn denied_error_is_rendered_with_origin() {
        let mut controller = SessionController::new(ORIGIN);
        let ticket = controller.begin_submit("221B Baker Street").unwrap();
        controller.finish_image(
            &ticket,
            Err(ServiceError::from_geocode_status("REQUEST_DENIED")),
        );
        let shown = controller.state().error.clone().unwrap_or_default();
        assert!(shown.contains("https://cams.example.com/*"));
    }

    #[test]
    fn analysis_failure_keeps_fetched_image() {
        let mut controller = SessionController::new(ORIGIN);
        let ticket = controller.begin_submit("221B Baker Street").unwrap();
        let Step::Next(next) = controller.finish_image(&ticket, Ok(image("B"))) else {
            panic!("expected analysis ticket");
        };
        controller.finish_analysis(&next, Err(ServiceError::analysis()));
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Error);
        assert_eq!(state.image, Some(image("B")));
        assert!(state.analysis.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn zoom_is_bounded_to_range() {
        let mut controller = completed();
        assert_eq!(controller.state().zoom, DEFAULT_ZOOM);

        // 20 -> 19
        let ticket = controller.begin_zoom(-1).unwrap();
        controller.finish_zoom(&ticket, Ok(image("Z19")));
        assert_eq!(controller.state().zoom, 19);

        // 19 -> 22 is past the maximum
        assert!(controller.begin_zoom(3).is_none());
        assert_eq!(controller.state().zoom, 19);
        assert!(!controller.state().is_image_loading);

        // walk down to 17, then one more is past the minimum
        let ticket = controller.begin_zoom(-2).unwrap();
        controller.finish_zoom(&ticket, Ok(image("Z17")));
        assert_eq!(controller.state().zoom, 17);
        assert!(controller.begin_zoom(-1).is_none());
    }

    #[test]
    fn zoom_replaces_only_the_image() {
        let mut controller = completed();
        let ticket = controller.begin_zoom(1).unwrap();
        assert!(controller.begin_zoom(-1).is_none());
        assert_eq!(controller.finish_zoom(&ticket, Ok(image("Z21"))), Applied::Updated);
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Complete);
        assert_eq!(state.image, Some(image("Z21")));
        assert_eq!(state.analysis, Some(analysis()));
        assert_eq!(state.zoom, 21);
    }

    #[test]
    fn zoom_failure_keeps_previous_image_and_workflow() {
        let mut controller = completed();
        let ticket = controller.begin_zoom(1).unwrap();
        controller.finish_zoom(&ticket, Err(ServiceError::imagery_fetch()));
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Complete);
        assert_eq!(state.image, Some(image("B")));
        assert_eq!(state.zoom, DEFAULT_ZOOM);
        assert_eq!(state.error_kind, Some(ErrorKind::ImageryFetch));
    }

    #[test]
    fn zoom_rejected_outside_complete() {
        let mut controller = SessionController::new(ORIGIN);
        assert!(controller.begin_zoom(1).is_none());
        controller.begin_submit("221B Baker Street").unwrap();
        assert!(controller.begin_zoom(1).is_none());
    }

    #[test]
    fn second_export_while_first_in_flight_is_noop() {
        let mut controller = completed();
        let first = controller.begin_export().unwrap();
        assert!(controller.begin_export().is_none());
        controller.finish_export(&first, Ok(PathBuf::from("/tmp/report.html")));
        assert_eq!(
            controller.state().last_report,
            Some(PathBuf::from("/tmp/report.html"))
        );
        assert!(controller.begin_export().is_some());
    }

    #[test]
    fn export_failure_keeps_workflow_and_content() {
        let mut controller = completed();
        let ticket = controller.begin_export().unwrap();
        controller.finish_export(&ticket, Err(ServiceError::export()));
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Complete);
        assert!(state.analysis.is_some());
        assert_eq!(state.error_kind, Some(ErrorKind::Export));
        assert!(!state.is_exporting);
        assert!(controller.clone().dismiss_error());
    }

    #[test]
    fn reset_from_complete_clears_session() {
        let mut controller = completed();
        assert!(controller.reset());
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Input);
        assert!(state.address.is_empty());
        assert!(state.image.is_none());
        assert!(state.analysis.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn reset_is_refused_mid_flight() {
        let mut controller = SessionController::new(ORIGIN);
        controller.begin_submit("221B Baker Street").unwrap();
        assert!(!controller.reset());
        assert_eq!(controller.state().workflow, WorkflowState::FetchingImage);
    }

    #[test]
    fn retry_returns_to_input_with_address() {
        let mut controller = SessionController::new(ORIGIN);
        let ticket = controller.begin_submit("221B Baker Street").unwrap();
        controller.finish_image(&ticket, Err(ServiceError::imagery_fetch()));
        assert!(controller.retry());
        let state = controller.state();
        assert_eq!(state.workflow, WorkflowState::Input);
        assert_eq!(state.address, "221B Baker Street");
        assert!(state.error.is_none());
    }

    #[test]
    fn stale_zoom_after_reset_is_discarded() {
        let mut controller = completed();
        let ticket = controller.begin_zoom(1).unwrap();
        controller.reset();
        assert_eq!(controller.finish_zoom(&ticket, Ok(image("late"))), Applied::Stale);
        assert!(controller.state().image.is_none());
    }

    #[test]
    fn stale_export_after_resubmit_is_discarded() {
        let mut controller = completed();
        let export = controller.begin_export().unwrap();
        controller.begin_submit("10 Downing Street").unwrap();
        assert_eq!(
            controller.finish_export(&export, Err(ServiceError::export())),
            Applied::Stale
        );
        assert!(controller.state().error.is_none());
    }

    #[test]
    fn marker_hover_and_selection() {
        let mut controller = completed();
        assert!(controller.toggle_marker(1));
        assert_eq!(controller.state().selected_marker, Some(1));
        assert!(controller.toggle_marker(1));
        assert_eq!(controller.state().selected_marker, None);
        assert!(!controller.toggle_marker(2));

        assert!(controller.hover_marker(Some(0)));
        assert_eq!(controller.state().highlighted_marker(), Some(0));
        assert!(!controller.hover_marker(Some(5)));
        assert!(controller.hover_marker(None));
        assert_eq!(controller.state().hovered_marker, None);
    }
}
