mod controller;
mod state;

pub use controller::{
    AnalysisTicket, Applied, ExportTicket, ImageTicket, SessionController, Step, ZoomTicket,
};
pub use state::{clamp_zoom, SessionState, WorkflowState, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};
