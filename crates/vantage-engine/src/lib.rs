mod analysis;
mod config;
mod dryrun;
mod http;
mod imagery;
mod report;
mod session;

pub use analysis::{
    analysis_instruction, build_analysis_payload, parse_analysis_response, AnalysisProvider,
    AnalysisResponse, GeminiAnalysisClient,
};
pub use config::{EngineConfig, ANALYSIS_KEY_VARS, IMAGERY_KEY_VARS};
pub use dryrun::{DryrunAnalysis, DryrunImagery};
pub use http::error_chain_text;
pub use imagery::{
    decode_image_bytes, parse_geocode_response, static_map_url, Coordinate, ImageSize,
    ImageryEndpoints, ImageryProvider, MapsImageryClient,
};
pub use report::{
    estimate_block_height, paginate, render_marker_overlay, render_report_text, HtmlReportExporter,
    PageLayout, ReportBlock, ReportExporter, ReportView,
};
pub use session::{Session, SessionProviders, ZoomOutcome};
