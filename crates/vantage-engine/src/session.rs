use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use vantage_contracts::analysis::SecurityAnalysis;
use vantage_contracts::errors::ServiceError;
use vantage_contracts::events::{now_utc_iso, EventPayload, EventWriter};
use vantage_contracts::models::{ModelSelection, ModelSelector};
use vantage_contracts::runs::receipts::{build_receipt, write_receipt};
use vantage_contracts::runs::summary::{write_summary, SessionSummary};
use vantage_contracts::workflow::{
    Applied, SessionController, SessionState, Step, WorkflowState,
};

use crate::analysis::{AnalysisProvider, AnalysisResponse, GeminiAnalysisClient};
use crate::config::EngineConfig;
use crate::dryrun::{DryrunAnalysis, DryrunImagery};
use crate::http::error_chain_text;
use crate::imagery::{ImageSize, ImageryProvider, MapsImageryClient};
use crate::report::{HtmlReportExporter, ReportExporter, ReportView};

const EXPORT_ERROR_MAX_CHARS: usize = 512;

/// The three collaborators a session talks to.
pub struct SessionProviders {
    pub imagery: Box<dyn ImageryProvider>,
    pub analysis: Box<dyn AnalysisProvider>,
    pub exporter: Box<dyn ReportExporter>,
}

impl SessionProviders {
    /// Picks live or offline providers for the requested analysis model.
    ///
    /// Live providers need both API keys; a dryrun model needs none.
    pub fn from_config(
        config: &EngineConfig,
        out_dir: &Path,
        requested_model: Option<&str>,
        dryrun: bool,
    ) -> Result<(Self, ModelSelection), ServiceError> {
        let selector = ModelSelector::new(None);
        let requested = if dryrun {
            requested_model
                .filter(|name| {
                    selector
                        .registry
                        .get(name)
                        .map(|spec| spec.is_dryrun())
                        .unwrap_or(false)
                })
                .unwrap_or(DryrunAnalysis::DEFAULT_MODEL)
        } else {
            requested_model.unwrap_or(config.analysis_model.as_str())
        };
        let selection = selector
            .select(Some(requested), "analysis")
            .map_err(|reason| ServiceError::analysis().with_detail(reason))?;

        let exporter: Box<dyn ReportExporter> = Box::new(HtmlReportExporter::new(out_dir));
        if selection.model.is_dryrun() {
            return Ok((
                Self {
                    imagery: Box::new(DryrunImagery),
                    analysis: Box::new(DryrunAnalysis::new(&selection.model.name)),
                    exporter,
                },
                selection,
            ));
        }

        config.require_keys()?;
        Ok((
            Self {
                imagery: Box::new(MapsImageryClient::new(config)),
                analysis: Box::new(GeminiAnalysisClient::new(config, &selection.model.name)),
                exporter,
            },
            selection,
        ))
    }
}

/// One user session: the controller plus the blocking clients it drives, an
/// event log, and the artefacts written next to it.
pub struct Session {
    out_dir: PathBuf,
    session_id: String,
    events: EventWriter,
    controller: SessionController,
    providers: SessionProviders,
    image_size: ImageSize,
    summary_path: PathBuf,
    started_at: String,
}

impl Session {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        config: &EngineConfig,
        providers: SessionProviders,
    ) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        let session_id = Uuid::new_v4().to_string();
        let events = EventWriter::new(events_path.into(), session_id.clone());
        let summary_path = out_dir.join("summary.json");
        let started_at = now_utc_iso();

        events.emit(
            "session_started",
            map_object(json!({
                "out_dir": out_dir.to_string_lossy().to_string(),
                "imagery_provider": providers.imagery.name(),
                "analysis_provider": providers.analysis.name(),
                "analysis_model": providers.analysis.model(),
            })),
        )?;

        Ok(Self {
            out_dir,
            session_id,
            events,
            controller: SessionController::new(config.origin.clone()),
            providers,
            image_size: ImageSize::default(),
            summary_path,
            started_at,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &SessionState {
        self.controller.state()
    }

    /// Runs a full submission: imagery first, then analysis once the image
    /// has resolved. Returns the workflow state it ended in.
    ///
    /// A failed event write is reported only after the controller has left
    /// its loading state.
    pub fn submit(&mut self, address: &str) -> Result<WorkflowState> {
        let Some(ticket) = self.controller.begin_submit(address) else {
            let reason = if address.trim().is_empty() {
                "empty_address"
            } else {
                "busy"
            };
            self.events
                .emit("submit_ignored", map_object(json!({ "reason": reason })))?;
            return Ok(self.state().workflow);
        };

        let mut log = DeferredLog::new(&self.events);
        log.emit(
            "image_requested",
            map_object(json!({
                "address": ticket.address,
                "zoom": ticket.zoom,
                "provider": self.providers.imagery.name(),
            })),
        );
        let fetched =
            self.providers
                .imagery
                .fetch_aerial_image(&ticket.address, ticket.zoom, self.image_size);
        match &fetched {
            Ok(image) => log.emit(
                "image_fetched",
                map_object(json!({
                    "mime_type": image.mime_type,
                    "encoded_len": image.len(),
                    "zoom": ticket.zoom,
                })),
            ),
            Err(err) => log.emit("workflow_error", self.error_payload("imagery", err)),
        }

        let analysis_ticket = match self.controller.finish_image(&ticket, fetched) {
            Step::Next(next) => next,
            Step::Done => {
                log.finish()?;
                return Ok(self.state().workflow);
            }
            Step::Stale => {
                log.emit(
                    "stale_response_discarded",
                    self.stale_payload("imagery", ticket.epoch),
                );
                log.finish()?;
                return Ok(self.state().workflow);
            }
        };

        log.emit(
            "analysis_requested",
            map_object(json!({
                "provider": self.providers.analysis.name(),
                "model": self.providers.analysis.model(),
            })),
        );
        let response = self
            .providers
            .analysis
            .analyze(&analysis_ticket.address, &analysis_ticket.image);
        let (result, receipt) = match response {
            Ok(response) => {
                let analysis = response.analysis.clone();
                (Ok(analysis), Some(response))
            }
            Err(err) => {
                log.emit("workflow_error", self.error_payload("analysis", &err));
                (Err(err), None)
            }
        };

        let applied = self.controller.finish_analysis(&analysis_ticket, result);
        if applied == Applied::Stale {
            log.emit(
                "stale_response_discarded",
                self.stale_payload("analysis", analysis_ticket.epoch),
            );
        }
        log.finish()?;

        if let (Applied::Updated, Some(response), Some(analysis)) =
            (applied, receipt, self.controller.state().analysis.clone())
        {
            let analysis_path = self.persist_analysis(&analysis, &response)?;
            self.events.emit(
                "analysis_complete",
                map_object(json!({
                    "placements": analysis.placements.len(),
                    "summary_items": analysis.summary_items().len(),
                    "analysis_path": analysis_path.to_string_lossy().to_string(),
                })),
            )?;
        }
        Ok(self.state().workflow)
    }

    /// Moves the zoom by `delta` levels and refetches the tile. The analysis
    /// is kept as is.
    pub fn change_zoom(&mut self, delta: i64) -> Result<ZoomOutcome> {
        let current = self.state().zoom;
        let Some(ticket) = self.controller.begin_zoom(delta) else {
            self.events.emit(
                "zoom_ignored",
                map_object(json!({
                    "delta": delta,
                    "zoom": current,
                    "workflow": self.state().workflow.as_str(),
                })),
            )?;
            return Ok(ZoomOutcome::Ignored);
        };

        let mut log = DeferredLog::new(&self.events);
        log.emit(
            "zoom_requested",
            map_object(json!({ "from": current, "to": ticket.zoom })),
        );
        let fetched =
            self.providers
                .imagery
                .fetch_aerial_image(&ticket.address, ticket.zoom, self.image_size);
        if let Err(err) = &fetched {
            log.emit("workflow_error", self.error_payload("zoom", err));
        }
        let succeeded = fetched.is_ok();
        let outcome = match self.controller.finish_zoom(&ticket, fetched) {
            Applied::Stale => {
                log.emit(
                    "stale_response_discarded",
                    self.stale_payload("zoom", ticket.epoch),
                );
                ZoomOutcome::Ignored
            }
            Applied::Updated if succeeded => {
                log.emit("zoom_applied", map_object(json!({ "zoom": ticket.zoom })));
                ZoomOutcome::Applied
            }
            Applied::Updated => ZoomOutcome::Failed,
        };
        log.finish()?;
        Ok(outcome)
    }

    /// Exports the current view and analysis. `None` when there is nothing to
    /// export, an export is already running, or the export failed.
    pub fn export(&mut self) -> Result<Option<PathBuf>> {
        let Some(ticket) = self.controller.begin_export() else {
            return Ok(None);
        };
        let mut log = DeferredLog::new(&self.events);
        log.emit(
            "export_started",
            map_object(json!({ "address": ticket.address })),
        );

        let view = ReportView {
            image: ticket.image.clone(),
            highlighted_marker: ticket.selected_marker,
        };
        let result = self
            .providers
            .exporter
            .export(&view, &ticket.analysis, &ticket.address)
            .map_err(|err| {
                ServiceError::export().with_detail(error_chain_text(&err, EXPORT_ERROR_MAX_CHARS))
            });

        let exported = match &result {
            Ok(path) => Some(path.clone()),
            Err(err) => {
                log.emit(
                    "export_failed",
                    map_object(json!({
                        "message": err.message,
                        "detail": err.detail,
                    })),
                );
                None
            }
        };
        let exported = match self.controller.finish_export(&ticket, result) {
            Applied::Stale => {
                log.emit(
                    "stale_response_discarded",
                    self.stale_payload("export", ticket.epoch),
                );
                None
            }
            Applied::Updated => {
                if let Some(path) = &exported {
                    log.emit(
                        "report_exported",
                        map_object(json!({ "path": path.to_string_lossy().to_string() })),
                    );
                }
                exported
            }
        };
        log.finish()?;
        Ok(exported)
    }

    pub fn reset(&mut self) -> Result<bool> {
        let reset = self.controller.reset();
        if reset {
            self.events
                .emit("session_reset", map_object(json!({ "keep_address": false })))?;
        }
        Ok(reset)
    }

    pub fn retry(&mut self) -> Result<bool> {
        let reset = self.controller.retry();
        if reset {
            self.events.emit(
                "session_reset",
                map_object(json!({
                    "keep_address": true,
                    "address": self.state().address,
                })),
            )?;
        }
        Ok(reset)
    }

    pub fn hover(&mut self, index: Option<usize>) -> bool {
        self.controller.hover_marker(index)
    }

    pub fn select(&mut self, index: usize) -> bool {
        self.controller.toggle_marker(index)
    }

    pub fn dismiss_error(&mut self) -> bool {
        self.controller.dismiss_error()
    }

    pub fn finish(&mut self) -> Result<()> {
        let state = self.controller.state();
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            address: Some(state.address.clone()).filter(|value| !value.is_empty()),
            workflow: state.workflow.as_str().to_string(),
            zoom: state.zoom,
            total_placements: state.placement_count() as u64,
            report_path: state
                .last_report
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        };
        write_summary(&self.summary_path, &summary, None)?;
        self.events.emit(
            "session_finished",
            map_object(json!({
                "summary_path": self.summary_path.to_string_lossy().to_string()
            })),
        )?;
        Ok(())
    }

    fn persist_analysis(
        &self,
        analysis: &SecurityAnalysis,
        response: &AnalysisResponse,
    ) -> Result<PathBuf> {
        let analysis_path = self.out_dir.join("analysis.json");
        std::fs::write(&analysis_path, serde_json::to_string_pretty(analysis)?)?;
        let receipt = build_receipt(
            self.providers.analysis.name(),
            Some(self.providers.analysis.model()),
            &response.provider_request,
            &response.provider_response,
            &response.warnings,
            &analysis_path,
        );
        write_receipt(&self.out_dir.join("receipt-analysis.json"), &receipt)?;
        Ok(analysis_path)
    }

    fn error_payload(&self, stage: &str, err: &ServiceError) -> EventPayload {
        map_object(json!({
            "stage": stage,
            "kind": err.kind.as_str(),
            "message": err.display_message(self.controller.origin()),
            "detail": err.detail,
        }))
    }

    fn stale_payload(&self, stage: &str, epoch: u64) -> EventPayload {
        map_object(json!({
            "stage": stage,
            "ticket_epoch": epoch,
            "current_epoch": self.state().epoch,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomOutcome {
    Applied,
    /// Not allowed right now (bounds, busy, or no completed analysis).
    Ignored,
    /// The refetch failed; the previous tile and zoom are kept.
    Failed,
}

/// Event writes made while a ticket is outstanding. The first failure is held
/// until the controller has settled, then surfaced by `finish`.
struct DeferredLog<'a> {
    events: &'a EventWriter,
    failure: Option<anyhow::Error>,
}

impl<'a> DeferredLog<'a> {
    fn new(events: &'a EventWriter) -> Self {
        Self {
            events,
            failure: None,
        }
    }

    fn emit(&mut self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.events.emit(event_type, payload) {
            self.failure.get_or_insert(err);
        }
    }

    fn finish(self) -> Result<()> {
        match self.failure {
            Some(err) => Err(err.context("event log write failed")),
            None => Ok(()),
        }
    }
}

fn map_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
