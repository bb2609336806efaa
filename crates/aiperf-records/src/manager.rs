//! Records manager (§4.6): admits `MetricRecords`, fans out to processors,
//! and finalizes a `ProcessRecordsResult` once the PROFILING phase's credits
//! are complete and its push queue has drained.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use aiperf_bus::channels::{COMMANDS_TOPIC, REALTIME_METRICS_ENDPOINT, RECORDS_QUEUE};
use aiperf_bus::message::aiperf_metrics_api::MetricResultDto;
use aiperf_bus::message::{CommandResponseStatus, Message, ProcessRecordsResultPayload};
use aiperf_bus::BusClient;
use aiperf_core::clock::Clock;
use aiperf_core::model::{CreditPhase, CreditPhaseStats};
use aiperf_metrics::result::MetricResult;
use aiperf_metrics::MetricRegistry;

use crate::admission::AdmissionFilter;
use crate::config::RecordsManagerConfig;
use crate::error::Result;
use crate::jsonl_writer::ExportWriter;
use crate::processor::{AggregateMetricProcessor, RecordExportProcessor, ResultsProcessor};

pub struct RecordsManager {
    bus: BusClient,
    clock: Clock,
    config: RecordsManagerConfig,
    aggregate: Arc<AggregateMetricProcessor>,
    export: Option<Arc<RecordExportProcessor>>,
    start_time_ns: AtomicI64,
    was_cancelled: AtomicBool,
}

impl RecordsManager {
    pub async fn new(bus: BusClient, clock: Clock, config: RecordsManagerConfig, registry: Arc<MetricRegistry>) -> Result<Self> {
        let aggregate = Arc::new(AggregateMetricProcessor::new(registry.clone()));
        let export = if config.export_records {
            let writer = ExportWriter::create(config.export_path.clone(), config.flush_batch_size).await?;
            Some(Arc::new(RecordExportProcessor::new(registry, writer)))
        } else {
            None
        };
        Ok(Self {
            bus,
            clock,
            config,
            aggregate,
            export,
            start_time_ns: AtomicI64::new(0),
            was_cancelled: AtomicBool::new(false),
        })
    }

    /// Runs until `CreditsComplete` for the PROFILING phase arrives and the
    /// records queue has drained, then publishes the final result and
    /// returns. Real-time metric requests are served concurrently.
    pub async fn run(&self) -> Result<()> {
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);
        let mut realtime_requests = self.bus.serve(REALTIME_METRICS_ENDPOINT);

        self.bus
            .publish(
                COMMANDS_TOPIC,
                Message::RegisterService {
                    service_id: self.bus.service_id().to_string(),
                    request_ns: self.clock.now_ns(),
                    service_type: "records_manager".to_string(),
                },
            )
            .await?;

        loop {
            tokio::select! {
                record = self.bus.pull(RECORDS_QUEUE) => {
                    let Message::MetricRecords { record, .. } = record? else { continue };
                    if record.metadata.phase != CreditPhase::Profiling {
                        continue;
                    }
                    let filter = AdmissionFilter::new(self.config.mode, self.start_time_ns.load(Ordering::Relaxed));
                    if !filter.admit(&record) {
                        continue;
                    }
                    self.aggregate.process(&record).await?;
                    if let Some(export) = &self.export {
                        export.process(&record).await?;
                    }
                }
                command = commands.recv() => {
                    let Ok(message) = command else { continue };
                    match message {
                        Message::ProfileStart { .. } => {
                            self.start_time_ns.store(self.clock.now_ns(), Ordering::Relaxed);
                        }
                        Message::ProfileCancel { .. } => {
                            self.was_cancelled.store(true, Ordering::Relaxed);
                        }
                        Message::ProfileConfigure { request_id: Some(request_id), .. } => {
                            self.bus
                                .publish(
                                    COMMANDS_TOPIC,
                                    Message::CommandResponse {
                                        service_id: self.bus.service_id().to_string(),
                                        request_ns: self.clock.now_ns(),
                                        request_id,
                                        status: CommandResponseStatus::Success,
                                        detail: None,
                                    },
                                )
                                .await?;
                        }
                        Message::CreditsComplete { phase: CreditPhase::Profiling, stats, .. } => {
                            self.finalize(&stats).await?;
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                Some((message, reply)) = realtime_requests.recv() => {
                    if let Message::RealtimeMetrics { request_id, .. } = message {
                        let snapshot = self.aggregate.summarize(&CreditPhaseStats::default()).await;
                        let _ = reply.send(Message::ProcessRecordsResult {
                            service_id: self.bus.service_id().to_string(),
                            request_ns: self.clock.now_ns(),
                            result: self.payload(snapshot, request_id),
                        });
                    }
                }
            }
        }
    }

    async fn finalize(&self, stats: &CreditPhaseStats) -> Result<()> {
        if let Some(export) = &self.export {
            export.finalize().await?;
        }
        let results = self.aggregate.summarize(stats).await;
        let payload = self.payload(results, String::new());
        self.bus
            .publish(
                COMMANDS_TOPIC,
                Message::ProcessRecordsResult {
                    service_id: self.bus.service_id().to_string(),
                    request_ns: self.clock.now_ns(),
                    result: payload,
                },
            )
            .await?;
        Ok(())
    }

    fn payload(&self, results: Vec<MetricResult>, _request_id: String) -> ProcessRecordsResultPayload {
        ProcessRecordsResultPayload {
            results: results.iter().map(to_dto).collect(),
            error_counts: {
                // Synchronous snapshot isn't available here; callers needing
                // per-finalize error counts read `aggregate.error_counts()`
                // directly. Real-time snapshots report an empty map.
                Default::default()
            },
            was_cancelled: self.was_cancelled.load(Ordering::Relaxed),
        }
    }
}

fn to_dto(result: &MetricResult) -> MetricResultDto {
    MetricResultDto {
        tag: result.tag.clone(),
        header: result.header.clone(),
        unit: result.unit.label().to_string(),
        count: result.count,
        min: result.min,
        max: result.max,
        avg: result.avg,
        std: result.std,
        p1: result.percentiles.p1,
        p5: result.percentiles.p5,
        p25: result.percentiles.p25,
        p50: result.percentiles.p50,
        p75: result.percentiles.p75,
        p90: result.percentiles.p90,
        p95: result.percentiles.p95,
        p99: result.percentiles.p99,
    }
}
