//! Per-credit procedure (§4.3): pull a credit, resolve its turn, issue the
//! request, parse the response, evaluate metrics, publish the result.

use std::sync::Arc;

use reqwest::Client;
use uuid::Uuid;

use aiperf_bus::channels::{COMMANDS_TOPIC, CREDITS_QUEUE, CREDIT_RETURNS_TOPIC, RECORDS_QUEUE};
use aiperf_bus::message::{CommandResponseStatus, Message, MetricRecordPayload};
use aiperf_bus::BusClient;
use aiperf_core::clock::Clock;
use aiperf_core::model::{Credit, MetricValue, RecordMetadata};
use aiperf_dataset::DatasetClient;
use aiperf_http::converters::{build_payload, EndpointConfig};
use aiperf_http::sse_client::{issue_request, RequestParams};
use aiperf_metrics::{evaluate_record, MetricRegistry};

use crate::config::WorkerConfig;
use crate::error::Result;

pub struct Worker {
    pub config: WorkerConfig,
    pub bus: BusClient,
    pub clock: Clock,
    pub http: Client,
    pub endpoint: EndpointConfig,
    pub dataset: DatasetClient,
    pub registry: Arc<MetricRegistry>,
}

impl Worker {
    /// Runs until the pull queue is closed or a transport-level bus failure
    /// occurs; credit-level failures (a single bad request) never stop the
    /// loop (§7: transport errors become `ErrorDetails`, not a worker exit).
    pub async fn run(&self) -> Result<()> {
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);

        self.bus
            .publish(
                COMMANDS_TOPIC,
                Message::RegisterService {
                    service_id: self.config.service_id.clone(),
                    request_ns: self.clock.now_ns(),
                    service_type: "worker".to_string(),
                },
            )
            .await?;

        self.await_profile_configure(&mut commands).await?;

        loop {
            let message = self.bus.pull(CREDITS_QUEUE).await?;
            let Message::CreditDrop {
                phase,
                conversation_id,
                turn_index,
                should_cancel,
                cancel_after_ns,
                credit_drop_perf_ns,
                conversation_num,
                ..
            } = message
            else {
                continue;
            };

            let credit = Credit {
                phase,
                conversation_id,
                turn_index,
                should_cancel,
                cancel_after_ns,
                credit_drop_perf_ns,
                conversation_num,
            };

            let errored = self.serve_credit(credit).await.is_err();
            self.bus
                .publish(
                    CREDIT_RETURNS_TOPIC,
                    Message::CreditReturn {
                        service_id: self.bus.service_id().to_string(),
                        request_ns: self.clock.now_ns(),
                        conversation_num,
                        errored,
                    },
                )
                .await?;
        }
    }

    /// Waits for the controller's `ProfileConfigure` broadcast and acks it
    /// (§4.7 step 4), so the worker never pulls a credit before the
    /// controller has finished telling every required service the run is
    /// configured.
    async fn await_profile_configure(&self, commands: &mut tokio::sync::broadcast::Receiver<Message>) -> Result<()> {
        loop {
            match commands.recv().await {
                Ok(Message::ProfileConfigure { request_id: Some(request_id), .. }) => {
                    self.bus
                        .publish(
                            COMMANDS_TOPIC,
                            Message::CommandResponse {
                                service_id: self.config.service_id.clone(),
                                request_ns: self.clock.now_ns(),
                                request_id,
                                status: CommandResponseStatus::Success,
                                detail: None,
                            },
                        )
                        .await?;
                    return Ok(());
                }
                Ok(_) => continue,
                Err(_) => return Err(crate::error::WorkerError::Bus(aiperf_core::Error::Transport("command bus closed before ProfileConfigure".into()))),
            }
        }
    }

    async fn serve_credit(&self, credit: Credit) -> Result<()> {
        let request_id = Uuid::new_v4().to_string();

        let (conversation_id, turn) = match credit.conversation_id {
            Some(id) => {
                let turn = self.dataset.turn(&id, credit.turn_index, request_id).await?;
                (id, turn)
            }
            None => {
                let conversation = self.dataset.random_conversation(request_id).await?;
                let turn = conversation
                    .turn(credit.turn_index)
                    .cloned()
                    .unwrap_or_default();
                (conversation.conversation_id, turn)
            }
        };

        let payload = build_payload(&self.endpoint, &turn)?;

        let params = RequestParams {
            conversation_id: conversation_id.clone(),
            turn_index: credit.turn_index,
            model_name: self.config.model_name.clone(),
            credit_num: credit.conversation_num,
            worker_id: Some(self.config.service_id.clone()),
            should_cancel: credit.should_cancel,
            cancel_after_ns: credit.cancel_after_ns,
        };

        let record = issue_request(&self.http, &self.clock, &self.endpoint, payload, params).await;
        let is_error = record.error.is_some();

        let metadata = RecordMetadata {
            phase: credit.phase,
            conversation_id: record.conversation_id.clone(),
            turn_index: record.turn_index,
            start_perf_ns: record.start_perf_ns,
            end_perf_ns: record.end_perf_ns,
            model_name: record.model_name.clone(),
            error: record.error.clone(),
        };

        let mut values = std::collections::HashMap::new();
        if !is_error {
            let parsed = aiperf_parser::reconstruct(record)?;
            let is_streaming = parsed.is_streaming();
            let produces_tokens = self.endpoint.endpoint_type.produces_tokens();
            let (_, contributions) = evaluate_record(&self.registry, &parsed, is_streaming, produces_tokens, &self.config.slo)?;
            for contribution in contributions {
                values.insert(
                    contribution.tag.to_string(),
                    MetricValue { value: contribution.value, unit: contribution.unit.label().to_string() },
                );
            }
        }

        self.bus
            .push(
                RECORDS_QUEUE,
                Message::MetricRecords {
                    service_id: self.config.service_id.clone(),
                    request_ns: self.clock.now_ns(),
                    record: MetricRecordPayload { error: metadata.error.clone(), metadata, values },
                },
            )
            .await?;

        if is_error {
            Err(crate::error::WorkerError::Bus(aiperf_core::Error::Transport("request failed".into())))
        } else {
            Ok(())
        }
    }
}
