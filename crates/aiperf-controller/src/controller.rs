//! System controller (§4.7): the eight-step run lifecycle. Binds the
//! message bus, spawns the worker and records-manager subprocesses, drives
//! them through registration, configuration, and profiling, then tears
//! everything down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use aiperf_bus::channels::COMMANDS_TOPIC;
use aiperf_bus::message::{Message, ProcessRecordsResultPayload};
use aiperf_bus::transport::BusTransport;
use aiperf_bus::{BrokerServer, BusClient, TcpBus};
use aiperf_core::clock::Clock;
use aiperf_core::config::write_service_config;
use aiperf_core::model::{CreditPhase, CreditPhaseStats};
use aiperf_core::ExitErrorInfo;
use aiperf_records::config::RecordsManagerConfig;
use aiperf_timing::{cancel_pair, CancelHandle, ConcurrencyStrategy, CreditStrategy, FixedScheduleStrategy, RequestRateStrategy, StopCondition, StrategyContext};
use aiperf_worker::config::WorkerConfig;

use crate::config::{RunConfig, StrategyConfig};
use crate::dataset_service;
use crate::error::{ControllerError, Result};
use crate::supervisor::Supervisor;

const CONTROLLER_SERVICE_ID: &str = "controller";
const RECORDS_MANAGER_SERVICE_ID: &str = "records-manager";

/// Final outcome of one benchmark invocation.
pub struct RunOutcome {
    pub warmup_stats: CreditPhaseStats,
    pub profiling_stats: CreditPhaseStats,
    pub result: ProcessRecordsResultPayload,
    pub exit_errors: Vec<ExitErrorInfo>,
    pub was_cancelled: bool,
}

impl RunOutcome {
    /// Per §7: nonzero iff the controller accumulated any `ExitErrorInfo`.
    pub fn is_success(&self) -> bool {
        self.exit_errors.is_empty()
    }
}

pub struct Controller {
    config: RunConfig,
    bus: BusClient,
    clock: Clock,
    bus_addr: String,
    supervisor: Supervisor,
    worker_ids: Vec<String>,
    exit_errors: Arc<std::sync::Mutex<Vec<ExitErrorInfo>>>,
    cancel: CancelHandle,
    cancel_token: aiperf_timing::CancelToken,
}

impl Controller {
    /// Binds the broker and connects the controller's own bus client.
    /// Returns the controller plus the broker's accept loop, which the
    /// caller must `tokio::spawn`.
    pub async fn bind(config: RunConfig) -> Result<(Self, tokio::task::JoinHandle<()>)> {
        let broker = BrokerServer::bind(&config.bus_bind_addr).await?;
        let bus_addr = broker.local_addr()?.to_string();
        let broker_task = tokio::spawn(async move {
            if let Err(e) = broker.run().await {
                error!(error = %e, "broker stopped with an error");
            }
        });

        let transport: Arc<dyn BusTransport> = Arc::new(TcpBus::connect(&bus_addr).await?);
        let bus = BusClient::new(CONTROLLER_SERVICE_ID, transport);
        let worker_ids = (0..config.num_workers).map(|i| format!("worker-{i}")).collect();
        let supervisor = Supervisor::new()?;
        let (cancel, cancel_token) = cancel_pair();

        Ok((
            Self {
                config,
                bus,
                clock: Clock::new(),
                bus_addr,
                supervisor,
                worker_ids,
                exit_errors: Arc::new(std::sync::Mutex::new(Vec::new())),
                cancel,
                cancel_token,
            },
            broker_task,
        ))
    }

    fn required_service_ids(&self) -> Vec<String> {
        let mut ids = self.worker_ids.clone();
        ids.push(RECORDS_MANAGER_SERVICE_ID.to_string());
        ids
    }

    /// Runs the full lifecycle to completion, honoring SIGINT as described
    /// in §4.7/§5: once cancels the profile and waits briefly, twice kills
    /// everything immediately.
    pub async fn run(mut self) -> Result<RunOutcome> {
        tokio::select! {
            outcome = self.drive() => {
                let outcome = outcome;
                self.shutdown(self.config.shutdown_grace_secs).await;
                outcome
            }
            _ = wait_for_interrupt() => {
                warn!("interrupt received, cancelling profile run");
                self.cancel.cancel();
                let _ = self
                    .bus
                    .publish(COMMANDS_TOPIC, Message::ProfileCancel { service_id: CONTROLLER_SERVICE_ID.into(), request_ns: self.clock.now_ns() })
                    .await;

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(self.config.cancel_grace_secs)) => {}
                    _ = wait_for_interrupt() => {
                        warn!("second interrupt received, killing all subprocesses immediately");
                        self.supervisor.kill_all().await;
                        return Err(ControllerError::ServiceFailed {
                            service_id: CONTROLLER_SERVICE_ID.into(),
                            message: "run cancelled by operator".into(),
                        });
                    }
                }
                self.shutdown(self.config.shutdown_grace_secs).await;
                Err(ControllerError::ServiceFailed { service_id: CONTROLLER_SERVICE_ID.into(), message: "run cancelled by operator".into() })
            }
        }
    }

    /// Steps 2-7 of §4.7: spawn, register, configure, start, drive the
    /// timing strategy through both phases, and await the final result.
    async fn drive(&mut self) -> Result<RunOutcome> {
        let store = dataset_service::load_store(&self.config.dataset)?;
        let dataset_bus = self.bus.clone();
        tokio::spawn(async move { dataset_service::serve(dataset_bus, store).await });

        self.spawn_services().await?;
        self.await_registrations().await?;
        self.configure_services().await?;
        self.publish_start().await?;

        let failures = self.watch_service_failures();

        let strategy = self.config.strategy.build();
        let ctx = StrategyContext { bus: self.bus.clone(), clock: self.clock, cancel: self.cancel_token.clone() };

        let warmup_stats = self.run_phase(strategy.as_ref(), &ctx, CreditPhase::Warmup, self.config.warmup.stop).await?;
        let profiling_stats = self.run_phase(strategy.as_ref(), &ctx, CreditPhase::Profiling, self.config.profiling.stop).await?;

        let result = self.await_process_records_result().await?;
        failures.abort();

        Ok(RunOutcome {
            warmup_stats,
            profiling_stats,
            was_cancelled: result.was_cancelled,
            result,
            exit_errors: self.exit_errors.lock().unwrap().clone(),
        })
    }

    async fn spawn_services(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.config.work_dir)?;

        let mode = self.config.benchmark_mode();
        let records_config = RecordsManagerConfig {
            service_id: RECORDS_MANAGER_SERVICE_ID.to_string(),
            bus_addr: self.bus_addr.clone(),
            mode,
            export_path: self.config.export_path.clone(),
            export_records: self.config.export_records,
            flush_batch_size: self.config.flush_batch_size,
        };
        let records_path = self.service_config_path(RECORDS_MANAGER_SERVICE_ID);
        write_service_config(&records_path, &records_config)?;
        self.supervisor.spawn("records-manager", RECORDS_MANAGER_SERVICE_ID, &records_path)?;

        for worker_id in self.worker_ids.clone() {
            let worker_config = WorkerConfig {
                service_id: worker_id.clone(),
                bus_addr: self.bus_addr.clone(),
                model_name: self.config.model_name.clone(),
                base_url: self.config.base_url.clone(),
                endpoint_type: self.config.endpoint_type,
                streaming: self.config.streaming,
                api_key: self.config.api_key.clone(),
                extra_headers: self.config.extra_headers.clone(),
                extra: self.config.extra.clone(),
                http: self.config.http.clone(),
                slo: self.config.slo.clone(),
            };
            let path = self.service_config_path(&worker_id);
            write_service_config(&path, &worker_config)?;
            self.supervisor.spawn("worker", &worker_id, &path)?;
        }
        Ok(())
    }

    fn service_config_path(&self, service_id: &str) -> PathBuf {
        self.config.work_dir.join(format!("aiperf-{service_id}-{}.json", Uuid::new_v4()))
    }

    /// Waits for a `RegisterService` from every required service, retrying
    /// until `registration_timeout_secs` elapses (§4.7 step 3).
    async fn await_registrations(&self) -> Result<()> {
        let mut pending: std::collections::HashSet<String> = self.required_service_ids().into_iter().collect();
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);
        let deadline = Duration::from_secs(self.config.registration_timeout_secs);

        timeout(deadline, async {
            while !pending.is_empty() {
                if let Ok(Message::RegisterService { service_id, .. }) = commands.recv().await {
                    pending.remove(&service_id);
                }
            }
        })
        .await
        .map_err(|_| ControllerError::RegistrationTimeout(pending.iter().cloned().collect::<Vec<_>>().join(", ")))?;

        info!("all required services registered");
        Ok(())
    }

    /// Broadcasts `ProfileConfigure` and waits for a `CommandResponse` from
    /// every required service (§4.7 step 4).
    async fn configure_services(&self) -> Result<()> {
        let request_id = Uuid::new_v4().to_string();
        let mut pending: std::collections::HashSet<String> = self.required_service_ids().into_iter().collect();
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);

        self.bus
            .publish(
                COMMANDS_TOPIC,
                Message::ProfileConfigure {
                    service_id: CONTROLLER_SERVICE_ID.into(),
                    request_ns: self.clock.now_ns(),
                    request_id: Some(request_id.clone()),
                    config_path: String::new(),
                },
            )
            .await?;

        let deadline = Duration::from_secs(self.config.configure_timeout_secs);
        timeout(deadline, async {
            while !pending.is_empty() {
                if let Ok(Message::CommandResponse { service_id, request_id: rid, .. }) = commands.recv().await {
                    if rid == request_id {
                        pending.remove(&service_id);
                    }
                }
            }
        })
        .await
        .map_err(|_| ControllerError::ConfigureTimeout(pending.iter().cloned().collect::<Vec<_>>().join(", ")))?;

        info!("all required services configured");
        Ok(())
    }

    async fn publish_start(&self) -> Result<()> {
        self.bus
            .publish(COMMANDS_TOPIC, Message::ProfileStart { service_id: CONTROLLER_SERVICE_ID.into(), request_ns: self.clock.now_ns() })
            .await?;
        Ok(())
    }

    async fn run_phase(
        &self,
        strategy: &dyn CreditStrategy,
        ctx: &StrategyContext,
        phase: CreditPhase,
        stop: StopCondition,
    ) -> Result<CreditPhaseStats> {
        info!(?phase, "starting credit phase");
        let stats = strategy.run(ctx, phase, stop).await?;
        info!(?phase, completed = stats.completed, errors = stats.errors, "credit phase complete");
        Ok(stats)
    }

    /// Blocks until the records manager's `ProcessRecordsResult` arrives on
    /// `COMMANDS_TOPIC` (§4.7 step 7).
    async fn await_process_records_result(&self) -> Result<ProcessRecordsResultPayload> {
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);
        loop {
            match commands.recv().await {
                Ok(Message::ProcessRecordsResult { result, .. }) => return Ok(result),
                Ok(_) => continue,
                Err(_) => {
                    return Err(ControllerError::ServiceFailed {
                        service_id: RECORDS_MANAGER_SERVICE_ID.into(),
                        message: "command bus closed before a result arrived".into(),
                    })
                }
            }
        }
    }

    /// Background task aggregating `ServiceFailed` into `exit_errors` (§7:
    /// lifecycle errors surface to the controller, which aggregates them).
    fn watch_service_failures(&self) -> tokio::task::JoinHandle<()> {
        let mut commands = self.bus.subscribe(COMMANDS_TOPIC);
        let exit_errors = self.exit_errors.clone();
        tokio::spawn(async move {
            while let Ok(message) = commands.recv().await {
                if let Message::ServiceFailed { service_id, message: detail, fatal, .. } = message {
                    error!(service_id, detail, fatal, "service reported failure");
                    exit_errors.lock().unwrap().push(ExitErrorInfo { service_id, message: detail, fatal });
                }
            }
        })
    }

    /// Publishes `Shutdown`, then SIGTERM/SIGKILLs every subprocess (§4.7
    /// step 8).
    async fn shutdown(&mut self, grace_secs: u64) {
        let _ = self
            .bus
            .publish(COMMANDS_TOPIC, Message::Shutdown { service_id: CONTROLLER_SERVICE_ID.into(), request_ns: self.clock.now_ns() })
            .await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.supervisor.stop_all(Duration::from_secs(grace_secs)).await;
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn CreditStrategy> {
        match self.clone() {
            StrategyConfig::RequestRate(config) => Box::new(RequestRateStrategy { config }),
            StrategyConfig::Concurrency(config) => Box::new(ConcurrencyStrategy { config }),
            StrategyConfig::FixedSchedule(config) => Box::new(FixedScheduleStrategy { config }),
        }
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    let _ = tokio::signal::ctrl_c().await;
}
