// src/provision/sequence.rs

//! The provisioning sequence.
//!
//! Stages run strictly in order and the first failure stops the run:
//!
//! 1. validate the configuration (no network activity before this passes),
//! 2. connect, retrying until the communicator's timeout,
//! 3. install `hab` (skipped with `skip_install`),
//! 4. install and start the supervisor,
//! 5. register each service in declared order.
//!
//! Once connected, the session is always closed before returning.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use super::install::install_runtime;
use super::service::register_service;
use super::supervisor::start_supervisor;
use crate::config::{ProvisionerConfig, RawProvisionerConfig};
use crate::errors::ProvisionError;
use crate::exec::{Communicator, RetryPolicy, Session, SharedSink, connect_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Connect,
    InstallRuntime,
    StartSupervisor,
    /// Carries the package identifier.
    RegisterService(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validate => f.write_str("config validation"),
            Stage::Connect => f.write_str("connect"),
            Stage::InstallRuntime => f.write_str("hab install"),
            Stage::StartSupervisor => f.write_str("supervisor start"),
            Stage::RegisterService(ident) => write!(f, "service {ident}"),
        }
    }
}

/// Result of a provisioning run.
#[derive(Debug)]
pub enum ProvisionOutcome {
    Succeeded,
    Failed { stage: Stage, error: ProvisionError },
}

impl ProvisionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProvisionOutcome::Succeeded)
    }

    /// The stage that failed, if any.
    pub fn failed_stage(&self) -> Option<&Stage> {
        match self {
            ProvisionOutcome::Succeeded => None,
            ProvisionOutcome::Failed { stage, .. } => Some(stage),
        }
    }

    pub fn into_result(self) -> std::result::Result<(), StageFailure> {
        match self {
            ProvisionOutcome::Succeeded => Ok(()),
            ProvisionOutcome::Failed { stage, error } => Err(StageFailure { stage, error }),
        }
    }
}

#[derive(Error, Debug)]
#[error("provisioning failed during {stage}: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: ProvisionError,
}

/// Drives one host through the provisioning stages.
pub struct Provisioner<'a, C: Communicator + ?Sized> {
    config: &'a ProvisionerConfig,
    comm: &'a C,
    sink: SharedSink,
}

impl<'a, C: Communicator + ?Sized> Provisioner<'a, C> {
    pub fn new(config: &'a ProvisionerConfig, comm: &'a C, sink: SharedSink) -> Self {
        Self { config, comm, sink }
    }

    /// Run every stage after validation.
    pub async fn run(&self) -> ProvisionOutcome {
        let policy = RetryPolicy::new(self.comm.timeout(), self.config.connection.retry_interval);
        if let Err(err) = connect_with_retry(self.comm, policy).await {
            return self.fail(Stage::Connect, err.into());
        }

        let session = Session::new(self.comm, Arc::clone(&self.sink));
        let result = self.remote_stages(&session).await;

        if let Err(err) = self.comm.disconnect().await {
            warn!(error = %format!("{err:#}"), "closing the session failed");
        }

        match result {
            Ok(()) => {
                info!(
                    host = %self.config.connection.host,
                    services = self.config.services.len(),
                    "provisioning finished"
                );
                ProvisionOutcome::Succeeded
            }
            Err((stage, err)) => self.fail(stage, err),
        }
    }

    async fn remote_stages(
        &self,
        session: &Session<'_, C>,
    ) -> std::result::Result<(), (Stage, ProvisionError)> {
        let cfg = self.config;

        if cfg.skip_install {
            info!("skipping hab install");
        } else {
            install_runtime(session, cfg)
                .await
                .map_err(|e| (Stage::InstallRuntime, e))?;
        }

        start_supervisor(session, cfg)
            .await
            .map_err(|e| (Stage::StartSupervisor, e))?;

        for spec in &cfg.services {
            register_service(session, spec, cfg.use_sudo)
                .await
                .map_err(|e| (Stage::RegisterService(spec.ident.clone()), e))?;
        }
        Ok(())
    }

    fn fail(&self, stage: Stage, error: ProvisionError) -> ProvisionOutcome {
        error!(%stage, error = %error, "provisioning failed");
        // Best effort: the failure is already recorded in the outcome.
        let _ = self
            .sink
            .output(&format!("provisioning failed during {stage}: {error}"));
        ProvisionOutcome::Failed { stage, error }
    }
}

/// Validate `raw`, then provision the host behind `comm`.
///
/// An invalid configuration fails in [`Stage::Validate`] without touching the
/// communicator.
pub async fn provision<C>(
    raw: RawProvisionerConfig,
    comm: &C,
    sink: SharedSink,
) -> ProvisionOutcome
where
    C: Communicator + ?Sized,
{
    let config = match ProvisionerConfig::try_from(raw) {
        Ok(config) => config,
        Err(err) => {
            let error = ProvisionError::from(err);
            error!(error = %error, "invalid configuration");
            let _ = sink.output(&format!("provisioning failed during {}: {error}", Stage::Validate));
            return ProvisionOutcome::Failed {
                stage: Stage::Validate,
                error,
            };
        }
    };
    Provisioner::new(&config, comm, sink).run().await
}
