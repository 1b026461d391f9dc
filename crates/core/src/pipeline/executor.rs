//! Runs the stage sequence for one ready scene.

use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::commands::{
    destripe_command, gbad_command, geo_command_line, level1a_command, level1b_command,
};
use super::error::PipelineError;
use super::naming::{attitude_ephemeris_paths, existing_product, format_time, observation_time};
use super::relocate::relocate;
use super::types::{PipelineReport, ProductPaths, Stage, StageOutput};
use crate::config::Config;
use crate::message::{completion_message, ProductLevel};
use crate::metrics::{PIPELINE_RUNS, PRODUCTS_RELOCATED, STAGE_DURATION, STAGE_FAILURES};
use crate::process::{CommandRunner, ExitPolicy, StageCommand};
use crate::publisher::PublishHandle;
use crate::scene::SceneDescriptor;

/// Creates the working directory, falling back to the system temp dir.
pub async fn ensure_working_dir(dir: &Path) -> PathBuf {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => dir.to_path_buf(),
        Err(e) => {
            let fallback = std::env::temp_dir();
            warn!(
                "Cannot use working dir {} ({}), using {}",
                dir.display(),
                e,
                fallback.display()
            );
            fallback
        }
    }
}

/// Executes the level-0 to level-1B pipeline and publishes its products.
pub struct PipelineExecutor {
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
    publisher: PublishHandle,
    sender: String,
}

impl PipelineExecutor {
    /// `sender` identifies this runner in published messages (`user@host`).
    pub fn new(
        config: Arc<Config>,
        runner: Arc<dyn CommandRunner>,
        publisher: PublishHandle,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            config,
            runner,
            publisher,
            sender: sender.into(),
        }
    }

    /// Runs every stage for `scene`. `input` is the data of the notification
    /// that completed the scene; it is carried into the published messages.
    pub async fn run(
        &self,
        scene: &SceneDescriptor,
        input: &Value,
    ) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        info!(
            "Starting MODIS level-1 processing of {} ({})",
            scene.key, scene.platform
        );

        let result = self.execute(scene, input, start).await;
        match &result {
            Ok(report) => {
                PIPELINE_RUNS
                    .with_label_values(&[scene.platform.name(), "success"])
                    .inc();
                info!(
                    "MODIS level-1 scene {} finished. It took: {:?}",
                    scene.key, report.elapsed
                );
                for missing in report.missing() {
                    warn!(
                        "{} output {} was not produced",
                        missing.stage,
                        missing.outcome.path().display()
                    );
                }
            }
            Err(e) => {
                PIPELINE_RUNS
                    .with_label_values(&[scene.platform.name(), "failed"])
                    .inc();
                error!("Processing of {} failed: {}", scene.key, e);
            }
        }
        result
    }

    async fn execute(
        &self,
        scene: &SceneDescriptor,
        input: &Value,
        start: Instant,
    ) -> Result<PipelineReport, PipelineError> {
        let config = &self.config;
        let executables = &config.executables;
        let working_dir = ensure_working_dir(&config.runner.working_dir).await;
        debug!("Working dir = {}", working_dir.display());

        let templates = config.products.for_platform(scene.platform);
        let observed = observation_time(&scene.primary_file, templates, scene.start_time);
        let processed = Utc::now().naive_utc();
        let products = ProductPaths::new(
            templates,
            &config.paths.level1b_home,
            observed,
            processed,
        )?;

        let geo_prefix = format_time(observed, &templates.geo)?;
        if let Some(existing) = existing_product(&config.paths.level1b_home, &geo_prefix) {
            warn!(
                "Level 1 file for this scene already exists: {}",
                existing.display()
            );
        }
        info!("Level-1 filename: {}", products.level1a.display());

        let mut outputs = Vec::new();

        // Level-0 to 1A
        let cmd = level1a_command(
            executables,
            scene.platform,
            config.runner.startnudge,
            config.runner.endnudge,
            &products.level1a,
            &scene.primary_file,
        );
        self.run_stage(Stage::Level1A, cmd, &working_dir, &executables.l1a_exit)
            .await?;
        let level1a = self
            .collect(Stage::Level1A, &working_dir, &products.level1a, &mut outputs)
            .await?;
        if let Some(path) = level1a {
            self.publish(input, &[path], ProductLevel::L1A).await;
        }

        // Attitude and ephemeris
        let attitude_ephemeris = if scene.platform.requires_auxiliary() {
            let packet = scene
                .auxiliary_file
                .as_deref()
                .ok_or(PipelineError::MissingPacketFile)?;
            Some(self.run_gbad(packet, &working_dir).await?)
        } else {
            None
        };

        // Geolocation
        let cmd = geo_command_line(
            executables,
            &products.level1a,
            &products.geo,
            attitude_ephemeris
                .as_ref()
                .map(|(att, eph)| (att.as_path(), eph.as_path())),
        );
        self.run_stage(Stage::Geolocation, cmd, &working_dir, &executables.geo_exit)
            .await?;
        let mut level1b_files = Vec::new();
        if let Some(path) = self
            .collect(Stage::Geolocation, &working_dir, &products.geo, &mut outputs)
            .await?
        {
            level1b_files.push(path);
        }

        // Calibration
        let cmd = level1b_command(
            executables,
            &products.level1b_1km,
            &products.level1b_500m,
            &products.level1b_250m,
            &products.level1a,
            &products.geo,
        );
        self.run_stage(Stage::Calibration, cmd, &working_dir, &executables.l1b_exit)
            .await?;

        // Destriping works on the 1 km product while it is still in the working dir.
        if config.destriping.enabled {
            info!("Apply destriping...");
            let cmd = destripe_command(&config.destriping, scene.platform, &products.level1b_1km);
            self.run_stage(
                Stage::Destriping,
                cmd,
                &working_dir,
                &executables.destripe_exit,
            )
            .await?;
        } else {
            debug!("Destriping will not be applied");
        }

        for product in products.calibrated() {
            if let Some(path) = self
                .collect(Stage::Calibration, &working_dir, product, &mut outputs)
                .await?
            {
                level1b_files.push(path);
            }
        }

        if level1b_files.is_empty() {
            warn!("No level-1B products for {}, nothing to publish", scene.key);
        } else {
            self.publish(input, &level1b_files, ProductLevel::L1B).await;
        }

        Ok(PipelineReport {
            scene: scene.key.clone(),
            outputs,
            attitude_ephemeris,
            elapsed: start.elapsed(),
        })
    }

    async fn run_gbad(
        &self,
        packet: &Path,
        working_dir: &Path,
    ) -> Result<(PathBuf, PathBuf), PipelineError> {
        let paths = &self.config.paths;
        let (attitude, ephemeris) = attitude_ephemeris_paths(packet, paths);
        info!("Attitude file = {}", attitude.display());
        info!("Ephemeris file = {}", ephemeris.display());

        tokio::fs::create_dir_all(&paths.attitude_home).await?;
        tokio::fs::create_dir_all(&paths.ephemeris_home).await?;

        if let Some(config_file) = &self.config.executables.spa_config_file {
            if !config_file.exists() {
                warn!(
                    "SPA config file {} does not exist, running GBAD without it",
                    config_file.display()
                );
            }
        }

        let cmd = gbad_command(&self.config.executables, packet, &attitude, &ephemeris);
        self.run_stage(
            Stage::Gbad,
            cmd,
            working_dir,
            &self.config.executables.gbad_exit,
        )
        .await?;

        for path in [&attitude, &ephemeris] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                error!("Failed producing the attitude and/or the ephemeris file(s)");
                STAGE_FAILURES.with_label_values(&[Stage::Gbad.as_str()]).inc();
                return Err(PipelineError::MissingOutput {
                    stage: Stage::Gbad,
                    path: path.clone(),
                });
            }
        }
        Ok((attitude, ephemeris))
    }

    async fn run_stage(
        &self,
        stage: Stage,
        command: StageCommand,
        working_dir: &Path,
        policy: &ExitPolicy,
    ) -> Result<(), PipelineError> {
        let command = command.current_dir(working_dir);
        debug!("Run command: {}", command);

        let started = Instant::now();
        let outcome = self.runner.run(&command).await;
        STAGE_DURATION
            .with_label_values(&[stage.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let outcome = outcome.map_err(|source| {
            STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
            PipelineError::Process { stage, source }
        })?;

        debug!("Return code from {} = {:?}", stage, outcome.code);
        if !policy.accepts(outcome.code) {
            STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
            return Err(PipelineError::StageFailed {
                stage,
                code: outcome.code,
            });
        }
        if outcome.code != Some(0) {
            warn!(
                "{} exited with {:?}, accepted by its exit policy",
                stage, outcome.code
            );
        }
        Ok(())
    }

    /// Relocates one output and records its outcome.
    async fn collect(
        &self,
        stage: Stage,
        working_dir: &Path,
        destination: &Path,
        outputs: &mut Vec<StageOutput>,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let outcome = relocate(working_dir, destination).await?;
        let label = if outcome.is_present() { "present" } else { "missing" };
        PRODUCTS_RELOCATED.with_label_values(&[label]).inc();

        let present = outcome.present().map(Path::to_path_buf);
        outputs.push(StageOutput { stage, outcome });
        Ok(present)
    }

    async fn publish(&self, input: &Value, files: &[PathBuf], level: ProductLevel) {
        let message = completion_message(
            input,
            files,
            level,
            &self.config.runner.station,
            &self.sender,
        );
        info!("Sending {} message for {} file(s)", level, files.len());
        self.publisher.publish(level, message).await;
    }
}
