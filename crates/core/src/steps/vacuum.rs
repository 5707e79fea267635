//! Pressure stages: rough vacuum, fine vacuum, hold and vacuum break.

use super::{close_outputs, sleep, tick, BREAK_COMPLETE_PRESSURE, BREAK_SMALL_VALVE_PRESSURE};
use crate::engine::{ProcessContext, ProcessStep, StepError};
use crate::state::{VacuumContext, ATMOSPHERIC_PRESSURE};
use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vd_protocol::alarm_models::codes;
use vd_protocol::recipe_models::FineVacuumStageParams;

const ROUGH_DECAY: f64 = 0.9;
const FINE_DECAY: f64 = 0.95;
const BREAK_SMALL_GROWTH: f64 = 1.5;
const BREAK_LARGE_GROWTH: f64 = 1.2;

/// Pump down with the rough valve open until the recipe target.
///
/// The rough valve is closed again on every exit path.
pub struct RoughVacuumStep;

impl RoughVacuumStep {
    async fn pump_down(
        &self,
        ctx: &VacuumContext,
        target: f64,
        started: Instant,
        limit: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        while ctx.pressure() > target {
            tick(cancel).await?;
            let pressure = ctx.scale_pressure(ROUGH_DECAY);
            if pressure <= target {
                break;
            }
            if started.elapsed() > limit {
                ctx.raise_alarm(
                    codes::ROUGH_VACUUM_TIMEOUT,
                    &format!("Rough vacuum timeout at {pressure:.1} Pa (target {target:.1} Pa)"),
                );
                return Err(StepError::Timeout {
                    stage: "Rough vacuum".to_string(),
                    limit,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessStep<VacuumContext> for RoughVacuumStep {
    fn name(&self) -> &str {
        "RoughVacuum"
    }

    fn description(&self) -> &str {
        "Evacuate the chamber with the rough pump"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let channel = ctx.outputs().rough_valve;
        let target = recipe.rough_vacuum_target_pressure;
        let limit = Duration::from_secs(recipe.rough_vacuum_timeout);
        let started = Instant::now();

        ctx.log(&format!(
            "Rough vacuum: target {target:.1} Pa, timeout {}s",
            limit.as_secs()
        ));
        ctx.write_output(channel, true)?;

        let pumped = self.pump_down(ctx, target, started, limit, cancel).await;
        let closed = close_outputs(ctx, &[channel]);
        pumped?;
        closed?;

        ctx.log(&format!("Rough vacuum reached {:.1} Pa", ctx.pressure()));
        Ok(())
    }
}

/// One of the five fine-vacuum stages.
pub struct FineVacuumStep {
    stage: usize,
    name: String,
}

impl FineVacuumStep {
    /// `stage` is 1-based.
    pub fn new(stage: usize) -> Self {
        Self {
            stage,
            name: format!("FineVacuum{stage}"),
        }
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    async fn pump_down(
        &self,
        ctx: &VacuumContext,
        params: &FineVacuumStageParams,
        valve_speed: f64,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        ctx.motion().set_valve(params.valve_angle, valve_speed, cancel).await?;

        let duration = Duration::from_secs(params.duration);
        let limit = Duration::from_secs(params.timeout);
        while ctx.pressure() > params.start_pressure && started.elapsed() < duration {
            tick(cancel).await?;
            let pressure = ctx.scale_pressure(FINE_DECAY);
            if pressure > params.start_pressure && started.elapsed() > limit {
                ctx.raise_alarm(
                    codes::fine_vacuum_timeout(self.stage),
                    &format!("Fine vacuum stage {} timeout at {pressure:.1} Pa", self.stage),
                );
                return Err(StepError::Timeout {
                    stage: format!("Fine vacuum stage {}", self.stage),
                    limit,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessStep<VacuumContext> for FineVacuumStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Throttle the fine pump to the stage valve angle"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let params = recipe
            .fine_stage(self.stage)
            .ok_or_else(|| anyhow!("recipe has no fine vacuum stage {}", self.stage))?;
        let channel = ctx.outputs().fine_valve;
        let started = Instant::now();

        ctx.set_fine_vacuum_stage(self.stage);
        ctx.log(&format!(
            "Fine vacuum stage {}: valve {:.0}%, threshold {:.1} Pa, {}s",
            self.stage, params.valve_angle, params.start_pressure, params.duration
        ));
        ctx.write_output(channel, true)?;

        let result = self
            .pump_down(ctx, params, recipe.valve_speed, started, cancel)
            .await;
        if let Err(e) = &result {
            if let Err(close_error) = close_outputs(ctx, &[channel]) {
                warn!(stage = self.stage, error = %close_error, "fine valve not closed after {e}");
            }
            return result;
        }

        ctx.log(&format!(
            "Fine vacuum stage {} done at {:.1} Pa",
            self.stage,
            ctx.pressure()
        ));
        Ok(())
    }
}

/// Wait at the reached pressure for the recipe duration.
pub struct HoldPressureStep;

#[async_trait]
impl ProcessStep<VacuumContext> for HoldPressureStep {
    fn name(&self) -> &str {
        "HoldPressure"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let duration = Duration::from_secs(recipe.hold_pressure_duration);

        ctx.log(&format!(
            "Holding pressure for {}s (target {:.1} Pa)",
            duration.as_secs(),
            recipe.hold_pressure_target
        ));
        sleep(duration, cancel).await?;
        ctx.log(&format!("Hold complete at {:.1} Pa", ctx.pressure()));
        Ok(())
    }
}

/// Vent the chamber back to atmosphere through the break valves.
///
/// The small valve opens first. If it has not reached
/// [`BREAK_SMALL_VALVE_PRESSURE`] within its timeout the large valve is opened
/// as well. Both break valves are closed on every exit path.
pub struct VacuumBreakStep;

impl VacuumBreakStep {
    async fn vent(
        &self,
        ctx: &VacuumContext,
        small_limit: Duration,
        limit: Duration,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let large_valve = ctx.outputs().break_large_valve;

        while ctx.pressure() < BREAK_SMALL_VALVE_PRESSURE {
            tick(cancel).await?;
            let pressure = ctx.scale_pressure(BREAK_SMALL_GROWTH);
            if pressure < BREAK_SMALL_VALVE_PRESSURE && started.elapsed() > small_limit {
                ctx.log(&format!(
                    "Small break valve timeout at {pressure:.1} Pa, opening large break valve"
                ));
                ctx.write_output(large_valve, true)?;
                break;
            }
        }

        while ctx.pressure() < BREAK_COMPLETE_PRESSURE {
            tick(cancel).await?;
            let pressure = ctx.scale_pressure(BREAK_LARGE_GROWTH);
            if pressure < BREAK_COMPLETE_PRESSURE && started.elapsed() > limit {
                ctx.raise_alarm(
                    codes::VACUUM_BREAK_TIMEOUT,
                    &format!("Vacuum break timeout at {pressure:.1} Pa"),
                );
                return Err(StepError::Timeout {
                    stage: "Vacuum break".to_string(),
                    limit,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessStep<VacuumContext> for VacuumBreakStep {
    fn name(&self) -> &str {
        "VacuumBreak"
    }

    fn description(&self) -> &str {
        "Vent the chamber to atmosphere"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let outputs = ctx.outputs();
        let small_limit = Duration::from_secs(recipe.vacuum_break_small_valve_timeout);
        let limit = Duration::from_secs(recipe.vacuum_break_timeout);
        let started = Instant::now();

        ctx.set_fine_vacuum_stage(0);
        ctx.log(&format!("Vacuum break from {:.1} Pa", ctx.pressure()));
        close_outputs(ctx, &[outputs.fine_valve])?;
        ctx.write_output(outputs.break_small_valve, true)?;

        let vented = self.vent(ctx, small_limit, limit, started, cancel).await;
        let closed = close_outputs(ctx, &[outputs.break_small_valve, outputs.break_large_valve]);
        vented?;
        closed?;

        ctx.set_pressure(ATMOSPHERIC_PRESSURE);
        ctx.log("Vacuum break complete");
        Ok(())
    }
}
