//! Chamber lid moves on the gantry.

use crate::engine::{ProcessContext, ProcessStep, StepError};
use crate::state::VacuumContext;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Fast to the slowdown position, then slow onto the seal.
pub struct CloseChamberStep;

#[async_trait]
impl ProcessStep<VacuumContext> for CloseChamberStep {
    fn name(&self) -> &str {
        "CloseChamber"
    }

    fn description(&self) -> &str {
        "Move the gantry to the closed position"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let motion = ctx.motion();

        ctx.log(&format!(
            "Closing chamber: fast to {:.1} mm",
            recipe.chamber_slowdown_position
        ));
        motion
            .move_sync(recipe.chamber_slowdown_position, recipe.chamber_fast_speed, cancel)
            .await?;

        ctx.log(&format!("Closing chamber: slow to {:.1} mm", recipe.chamber_close_position));
        motion
            .move_sync(recipe.chamber_close_position, recipe.chamber_slow_speed, cancel)
            .await?;

        let (z1, z2, _) = motion.positions();
        ctx.log(&format!("Chamber closed at Z1={z1:.2} mm, Z2={z2:.2} mm"));
        Ok(())
    }
}

/// Single fast move back to the open position.
pub struct OpenChamberStep;

#[async_trait]
impl ProcessStep<VacuumContext> for OpenChamberStep {
    fn name(&self) -> &str {
        "OpenChamber"
    }

    fn description(&self) -> &str {
        "Move the gantry to the open position"
    }

    async fn execute(&self, ctx: &VacuumContext, cancel: &CancellationToken) -> Result<(), StepError> {
        let recipe = ctx.recipe();
        let motion = ctx.motion();

        ctx.log(&format!("Opening chamber to {:.1} mm", recipe.chamber_open_position));
        motion
            .move_sync(recipe.chamber_open_position, recipe.chamber_fast_speed, cancel)
            .await?;

        let (z1, z2, _) = motion.positions();
        ctx.log(&format!("Chamber open at Z1={z1:.2} mm, Z2={z2:.2} mm"));
        Ok(())
    }
}
