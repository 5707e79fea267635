//! Test fixtures for creating a simulated machine and sample configuration.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vd_core::config::MachineConfig;
use vd_core::hal::simulation::SimulatedMotionCard;
use vd_core::hal::DigitalIo;
use vd_core::state::VacuumProcessController;
use vd_protocol::ipc::Event;
use vd_protocol::recipe_models::ProcessRecipe;

/// A controller on a simulated card with homed, enabled axes.
pub struct Machine {
    pub card: Arc<SimulatedMotionCard>,
    pub controller: Arc<VacuumProcessController>,
    pub events: mpsc::Receiver<Event>,
}

impl Machine {
    pub fn output(&self, channel: usize) -> bool {
        self.card
            .simulated_io()
            .read_output(channel)
            .expect("channel in range")
    }

    /// Receive until `ProcessCompleted` (inclusive) or the channel closes.
    pub async fn events_until_completion(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            let done = matches!(event, Event::ProcessCompleted { .. });
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    /// Everything forwarded so far, without waiting.
    #[allow(dead_code)]
    pub async fn drain_events(&mut self) -> Vec<Event> {
        // Let the forwarder catch up
        tokio::time::sleep(Duration::from_millis(1)).await;
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Build a [`Machine`] with `recipe` loaded.
pub async fn create_machine(recipe: ProcessRecipe) -> Machine {
    let card = Arc::new(SimulatedMotionCard::new());
    let (tx, events) = mpsc::channel(4096);
    let controller = VacuumProcessController::new(card.as_ref(), &MachineConfig::default(), recipe, tx)
        .expect("simulated card provides every axis and I/O");
    controller
        .initialize_axes(&CancellationToken::new())
        .await
        .expect("simulated axes home");
    Machine {
        card,
        controller: Arc::new(controller),
        events,
    }
}

/// Recipe whose rough vacuum cannot reach its target within the timeout.
#[allow(dead_code)]
pub fn create_rough_timeout_recipe() -> ProcessRecipe {
    ProcessRecipe {
        name: "rough-timeout".to_string(),
        rough_vacuum_target_pressure: 500.0,
        rough_vacuum_timeout: 1,
        ..ProcessRecipe::default()
    }
}

/// Create a temporary root with a `.vacuum-dryer/` directory holding a
/// config file and one recipe.
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let vd_dir = temp_dir.path().join(".vacuum-dryer");
    std::fs::create_dir_all(vd_dir.join("recipes"))?;

    std::fs::write(
        vd_dir.join("config.toml"),
        "loop_interval_ms = 10\ndefault_recipe = \"PI-film\"\n",
    )?;
    std::fs::write(
        vd_dir.join("recipes/pi-film.json"),
        r#"{ "Name": "PI-film", "HoldPressureDuration": 5 }"#,
    )?;

    Ok(temp_dir)
}
