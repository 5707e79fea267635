//! In-process simulation of the motion card.
//!
//! Used by the CLI when no vendor driver is configured and by every test in
//! this workspace. Moves advance in tokio time, so tests running with a
//! paused clock complete instantly while still observing intermediate
//! positions.

mod axis;
mod card;
mod io;

pub use axis::{SimulatedAxis, HOMING_VELOCITY, LIMIT_POSITION, MOVE_TICK};
pub use card::{SimulatedMotionCard, AXIS_NAMES};
pub use io::{SimulatedDigitalIo, CHANNEL_COUNT};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Axis, HalError, MotionCard};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use vd_protocol::axis_models::AxisState;

    async fn enabled_axis() -> SimulatedAxis {
        let axis = SimulatedAxis::new(0, "Z1");
        axis.enable().await.unwrap();
        axis
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_absolute_reaches_target() {
        let axis = enabled_axis().await;
        let cancel = CancellationToken::new();

        axis.move_absolute(100.0, 100.0, &cancel).await.unwrap();

        assert_eq!(axis.position(), 100.0);
        assert!(!axis.is_moving());
        assert_eq!(axis.state(), AxisState::Enabled);
        assert_eq!(axis.motion_commands(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_requires_enable() {
        let axis = SimulatedAxis::new(1, "Z2");
        let cancel = CancellationToken::new();

        let result = axis.move_absolute(10.0, 10.0, &cancel).await;
        assert_eq!(
            result,
            Err(HalError::NotEnabled {
                axis: "Z2".to_string()
            })
        );
        assert_eq!(axis.motion_commands(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_move_stays_in_place() {
        let axis = Arc::new(enabled_axis().await);
        let cancel = CancellationToken::new();

        let mover = {
            let axis = Arc::clone(&axis);
            let cancel = cancel.clone();
            tokio::spawn(async move { axis.move_absolute(100.0, 10.0, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(2_025)).await;
        assert!(axis.is_moving());
        cancel.cancel();

        let result = mover.await.unwrap();
        assert_eq!(result, Err(HalError::Cancelled));
        let position = axis.position();
        assert!(position > 0.0 && position < 100.0, "stopped mid-move at {position}");
        assert!(!axis.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_move() {
        let axis = Arc::new(enabled_axis().await);

        let mover = {
            let axis = Arc::clone(&axis);
            tokio::spawn(async move {
                let cancel = CancellationToken::new();
                axis.move_absolute(-50.0, 10.0, &cancel).await
            })
        };

        tokio::time::sleep(Duration::from_millis(525)).await;
        axis.stop().await.unwrap();

        assert_eq!(mover.await.unwrap(), Err(HalError::Cancelled));
        assert!(axis.position() < 0.0 && axis.position() > -50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_fault_raises_alarm() {
        let axis = enabled_axis().await;
        let cancel = CancellationToken::new();
        axis.inject_fault("encoder lost");

        let result = axis.move_relative(5.0, 10.0, &cancel).await;
        assert!(matches!(result, Err(HalError::AxisFault { .. })));
        assert_eq!(axis.state(), AxisState::Alarm);

        // Alarm sticks until cleared
        assert!(axis.move_relative(5.0, 10.0, &cancel).await.is_err());
        axis.clear_alarm().await.unwrap();
        axis.move_relative(5.0, 10.0, &cancel).await.unwrap();
        assert_eq!(axis.position(), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_home_returns_to_zero() {
        let axis = enabled_axis().await;
        axis.set_position(75.0);
        assert!(!axis.is_homed());

        axis.home(&CancellationToken::new()).await.unwrap();

        assert_eq!(axis.position(), 0.0);
        assert!(axis.is_homed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jog_runs_until_stopped() {
        let axis = enabled_axis().await;
        axis.jog(100.0).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1_010)).await;
        axis.stop().await.unwrap();
        let stopped_at = axis.position();
        assert!(stopped_at > 0.0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(axis.position(), stopped_at);
    }

    #[tokio::test]
    async fn test_card_exposes_three_axes_and_io() {
        let card = SimulatedMotionCard::new();
        assert!(!card.is_connected());
        card.initialize().await.unwrap();

        assert!(card.is_connected());
        assert_eq!(card.axis_count(), 3);
        assert_eq!(card.axis(2).unwrap().name(), "Valve");
        assert!(matches!(card.axis(3), Err(HalError::AxisNotFound(3))));
        assert!(card.digital_io().is_some());

        card.close().await.unwrap();
        assert!(!card.is_connected());
    }
}
