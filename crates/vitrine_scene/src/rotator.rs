//! Timed quaternion rotations, advanced by the frame loop.
//!
//! Rotations only touch the node's transform. Nodes paired with an awake
//! dynamic body are overwritten by the next sync pass, so rotating those is
//! the caller's business.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use glam::{Quat, Vec3};
use log::{debug, warn};
use tokio::sync::oneshot;
use vitrine_core::scene_graph::{NodeId, Scene};

use crate::error::RotationError;

/// Timing curves for rotation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    Linear,
    /// Quadratic ease in/out.
    #[default]
    QuadInOut,
    /// Cubic ease out.
    CubicOut,
    /// Cubic ease in/out.
    CubicInOut,
}

impl Easing {
    /// Apply the easing function to a normalized time value (0-1).
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Runs once when a rotation's progress reaches one half.
pub type HalfwayCallback = Box<dyn FnOnce(&mut Scene, NodeId) + Send>;

#[derive(Default)]
pub struct RotationOptions {
    pub easing: Easing,
    pub on_halfway: Option<HalfwayCallback>,
}

impl RotationOptions {
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn on_halfway(mut self, callback: impl FnOnce(&mut Scene, NodeId) + Send + 'static) -> Self {
        self.on_halfway = Some(Box::new(callback));
        self
    }
}

/// Completion handle of a rotation. Resolves to the rotated node, or to the
/// reason it was cut short.
#[derive(Debug)]
pub struct RotationTask {
    node: NodeId,
    receiver: oneshot::Receiver<Result<NodeId, RotationError>>,
}

impl RotationTask {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Non-blocking check, `None` while the rotation is still running.
    pub fn try_result(&mut self) -> Option<Result<NodeId, RotationError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RotationError::Stopped)),
        }
    }
}

impl Future for RotationTask {
    type Output = Result<NodeId, RotationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // a dropped rotator counts as a stop
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RotationError::Stopped)))
    }
}

struct ActiveRotation {
    start: Quat,
    target: Quat,
    duration: Duration,
    elapsed: Duration,
    easing: Easing,
    on_halfway: Option<HalfwayCallback>,
    done: oneshot::Sender<Result<NodeId, RotationError>>,
}

impl ActiveRotation {
    fn finish(self, result: Result<NodeId, RotationError>) {
        // the caller may have dropped its task; nothing to report then
        let _ = self.done.send(result);
    }
}

/// At most one rotation per node; a new one replaces the old.
#[derive(Default)]
pub struct AssetRotator {
    active: HashMap<NodeId, ActiveRotation>,
}

impl AssetRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts rotating `node` by `radians` around `axis` (node-local, relative
    /// to its current orientation). Inputs are validated before anything
    /// changes.
    pub fn rotate_asset(
        &mut self,
        scene: &Scene,
        node: NodeId,
        axis: Vec3,
        radians: f32,
        duration: Duration,
        options: RotationOptions,
    ) -> Result<RotationTask, RotationError> {
        if !axis.is_finite() || axis.length_squared() <= f32::EPSILON {
            return Err(RotationError::InvalidInput(format!(
                "axis {:?} cannot be normalized",
                axis
            )));
        }
        if !radians.is_finite() {
            return Err(RotationError::InvalidInput(format!(
                "angle must be finite, got {}",
                radians
            )));
        }
        if duration.is_zero() {
            return Err(RotationError::InvalidInput(
                "duration must be positive".to_string(),
            ));
        }
        let start = scene
            .get(node)
            .ok_or(RotationError::MissingNode(node))?
            .transform
            .rotation;

        if let Some(previous) = self.active.remove(&node) {
            debug!("Rotation on {} superseded", node);
            previous.finish(Err(RotationError::Superseded));
        }

        let target = (start * Quat::from_axis_angle(axis.normalize(), radians)).normalize();
        let (done, receiver) = oneshot::channel();
        self.active.insert(
            node,
            ActiveRotation {
                start,
                target,
                duration,
                elapsed: Duration::ZERO,
                easing: options.easing,
                on_halfway: options.on_halfway,
                done,
            },
        );

        Ok(RotationTask { node, receiver })
    }

    /// Cancels the rotation on `node`; its task resolves to `Stopped`. The
    /// node keeps whatever orientation it had reached.
    pub fn stop_rotation(&mut self, node: NodeId) -> bool {
        match self.active.remove(&node) {
            Some(rotation) => {
                rotation.finish(Err(RotationError::Stopped));
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, rotation) in self.active.drain() {
            rotation.finish(Err(RotationError::Stopped));
        }
    }

    pub fn is_rotating(&self, node: NodeId) -> bool {
        self.active.contains_key(&node)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Advances every rotation by `dt`.
    pub fn update(&mut self, scene: &mut Scene, dt: Duration) {
        let mut finished = Vec::new();

        for (node, rotation) in self.active.iter_mut() {
            let Some(target_node) = scene.get_mut(*node) else {
                warn!("Rotated node {} disappeared, stopping", node);
                finished.push((*node, Err(RotationError::Stopped)));
                continue;
            };

            rotation.elapsed += dt;
            let progress =
                (rotation.elapsed.as_secs_f32() / rotation.duration.as_secs_f32()).min(1.0);

            target_node.transform.rotation = if progress >= 1.0 {
                // exact target, no accumulated slerp drift
                rotation.target
            } else {
                rotation
                    .start
                    .slerp(rotation.target, rotation.easing.apply(progress))
            };

            if progress >= 0.5 {
                if let Some(callback) = rotation.on_halfway.take() {
                    callback(scene, *node);
                }
            }

            if progress >= 1.0 {
                finished.push((*node, Ok(*node)));
            }
        }

        for (node, result) in finished {
            if let Some(rotation) = self.active.remove(&node) {
                rotation.finish(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        f32::consts::{FRAC_PI_2, PI},
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use super::*;
    use vitrine_core::scene_graph::Node;

    fn same_orientation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-5
    }

    fn setup() -> (Scene, NodeId, AssetRotator) {
        let mut scene = Scene::new();
        let node = scene.spawn(Node::group("lid"));
        (scene, node, AssetRotator::new())
    }

    #[tokio::test]
    async fn completes_on_exact_target() {
        let (mut scene, node, mut rotator) = setup();
        let task = rotator
            .rotate_asset(&scene, node, Vec3::Y, FRAC_PI_2, Duration::from_millis(300), RotationOptions::default())
            .unwrap();

        for _ in 0..4 {
            rotator.update(&mut scene, Duration::from_millis(100));
        }

        assert_eq!(task.await, Ok(node));
        assert!(!rotator.is_rotating(node));
        let rotation = scene.get(node).unwrap().transform.rotation;
        assert_eq!(rotation, Quat::from_axis_angle(Vec3::Y, FRAC_PI_2).normalize());
    }

    #[test]
    fn successive_rotations_compose() {
        let (mut scene, node, mut rotator) = setup();

        for _ in 0..2 {
            rotator
                .rotate_asset(&scene, node, Vec3::Y, FRAC_PI_2, Duration::from_millis(100), RotationOptions::default())
                .unwrap();
            rotator.update(&mut scene, Duration::from_millis(100));
        }

        let rotation = scene.get(node).unwrap().transform.rotation;
        assert!(same_orientation(rotation, Quat::from_rotation_y(PI)));
    }

    #[test]
    fn invalid_input_starts_nothing() {
        let (scene, node, mut rotator) = setup();
        let cases = [
            (Vec3::ZERO, 1.0, Duration::from_secs(1)),
            (Vec3::new(f32::NAN, 0.0, 0.0), 1.0, Duration::from_secs(1)),
            (Vec3::Y, f32::INFINITY, Duration::from_secs(1)),
            (Vec3::Y, 1.0, Duration::ZERO),
        ];

        for (axis, radians, duration) in cases {
            let result =
                rotator.rotate_asset(&scene, node, axis, radians, duration, RotationOptions::default());
            assert!(matches!(result, Err(RotationError::InvalidInput(_))));
        }
        assert_eq!(rotator.active_count(), 0);

        let mut other = Scene::new();
        let missing = other.spawn(Node::group("elsewhere"));
        let result = rotator.rotate_asset(
            &Scene::new(),
            missing,
            Vec3::Y,
            1.0,
            Duration::from_secs(1),
            RotationOptions::default(),
        );
        assert_eq!(result.unwrap_err(), RotationError::MissingNode(missing));
    }

    #[tokio::test]
    async fn stop_rejects_and_freezes_the_node() {
        let (mut scene, node, mut rotator) = setup();
        let task = rotator
            .rotate_asset(&scene, node, Vec3::X, PI, Duration::from_secs(1), RotationOptions::default())
            .unwrap();

        rotator.update(&mut scene, Duration::from_millis(300));
        assert!(rotator.stop_rotation(node));
        let frozen = scene.get(node).unwrap().transform.rotation;

        rotator.update(&mut scene, Duration::from_millis(500));

        assert_eq!(task.await, Err(RotationError::Stopped));
        assert_eq!(scene.get(node).unwrap().transform.rotation, frozen);
        assert!(!rotator.stop_rotation(node));
    }

    #[test]
    fn newer_rotation_supersedes_older() {
        let (mut scene, node, mut rotator) = setup();
        let mut first = rotator
            .rotate_asset(&scene, node, Vec3::Y, PI, Duration::from_secs(1), RotationOptions::default())
            .unwrap();
        rotator.update(&mut scene, Duration::from_millis(500));

        let mut second = rotator
            .rotate_asset(&scene, node, Vec3::Y, FRAC_PI_2, Duration::from_secs(1), RotationOptions::default())
            .unwrap();

        assert_eq!(first.try_result(), Some(Err(RotationError::Superseded)));
        assert_eq!(second.try_result(), None);
        assert_eq!(rotator.active_count(), 1);
    }

    #[test]
    fn halfway_callback_fires_once() {
        let (mut scene, node, mut rotator) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let options = RotationOptions::default()
            .with_easing(Easing::Linear)
            .on_halfway(move |scene, node| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(n) = scene.get_mut(node) {
                    n.user_data.interactable_id = Some("flipped".into());
                }
            });
        rotator
            .rotate_asset(&scene, node, Vec3::X, PI, Duration::from_millis(400), options)
            .unwrap();

        rotator.update(&mut scene, Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        for _ in 0..3 {
            rotator.update(&mut scene, Duration::from_millis(100));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            scene.get(node).unwrap().user_data.interactable_id.as_deref(),
            Some("flipped")
        );
    }

    #[test]
    fn removed_node_stops_its_rotation() {
        let (mut scene, node, mut rotator) = setup();
        let mut task = rotator
            .rotate_asset(&scene, node, Vec3::Y, PI, Duration::from_secs(1), RotationOptions::default())
            .unwrap();

        scene.despawn_recursive(node);
        rotator.update(&mut scene, Duration::from_millis(16));

        assert_eq!(task.try_result(), Some(Err(RotationError::Stopped)));
        assert_eq!(rotator.active_count(), 0);
    }

    #[test]
    fn easing_endpoints() {
        for easing in [Easing::Linear, Easing::QuadInOut, Easing::CubicOut, Easing::CubicInOut] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
        }
        assert!((Easing::QuadInOut.apply(0.5) - 0.5).abs() < 1e-6);
    }
}
