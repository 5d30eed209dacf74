//! In-process simulated drivers for headless runs and CI without a render
//! engine.
//!
//! [`SimAirframe`] is a builder that pre-populates a [`RotorRegistry`] with
//! stub rotors and attaches a synthetic camera and a flat ground plane, so the
//! full flight stack runs in tests and from the CLI without a simulator.
//!
//! # Example
//!
//! ```rust
//! use skyloop_hal::sim::SimAirframe;
//!
//! let hw = SimAirframe::new()
//!     .with_quad_rotors()
//!     .with_camera("forward_rgb")
//!     .with_flat_ground(0.0)
//!     .build();
//!
//! assert_eq!(hw.rotors.len(), 4);
//! assert!(hw.camera.is_some());
//! ```

use std::sync::{Arc, Mutex};

use nalgebra::Vector3;
use skyloop_types::SkyError;

use crate::camera::{Camera, CameraFrame};
use crate::ground::{GroundProbe, LayerMask};
use crate::registry::RotorRegistry;
use crate::rotor::Rotor;
use crate::status::StatusSink;

// ────────────────────────────────────────────────────────────────────────────
// Stub rotor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated rotor that accumulates its spin angle. Always succeeds.
pub struct SimRotor {
    id: String,
    angle: f32,
}

impl SimRotor {
    /// Create a new simulated rotor with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            angle: 0.0,
        })
    }
}

impl Rotor for SimRotor {
    fn id(&self) -> &str {
        &self.id
    }

    fn rotate(&mut self, _axis: Vector3<f32>, angle_deg: f32) -> Result<(), SkyError> {
        self.angle = (self.angle + angle_deg).rem_euclid(360.0);
        Ok(())
    }

    fn angle(&self) -> f32 {
        self.angle
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera that renders a diagonal RGB gradient which shifts by
/// one pixel on every capture, so consecutive frames differ.
pub struct SimCamera {
    id: String,
    frame_count: u32,
}

impl SimCamera {
    /// Create a new simulated camera with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            frame_count: 0,
        })
    }

    /// Number of frames captured so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self, width: u32, height: u32) -> Result<CameraFrame, SkyError> {
        if width == 0 || height == 0 {
            return Err(SkyError::HardwareFault {
                component: self.id.clone(),
                details: format!("invalid render size {width}x{height}"),
            });
        }
        let shift = self.frame_count;
        self.frame_count = self.frame_count.wrapping_add(1);

        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let r = (x.wrapping_add(shift) % width * 255 / width) as u8;
                let g = (y * 255 / height) as u8;
                let b = ((x + y).wrapping_add(shift) / 2 % 256) as u8;
                data.extend_from_slice(&[r, g, b]);
            }
        }
        Ok(CameraFrame {
            width,
            height,
            data,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Flat ground
// ────────────────────────────────────────────────────────────────────────────

/// An infinite (or square, if an extent is set) horizontal ground plane on a
/// single collision layer.
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    surface_y: f32,
    layer: LayerMask,
    half_extent: Option<f32>,
}

impl FlatGround {
    /// Ground plane at height `surface_y` on every layer.
    pub fn new(surface_y: f32) -> Self {
        Self {
            surface_y,
            layer: LayerMask::ALL,
            half_extent: None,
        }
    }

    /// Restrict the plane to the given collision layer.
    pub fn on_layer(mut self, layer: LayerMask) -> Self {
        self.layer = layer;
        self
    }

    /// Limit the plane to `|x| <= half_extent && |z| <= half_extent`.
    pub fn with_extent(mut self, half_extent: f32) -> Self {
        self.half_extent = Some(half_extent);
        self
    }
}

impl GroundProbe for FlatGround {
    fn raycast_down(
        &self,
        origin: Vector3<f32>,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<f32> {
        if !mask.intersects(self.layer) {
            return None;
        }
        if let Some(half) = self.half_extent
            && (origin.x.abs() > half || origin.z.abs() > half)
        {
            return None;
        }
        let distance = origin.y - self.surface_y;
        (distance >= 0.0 && distance <= max_distance).then_some(distance)
    }
}

/// A probe that never hits anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGround;

impl GroundProbe for NoGround {
    fn raycast_down(&self, _: Vector3<f32>, _: f32, _: LayerMask) -> Option<f32> {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording status sink
// ────────────────────────────────────────────────────────────────────────────

/// A [`StatusSink`] that records every line into a shared buffer, so tests
/// can assert on what would have been shown on screen.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line displayed so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl StatusSink for RecordingStatusSink {
    fn display_state(&mut self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimAirframe builder
// ────────────────────────────────────────────────────────────────────────────

/// Simulated hardware bundle produced by [`SimAirframe::build`].
pub struct SimHardware {
    pub rotors: RotorRegistry,
    pub camera: Option<Box<dyn Camera>>,
    pub ground: Option<Box<dyn GroundProbe>>,
}

/// Builder that assembles simulated drivers for headless runs.
#[derive(Default)]
pub struct SimAirframe {
    rotors: Vec<Box<dyn Rotor>>,
    camera: Option<Box<dyn Camera>>,
    ground: Option<Box<dyn GroundProbe>>,
}

impl SimAirframe {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the four rotors of a quadcopter.
    pub fn with_quad_rotors(mut self) -> Self {
        for id in [
            "rotor_front_left",
            "rotor_front_right",
            "rotor_rear_left",
            "rotor_rear_right",
        ] {
            self = self.with_rotor(SimRotor::new(id));
        }
        self
    }

    /// Register a custom rotor driver.
    pub fn with_rotor(mut self, rotor: Box<dyn Rotor>) -> Self {
        self.rotors.push(rotor);
        self
    }

    /// Attach a simulated gradient camera.
    pub fn with_camera(mut self, id: impl Into<String>) -> Self {
        self.camera = Some(SimCamera::new(id));
        self
    }

    /// Attach an infinite flat ground plane at `surface_y`.
    pub fn with_flat_ground(self, surface_y: f32) -> Self {
        self.with_ground(Box::new(FlatGround::new(surface_y)))
    }

    /// Attach a custom ground probe.
    pub fn with_ground(mut self, ground: Box<dyn GroundProbe>) -> Self {
        self.ground = Some(ground);
        self
    }

    /// Consume the builder and return the configured hardware.
    pub fn build(self) -> SimHardware {
        let mut rotors = RotorRegistry::new();
        for r in self.rotors {
            rotors.register(r);
        }
        SimHardware {
            rotors,
            camera: self.camera,
            ground: self.ground,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_camera_renders_requested_size() {
        let mut cam = SimCamera::new("front");
        let frame = cam.capture(8, 4).unwrap();
        assert_eq!(frame.width, 8);
        assert_eq!(frame.height, 4);
        assert!(frame.is_well_formed());
    }

    #[test]
    fn sim_camera_frames_differ_between_captures() {
        let mut cam = SimCamera::new("front");
        let a = cam.capture(8, 8).unwrap();
        let b = cam.capture(8, 8).unwrap();
        assert_ne!(a.data, b.data);
        assert_eq!(cam.frame_count(), 2);
    }

    #[test]
    fn sim_camera_rejects_empty_size() {
        let mut cam = SimCamera::new("front");
        assert!(matches!(
            cam.capture(0, 512),
            Err(SkyError::HardwareFault { .. })
        ));
    }

    #[test]
    fn flat_ground_reports_height_above_surface() {
        let ground = FlatGround::new(0.0);
        let hit = ground.raycast_down(Vector3::new(3.0, 6.0, -2.0), 50.0, LayerMask::ALL);
        assert_eq!(hit, Some(6.0));
    }

    #[test]
    fn flat_ground_respects_range_and_layer() {
        let ground = FlatGround::new(0.0).on_layer(LayerMask::single(6));
        let origin = Vector3::new(0.0, 20.0, 0.0);
        assert_eq!(ground.raycast_down(origin, 10.0, LayerMask::ALL), None);
        assert_eq!(ground.raycast_down(origin, 50.0, LayerMask::single(2)), None);
        assert_eq!(ground.raycast_down(origin, 50.0, LayerMask::single(6)), Some(20.0));
    }

    #[test]
    fn flat_ground_with_extent_misses_outside() {
        let ground = FlatGround::new(0.0).with_extent(5.0);
        assert!(ground.raycast_down(Vector3::new(1.0, 3.0, 1.0), 50.0, LayerMask::ALL).is_some());
        assert!(ground.raycast_down(Vector3::new(9.0, 3.0, 1.0), 50.0, LayerMask::ALL).is_none());
    }

    #[test]
    fn ground_below_origin_only() {
        let ground = FlatGround::new(5.0);
        assert_eq!(ground.raycast_down(Vector3::new(0.0, 2.0, 0.0), 50.0, LayerMask::ALL), None);
        assert_eq!(NoGround.raycast_down(Vector3::zeros(), 50.0, LayerMask::ALL), None);
    }

    #[test]
    fn recording_sink_keeps_lines_across_clones() {
        let sink = RecordingStatusSink::new();
        let mut writer = sink.clone();
        writer.display_state("Landing");
        writer.display_state("Landed");
        assert_eq!(sink.lines(), vec!["Landing".to_string(), "Landed".to_string()]);
    }

    #[test]
    fn sim_airframe_full_stack_no_hardware_required() {
        let mut hw = SimAirframe::new()
            .with_quad_rotors()
            .with_camera("forward_rgb")
            .with_flat_ground(0.0)
            .build();

        assert_eq!(hw.rotors.len(), 4);
        hw.rotors.spin_all(Vector3::y(), 30.0).expect("sim rotors must spin");
        assert!((hw.rotors.get("rotor_rear_left").unwrap().angle() - 30.0).abs() < 1e-4);

        let frame = hw.camera.as_mut().unwrap().capture(16, 16).unwrap();
        assert!(frame.is_well_formed());

        let ground = hw.ground.as_ref().unwrap();
        assert_eq!(ground.raycast_down(Vector3::new(0.0, 4.0, 0.0), 50.0, LayerMask::ALL), Some(4.0));
    }

    #[test]
    fn sim_airframe_accepts_custom_drivers() {
        let hw = SimAirframe::new()
            .with_rotor(SimRotor::new("tail"))
            .with_flat_ground(0.0)
            .with_ground(Box::new(NoGround))
            .build();

        assert_eq!(hw.rotors.len(), 1);
        assert!(hw.rotors.get("tail").is_some());
        assert!(hw.camera.is_none());
        let ground = hw.ground.as_ref().unwrap();
        assert_eq!(ground.raycast_down(Vector3::new(0.0, 4.0, 0.0), 50.0, LayerMask::ALL), None);
    }
}
