//! Render pipeline adapter and render-target bookkeeping.
//!
//! The controller never renders anything itself; it pushes decisions to a
//! [`RenderPipeline`] implementation supplied by the host. Every call must be
//! safe to repeat with the same arguments.

use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Post-process antialiasing technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasingMode {
    #[default]
    None,
    Fxaa,
    Smaa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasingQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Handle for a render target registered with a [`RenderTargetRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTargetId(pub u64);

/// Per-target override of the config's render-scale policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderScaling {
    /// Follow `use_render_scale_for_render_targets` from the config.
    #[default]
    UseDefault,
    On,
    Off,
}

/// Side-effecting calls the controller makes into the host's renderer.
pub trait RenderPipeline {
    /// Set the output resolution multiplier.
    fn apply_scale(&mut self, scale: f32);

    /// Switch the pipeline's quality preset.
    fn apply_quality_level(&mut self, tier: QualityTier);

    /// Cap the frame rate the host should target.
    fn apply_target_framerate(&mut self, fps: u32);

    /// Apply antialiasing to every registered camera.
    fn apply_antialiasing(&mut self, mode: AntialiasingMode, quality: AntialiasingQuality);

    /// Set how many vertical blanks to wait per frame (0 turns VSync off).
    fn apply_vsync(&mut self, count: i32);

    /// (Re)allocate a render target at the given pixel size.
    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32);

    /// Free a render target.
    fn release_render_target(&mut self, id: RenderTargetId);
}

/// Size request for an offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTargetRequest {
    pub base_width: u32,
    pub base_height: u32,
    #[serde(default)]
    pub scaling: RenderScaling,
}

#[derive(Debug, Clone)]
struct RegisteredTarget {
    id: RenderTargetId,
    request: RenderTargetRequest,
    assigned: Option<(u32, u32)>,
}

/// Tracks offscreen render targets whose size follows the render scale.
///
/// A resize is only forwarded to the pipeline when a target's pixel size
/// actually changes, so calling [`RenderTargetRegistry::resize_all`] after
/// every scale application is cheap.
#[derive(Debug, Clone, Default)]
pub struct RenderTargetRegistry {
    use_render_scale: bool,
    next_id: u64,
    targets: Vec<RegisteredTarget>,
}

impl RenderTargetRegistry {
    pub fn new(use_render_scale: bool) -> Self {
        Self {
            use_render_scale,
            next_id: 0,
            targets: Vec::new(),
        }
    }

    /// Pixel size of a request at the given scale.
    pub fn pixel_size(&self, request: &RenderTargetRequest, scale: f32) -> (u32, u32) {
        let scaled = match request.scaling {
            RenderScaling::Off => false,
            RenderScaling::On => true,
            RenderScaling::UseDefault => self.use_render_scale,
        };

        if !scaled {
            return (request.base_width, request.base_height);
        }

        let w = ((request.base_width as f32) * scale).floor() as u32;
        let h = ((request.base_height as f32) * scale).floor() as u32;
        (w.max(1), h.max(1))
    }

    /// Register a target and allocate it at the current scale.
    pub fn register<P: RenderPipeline + ?Sized>(
        &mut self,
        request: RenderTargetRequest,
        scale: f32,
        pipeline: &mut P,
    ) -> RenderTargetId {
        let id = RenderTargetId(self.next_id);
        self.next_id += 1;
        self.targets.push(RegisteredTarget {
            id,
            request,
            assigned: None,
        });
        self.assign(self.targets.len() - 1, scale, pipeline);
        id
    }

    /// Release a target. Returns false if the id was unknown.
    pub fn release<P: RenderPipeline + ?Sized>(
        &mut self,
        id: RenderTargetId,
        pipeline: &mut P,
    ) -> bool {
        match self.targets.iter().position(|t| t.id == id) {
            Some(index) => {
                self.targets.remove(index);
                pipeline.release_render_target(id);
                true
            }
            None => {
                debug!("Release of unknown render target {:?}", id);
                false
            }
        }
    }

    /// Re-run sizing for every target. Returns how many were resized.
    pub fn resize_all<P: RenderPipeline + ?Sized>(&mut self, scale: f32, pipeline: &mut P) -> usize {
        (0..self.targets.len())
            .filter(|&index| self.assign(index, scale, pipeline))
            .count()
    }

    /// Current pixel size of a registered target.
    pub fn size_of(&self, id: RenderTargetId) -> Option<(u32, u32)> {
        self.targets
            .iter()
            .find(|t| t.id == id)
            .and_then(|t| t.assigned)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn assign<P: RenderPipeline + ?Sized>(
        &mut self,
        index: usize,
        scale: f32,
        pipeline: &mut P,
    ) -> bool {
        let size = self.pixel_size(&self.targets[index].request, scale);
        let target = &mut self.targets[index];
        if target.assigned == Some(size) {
            return false;
        }

        target.assigned = Some(size);
        pipeline.resize_render_target(target.id, size.0, size.1);
        true
    }
}

/// Pipeline that only logs what it is asked to do and remembers the latest
/// value of each knob. Used by the replay host.
#[derive(Debug, Clone, Default)]
pub struct LoggingPipeline {
    pub scale: Option<f32>,
    pub quality_level: Option<QualityTier>,
    pub target_framerate: Option<u32>,
    pub antialiasing: Option<(AntialiasingMode, AntialiasingQuality)>,
    pub vsync: Option<i32>,
}

impl RenderPipeline for LoggingPipeline {
    fn apply_scale(&mut self, scale: f32) {
        if self.scale != Some(scale) {
            info!("Render scale set to {:.3}", scale);
        }
        self.scale = Some(scale);
    }

    fn apply_quality_level(&mut self, tier: QualityTier) {
        info!("Pipeline quality level set to {}", tier);
        self.quality_level = Some(tier);
    }

    fn apply_target_framerate(&mut self, fps: u32) {
        info!("Target framerate set to {}", fps);
        self.target_framerate = Some(fps);
    }

    fn apply_antialiasing(&mut self, mode: AntialiasingMode, quality: AntialiasingQuality) {
        info!("Antialiasing set to {:?} ({:?})", mode, quality);
        self.antialiasing = Some((mode, quality));
    }

    fn apply_vsync(&mut self, count: i32) {
        info!("VSync count set to {}", count);
        self.vsync = Some(count);
    }

    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32) {
        debug!("Render target {} resized to {}x{}", id.0, width, height);
    }

    fn release_render_target(&mut self, id: RenderTargetId) {
        debug!("Render target {} released", id.0);
    }
}

/// One call received by a [`RecordingPipeline`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCall {
    Scale(f32),
    QualityLevel(QualityTier),
    TargetFramerate(u32),
    Antialiasing(AntialiasingMode, AntialiasingQuality),
    VSync(i32),
    Resize(RenderTargetId, u32, u32),
    Release(RenderTargetId),
}

/// Pipeline that records every call, for tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RecordingPipeline {
    pub calls: Vec<PipelineCall>,
}

impl RecordingPipeline {
    /// Most recent scale pushed, if any.
    pub fn last_scale(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            PipelineCall::Scale(s) => Some(*s),
            _ => None,
        })
    }

    /// Most recent quality level pushed, if any.
    pub fn last_quality_level(&self) -> Option<QualityTier> {
        self.calls.iter().rev().find_map(|c| match c {
            PipelineCall::QualityLevel(t) => Some(*t),
            _ => None,
        })
    }

    pub fn resize_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PipelineCall::Resize(..)))
            .count()
    }
}

impl RenderPipeline for RecordingPipeline {
    fn apply_scale(&mut self, scale: f32) {
        self.calls.push(PipelineCall::Scale(scale));
    }

    fn apply_quality_level(&mut self, tier: QualityTier) {
        self.calls.push(PipelineCall::QualityLevel(tier));
    }

    fn apply_target_framerate(&mut self, fps: u32) {
        self.calls.push(PipelineCall::TargetFramerate(fps));
    }

    fn apply_antialiasing(&mut self, mode: AntialiasingMode, quality: AntialiasingQuality) {
        self.calls.push(PipelineCall::Antialiasing(mode, quality));
    }

    fn apply_vsync(&mut self, count: i32) {
        self.calls.push(PipelineCall::VSync(count));
    }

    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32) {
        self.calls.push(PipelineCall::Resize(id, width, height));
    }

    fn release_render_target(&mut self, id: RenderTargetId) {
        self.calls.push(PipelineCall::Release(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(w: u32, h: u32, scaling: RenderScaling) -> RenderTargetRequest {
        RenderTargetRequest {
            base_width: w,
            base_height: h,
            scaling,
        }
    }

    #[test]
    fn test_pixel_size_follows_policy() {
        let registry = RenderTargetRegistry::new(true);
        assert_eq!(
            registry.pixel_size(&request(1000, 500, RenderScaling::UseDefault), 0.75),
            (750, 375)
        );
        assert_eq!(
            registry.pixel_size(&request(1000, 500, RenderScaling::Off), 0.75),
            (1000, 500)
        );

        let registry = RenderTargetRegistry::new(false);
        assert_eq!(
            registry.pixel_size(&request(1000, 500, RenderScaling::UseDefault), 0.75),
            (1000, 500)
        );
        assert_eq!(
            registry.pixel_size(&request(1000, 500, RenderScaling::On), 0.5),
            (500, 250)
        );
    }

    #[test]
    fn test_pixel_size_never_zero() {
        let registry = RenderTargetRegistry::new(true);
        assert_eq!(
            registry.pixel_size(&request(1, 1, RenderScaling::On), 0.5),
            (1, 1)
        );
    }

    #[test]
    fn test_register_allocates_immediately() {
        let mut registry = RenderTargetRegistry::new(true);
        let mut pipeline = RecordingPipeline::default();

        let id = registry.register(request(800, 600, RenderScaling::UseDefault), 1.0, &mut pipeline);
        assert_eq!(registry.size_of(id), Some((800, 600)));
        assert_eq!(pipeline.calls, vec![PipelineCall::Resize(id, 800, 600)]);
    }

    #[test]
    fn test_resize_only_when_pixels_change() {
        let mut registry = RenderTargetRegistry::new(true);
        let mut pipeline = RecordingPipeline::default();
        let scaled = registry.register(request(800, 600, RenderScaling::UseDefault), 1.0, &mut pipeline);
        let fixed = registry.register(request(256, 256, RenderScaling::Off), 1.0, &mut pipeline);
        assert_eq!(pipeline.resize_count(), 2);

        // Same scale: nothing to do
        assert_eq!(registry.resize_all(1.0, &mut pipeline), 0);
        assert_eq!(pipeline.resize_count(), 2);

        // New scale resizes only the scaled target
        assert_eq!(registry.resize_all(0.5, &mut pipeline), 1);
        assert_eq!(registry.size_of(scaled), Some((400, 300)));
        assert_eq!(registry.size_of(fixed), Some((256, 256)));

        // A scale change that floors to the same pixels is not a resize
        assert_eq!(registry.resize_all(0.5001, &mut pipeline), 0);
    }

    #[test]
    fn test_release() {
        let mut registry = RenderTargetRegistry::new(true);
        let mut pipeline = RecordingPipeline::default();
        let id = registry.register(request(64, 64, RenderScaling::On), 1.0, &mut pipeline);

        assert!(registry.release(id, &mut pipeline));
        assert!(registry.is_empty());
        assert_eq!(pipeline.calls.last(), Some(&PipelineCall::Release(id)));
        assert!(!registry.release(id, &mut pipeline));
    }
}
