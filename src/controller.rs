//! Quality controller implementing the adaptive feedback loop.
//!
//! This module contains the state machine that trades render scale and
//! quality tier for frame rate, based on sustained FPS averages.

use crate::config::{ControllerTuning, QualityConfig};
use crate::cooldown::CooldownGate;
use crate::error::ConfigError;
use crate::events::QualityListener;
use crate::pipeline::{RenderPipeline, RenderTargetId, RenderTargetRegistry, RenderTargetRequest};
use crate::platform::{resolve_startup_tier, Platform, PlatformInfo};
use crate::prefs::{
    PreferenceStore, PP_ANTI_ALIASING_ENABLED, PP_QUALITY_AUTOMATIC, PP_QUALITY_TIER,
    PP_RENDER_SCALE_STEP, PP_VSYNC_STATE,
};
use crate::render_scale::ScaleStepper;
use crate::sampler::{rate_from_delta, MetricSampler};
use crate::stats::{QualityStats, QualityStatus};
use crate::tier::{QualityTier, TierStepper};
use tracing::{debug, info, warn};

/// Whether the control loop is acting on ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Ticks are accepted and ignored
    #[default]
    Disabled,
    /// Ticks feed the sampler and drive adjustments
    Enabled,
}

/// A single change made (or refused) during a decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    ScaleDown,
    TierDown,
    ScaleUp,
    TierUp,
    /// A decrease was due but scale and tier were both at their floors
    Saturated,
}

/// Outcome of one cooldown-gated decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Rolling average the decision was based on
    pub average: i32,
    pub decrease: Option<Adjustment>,
    pub increase: Option<Adjustment>,
    /// Ceiling counter after the cycle
    pub ceiling_checks: u32,
}

impl Decision {
    /// True if the cycle changed scale or tier.
    pub fn changed_anything(&self) -> bool {
        matches!(
            self.decrease,
            Some(Adjustment::ScaleDown) | Some(Adjustment::TierDown)
        ) || self.increase.is_some()
    }
}

/// Adaptive quality controller.
///
/// Owns the sampler, the cooldown gate and both steppers, and pushes every
/// change to the render pipeline, the preference store and the registered
/// listeners before the mutating call returns.
///
/// # Algorithm
/// - Every tick records `round(1 / dt)` and advances the cooldown
/// - Once per cooldown, the rolling average is compared against the target:
///   - below `target - tolerance_down`: lower the render scale, or the tier
///     once the scale is exhausted
///   - at or above `target - tolerance_up`: count a ceiling check
/// - After `required_consecutive` ceiling checks: raise the render scale, or
///   the tier once the scale is at its maximum
pub struct QualityController<S: PreferenceStore, R: RenderPipeline> {
    platform: Platform,
    config: QualityConfig,
    tuning: ControllerTuning,
    state: ControllerState,
    sampler: MetricSampler,
    gate: CooldownGate,
    scale: ScaleStepper,
    tier: TierStepper,
    render_targets: RenderTargetRegistry,
    /// Consecutive cycles with the average near the target
    consecutive_at_ceiling: u32,
    last_average: i32,
    stats: QualityStats,
    prefs: S,
    pipeline: R,
    listeners: Vec<Box<dyn QualityListener>>,
}

impl<S: PreferenceStore, R: RenderPipeline> QualityController<S, R> {
    /// Build a controller for `platform` and push the startup settings to
    /// the pipeline.
    ///
    /// Fails if the config or tuning is malformed, including any per-tier
    /// table missing an entry for a reachable tier. Dynamic management stays
    /// disabled until [`QualityController::start`] or an explicit
    /// [`QualityController::set_dynamic_management`].
    pub fn new(
        platform: Platform,
        config: QualityConfig,
        tuning: ControllerTuning,
        info: &dyn PlatformInfo,
        prefs: S,
        pipeline: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        tuning.validate()?;

        let tier = resolve_startup_tier(platform, &config, info, &prefs);
        let persisted_step = prefs
            .has_key(PP_RENDER_SCALE_STEP)
            .then(|| prefs.get_int(PP_RENDER_SCALE_STEP, 0));
        let scale = ScaleStepper::initialize(tier, persisted_step, info.current_dpi(), &config)?;

        info!(
            "Quality controller initialized for {:?}: tier {}, scale step {} ({:.3})",
            platform,
            tier,
            scale.step(),
            scale.scale()
        );

        let mut controller = Self {
            platform,
            tier: TierStepper::new(tier, config.min_quality_tier, config.max_quality_tier),
            render_targets: RenderTargetRegistry::new(config.use_render_scale_for_render_targets),
            sampler: MetricSampler::with_capacity(tuning.sample_capacity),
            gate: CooldownGate::from_secs(tuning.cooldown_secs),
            scale,
            config,
            tuning,
            state: ControllerState::Disabled,
            consecutive_at_ceiling: 0,
            last_average: 0,
            stats: QualityStats::default(),
            prefs,
            pipeline,
            listeners: Vec::new(),
        };

        controller
            .pipeline
            .apply_target_framerate(controller.config.max_framerate);
        controller.pipeline.apply_quality_level(tier);
        controller.apply_antialiasing();
        controller.apply_vsync();
        controller.apply_scale();

        Ok(controller)
    }

    /// Register a listener for tier/scale changes.
    pub fn add_listener(&mut self, listener: Box<dyn QualityListener>) {
        self.listeners.push(listener);
    }

    /// Finish startup: enable dynamic management unless the platform waits
    /// for an explicit opt-in. Returns whether management is now active.
    pub fn start(&mut self) -> bool {
        if self.platform.requires_automatic_opt_in() {
            debug!("Dynamic management left off until the host enables it");
            return self.is_dynamic_active();
        }
        self.set_dynamic_management(true)
    }

    /// Turn the control loop on or off. Returns whether it is now active.
    ///
    /// Enabling is refused when the platform config forbids dynamic
    /// management. Disabling persists the current scale step.
    pub fn set_dynamic_management(&mut self, active: bool) -> bool {
        if active {
            if !self.config.enable_dynamic_management {
                debug!("Dynamic management is disabled by the platform config");
                return false;
            }
            if self.state == ControllerState::Enabled {
                return true;
            }

            self.state = ControllerState::Enabled;
            self.sampler.reset();
            self.gate.reset();
            self.consecutive_at_ceiling = 0;
            for listener in self.listeners.iter_mut() {
                listener.on_quality_management_begin();
            }
            info!("Dynamic quality management enabled");
            true
        } else {
            let was_enabled = self.state == ControllerState::Enabled;
            self.state = ControllerState::Disabled;
            self.persist_scale_step();
            if was_enabled {
                for listener in self.listeners.iter_mut() {
                    listener.on_quality_management_end();
                }
                info!(
                    "Dynamic quality management disabled at tier {}, scale step {}",
                    self.tier.current(),
                    self.scale.step()
                );
            }
            false
        }
    }

    /// Record the user's opt-in to automatic changes on platforms that need it.
    pub fn set_automatic_opt_in(&mut self, enabled: bool) {
        self.prefs.set_int(PP_QUALITY_AUTOMATIC, i32::from(enabled));
    }

    /// Whether automatic changes are currently allowed by user preference.
    pub fn automatic_change_permitted(&self) -> bool {
        if self.platform.requires_automatic_opt_in() {
            self.prefs.get_int(PP_QUALITY_AUTOMATIC, 0) != 0
        } else {
            true
        }
    }

    /// Drive one step of the control loop.
    ///
    /// Returns `Some` only on ticks where the cooldown elapsed and a
    /// decision cycle ran. Never fails: bad frame times are dropped from the
    /// average and saturated steppers simply do nothing.
    pub fn evaluate_tick(&mut self, delta_secs: f32) -> Option<Decision> {
        if self.state != ControllerState::Enabled || !self.automatic_change_permitted() {
            return None;
        }

        self.sampler.record(rate_from_delta(delta_secs));
        self.gate.tick(delta_secs);
        if !self.gate.consume() {
            return None;
        }

        let average = self.sampler.average();
        self.sampler.reset();
        self.last_average = average;
        self.stats.decision_cycles += 1;

        let mut decision = Decision {
            average,
            decrease: None,
            increase: None,
            ceiling_checks: self.consecutive_at_ceiling,
        };

        // No valid frame times this cycle: nothing to judge
        if average == 0 {
            debug!("Skipping decision cycle without valid samples");
            return Some(decision);
        }

        let target = i32::try_from(self.config.max_framerate).unwrap_or(i32::MAX);

        if average < target.saturating_sub(self.tuning.tolerance_down) {
            decision.decrease = Some(self.step_down());
        } else if average >= target.saturating_sub(self.tuning.tolerance_up) {
            self.consecutive_at_ceiling += 1;
        }

        if self.consecutive_at_ceiling >= self.tuning.required_consecutive {
            self.consecutive_at_ceiling = 0;
            decision.increase = self.step_up();
        }

        decision.ceiling_checks = self.consecutive_at_ceiling;
        debug!(
            "Decision cycle: avg {} fps (target {}), decrease {:?}, increase {:?}, ceiling checks {}",
            average, target, decision.decrease, decision.increase, decision.ceiling_checks
        );
        Some(decision)
    }

    /// Set the tier directly, clamped to the platform bounds.
    ///
    /// Applies, broadcasts and persists immediately. The automatic loop's
    /// counters are left untouched.
    pub fn manual_set_tier(&mut self, tier: QualityTier) -> QualityTier {
        let applied = self.tier.set_tier(tier);
        self.stats.manual_changes += 1;
        info!("Manually changed quality to {} (requested {})", applied, tier);
        self.apply_tier_change(applied);
        applied
    }

    /// Move the tier one step up (`delta > 0`) or down (`delta < 0`) by hand.
    pub fn manual_step_tier(&mut self, delta: i32) -> QualityTier {
        let current = self.tier.current();
        let target = match delta.signum() {
            1 => current.up().unwrap_or(current),
            -1 => current.down().unwrap_or(current),
            _ => current,
        };
        self.manual_set_tier(target)
    }

    /// Register an offscreen render target sized from the render scale.
    pub fn register_render_target(&mut self, request: RenderTargetRequest) -> RenderTargetId {
        let scale = self.scale.scale();
        self.render_targets
            .register(request, scale, &mut self.pipeline)
    }

    pub fn release_render_target(&mut self, id: RenderTargetId) -> bool {
        self.render_targets.release(id, &mut self.pipeline)
    }

    pub fn render_target_size(&self, id: RenderTargetId) -> Option<(u32, u32)> {
        self.render_targets.size_of(id)
    }

    pub fn current_tier(&self) -> QualityTier {
        self.tier.current()
    }

    pub fn current_scale(&self) -> f32 {
        self.scale.scale()
    }

    pub fn current_step(&self) -> i32 {
        self.scale.step()
    }

    /// Rolling average of the samples gathered so far this cycle, or the
    /// average the last decision used if none have been gathered yet.
    pub fn current_average(&self) -> i32 {
        if self.sampler.is_empty() {
            self.last_average
        } else {
            self.sampler.average()
        }
    }

    pub fn is_dynamic_active(&self) -> bool {
        self.state == ControllerState::Enabled
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Consecutive decision cycles spent near the target.
    pub fn ceiling_checks(&self) -> u32 {
        self.consecutive_at_ceiling
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn tuning(&self) -> &ControllerTuning {
        &self.tuning
    }

    pub fn stats(&self) -> &QualityStats {
        &self.stats
    }

    pub fn status(&self) -> QualityStatus {
        QualityStatus {
            dynamic_active: self.is_dynamic_active(),
            tier: self.tier.current(),
            scale: self.scale.scale(),
            scale_step: self.scale.step(),
            min_scale: self.scale.min_scale(),
            max_scale: self.scale.max_scale(),
            average_fps: self.current_average(),
            target_framerate: self.config.max_framerate,
            stats: self.stats.clone(),
        }
    }

    pub fn prefs(&self) -> &S {
        &self.prefs
    }

    pub fn pipeline(&self) -> &R {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut R {
        &mut self.pipeline
    }

    /// Lower the cheapest knob available: scale first, then tier.
    fn step_down(&mut self) -> Adjustment {
        if !self.scale.is_at_minimum() {
            self.scale.decrease();
            self.consecutive_at_ceiling = 0;
            self.stats.scale_downs += 1;
            info!(
                "Reduced render scale to step {} ({:.3})",
                self.scale.step(),
                self.scale.scale()
            );
            self.apply_scale();
            self.persist_scale_step();
            return Adjustment::ScaleDown;
        }

        if self.tier.decrease() {
            self.consecutive_at_ceiling = 0;
            self.stats.tier_downs += 1;
            info!("Dynamically decreased quality to {}", self.tier.current());
            self.apply_tier_change(self.tier.current());
            return Adjustment::TierDown;
        }

        self.stats.saturated_decreases += 1;
        debug!("Scale and tier already at their floors");
        Adjustment::Saturated
    }

    /// Raise the tier once the scale is maxed out, otherwise raise the scale.
    fn step_up(&mut self) -> Option<Adjustment> {
        if self.scale.is_at_maximum() {
            if !self.tier.increase() {
                return None;
            }
            self.stats.tier_ups += 1;
            info!("Dynamically increased quality to {}", self.tier.current());
            self.apply_tier_change(self.tier.current());
            return Some(Adjustment::TierUp);
        }

        self.scale.increase();
        self.stats.scale_ups += 1;
        info!(
            "Increased render scale to step {} ({:.3})",
            self.scale.step(),
            self.scale.scale()
        );
        self.apply_scale();
        self.persist_scale_step();
        Some(Adjustment::ScaleUp)
    }

    /// Propagate a new tier to every tier-aware collaborator and persist it.
    fn apply_tier_change(&mut self, tier: QualityTier) {
        if let Err(e) = self.scale.on_tier_changed(tier, &self.config) {
            // Unreachable for validated configs; keep the previous bounds
            warn!("Keeping previous render scale bounds: {}", e);
        }

        self.pipeline.apply_quality_level(tier);
        self.apply_antialiasing();
        self.apply_scale();

        for listener in self.listeners.iter_mut() {
            listener.on_tier_changed(tier);
        }

        self.prefs.set_int(PP_QUALITY_TIER, tier.index() as i32);
    }

    /// Push the effective scale to the pipeline, render targets and listeners.
    fn apply_scale(&mut self) {
        let scale = self.scale.scale();
        self.pipeline.apply_scale(scale);

        let resized = self.render_targets.resize_all(scale, &mut self.pipeline);
        if resized > 0 {
            debug!("Resized {} render targets for scale {:.3}", resized, scale);
        }

        for listener in self.listeners.iter_mut() {
            listener.on_scale_changed(scale);
        }
    }

    fn apply_antialiasing(&mut self) {
        if !self.config.enable_antialiasing {
            return;
        }
        if self.prefs.get_int(PP_ANTI_ALIASING_ENABLED, 1) == 0 {
            debug!("Antialiasing turned off by user preference");
            return;
        }
        if let Some(setting) = self.config.antialiasing_for(self.tier.current()) {
            self.pipeline
                .apply_antialiasing(setting.mode, setting.quality);
        }
    }

    /// VSync is only touched when the config enables it; a stored user
    /// choice wins over the default of one blank per frame.
    fn apply_vsync(&mut self) {
        if !self.config.enable_vsync {
            return;
        }
        let count = self.prefs.get_int(PP_VSYNC_STATE, 1);
        self.pipeline.apply_vsync(count);
    }

    fn persist_scale_step(&mut self) {
        self.prefs
            .set_int(PP_RENDER_SCALE_STEP, self.scale.step());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventLog, QualityEvent};
    use crate::pipeline::{
        AntialiasingMode, AntialiasingQuality, PipelineCall, RecordingPipeline, RenderScaling,
    };
    use crate::platform::FixedPlatform;
    use crate::prefs::MemoryPreferenceStore;
    use crate::render_scale::SCALE_STEPS;
    use proptest::prelude::*;

    type TestController = QualityController<MemoryPreferenceStore, RecordingPipeline>;

    /// 4 GiB Android device: starts at Normal, bounds Lowest..=High, target 60.
    fn android_info() -> FixedPlatform {
        FixedPlatform {
            dpi: 0,
            memory_mb: 4096,
        }
    }

    fn tuning() -> ControllerTuning {
        ControllerTuning {
            cooldown_secs: 1.0,
            ..ControllerTuning::default()
        }
    }

    fn android_with(prefs: MemoryPreferenceStore) -> TestController {
        let mut controller = QualityController::new(
            Platform::Android,
            QualityConfig::android(),
            tuning(),
            &android_info(),
            prefs,
            RecordingPipeline::default(),
        )
        .unwrap();
        assert!(controller.start());
        controller
    }

    fn android() -> TestController {
        android_with(MemoryPreferenceStore::default())
    }

    /// Tick at a steady `fps` until one decision cycle runs.
    fn cycle_at(controller: &mut TestController, fps: u32) -> Decision {
        let dt = 1.0 / fps as f32;
        for _ in 0..100_000 {
            if let Some(decision) = controller.evaluate_tick(dt) {
                return decision;
            }
        }
        panic!("no decision cycle ran at {} fps", fps);
    }

    #[test]
    fn test_startup_pushes_settings() {
        let controller = android();
        assert_eq!(controller.current_tier(), QualityTier::Normal);
        assert_eq!(controller.current_step(), 0);
        assert!(controller.is_dynamic_active());

        let calls = &controller.pipeline().calls;
        assert_eq!(calls[0], PipelineCall::TargetFramerate(60));
        assert_eq!(calls[1], PipelineCall::QualityLevel(QualityTier::Normal));
        assert_eq!(calls[2], PipelineCall::Scale(1.0));
    }

    #[test]
    fn test_new_fails_fast_on_missing_tier_entry() {
        let mut config = QualityConfig::android();
        config.min_render_scale_by_tier.truncate(2);

        let result = QualityController::new(
            Platform::Android,
            config,
            tuning(),
            &android_info(),
            MemoryPreferenceStore::default(),
            RecordingPipeline::default(),
        );
        assert!(matches!(result, Err(ConfigError::MissingTierEntry { .. })));
    }

    #[test]
    fn test_no_decision_before_cooldown() {
        let mut controller = android();
        for _ in 0..59 {
            assert!(controller.evaluate_tick(1.0 / 60.0).is_none());
        }
        assert_eq!(controller.current_average(), 60);
    }

    #[test]
    fn test_hysteresis_dead_zone() {
        let mut controller = android();

        // 56 is neither below 55 nor at/above 57
        let decision = cycle_at(&mut controller, 56);
        assert_eq!(decision.average, 56);
        assert_eq!(decision.decrease, None);
        assert_eq!(decision.increase, None);
        assert_eq!(controller.ceiling_checks(), 0);

        // 58 counts toward an increase but changes nothing yet
        let decision = cycle_at(&mut controller, 58);
        assert!(!decision.changed_anything());
        assert_eq!(controller.ceiling_checks(), 1);

        // 54 is below the decrease threshold
        let decision = cycle_at(&mut controller, 54);
        assert_eq!(decision.decrease, Some(Adjustment::ScaleDown));
        assert_eq!(controller.current_step(), 1);
        assert_eq!(controller.ceiling_checks(), 0);
    }

    #[test]
    fn test_three_ceiling_checks_trigger_one_increase() {
        let mut controller = android();
        cycle_at(&mut controller, 40);
        assert_eq!(controller.current_step(), 1);

        assert_eq!(cycle_at(&mut controller, 60).increase, None);
        assert_eq!(cycle_at(&mut controller, 58).increase, None);
        assert_eq!(controller.ceiling_checks(), 2);

        let decision = cycle_at(&mut controller, 57);
        assert_eq!(decision.increase, Some(Adjustment::ScaleUp));
        assert_eq!(decision.ceiling_checks, 0);
        assert_eq!(controller.current_step(), 0);
        assert_eq!(controller.stats().scale_ups, 1);
    }

    #[test]
    fn test_scale_exhausted_before_tier() {
        let mut controller = android();

        for expected_step in 1..=SCALE_STEPS {
            let decision = cycle_at(&mut controller, 30);
            assert_eq!(decision.decrease, Some(Adjustment::ScaleDown));
            assert_eq!(controller.current_step(), expected_step);
            assert_eq!(controller.current_tier(), QualityTier::Normal);
        }

        let decision = cycle_at(&mut controller, 30);
        assert_eq!(decision.decrease, Some(Adjustment::TierDown));
        assert_eq!(controller.current_tier(), QualityTier::Low);
        // Step is kept, the new tier's min scale applies
        assert_eq!(controller.current_step(), SCALE_STEPS);
        assert_eq!(controller.current_scale(), 0.55);

        assert_eq!(cycle_at(&mut controller, 30).decrease, Some(Adjustment::TierDown));
        assert_eq!(controller.current_tier(), QualityTier::Lowest);

        assert_eq!(cycle_at(&mut controller, 30).decrease, Some(Adjustment::Saturated));
        assert_eq!(controller.current_tier(), QualityTier::Lowest);
        assert_eq!(controller.stats().saturated_decreases, 1);
    }

    #[test]
    fn test_tier_increase_only_at_max_scale() {
        let mut controller = android();
        assert!(controller.scale.is_at_maximum());

        for _ in 0..2 {
            cycle_at(&mut controller, 60);
        }
        let decision = cycle_at(&mut controller, 60);
        assert_eq!(decision.increase, Some(Adjustment::TierUp));
        assert_eq!(controller.current_tier(), QualityTier::High);
        assert_eq!(
            controller.prefs().get_int(PP_QUALITY_TIER, -1),
            QualityTier::High.index() as i32
        );

        // High is the Android ceiling
        for _ in 0..2 {
            cycle_at(&mut controller, 60);
        }
        let decision = cycle_at(&mut controller, 60);
        assert_eq!(decision.increase, None);
        assert_eq!(decision.ceiling_checks, 0);
        assert_eq!(controller.current_tier(), QualityTier::High);
    }

    #[test]
    fn test_manual_override_keeps_counters() {
        let mut controller = android();
        let log = EventLog::new();
        controller.add_listener(Box::new(log.clone()));

        cycle_at(&mut controller, 60);
        cycle_at(&mut controller, 60);
        assert_eq!(controller.ceiling_checks(), 2);

        // Ultra is above the Android ceiling
        assert_eq!(controller.manual_set_tier(QualityTier::Ultra), QualityTier::High);
        assert_eq!(controller.current_tier(), QualityTier::High);
        assert_eq!(controller.ceiling_checks(), 2);
        assert!(controller.is_dynamic_active());
        assert_eq!(log.tier_changes(), vec![QualityTier::High]);
        assert_eq!(
            controller.prefs().get_int(PP_QUALITY_TIER, -1),
            QualityTier::High.index() as i32
        );
        assert_eq!(controller.stats().manual_changes, 1);
    }

    #[test]
    fn test_manual_step_tier() {
        let mut controller = android();
        assert_eq!(controller.manual_step_tier(-1), QualityTier::Low);
        assert_eq!(controller.manual_step_tier(-1), QualityTier::Lowest);
        assert_eq!(controller.manual_step_tier(-1), QualityTier::Lowest);
        assert_eq!(controller.manual_step_tier(1), QualityTier::Low);
        assert_eq!(controller.pipeline().last_quality_level(), Some(QualityTier::Low));
    }

    #[test]
    fn test_persistence_round_trip() {
        let mut controller = android();
        cycle_at(&mut controller, 40);
        cycle_at(&mut controller, 40);
        assert_eq!(controller.current_step(), 2);

        assert!(!controller.set_dynamic_management(false));
        assert_eq!(controller.prefs().get_int(PP_RENDER_SCALE_STEP, -1), 2);

        let prefs = controller.prefs().clone();
        let restored = android_with(prefs);
        assert_eq!(restored.current_step(), 2);
        assert_eq!(restored.current_tier(), QualityTier::Normal);
    }

    #[test]
    fn test_disabled_controller_ignores_ticks() {
        let mut controller = android();
        let log = EventLog::new();
        controller.add_listener(Box::new(log.clone()));

        controller.set_dynamic_management(false);
        for _ in 0..1000 {
            assert!(controller.evaluate_tick(1.0 / 20.0).is_none());
        }
        assert_eq!(controller.current_step(), 0);
        assert_eq!(log.events(), vec![QualityEvent::ManagementEnd]);

        assert!(controller.set_dynamic_management(true));
        assert_eq!(
            log.events(),
            vec![QualityEvent::ManagementEnd, QualityEvent::ManagementBegin]
        );
        assert_eq!(cycle_at(&mut controller, 20).decrease, Some(Adjustment::ScaleDown));
    }

    #[test]
    fn test_enable_refused_by_config() {
        let mut config = QualityConfig::android();
        config.enable_dynamic_management = false;

        let mut controller = QualityController::new(
            Platform::Android,
            config,
            tuning(),
            &android_info(),
            MemoryPreferenceStore::default(),
            RecordingPipeline::default(),
        )
        .unwrap();
        assert!(!controller.start());
        assert!(!controller.set_dynamic_management(true));
        assert!(controller.evaluate_tick(10.0).is_none());
    }

    #[test]
    fn test_desktop_requires_opt_in() {
        let mut controller = QualityController::new(
            Platform::Desktop,
            QualityConfig::desktop(),
            tuning(),
            &FixedPlatform::default(),
            MemoryPreferenceStore::default(),
            RecordingPipeline::default(),
        )
        .unwrap();
        assert_eq!(controller.current_tier(), QualityTier::Ultra);

        assert!(!controller.start());
        assert!(controller.set_dynamic_management(true));
        assert!(!controller.automatic_change_permitted());
        for _ in 0..500 {
            assert!(controller.evaluate_tick(1.0 / 30.0).is_none());
        }

        controller.set_automatic_opt_in(true);
        assert!(controller.automatic_change_permitted());
        let decision = loop {
            if let Some(d) = controller.evaluate_tick(1.0 / 30.0) {
                break d;
            }
        };
        assert_eq!(decision.decrease, Some(Adjustment::ScaleDown));
    }

    #[test]
    fn test_invalid_frame_times_are_excluded() {
        let mut controller = android();
        let decision = loop {
            controller.evaluate_tick(f32::NAN);
            controller.evaluate_tick(0.0);
            if let Some(d) = controller.evaluate_tick(1.0 / 60.0) {
                break d;
            }
        };
        assert_eq!(decision.average, 60);
        assert_eq!(decision.decrease, None);
    }

    #[test]
    fn test_antialiasing_follows_tier() {
        let mut controller = QualityController::new(
            Platform::Desktop,
            QualityConfig::desktop(),
            tuning(),
            &FixedPlatform::default(),
            MemoryPreferenceStore::default(),
            RecordingPipeline::default(),
        )
        .unwrap();
        assert!(controller.pipeline().calls.contains(&PipelineCall::Antialiasing(
            AntialiasingMode::Smaa,
            AntialiasingQuality::High
        )));

        controller.manual_set_tier(QualityTier::High);
        assert!(controller.pipeline().calls.contains(&PipelineCall::Antialiasing(
            AntialiasingMode::Fxaa,
            AntialiasingQuality::Medium
        )));

        // No preset for Normal: nothing new is sent
        let before = controller.pipeline().calls.len();
        controller.manual_set_tier(QualityTier::Normal);
        assert!(!controller.pipeline().calls[before..]
            .iter()
            .any(|c| matches!(c, PipelineCall::Antialiasing(..))));
    }

    #[test]
    fn test_antialiasing_respects_user_preference() {
        let mut prefs = MemoryPreferenceStore::default();
        prefs.set_int(PP_ANTI_ALIASING_ENABLED, 0);
        let controller = QualityController::new(
            Platform::Desktop,
            QualityConfig::desktop(),
            tuning(),
            &FixedPlatform::default(),
            prefs,
            RecordingPipeline::default(),
        )
        .unwrap();
        assert!(!controller
            .pipeline()
            .calls
            .iter()
            .any(|c| matches!(c, PipelineCall::Antialiasing(..))));
    }

    fn desktop_with(prefs: MemoryPreferenceStore) -> TestController {
        QualityController::new(
            Platform::Desktop,
            QualityConfig::desktop(),
            tuning(),
            &FixedPlatform::default(),
            prefs,
            RecordingPipeline::default(),
        )
        .unwrap()
    }

    fn vsync_calls(controller: &TestController) -> Vec<i32> {
        controller
            .pipeline()
            .calls
            .iter()
            .filter_map(|c| match c {
                PipelineCall::VSync(count) => Some(*count),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_vsync_applied_at_startup() {
        let controller = desktop_with(MemoryPreferenceStore::default());
        assert_eq!(vsync_calls(&controller), vec![1]);

        // Android preset leaves VSync alone
        assert!(vsync_calls(&android()).is_empty());
    }

    #[test]
    fn test_vsync_respects_user_preference() {
        let mut prefs = MemoryPreferenceStore::default();
        prefs.set_int(PP_VSYNC_STATE, 0);
        let controller = desktop_with(prefs);
        assert_eq!(vsync_calls(&controller), vec![0]);
    }

    #[test]
    fn test_huge_target_framerate_does_not_overflow() {
        let mut config = QualityConfig::android();
        config.max_framerate = i32::MAX as u32;

        let mut controller = QualityController::new(
            Platform::Android,
            config,
            tuning(),
            &android_info(),
            MemoryPreferenceStore::default(),
            RecordingPipeline::default(),
        )
        .unwrap();
        assert!(controller.start());

        let decision = cycle_at(&mut controller, 60);
        assert_eq!(decision.decrease, Some(Adjustment::ScaleDown));
    }

    #[test]
    fn test_ticks_between_cycles_consume_nothing() {
        let mut controller = android();
        for _ in 0..10 {
            assert!(controller.evaluate_tick(1.0 / 60.0).is_none());
        }
        assert_eq!(controller.gate.underflows(), 10);

        cycle_at(&mut controller, 60);
        assert!(!controller.gate.is_ready());
    }

    #[test]
    fn test_render_targets_follow_scale() {
        let mut controller = android();
        let id = controller.register_render_target(RenderTargetRequest {
            base_width: 1000,
            base_height: 500,
            scaling: RenderScaling::UseDefault,
        });
        assert_eq!(controller.render_target_size(id), Some((1000, 500)));

        cycle_at(&mut controller, 30);
        let expected = controller.current_scale();
        let (w, h) = controller.render_target_size(id).unwrap();
        assert_eq!(w, (1000.0 * expected).floor() as u32);
        assert_eq!(h, (500.0 * expected).floor() as u32);
        assert_eq!(controller.pipeline().resize_count(), 2);

        assert!(controller.release_render_target(id));
        assert_eq!(controller.render_target_size(id), None);
    }

    #[test]
    fn test_listeners_see_scale_changes() {
        let mut controller = android();
        let log = EventLog::new();
        controller.add_listener(Box::new(log.clone()));

        cycle_at(&mut controller, 30);
        assert_eq!(
            log.events(),
            vec![QualityEvent::ScaleChanged(controller.current_scale())]
        );
    }

    #[test]
    fn test_status_snapshot() {
        let mut controller = android();
        cycle_at(&mut controller, 30);

        let status = controller.status();
        assert!(status.dynamic_active);
        assert_eq!(status.tier, QualityTier::Normal);
        assert_eq!(status.scale_step, 1);
        assert_eq!(status.average_fps, 30);
        assert_eq!(status.target_framerate, 60);
        assert_eq!(status.stats.decision_cycles, 1);
        assert_eq!(status.stats.scale_downs, 1);
    }

    // For any sequence of decision-cycle frame rates, the step stays in
    // [0, STEPS] and the tier inside the platform bounds.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_controller_respects_bounds(
            rates in prop::collection::vec(10u32..=90, 1..24),
        ) {
            let mut controller = android();
            let config = QualityConfig::android();
            for fps in rates {
                cycle_at(&mut controller, fps);
                prop_assert!(controller.current_step() >= 0);
                prop_assert!(controller.current_step() <= SCALE_STEPS);
                prop_assert!(controller.current_tier() >= config.min_quality_tier);
                prop_assert!(controller.current_tier() <= config.max_quality_tier);
                let scale = controller.current_scale();
                prop_assert!(scale > 0.0 && scale <= 1.0);
            }
        }
    }
}
