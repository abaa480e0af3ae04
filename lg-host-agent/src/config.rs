//! Configuration loading and live reload, same shape as the teacher's
//! `user_agent::config::ConfigManager`: `Config::load` validates and
//! returns a typed error, `ConfigManager::new` spawns a watcher thread
//! that reloads on modify events and logs success/failure.
//!
//! Covers the knobs SPEC_FULL.md §1 calls out: shared-region size, queue
//! capacities and subscriber timeouts, alignment, throttle fps,
//! downsample rules, RGB24 packing toggle, SDR white-level nits, and
//! capture backend selection.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, RwLock},
    thread,
};

use lg_common::errors::ConfigError;
use lg_postprocess::{DownsampleRule, DownsampleStage, Hdr16ToPq10Stage, PostProcessChain, Rgb24PackStage, SdrWhiteLevelStage};
use lg_producer::OrchestratorConfig;

/// Full host-agent configuration, loaded from TOML.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Byte size of the shared-memory region `SharedRegion::new_anonymous`
    /// maps; stands in for the BAR size a real deployment would be
    /// handed (§1).
    pub region_size_bytes: usize,
    #[serde(default)]
    pub transport: TransportConfig,
    pub capture: CaptureConfig,
    #[serde(default)]
    pub postprocess: PostProcessConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[transport]` section.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    pub frame_queue_capacity: usize,
    pub pointer_queue_capacity: usize,
    pub n_frame_buffers: usize,
    pub max_frame_payload: usize,
    pub align_size: usize,
    pub throttle_fps: u32,
    pub subscriber_timeout_ms: u64,
    pub max_damage_rects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            frame_queue_capacity: defaults.frame_queue_capacity,
            pointer_queue_capacity: defaults.pointer_queue_capacity,
            n_frame_buffers: defaults.n_frame_buffers,
            max_frame_payload: defaults.max_frame_payload,
            align_size: defaults.align_size,
            throttle_fps: defaults.throttle_fps,
            subscriber_timeout_ms: defaults.subscriber_timeout.as_millis() as u64,
            max_damage_rects: defaults.max_damage_rects,
        }
    }
}

/// `[capture]` section. The real platform backends (DXGI/NvFBC/XCB) are
/// out of scope (SPEC_FULL.md §8); this selects between the two portable
/// reference backends `lg-capture` ships.
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    pub backend: CaptureBackendKind,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureBackendKind {
    TestPattern,
    ThreadedTest,
}

/// `[postprocess]` section: toggles and parameters for the stages
/// `lg-postprocess` defines. Each omitted stage is left out of the
/// chain entirely (as opposed to included but bypassed).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PostProcessConfig {
    #[serde(default)]
    pub hdr16_to_pq10: bool,
    pub sdr_white_level_nits: Option<f32>,
    #[serde(default)]
    pub downsample_rules: Vec<DownsampleRuleConfig>,
    #[serde(default)]
    pub rgb24_pack: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownsampleRuleConfig {
    pub id: u32,
    pub greater: bool,
    pub x: u32,
    pub y: u32,
    pub target_x: u32,
    pub target_y: u32,
}

impl From<&DownsampleRuleConfig> for lg_postprocess::DownsampleRule {
    fn from(r: &DownsampleRuleConfig) -> Self {
        DownsampleRule { id: r.id, greater: r.greater, x: r.x, y: r.y, target_x: r.target_x, target_y: r.target_y }
    }
}

impl Config {
    /// Load, parse, and validate a `Config` from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })?;
        let cfg: Config = toml::from_str(&s).map_err(ConfigError::Parse)?;

        if cfg.region_size_bytes == 0 {
            return Err(ConfigError::Validation("region_size_bytes must be > 0".into()));
        }
        if cfg.transport.n_frame_buffers == 0 {
            return Err(ConfigError::Validation("transport.n_frame_buffers must be > 0".into()));
        }
        if cfg.capture.width == 0 || cfg.capture.height == 0 {
            return Err(ConfigError::Validation("capture.width and capture.height must be > 0".into()));
        }

        Ok(cfg)
    }

    /// Translate this config into the orchestrator's own config type.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();
        OrchestratorConfig {
            frame_queue_capacity: self.transport.frame_queue_capacity,
            pointer_queue_capacity: self.transport.pointer_queue_capacity,
            n_frame_buffers: self.transport.n_frame_buffers,
            max_frame_payload: self.transport.max_frame_payload,
            align_size: self.transport.align_size,
            throttle_fps: self.transport.throttle_fps,
            subscriber_timeout: std::time::Duration::from_millis(self.transport.subscriber_timeout_ms),
            max_damage_rects: self.transport.max_damage_rects,
            ..defaults
        }
    }

    /// Build the post-process chain this config describes, or `None` if
    /// every stage is disabled (frames stream straight through).
    pub fn build_pp_chain(&self) -> Option<PostProcessChain> {
        let pp = &self.postprocess;
        let mut stages: Vec<Box<dyn lg_postprocess::PostProcessStage>> = Vec::new();

        if pp.hdr16_to_pq10 {
            stages.push(Box::new(Hdr16ToPq10Stage));
        }
        if let Some(nits) = pp.sdr_white_level_nits {
            stages.push(Box::new(SdrWhiteLevelStage::new(nits)));
        }
        if !pp.downsample_rules.is_empty() {
            let rules = pp.downsample_rules.iter().map(Into::into).collect();
            stages.push(Box::new(DownsampleStage::new(rules)));
        }
        if pp.rgb24_pack {
            stages.push(Box::new(Rgb24PackStage));
        }

        if stages.is_empty() {
            None
        } else {
            Some(PostProcessChain::new(stages))
        }
    }
}

/// Manages a live-updating `Config` via a file watcher, mirroring
/// `user_agent::config::ConfigManager` exactly in shape.
pub struct ConfigManager {
    inner: Arc<RwLock<Config>>,
    _watcher: RecommendedWatcher,
}

impl ConfigManager {
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Config::load(path)?;
        let shared = Arc::new(RwLock::new(cfg));
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default().with_poll_interval(std::time::Duration::from_secs(1)))
            .map_err(|e| ConfigError::Validation(format!("watcher error: {e}")))?;

        watcher.watch(path, RecursiveMode::NonRecursive).map_err(|e| ConfigError::Validation(format!("watch error: {e}")))?;

        let cfg_path = path.to_path_buf();
        let shared_clone = Arc::clone(&shared);
        let builder = thread::Builder::new().name("config_watcher".to_string());
        if let Err(e) = builder.spawn(move || {
            for evt in rx {
                let Ok(event) = evt else { continue };
                if let EventKind::Modify(_) = event.kind {
                    match Config::load(&cfg_path) {
                        Ok(new_cfg) => {
                            *shared_clone.write().expect("config lock poisoned") = new_cfg;
                            log::info!("config reloaded");
                        }
                        Err(e) => log::error!("failed to reload config: {e}"),
                    }
                }
            }
        }) {
            return Err(ConfigError::Validation(format!("failed to spawn config watcher thread: {e}")));
        }

        Ok(ConfigManager { inner: shared, _watcher: watcher })
    }

    /// Snapshot-like read of the current config.
    pub fn get(&self) -> Config {
        self.inner.read().expect("config lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
region_size_bytes = 16777216

[transport]
frame_queue_capacity = 4
pointer_queue_capacity = 16
n_frame_buffers = 4
max_frame_payload = 33554432
align_size = 128
throttle_fps = 60
subscriber_timeout_ms = 1000
max_damage_rects = 10

[capture]
backend = "test-pattern"
width = 1920
height = 1080

[postprocess]
hdr16_to_pq10 = false
rgb24_pack = true

[[postprocess.downsample_rules]]
id = 1
greater = true
x = 1920
y = 1080
target_x = 1920
target_y = 1080
"#;

    #[test]
    fn parses_full_sample() {
        let cfg: Config = toml::from_str(SAMPLE).expect("should parse full sample");
        assert_eq!(cfg.region_size_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.transport.n_frame_buffers, 4);
        assert_eq!(cfg.capture.backend, CaptureBackendKind::TestPattern);
        assert_eq!(cfg.capture.width, 1920);
        assert!(cfg.postprocess.rgb24_pack);
        assert_eq!(cfg.postprocess.downsample_rules.len(), 1);
        assert_eq!(cfg.postprocess.downsample_rules[0].target_x, 1920);
    }

    #[test]
    fn missing_capture_section_fails_to_parse() {
        let toml = "region_size_bytes = 1024\n";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn zero_region_size_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "region_size_bytes = 0\n[capture]\nbackend = \"test-pattern\"\nwidth = 1\nheight = 1\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn builds_no_pp_chain_when_every_stage_disabled() {
        let cfg: Config = toml::from_str(
            "region_size_bytes = 1024\n[capture]\nbackend = \"test-pattern\"\nwidth = 1\nheight = 1\n",
        )
        .unwrap();
        assert!(cfg.build_pp_chain().is_none());
    }

    #[test]
    fn builds_pp_chain_with_configured_stages() {
        let cfg: Config = toml::from_str(SAMPLE).unwrap();
        assert!(cfg.build_pp_chain().is_some());
    }
}
