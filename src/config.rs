use crate::capture::CaptureMode;

/// Operating profile for one capture session. The replay and live
/// deployments of the same model run with different constants; both are
/// spelled out here so neither set is buried in the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ModeConfig {
    pub mode: CaptureMode,
    /// Stand-in flow duration fed to the feature extractor.
    pub duration_hint: f64,
    /// A record is labeled Attack when its probability is strictly above
    /// this.
    pub threshold: f64,
    /// Bound on the visible result window.
    pub window_size: usize,
    /// Publish a table snapshot after every this-many classified records;
    /// 1 means every record.
    pub publish_every: usize,
}

impl ModeConfig {
    pub fn replay() -> Self {
        ModeConfig {
            mode: CaptureMode::Replay,
            duration_hint: 0.1,
            threshold: 0.7,
            window_size: 15,
            publish_every: 10,
        }
    }

    pub fn live() -> Self {
        ModeConfig {
            mode: CaptureMode::Live,
            duration_hint: 1.0,
            threshold: 0.5,
            window_size: 20,
            publish_every: 1,
        }
    }

    pub fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Replay => Self::replay(),
            CaptureMode::Live => Self::live(),
        }
    }
}
