use std::path::PathBuf;

use anyhow::ensure;
use clap::{Args, Parser};

pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 700;

/// Interpreter variations between CHIP-8 implementations.
///
/// All of them are off by default, which gives the semantics documented in
/// Cowgod's technical reference. Turning all three on matches the COSMAC VIP.
#[derive(Args, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quirks {
    /// 8xy6/8xyE shift Vy into Vx instead of shifting Vx in place
    #[arg(long)]
    pub shift_uses_vy: bool,

    /// Fx55/Fx65 leave I pointing past the last register transferred
    #[arg(long)]
    pub load_store_bumps_index: bool,

    /// 8xy1/8xy2/8xy3 clear VF
    #[arg(long)]
    pub logic_resets_vf: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Run a CHIP-8 ROM in the terminal")]
pub struct Settings {
    /// Path to the ROM image
    pub rom: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    pub ips: u64,

    /// Timer and display refresh rate in Hz
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: u64,

    /// Seed for the random number instruction, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub quirks: Quirks,
}

impl Settings {
    pub fn new(rom: impl Into<PathBuf>) -> Self {
        Settings {
            rom: rom.into(),
            ips: DEFAULT_INSTRUCTIONS_PER_SECOND,
            frame_rate: DEFAULT_FRAME_RATE,
            seed: None,
            quirks: Quirks::default(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.frame_rate > 0, "frame rate must be greater than zero");
        ensure!(
            self.ips >= self.frame_rate,
            "instructions per second ({}) must be at least the frame rate ({})",
            self.ips,
            self.frame_rate
        );
        Ok(())
    }

    pub fn instructions_per_frame(&self) -> u64 {
        self.ips / self.frame_rate
    }

    pub fn rom_stem(&self) -> String {
        self.rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string())
    }
}
