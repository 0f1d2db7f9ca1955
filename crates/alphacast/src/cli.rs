use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;

use alphacast_core::DEFAULT_QUALITY;

use crate::hub::{DEFAULT_FRAME_QUEUE, DEFAULT_SEND_TIMEOUT, HubConfig};

/// alphacast: low-latency transparent video over WebSocket
#[derive(Parser, Debug)]
#[command(name = "alphacast")]
#[command(about = "Stream color + alpha video frames to WebSocket viewers", long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: IpAddr,

    /// Port to bind the HTTP server to
    #[arg(long, default_value_t = 7891)]
    pub port: u16,

    /// JPEG quality for the color plane (1-100)
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Frame rate of the test-pattern producer
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub fps: u32,

    /// Test-pattern frame width
    #[arg(long, default_value_t = 512)]
    pub width: u32,

    /// Test-pattern frame height
    #[arg(long, default_value_t = 512)]
    pub height: u32,

    /// Frames buffered between the producer and the network loop
    #[arg(long, default_value_t = DEFAULT_FRAME_QUEUE)]
    pub queue: usize,

    /// Per-viewer send timeout in milliseconds (0 disables)
    #[arg(long, default_value_t = DEFAULT_SEND_TIMEOUT.as_millis() as u64)]
    pub send_timeout_ms: u64,
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Hub settings derived from the flags
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            frame_queue: self.queue,
            send_timeout: (self.send_timeout_ms > 0)
                .then(|| Duration::from_millis(self.send_timeout_ms)),
        }
    }
}
