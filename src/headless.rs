//! Windowless mode: run the session for a fixed number of ticks and log them

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use satmap::{Clock, Frame, MapSession, Propagate};

use crate::ui::frame_summary;

#[derive(Args, Debug, Clone)]
pub struct HeadlessArgs {
    /// Log frames instead of opening a window
    #[arg(long)]
    pub headless: bool,
    /// Number of refresh ticks to run in headless mode
    #[arg(long, default_value_t = 10)]
    pub ticks: u64,
}

/// Log `ticks` delivered frames; returns the last one
pub fn run(
    session: &mut MapSession,
    propagator: Arc<dyn Propagate>,
    clock: Arc<dyn Clock>,
    ticks: u64,
) -> Result<Option<Frame>> {
    let frames = session.start(propagator, clock)?;
    log::info!("Running {} ticks without a window", ticks);

    let mut last = None;
    for _ in 0..ticks {
        let frame = frames
            .recv()
            .context("Refresh worker stopped before all ticks ran")?;
        log::info!("{}", frame_summary(&frame));
        last = Some(frame);
    }

    session.stop();
    Ok(last)
}
