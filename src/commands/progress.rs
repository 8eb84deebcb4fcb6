//! Progress reporting with indicatif

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use romlink_core::progress::TransferProgress;
use romlink_core::transfer::{TransferMode, TransferStats};

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
///
/// The bar length is the request's upper bound; when the source runs dry
/// early the bar is shortened to what was actually moved.
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    phase: &'static str,
}

impl IndicatifProgress {
    pub fn new(phase: &'static str) -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            phase,
        }
    }
}

impl TransferProgress for IndicatifProgress {
    fn started(&mut self, mode: TransferMode, limit: u32) {
        let pb = self.multi.add(
            create_progress_bar_with_phase(u64::from(limit), self.phase)
                .unwrap_or_else(|_| ProgressBar::new(u64::from(limit))),
        );
        pb.set_message(mode.name());
        self.current_bar = Some(pb);
    }

    fn slot_started(&mut self, index: u32, address: u32) {
        log::debug!("GROM slot {} at 0x{:08X}", index, address);
    }

    fn advanced(&mut self, bytes: u32) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(u64::from(bytes));
        }
    }

    fn finished(&mut self, stats: &TransferStats) {
        if let Some(pb) = self.current_bar.take() {
            pb.set_length(u64::from(stats.bytes));
            pb.finish_with_message("done");
        }
    }
}
