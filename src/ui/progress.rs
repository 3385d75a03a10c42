//! Progress indicators with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};

/// Per-layer upload progress.
///
/// Fed with the "layer N/M" labels the registry client receives; shows
/// an indicatif progress bar in interactive mode, plain text in CI.
pub struct PushProgress {
    bar: Option<ProgressBar>,
}

impl PushProgress {
    /// Create an upload progress indicator
    pub fn new(ctx: &UiContext) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {spinner:.cyan} Uploading  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                    .progress_chars("━╸─"),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            None
        };
        Self { bar }
    }

    /// Report a layer upload starting. Parses `layer N/M` labels.
    pub fn on_layer(&self, label: &str) {
        if let Some((n, total)) = parse_layer_label(label) {
            if let Some(ref bar) = self.bar {
                bar.set_length(total);
                bar.set_position(n);
                bar.set_message(label.to_string());
            } else {
                println!("  {label}");
            }
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Parse a label like `layer N/M`
fn parse_layer_label(label: &str) -> Option<(u64, u64)> {
    let rest = label.strip_prefix("layer ")?;
    let (n, total) = rest.split_once('/')?;
    Some((n.trim().parse().ok()?, total.trim().parse().ok()?))
}
