//! Terminal styling for stdout reports.

use owo_colors::OwoColorize;
use snipesync_core::clean::Orphan;
use snipesync_core::verify::SyncHealth;
use supports_color::Stream;

/// Preview length for long device lists.
pub(crate) const PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn stdout() -> Self {
        Self {
            enabled: supports_color::on(Stream::Stdout).is_some(),
        }
    }

    pub fn ok(self, text: &str) -> String {
        self.paint(text, |t| t.green().to_string())
    }

    pub fn warn(self, text: &str) -> String {
        self.paint(text, |t| t.yellow().to_string())
    }

    pub fn err(self, text: &str) -> String {
        self.paint(text, |t| t.red().to_string())
    }

    pub fn bold(self, text: &str) -> String {
        self.paint(text, |t| t.bold().to_string())
    }

    pub fn health(self, health: SyncHealth) -> String {
        let label = health.to_string();
        match health {
            SyncHealth::Perfect | SyncHealth::Good => self.ok(&label),
            SyncHealth::NeedsAttention => self.warn(&label),
            SyncHealth::Critical => self.err(&label),
        }
    }

    pub fn status(self, ok: bool) -> String {
        if ok { self.ok("ok") } else { self.err("FAILED") }
    }

    fn paint(self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.enabled {
            style(text)
        } else {
            text.to_string()
        }
    }
}

/// Prints the first [`PREVIEW_LIMIT`] targets of a deletion plan.
pub(crate) fn print_targets(targets: &[Orphan]) {
    for orphan in targets.iter().take(PREVIEW_LIMIT) {
        println!(
            "  #{:<6} {:<16} {:<32} {}",
            orphan.asset_id,
            orphan.serial.as_deref().unwrap_or("-"),
            orphan.name,
            orphan.manufacturer
        );
    }
    if targets.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", targets.len() - PREVIEW_LIMIT);
    }
}

pub(crate) fn print_preview(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{label} ({}):", items.len());
    for item in items.iter().take(PREVIEW_LIMIT) {
        println!("  {item}");
    }
    if items.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", items.len() - PREVIEW_LIMIT);
    }
}
