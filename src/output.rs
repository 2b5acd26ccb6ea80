//! Output formatting and styling module.
//!
//! Provides a centralized interface for all shell output, including colored
//! messages, the apply progress bar, and the per-destination summary table.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;

/// Manages all shell output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for apply
/// - Summary tables of pending assignments
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortling::output::OutputFormatter;
    /// OutputFormatter::success("Moved 3 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a prompt without a trailing newline.
    pub fn prompt(message: &str) {
        print!("{} ", message.bold());
        let _ = std::io::stdout().flush();
    }

    /// Creates and returns a progress bar for file moves.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortling::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints pending assignment counts per destination.
    ///
    /// # Arguments
    ///
    /// * `rows` - Destination folders with the number of files assigned to each,
    ///   in display order
    pub fn summary_table(rows: &[(&Path, usize)]) {
        Self::header("PENDING MOVES");

        let labels: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(i, (path, _))| format!("[{}] {}", i + 1, display_name(path)))
            .collect();

        let width = labels.iter().map(String::len).max().unwrap_or(0).max(11);

        println!(
            "{:<width$} | {}",
            "Destination".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        let mut total = 0;
        for (label, (_, count)) in labels.iter().zip(rows) {
            total += count;
            println!(
                "{:<width$} | {} {}",
                label,
                count.to_string().green(),
                if *count == 1 { "file" } else { "files" },
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            if total == 1 { "file" } else { "files" },
            width = width
        );
    }
}

/// Last path component, or the whole path if there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
