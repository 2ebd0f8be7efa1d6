//! Colored output helpers for the CLI.

use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "careflow".bright_cyan().bold(),
                version.dimmed(),
                "chat-driven supply approvals".bright_white()
            );
        } else {
            println!("\n   careflow {}\n   chat-driven supply approvals\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    pub fn table_header(&self, columns: &[&str]) {
        let header = row_text(columns);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 16).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 16));
        }
    }

    /// Print a table row; `flagged` rows are highlighted.
    pub fn table_row(&self, values: &[&str], flagged: bool) {
        let row = row_text(values);
        if self.colored && flagged {
            println!("    {}", row.yellow());
        } else {
            println!("    {}", row);
        }
    }
}

fn row_text(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{:<15}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_modes() {
        assert!(Output::new().colored);
        assert!(Output::default().colored);
        assert!(!Output::no_color().colored);
    }

    #[test]
    fn test_row_text_pads_columns() {
        assert_eq!(row_text(&["a", "b"]), format!("{:<15} {:<15}", "a", "b"));
        assert_eq!(row_text(&[]), "");
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::new(), Output::no_color()] {
            output.banner();
            output.success("ok");
            output.info("info");
            output.warning("warn");
            output.error("error");
            output.created("config", "careflow.toml");
            output.skipped("careflow.toml", "already exists");
            output.header("Header");
            output.kv("key", "value");
            output.hint("hint");
            output.command("careflow-server");
            output.table_header(&["Location", "Item"]);
            output.table_row(&["ICU-01", "N95 Masks"], true);
        }
    }
}
