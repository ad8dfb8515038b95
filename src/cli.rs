use std::io::{BufRead, Write};

use clap::Parser;

use crate::error::{Error, Result};
use crate::links::Mode;

/// cardlens — AI business-rule review of pull requests linked to a card
#[derive(Parser, Debug, Clone)]
#[command(name = "cardlens", version, about)]
pub struct Cli {
    /// Analyze a single pull request (and the card it references)
    #[arg(long, value_name = "ID", value_parser = clap::value_parser!(u64).range(1..))]
    pub pr: Option<u64>,

    /// Analyze a card and every pull request it links to
    #[arg(long, value_name = "ID", conflicts_with = "pr", value_parser = clap::value_parser!(u64).range(1..))]
    pub card: Option<u64>,

    /// Path to config file (default: .cardlens/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Organization base URL
    #[arg(long)]
    pub org_url: Option<String>,

    /// Work item field that receives the review report
    #[arg(long)]
    pub field: Option<String>,

    /// Generation model to use
    #[arg(long)]
    pub model: Option<String>,
}

impl Cli {
    /// Operating mode and target id, when given as flags.
    pub fn target(&self) -> Option<(Mode, u64)> {
        if let Some(id) = self.pr {
            Some((Mode::SinglePr, id))
        } else {
            self.card.map(|id| (Mode::WholeCard, id))
        }
    }
}

/// Interactive mode/id selector, used when neither `--pr` nor `--card`
/// was given.
pub fn prompt_target(stdin: &mut dyn BufRead, stderr: &mut dyn Write) -> Result<(Mode, u64)> {
    writeln!(stderr, "Choose the operating mode:").ok();
    writeln!(stderr, "  1) analyze one pull request").ok();
    writeln!(stderr, "  2) analyze a card and all linked pull requests").ok();
    write!(stderr, "Choice [1-2]: ").ok();
    stderr.flush().ok();

    let mut line = String::new();
    stdin
        .read_line(&mut line)
        .map_err(|e| Error::Input(format!("failed to read stdin: {e}")))?;

    let mode = match line.trim() {
        "1" => Mode::SinglePr,
        "2" => Mode::WholeCard,
        other => return Err(Error::Input(format!("invalid choice: {other}"))),
    };

    let what = match mode {
        Mode::SinglePr => "pull request",
        Mode::WholeCard => "card",
    };
    write!(stderr, "Enter the {what} id: ").ok();
    stderr.flush().ok();

    let mut line = String::new();
    stdin
        .read_line(&mut line)
        .map_err(|e| Error::Input(format!("failed to read stdin: {e}")))?;

    let id: u64 = line
        .trim()
        .parse()
        .map_err(|_| Error::Input(format!("invalid id: {}", line.trim())))?;
    if id == 0 {
        return Err(Error::Input("id must be a positive integer".to_string()));
    }

    Ok((mode, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pr_mode() {
        let cli = Cli::parse_from(["cardlens", "--pr", "42"]);
        assert_eq!(cli.target(), Some((Mode::SinglePr, 42)));
    }

    #[test]
    fn test_parse_card_mode() {
        let cli = Cli::parse_from(["cardlens", "--card", "500"]);
        assert_eq!(cli.target(), Some((Mode::WholeCard, 500)));
    }

    #[test]
    fn test_parse_no_mode() {
        let cli = Cli::parse_from(["cardlens"]);
        assert!(cli.target().is_none());
    }

    #[test]
    fn test_pr_and_card_conflict() {
        let result = Cli::try_parse_from(["cardlens", "--pr", "42", "--card", "500"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_id_rejected() {
        assert!(Cli::try_parse_from(["cardlens", "--pr", "0"]).is_err());
        assert!(Cli::try_parse_from(["cardlens", "--card", "0"]).is_err());
    }

    #[test]
    fn test_parse_all_overrides() {
        let cli = Cli::parse_from([
            "cardlens",
            "--card",
            "500",
            "--config",
            "/tmp/c.toml",
            "--org-url",
            "https://dev.example.com/org",
            "--field",
            "Custom.ReviewAnalysis",
            "--model",
            "gemini-2.5-pro",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert_eq!(cli.org_url.as_deref(), Some("https://dev.example.com/org"));
        assert_eq!(cli.field.as_deref(), Some("Custom.ReviewAnalysis"));
        assert_eq!(cli.model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn test_prompt_target_pr_mode() {
        let mut input = std::io::Cursor::new(b"1\n42\n");
        let mut output = Vec::new();
        let target = prompt_target(&mut input, &mut output).unwrap();
        assert_eq!(target, (Mode::SinglePr, 42));
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("operating mode"));
        assert!(shown.contains("pull request id"));
    }

    #[test]
    fn test_prompt_target_card_mode() {
        let mut input = std::io::Cursor::new(b"2\n500\n");
        let mut output = Vec::new();
        let target = prompt_target(&mut input, &mut output).unwrap();
        assert_eq!(target, (Mode::WholeCard, 500));
    }

    #[test]
    fn test_prompt_target_invalid_choice() {
        let mut input = std::io::Cursor::new(b"3\n");
        let mut output = Vec::new();
        let err = prompt_target(&mut input, &mut output).unwrap_err();
        assert!(err.to_string().contains("invalid choice"));
    }

    #[test]
    fn test_prompt_target_invalid_id() {
        let mut input = std::io::Cursor::new(b"1\nforty-two\n");
        let mut output = Vec::new();
        let err = prompt_target(&mut input, &mut output).unwrap_err();
        assert!(err.to_string().contains("invalid id"));
    }

    #[test]
    fn test_prompt_target_zero_id() {
        let mut input = std::io::Cursor::new(b"2\n0\n");
        let mut output = Vec::new();
        let err = prompt_target(&mut input, &mut output).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
