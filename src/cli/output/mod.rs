//! Output formatting for lookup results

use crate::cli::actions::Report;
use crate::cli::error::Result;
use crate::core::cmd::CmdId;
use colored::Colorize;

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Plain,
    Json,
}

impl OutputStyle {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Plain
        }
    }
}

/// Print a finished run and turn a non-Ok status into an error
pub fn print_report(report: Report, style: OutputStyle) -> Result<()> {
    match style {
        OutputStyle::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            report.into_result().map(|_| ())
        }
        OutputStyle::Plain => {
            let report = report.into_result()?;
            if report.outcome.result.is_empty() {
                println!("{}", report.message().dimmed());
            } else if report.kind.writes_database() {
                // gtags diagnostics
                eprint!("{}", report.outcome.result.yellow());
            } else {
                for line in report.outcome.result.lines() {
                    println!("{}", format_line(report.kind, line));
                }
            }
            Ok(())
        }
    }
}

/// Colorize a `path:line:text` result line
pub fn format_line(kind: CmdId, line: &str) -> String {
    if matches!(kind, CmdId::AutoComplete | CmdId::AutoCompleteSymbol | CmdId::Version) {
        return line.to_string();
    }

    let mut parts = line.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(path), Some(lineno), Some(text)) if lineno.parse::<u32>().is_ok() => {
            format!("{}:{}:{}", path.magenta(), lineno.green(), text)
        }
        _ => line.magenta().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(
            format_line(CmdId::FindDefinition, "src/a.c:10:int main(void)"),
            "src/a.c:10:int main(void)"
        );
        assert_eq!(format_line(CmdId::FindFile, "src/a.c"), "src/a.c");
        assert_eq!(format_line(CmdId::AutoComplete, "main"), "main");
        colored::control::unset_override();
    }

    #[test]
    fn test_output_style_from_flag() {
        assert_eq!(OutputStyle::from_flag(true), OutputStyle::Json);
        assert_eq!(OutputStyle::from_flag(false), OutputStyle::Plain);
    }
}
