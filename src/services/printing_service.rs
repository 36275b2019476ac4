//! In-house printing: HTML to PDF with wkhtmltopdf, then a CUPS print job.
//!
//! Both steps shell out. Documents travel over stdin/stdout so nothing is
//! written to a shared temporary path.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::error::IntegrationError;

/// Title given to print jobs submitted from the queue.
pub const PRINT_JOB_TITLE: &str = "QueuedLetterJob";

#[async_trait]
pub trait PrintSpooler: Send + Sync {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, IntegrationError>;

    /// Submit `pdf` to `printer` and return the CUPS job id.
    async fn print_pdf(
        &self,
        pdf: &[u8],
        printer: &str,
        title: &str,
    ) -> Result<String, IntegrationError>;
}

/// wkhtmltopdf plus the CUPS command line tools (`lpstat`, `lp`).
pub struct CupsSpooler {
    wkhtmltopdf_path: String,
    server: String,
}

impl CupsSpooler {
    pub fn new(wkhtmltopdf_path: String, cups_host: &str, cups_port: u16) -> Self {
        Self {
            wkhtmltopdf_path,
            server: format!("{cups_host}:{cups_port}"),
        }
    }

    /// Names of the printers the CUPS server knows about.
    async fn printers(&self) -> Result<Vec<String>, IntegrationError> {
        match run("lpstat", &["-h", &self.server, "-p"], None).await {
            Ok(stdout) => Ok(parse_printer_names(&String::from_utf8_lossy(&stdout))),
            Err(IntegrationError::Command { message, .. })
                if message.contains("No destinations added") =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PrintSpooler for CupsSpooler {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, IntegrationError> {
        run(
            &self.wkhtmltopdf_path,
            &["--quiet", "--encoding", "utf-8", "-", "-"],
            Some(html.as_bytes().to_vec()),
        )
        .await
    }

    async fn print_pdf(
        &self,
        pdf: &[u8],
        printer: &str,
        title: &str,
    ) -> Result<String, IntegrationError> {
        if !is_valid_printer_name(printer) {
            return Err(IntegrationError::PrinterNotFound(printer.to_string()));
        }
        if !self.printers().await?.iter().any(|name| name == printer) {
            return Err(IntegrationError::PrinterNotFound(printer.to_string()));
        }

        let stdout = run(
            "lp",
            &["-h", &self.server, "-d", printer, "-t", title],
            Some(pdf.to_vec()),
        )
        .await?;

        let stdout = String::from_utf8_lossy(&stdout);
        parse_job_id(&stdout).ok_or_else(|| IntegrationError::InvalidResponse {
            service: "CUPS",
            message: format!("no job id in lp output: {}", stdout.trim()),
        })
    }
}

/// Run a command, optionally feeding `input` on stdin, and return stdout.
async fn run(
    program: &str,
    args: &[&str],
    input: Option<Vec<u8>>,
) -> Result<Vec<u8>, IntegrationError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // stdin is written from its own task so a full stdout pipe cannot
    // block the writer
    let writer = match (input, child.stdin.take()) {
        (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        })),
        _ => None,
    };

    let output = child.wait_with_output().await?;
    let written = match writer {
        Some(writer) => writer.await.map_err(|e| IntegrationError::Command {
            command: program.to_string(),
            message: format!("stdin writer failed: {e}"),
        })?,
        None => Ok(()),
    };

    // A failing command usually closes stdin early; its own error is the
    // useful one
    if !output.status.success() {
        return Err(IntegrationError::Command {
            command: program.to_string(),
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    written?;
    Ok(output.stdout)
}

/// CUPS destination names may not contain whitespace, `/` or `#`; a
/// leading `-` would be read as an option.
pub fn is_valid_printer_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 127
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_graphic() && c != '/' && c != '#')
}

/// Parse `lpstat -p` output (`printer Office is idle.  enabled since ...`).
pub fn parse_printer_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("printer "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Parse `lp` output (`request id is Office-42 (0 file(s))`).
pub fn parse_job_id(output: &str) -> Option<String> {
    output
        .split("request id is ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_read_from_lp_output() {
        assert_eq!(
            parse_job_id("request id is Office-42 (0 file(s))\n").as_deref(),
            Some("Office-42")
        );
        assert_eq!(parse_job_id("lp: error - no default destination"), None);
    }

    #[test]
    fn printer_names_are_read_from_lpstat_output() {
        let output = "printer Office is idle.  enabled since Mon 01 Jan 2025\n\
                      \tReady\n\
                      printer Lobby_Laser disabled since Tue 02 Jan 2025 -\n";

        assert_eq!(parse_printer_names(output), vec!["Office", "Lobby_Laser"]);
        assert!(parse_printer_names("").is_empty());
    }

    #[test]
    fn printer_names_that_could_be_options_are_rejected() {
        assert!(is_valid_printer_name("Office"));
        assert!(is_valid_printer_name("HP_LaserJet-4"));
        assert!(!is_valid_printer_name(""));
        assert!(!is_valid_printer_name("-o evil"));
        assert!(!is_valid_printer_name("two words"));
        assert!(!is_valid_printer_name("a/b"));
    }

    #[tokio::test]
    async fn run_pipes_stdin_to_stdout() {
        let output = run("cat", &[], Some(b"letter body".to_vec())).await.unwrap();
        assert_eq!(output, b"letter body");
    }

    #[tokio::test]
    async fn failing_commands_report_their_name() {
        let err = run("false", &[], None).await.unwrap_err();
        assert!(matches!(err, IntegrationError::Command { ref command, .. } if command == "false"));
    }
}
