//! Round trip between the simulator's compiled `.bin` scenarios and XML via
//! the `serz.exe` converter shipped in the RailWorks folder.
//!
//! The converter is a Windows binary. On Windows and under WSL it runs
//! directly; on other unixes it runs through wine. A scenario arriving as
//! `.bin` cannot be processed at all without it, so a missing converter is
//! fatal up front rather than a per-file surprise.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

#[derive(Debug)]
pub struct Serz {
    exe: PathBuf,
}

impl Serz {
    /// Find `serz.exe` in the RailWorks folder.
    pub fn locate(railworks: &Path) -> Result<Serz> {
        let exe = railworks.join("serz.exe");
        if !exe.is_file() {
            bail!(
                "{} not found; check that the RailWorks folder is set correctly",
                exe.display()
            );
        }
        Ok(Serz { exe })
    }

    /// Decode a compiled scenario to XML.
    pub fn bin_to_xml(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(input, &format!("/xml:{}", output.display()))
    }

    /// Compile edited XML back to the `.bin` form.
    pub fn xml_to_bin(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(input, &format!("/bin:{}", output.display()))
    }

    fn run(&self, input: &Path, conversion: &str) -> Result<()> {
        let mut command = self.command()?;
        command.arg(input).arg(conversion);
        debug!(?command, "running serz");
        let output = command
            .output()
            .with_context(|| format!("cannot run {}", self.exe.display()))?;
        if !output.status.success() {
            bail!(
                "serz failed on {}: {}",
                input.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    #[cfg(windows)]
    fn command(&self) -> Result<Command> {
        Ok(Command::new(&self.exe))
    }

    #[cfg(not(windows))]
    fn command(&self) -> Result<Command> {
        // WSL executes Windows binaries natively; elsewhere wine has to
        // carry the converter.
        if running_under_wsl() {
            return Ok(Command::new(&self.exe));
        }
        let wine = which::which("wine")
            .context("wine is required to run serz.exe outside Windows and was not found")?;
        let mut command = Command::new(wine);
        command.arg(&self.exe);
        Ok(command)
    }
}

#[cfg(not(windows))]
fn running_under_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|v| kernel_is_wsl(&v))
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn kernel_is_wsl(version: &str) -> bool {
    version.to_ascii_lowercase().contains("microsoft")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_converter_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = Serz::locate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("serz.exe"));
        assert!(err.to_string().contains("RailWorks"));
    }

    #[test]
    fn converter_found_next_to_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("serz.exe"), "").unwrap();
        assert!(Serz::locate(dir.path()).is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn wsl_kernel_detection() {
        assert!(kernel_is_wsl(
            "Linux version 5.15.90.1-microsoft-standard-WSL2"
        ));
        assert!(!kernel_is_wsl("Linux version 6.8.0-41-generic"));
    }
}
