//! `pvpn-rotator extract` — turn a pasted server table into a list.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use rotator_core::{extract_server_codes, ListFiles, ListId};

use super::home;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Text file to scan, or `-` for stdin.
    pub input: PathBuf,

    /// Replace this server list with the extracted codes.
    #[arg(long, conflicts_with = "output")]
    pub list: Option<ListId>,

    /// Write the codes to this file, one per line.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl ExtractArgs {
    pub fn run(self) -> Result<()> {
        let text = self.read_input()?;
        let codes = extract_server_codes(&text);
        if codes.is_empty() {
            bail!("no server codes found in {}", self.input.display());
        }

        if let Some(list) = self.list {
            let home = home()?;
            ListFiles::at(&home)
                .overwrite(list, &codes)
                .with_context(|| format!("failed to write list {list}"))?;
            println!("{} Wrote {} servers to list {list}", "✓".green(), codes.len());
        } else if let Some(output) = &self.output {
            let mut contents = codes.join("\n");
            contents.push('\n');
            std::fs::write(output, contents)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "{} Wrote {} servers to {}",
                "✓".green(),
                codes.len(),
                output.display()
            );
        } else {
            for code in &codes {
                println!("{code}");
            }
        }
        Ok(())
    }

    fn read_input(&self) -> Result<String> {
        if self.input.as_os_str() == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            return Ok(text);
        }
        std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read {}", self.input.display()))
    }
}
