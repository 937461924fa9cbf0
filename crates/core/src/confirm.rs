use crate::planner::RenamePlan;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

pub trait Confirm {
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Asked once per batch, before anything moves. Implementations that
    /// show the pending renames override this; the default asks `message` only.
    fn confirm_plan(&mut self, plan: &RenamePlan, message: &str) -> Result<bool> {
        let _ = plan;
        self.confirm(message)
    }
}

/// Answers yes without asking; used for `--noconfirm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on `output` and accepts only a line reading `ok`.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Confirm for LinePrompt<R, W> {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        writeln!(self.output, "{message}").context("could not write prompt")?;
        write!(
            self.output,
            "Enter 'ok' to continue (any other response will abort): "
        )
        .context("could not write prompt")?;
        self.output.flush().context("could not write prompt")?;

        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context("could not read confirmation")?;
        Ok(answer.trim().eq_ignore_ascii_case("ok"))
    }
}
