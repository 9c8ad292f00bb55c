// src/confirm.rs
//! Publish gate: the one place the pipeline waits on a human.

use std::io::{self, Write};

use dialoguer::{theme::ColorfulTheme, Confirm};
use tracing::{info, warn};

use crate::pipeline::ContentBundle;

pub trait PublishGate: Send + Sync {
    /// `true` to publish the bundle, `false` to stop with drafts on disk.
    fn approve(&self, bundle: &ContentBundle) -> bool;
}

/// `--yes`: approve without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl PublishGate for AutoApprove {
    fn approve(&self, _bundle: &ContentBundle) -> bool {
        true
    }
}

/// Always answers the same. Handy for dry runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl PublishGate for FixedAnswer {
    fn approve(&self, _bundle: &ContentBundle) -> bool {
        self.0
    }
}

/// Show the draft, then a yes/no prompt on the terminal. Defaults to no;
/// Esc, a missing TTY or a read error all count as no.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl PublishGate for TerminalPrompt {
    fn approve(&self, bundle: &ContentBundle) -> bool {
        if let Err(e) = preview(&mut io::stdout().lock(), bundle) {
            warn!(error = %e, "could not show the draft, treating as no");
            return false;
        }
        match Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Publish this post?")
            .default(false)
            .interact_opt()
        {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                info!("confirmation dismissed");
                false
            }
            Err(e) => {
                warn!(error = %e, "could not read confirmation, treating as no");
                false
            }
        }
    }
}

/// The post text and image path, framed.
pub fn preview<W: Write>(out: &mut W, bundle: &ContentBundle) -> io::Result<()> {
    writeln!(out, "The following post will be published:")?;
    writeln!(out, "{}", "-".repeat(50))?;
    writeln!(out, "{}", bundle.post.text)?;
    writeln!(out, "{}", "-".repeat(50))?;
    match &bundle.image {
        Some(img) => writeln!(out, "Image: {}", img.path.display())?,
        None => writeln!(out, "Image: none")?,
    }
    out.flush()
}
