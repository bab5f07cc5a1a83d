use anyhow::Result;
use clap::Subcommand;
use xshell::{Shell, cmd};

#[derive(Subcommand)]
pub enum Command {
    /// Apply rustfmt to the whole workspace
    Fmt,
    /// Run all CI checks (fmt check, clippy, tests)
    Ci,
    /// Run tests, forwarding any extra arguments to cargo test
    Test {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the pre-commit checks (fmt check and clippy)
    Precommit,
    /// Manage git hooks
    Hooks {
        #[command(subcommand)]
        command: HooksCommand,
    },
}

#[derive(Subcommand)]
pub enum HooksCommand {
    /// Install git hooks
    Install,
}

impl Command {
    pub fn run(self, sh: &Shell) -> Result<()> {
        match self {
            Command::Fmt => {
                cmd!(sh, "cargo fmt --all").run()?;
                Ok(())
            }
            Command::Ci => {
                run_fmt_check(sh)?;
                run_clippy(sh)?;
                run_tests(sh, &[])
            }
            Command::Test { args } => run_tests(sh, &args),
            Command::Precommit => {
                run_fmt_check(sh)?;
                run_clippy(sh)?;
                eprintln!("Precommit checks passed!");
                Ok(())
            }
            Command::Hooks { command } => match command {
                HooksCommand::Install => install_hooks(sh),
            },
        }
    }
}

fn install_hooks(sh: &Shell) -> Result<()> {
    let hooks_src = sh.current_dir().join("hooks");
    let hooks_dst = sh.current_dir().join(".git/hooks");

    if !hooks_src.exists() {
        anyhow::bail!("hooks directory not found. Are you in the repository root?");
    }

    if !hooks_dst.exists() {
        anyhow::bail!(".git/hooks directory not found. Is this a git repository?");
    }

    let pre_commit_src = hooks_src.join("pre-commit");
    let pre_commit_dst = hooks_dst.join("pre-commit");

    if pre_commit_src.exists() {
        eprintln!("Installing pre-commit hook...");
        std::fs::copy(&pre_commit_src, &pre_commit_dst)?;

        // Make the hook executable on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&pre_commit_dst)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&pre_commit_dst, perms)?;
        }

        eprintln!("Pre-commit hook installed to .git/hooks/pre-commit");
    } else {
        eprintln!("No pre-commit hook found in hooks directory");
    }

    eprintln!("Git hooks installed successfully!");
    Ok(())
}

fn run_fmt_check(sh: &Shell) -> Result<()> {
    eprintln!("Running cargo fmt check...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn run_clippy(sh: &Shell) -> Result<()> {
    eprintln!("Running cargo clippy...");
    cmd!(sh, "cargo clippy --all-targets --workspace -- -D warnings").run()?;
    Ok(())
}

fn run_tests(sh: &Shell, args: &[String]) -> Result<()> {
    eprintln!("Running cargo test...");
    cmd!(sh, "cargo test --workspace {args...}").run()?;
    Ok(())
}
