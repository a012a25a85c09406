//! Clone, commit a timestamp file, push.
//!
//! Every step shells out to the system `git` binary. Credentials for
//! `https://` remotes are embedded in the clone URL; logs only show the URL
//! as configured.

use std::path::Path;
use std::process::Stdio;

use chrono::Utc;
use gitload_common::config::TickConfig;
use gitload_common::{GitloadError, Result, Token};
use tokio::process::Command;
use tracing::{debug, info};

pub const TICK_FILE: &str = "tick.txt";
pub const TICK_MESSAGE: &str = "tick tick!";

/// Inserts `user:token@` after the scheme of an `https://` URL that carries
/// no userinfo yet. Other URLs come back unchanged.
pub fn authenticated_url(url: &str, user: &str, token: Option<&Token>) -> String {
    let (Some(rest), Some(token)) = (url.strip_prefix("https://"), token) else {
        return url.to_string();
    };
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.contains('@') {
        return url.to_string();
    }
    format!("https://{}:{}@{}", user, token.expose(), rest)
}

struct Git {
    envs: Vec<(&'static str, &'static str)>,
    verbose: bool,
}

impl Git {
    fn new(config: &TickConfig) -> Self {
        let mut envs = vec![("GIT_TERMINAL_PROMPT", "0")];
        if config.verbose {
            envs.push(("GIT_CURL_VERBOSE", "1"));
        }
        Self { envs, verbose: config.verbose }
    }

    async fn output(&self, dir: Option<&Path>, args: &[&str]) -> Result<std::process::Output> {
        let subcommand = subcommand(args);
        let mut cmd = Command::new("git");
        if let Some(dir) = dir {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args);
        cmd.envs(self.envs.iter().copied());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(subcommand, "spawning git");
        let output = cmd.output().await.map_err(|e| GitloadError::Git {
            command: subcommand.to_string(),
            message: format!("failed to spawn: {}", e),
        })?;
        if let Some(trace) = self.verbose_report(&output.stderr) {
            info!(subcommand, "git stderr:\n{}", trace);
        }
        Ok(output)
    }

    /// Stderr worth logging on its own: only in verbose mode, never empty.
    fn verbose_report(&self, stderr: &[u8]) -> Option<String> {
        if !self.verbose {
            return None;
        }
        let text = String::from_utf8_lossy(stderr).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    /// Runs `git <args>` (inside `dir` when given) and returns trimmed stdout
    /// and stderr.
    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<(String, String)> {
        let output = self.output(dir, args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(GitloadError::Git {
                command: subcommand(args).to_string(),
                message: format!("{}: {}", output.status, stderr),
            });
        }
        Ok((stdout, stderr))
    }

    /// `rev-parse --verify --quiet <rev>`. Exit status 1 means the revision
    /// does not exist; any other failure is an error.
    async fn resolve(&self, dir: &Path, rev: &str) -> Result<Option<String>> {
        let output = self.output(Some(dir), &["rev-parse", "--verify", "--quiet", rev]).await?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
            Some(1) => Ok(None),
            _ => Err(GitloadError::Git {
                command: "rev-parse".into(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }
}

/// First argument that is neither an option nor a `-c` value.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
            continue;
        }
        if !arg.starts_with('-') {
            return arg;
        }
    }
    "git"
}

/// Runs the whole workflow and returns the pushed commit id.
pub async fn run_tick(config: &TickConfig, token: Option<&Token>) -> Result<String> {
    let tmp = tempfile::Builder::new().prefix("silver-eureka-").tempdir()?;
    let repo = tmp.path().join("testing");
    let repo_arg = repo.to_string_lossy().to_string();
    let git = Git::new(config);

    info!(url = %config.url, path = %repo.display(), "cloning");
    let remote = authenticated_url(&config.url, &config.user, token);
    git.run(None, &["clone", "--quiet", &remote, &repo_arg]).await?;

    let remote_branch = format!("origin/{}^{{commit}}", config.branch);
    let start = match git.resolve(&repo, &remote_branch).await? {
        Some(sha) => sha,
        None => {
            debug!(branch = %config.branch, "no remote branch, starting from HEAD");
            git.run(Some(&repo), &["rev-parse", "--verify", "HEAD"]).await?.0
        }
    };

    info!(branch = %config.branch, %start, "creating branch");
    git.run(Some(&repo), &["checkout", "--quiet", "-B", &config.branch, &start]).await?;

    tokio::fs::write(repo.join(TICK_FILE), format!("{}\n", Utc::now().timestamp())).await?;
    git.run(Some(&repo), &["add", TICK_FILE]).await?;

    let name = format!("user.name={}", config.user);
    let email = format!("user.email={}@users.noreply.github.com", config.user);
    git.run(
        Some(&repo),
        &["-c", &name, "-c", &email, "-c", "commit.gpgsign=false", "commit", "--quiet", "-m", TICK_MESSAGE],
    )
    .await?;
    let (commit, _) = git.run(Some(&repo), &["rev-parse", "HEAD"]).await?;
    let (shown, _) = git.run(Some(&repo), &["show", "--no-patch", "--format=fuller", "HEAD"]).await?;
    info!("created commit:\n{}", shown);

    info!("pushing");
    let refspec = format!("{}:refs/heads/{}", commit, config.branch);
    let mut push = vec!["push"];
    if config.show_progress {
        push.push("--progress");
    }
    push.extend(["origin", refspec.as_str()]);
    let (_, progress) = git.run(Some(&repo), &push).await?;
    if config.show_progress && !config.verbose && !progress.is_empty() {
        info!("progress:\n{}", progress);
    }

    info!("DONE!");
    Ok(commit)
}
