use crate::boundary::BuildWarning;
use crate::domain::branch::DETACHED_HEAD;
use crate::domain::tag::{Tag, TAG_MESSAGE};
use crate::error::{BuildError, Result};
use crate::git::{TagSource, GITHUB_TOKEN_ENV};
use git2::{
    Cred, CredentialType, DescribeFormatOptions, DescribeOptions, Direction, ErrorClass,
    ErrorCode, PushOptions, RemoteCallbacks, Repository, Signature,
};
use std::path::Path;
use tracing::{debug, info, warn};

const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Tag source backed by a local repository and its remote
pub struct Git2TagSource {
    repo: Repository,
    remote: String,
}

impl Git2TagSource {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P, remote: impl Into<String>) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Ok(Git2TagSource {
            repo,
            remote: remote.into(),
        })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Repository, remote: impl Into<String>) -> Self {
        Git2TagSource {
            repo,
            remote: remote.into(),
        }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(signature) => Ok(signature),
            // CI checkouts often have no user configured
            Err(_) => Ok(Signature::now("universal-build", "universal-build@localhost")?),
        }
    }
}

fn github_token() -> Option<String> {
    std::env::var(GITHUB_TOKEN_ENV).ok().filter(|t| !t.is_empty())
}

/// Credentials callback: GitHub token over HTTPS, then SSH keys, then the SSH agent
fn remote_callbacks<'a>(token: Option<String>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = &token {
                return Cred::userpass_plaintext("x-access-token", token);
            }
        }

        if allowed_types.contains(CredentialType::SSH_KEY) {
            let username = username_from_url.unwrap_or("git");
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }
            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        Cred::default()
    });

    callbacks
}

impl TagSource for Git2TagSource {
    fn remote_tags(&self) -> Result<Vec<String>> {
        let Some(token) = github_token() else {
            info!("{}", BuildWarning::RemoteTagsSkipped);
            return Ok(Vec::new());
        };

        let mut remote = self.repo.find_remote(&self.remote)?;
        let connection =
            remote.connect_auth(Direction::Fetch, Some(remote_callbacks(Some(token))), None)?;

        let tags = connection
            .list()?
            .iter()
            .map(|head| head.name().to_string())
            .filter(|name| name.starts_with("refs/tags/") && !name.ends_with("^{}"))
            .collect();

        Ok(tags)
    }

    fn current_branch(&self) -> Result<String> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => {
                Ok(head.shorthand().unwrap_or(DETACHED_HEAD).to_string())
            }
            Ok(_) => Ok(DETACHED_HEAD.to_string()),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // No commits yet: HEAD still names the branch symbolically
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .unwrap_or(DETACHED_HEAD)
                    .to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn latest_branch_tag(&self) -> Result<Option<String>> {
        let mut options = DescribeOptions::new();
        options.describe_tags().pattern("v[0-9]*");

        let describe = match self.repo.describe(&options) {
            Ok(describe) => describe,
            Err(e) => {
                debug!("No version tag reachable from HEAD: {}", e);
                return Ok(None);
            }
        };

        let mut format = DescribeFormatOptions::new();
        format.abbreviated_size(0);
        Ok(Some(describe.format(Some(&format))?))
    }

    fn create_tag(&self, tag: &Tag, force: bool) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        let signature = self.signature()?;
        self.repo
            .tag(&tag.name, head.as_object(), &signature, TAG_MESSAGE, force)
            .map_err(|e| {
                BuildError::command(
                    format!("git tag -a {}", tag.name),
                    format!("tag creation might have a problem: {}", e),
                )
            })?;
        Ok(())
    }

    fn push_tag(&self, tag: &Tag, force: bool) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(&self.remote)
            .map_err(|_| BuildError::config(format!("No remote named '{}' found", self.remote)))?;

        let mut callbacks = remote_callbacks(github_token());
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => {
                warn!("Could not update reference {}: {}", refname, status);
                Err(git2::Error::from_str(&format!("Push failed for {}", refname)))
            }
            None => Ok(()),
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refname = tag.refname();
        let refspec = format!("{}{}:{}", if force { "+" } else { "" }, refname, refname);
        let command = format!("git push {} {}", self.remote, tag.name);

        remote
            .push(&[refspec.as_str()], Some(&mut push_options))
            .map_err(|e| match e.class() {
                ErrorClass::Net => BuildError::command(command, format!("network error: {}", e)),
                ErrorClass::Reference => {
                    BuildError::command(command, format!("reference error: {}", e))
                }
                _ => BuildError::command(command, e.to_string()),
            })
    }
}
