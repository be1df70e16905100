use crate::domain::Tag;
use crate::error::{BuildError, Result};
use crate::git::TagSource;
use std::sync::Mutex;

/// In-memory tag source for testing without a git repository
#[derive(Debug)]
pub struct MockTagSource {
    tags: Vec<String>,
    branch: String,
    latest_tag: Option<String>,
    created: Mutex<Vec<String>>,
    pushed: Mutex<Vec<String>>,
    fail_create: bool,
}

impl MockTagSource {
    /// Create an empty source on branch `main`
    pub fn new() -> Self {
        MockTagSource {
            tags: Vec::new(),
            branch: "main".to_string(),
            latest_tag: None,
            created: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
            fail_create: false,
        }
    }

    /// Set the remote tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the current branch
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the latest tag reachable from HEAD
    pub fn with_latest_tag(mut self, tag: impl Into<String>) -> Self {
        self.latest_tag = Some(tag.into());
        self
    }

    /// Make every tag creation fail
    pub fn failing_tag_creation(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Names of the tags created so far
    pub fn created_tags(&self) -> Vec<String> {
        self.created.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Names of the tags pushed so far
    pub fn pushed_tags(&self) -> Vec<String> {
        self.pushed.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Default for MockTagSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TagSource for MockTagSource {
    fn remote_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    fn latest_branch_tag(&self) -> Result<Option<String>> {
        Ok(self.latest_tag.clone())
    }

    fn create_tag(&self, tag: &Tag, force: bool) -> Result<()> {
        if self.fail_create {
            return Err(BuildError::command(
                format!("git tag {}", tag.name),
                "tag creation disabled",
            ));
        }
        let mut created = self
            .created
            .lock()
            .map_err(|_| BuildError::config("mock tag list poisoned"))?;
        if !force && created.contains(&tag.name) {
            return Err(BuildError::command(
                format!("git tag {}", tag.name),
                "tag already exists",
            ));
        }
        created.retain(|t| *t != tag.name);
        created.push(tag.name.clone());
        Ok(())
    }

    fn push_tag(&self, tag: &Tag, _force: bool) -> Result<()> {
        self.pushed
            .lock()
            .map_err(|_| BuildError::config("mock tag list poisoned"))?
            .push(tag.name.clone());
        Ok(())
    }
}
