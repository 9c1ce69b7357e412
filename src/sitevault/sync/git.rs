use super::queue::{PublishOutcome, Publisher, SyncEvent};
use crate::config::SyncConfig;
use crate::error::{Result, SiteError};
use crate::store::checksum::serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Publishes snapshots by committing them to a git working tree and pushing.
///
/// Commits only when the snapshot changed the tree; the push is attempted
/// every time so a commit left behind by a failed push goes out on retry.
pub struct GitPublisher {
    repo_dir: PathBuf,
    data_path: PathBuf,
    remote: Option<(String, String)>,
}

impl GitPublisher {
    pub fn new(repo_dir: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            data_path: data_path.into(),
            remote: None,
        }
    }

    pub fn with_push(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.remote = Some((remote.into(), branch.into()));
        self
    }

    /// Builds a publisher from config, or `None` when no repository is configured.
    pub fn from_config(config: &SyncConfig) -> Option<Self> {
        let repo_dir = config.repo_dir.clone()?;
        Some(
            Self::new(repo_dir, config.data_path.clone())
                .with_push(config.remote.clone(), config.branch.clone()),
        )
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|e| SiteError::Sync(format!("failed to run git: {}", e)))?;
        if !output.status.success() {
            return Err(SiteError::Sync(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn write_snapshot(&self, content: &str) -> Result<()> {
        let target = self.repo_dir.join(&self.data_path);
        let parent = target.parent().unwrap_or(Path::new("."));
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

impl Publisher for GitPublisher {
    fn publish(&mut self, event: &SyncEvent) -> Result<PublishOutcome> {
        let content = serialize(&event.document)?;
        self.write_snapshot(&content)?;

        let path = self.data_path.to_string_lossy().into_owned();
        self.git(&["add", "--", &path])?;
        let staged = self.git(&["status", "--porcelain", "--", &path])?;

        let outcome = if staged.trim().is_empty() {
            debug!(id = %event.id, "snapshot unchanged, nothing to commit");
            PublishOutcome::Unchanged
        } else {
            self.git(&["commit", "-m", &event.message, "--", &path])?;
            PublishOutcome::Published
        };

        if let Some((remote, branch)) = &self.remote {
            let refspec = format!("HEAD:{}", branch);
            self.git(&["push", remote.as_str(), &refspec])?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Record};
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-q"],
            vec!["config", "user.name", "Site Editor"],
            vec!["config", "user.email", "editor@example.com"],
            vec!["config", "commit.gpgsign", "false"],
        ] {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(&args)
                .status()
                .unwrap();
            assert!(status.success());
        }
    }

    fn event(doc: Document, message: &str) -> SyncEvent {
        SyncEvent {
            id: Uuid::new_v4(),
            document: doc,
            message: message.to_string(),
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn second_identical_snapshot_is_unchanged() {
        if !git_available() {
            return;
        }
        let repo = TempDir::new().unwrap();
        init_repo(repo.path());

        let mut doc = Document::default();
        doc.team.push(Record::new().with("id", 1).with("name", "Ada"));

        let mut publisher = GitPublisher::new(repo.path(), "data/data.json");
        assert_eq!(
            publisher.publish(&event(doc.clone(), "content: team")).unwrap(),
            PublishOutcome::Published
        );
        assert_eq!(
            publisher.publish(&event(doc, "content: team")).unwrap(),
            PublishOutcome::Unchanged
        );

        let written = fs::read_to_string(repo.path().join("data/data.json")).unwrap();
        assert!(written.contains("\"Ada\""));
    }

    #[test]
    fn missing_repository_is_a_sync_error() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let mut publisher = GitPublisher::new(dir.path().join("nope"), "data.json");
        let result = publisher.publish(&event(Document::default(), "x"));
        assert!(result.is_err());
    }

    #[test]
    fn from_config_requires_a_repo_dir() {
        assert!(GitPublisher::from_config(&SyncConfig::default()).is_none());
        let config = SyncConfig {
            repo_dir: Some(PathBuf::from("/srv/content")),
            ..SyncConfig::default()
        };
        assert!(GitPublisher::from_config(&config).is_some());
    }
}
