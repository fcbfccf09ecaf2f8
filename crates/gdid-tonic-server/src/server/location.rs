//! File-backed durable location.
//!
//! One state file per `(scope, sequence)` under the location root:
//! `<root>/<scope>/<sequence>` containing `"<era> <counter>"`. Writes go
//! through a temp file, fsync, then an atomic rename, so a crash leaves
//! either the old or the new state, never a torn record. Sequence-key
//! validation already restricts names to filesystem-safe characters.

use gdid::{Error, Location, Result, SequenceKey, SequenceState};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub struct FileLocation {
    name: String,
    root: PathBuf,
}

impl FileLocation {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    fn state_path(&self, key: &SequenceKey) -> PathBuf {
        self.root.join(key.scope()).join(key.sequence())
    }

    fn io_error(&self, context: impl std::fmt::Display) -> Error {
        Error::Location {
            location: self.name.clone(),
            context: context.to_string(),
        }
    }
}

impl Location for FileLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceState>> {
        let path = self.state_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(format!("read {}: {e}", path.display()))),
        };

        let mut fields = content.split_ascii_whitespace();
        let parsed = match (fields.next(), fields.next(), fields.next()) {
            (Some(era), Some(counter), None) => {
                era.parse::<u32>().ok().zip(counter.parse::<u64>().ok())
            }
            _ => None,
        };
        // A malformed record is an error, not NotFound: treating it as a
        // fresh sequence could re-issue granted counters.
        match parsed {
            Some((era, counter)) => Ok(Some(SequenceState::new(era, counter))),
            None => Err(self.io_error(format!("corrupt state file {}", path.display()))),
        }
    }

    async fn write(&self, key: &SequenceKey, state: SequenceState) -> Result<()> {
        let path = self.state_path(key);
        let dir = path.parent().expect("state path always has a parent");
        fs::create_dir_all(dir)
            .await
            .map_err(|e| self.io_error(format!("create {}: {e}", dir.display())))?;

        // Dot-prefixed temp name: validated sequence names can never start
        // with a dot, so no key's state file can collide with it.
        let tmp = dir.join(format!(".{}.tmp", key.sequence()));
        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| self.io_error(format!("create {}: {e}", tmp.display())))?;
        file.write_all(format!("{} {}", state.era, state.counter).as_bytes())
            .await
            .map_err(|e| self.io_error(format!("write {}: {e}", tmp.display())))?;
        file.sync_all()
            .await
            .map_err(|e| self.io_error(format!("sync {}: {e}", tmp.display())))?;
        drop(file);

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| self.io_error(format!("rename {}: {e}", path.display())))
    }
}
