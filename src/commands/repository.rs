//! Command repositories loaded from directories

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::alias::{AliasDefinition, CommandAlias};
use super::yaml::{load_command_file, LoadedCommand};
use super::{Command, CommandError};

/// A tree of commands addressed by `parent/.../name` paths
#[derive(Debug, Clone, Default)]
pub struct Repository {
    commands: Vec<Command>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Load every `.yaml`/`.yml` file below `dir`. Subdirectories become
    /// parents. Aliases are resolved once all commands are loaded, first
    /// relative to the alias' own directory, then from the root.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CommandError> {
        let mut files = Vec::new();
        collect_yaml_files(dir, &mut HashSet::new(), &mut files)?;
        files.sort();

        let mut repository = Self::new();
        let mut aliases: Vec<(AliasDefinition, Vec<String>)> = Vec::new();

        for file in files {
            let parents = parents_of(dir, &file);
            debug!(file = %file.display(), "loading command");
            match load_command_file(&file, parents.clone())? {
                LoadedCommand::Command(command) => repository.add(command),
                LoadedCommand::Alias(alias) => aliases.push((alias, parents)),
            }
        }

        // aliases may point at other aliases, so resolve until nothing changes
        while !aliases.is_empty() {
            let before = aliases.len();
            let mut pending = Vec::new();
            for (alias, parents) in aliases {
                match repository.resolve_alias_target(&alias.alias_for, &parents) {
                    Some(target) => {
                        let command = Command::Alias(Arc::new(CommandAlias::new(alias, parents, target)));
                        repository.add(command);
                    }
                    None => pending.push((alias, parents)),
                }
            }
            if pending.len() == before {
                let (alias, _) = pending.swap_remove(0);
                return Err(CommandError::DanglingAlias {
                    name: alias.name,
                    alias_for: alias.alias_for,
                });
            }
            aliases = pending;
        }

        info!(directory = %dir.display(), commands = repository.len(), "loaded command repository");
        Ok(repository)
    }

    fn resolve_alias_target(&self, alias_for: &str, parents: &[String]) -> Option<Command> {
        let relative = parents
            .iter()
            .map(String::as_str)
            .chain(alias_for.split('/'))
            .collect::<Vec<_>>()
            .join("/");
        self.find_exact(&relative)
            .or_else(|| self.find_exact(alias_for.trim_start_matches('/')))
            .cloned()
    }

    fn find_exact(&self, path: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.description().full_path() == path)
    }

    /// Commands at `path`. A path naming a command returns it, a path naming a
    /// directory returns the commands directly in it, or all commands below it
    /// when `recurse` is set.
    pub fn collect_commands(&self, path: &[&str], recurse: bool) -> Vec<&Command> {
        let path: Vec<&str> = path.iter().copied().filter(|p| !p.is_empty()).collect();

        let exact: Vec<&Command> = self
            .commands
            .iter()
            .filter(|c| {
                let d = c.description();
                d.parents.len() + 1 == path.len()
                    && d.parents.iter().map(String::as_str).eq(path[..path.len().saturating_sub(1)].iter().copied())
                    && path.last() == Some(&d.name.as_str())
            })
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        self.commands
            .iter()
            .filter(|c| {
                let parents = &c.description().parents;
                let under = parents.len() >= path.len()
                    && parents.iter().map(String::as_str).take(path.len()).eq(path.iter().copied());
                under && (recurse || parents.len() == path.len())
            })
            .collect()
    }

    /// The single command at `path`
    pub fn find_command(&self, path: &str) -> Result<&Command, CommandError> {
        let segments: Vec<&str> = path.split('/').collect();
        let mut found = self.collect_commands(&segments, false);
        match found.len() {
            0 => Err(CommandError::NotFound(path.to_string())),
            1 => Ok(found.remove(0)),
            _ => Err(CommandError::Ambiguous {
                path: path.to_string(),
                candidates: found.iter().map(|c| c.description().full_path()).collect(),
            }),
        }
    }
}

/// Collect YAML files below `dir` in name order. Symlinked directories are
/// followed, but each directory is read at most once.
fn collect_yaml_files(dir: &Path, visited: &mut HashSet<PathBuf>, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !visited.insert(dir.canonicalize()?) {
        debug!(directory = %dir.display(), "skipping directory already loaded");
        return Ok(());
    }
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_yaml_files(&path, visited, out)?;
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
            out.push(path);
        }
    }
    Ok(())
}

fn parents_of(root: &Path, file: &Path) -> Vec<String> {
    file.parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn repository() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "users.yaml", "name: users\nrows: [{name: a}]\n");
        write(dir.path(), "reports/daily.yaml", "name: daily\nrows: []\n");
        write(dir.path(), "reports/weekly.yml", "name: weekly\nrows: []\n");
        write(dir.path(), "reports/admins.yaml", "name: admins\nalias-for: users\nflags: {role: admin}\n");
        write(dir.path(), "reports/mine.yaml", "name: mine\nalias-for: weekly\n");
        write(dir.path(), "notes.txt", "ignored");
        let repository = Repository::load_from_dir(dir.path()).unwrap();
        (dir, repository)
    }

    #[test]
    fn test_load_tree_and_aliases() {
        let (_dir, repository) = repository();
        assert_eq!(repository.len(), 5);

        let admins = repository.find_command("reports/admins").unwrap();
        assert!(matches!(admins, Command::Alias(_)));
        assert_eq!(admins.resolve().description().full_path(), "users");

        let mine = repository.find_command("reports/mine").unwrap();
        assert_eq!(mine.resolve().description().full_path(), "reports/weekly");
    }

    #[test]
    fn test_find_command_errors() {
        let (_dir, repository) = repository();
        assert!(matches!(
            repository.find_command("nope"),
            Err(CommandError::NotFound(_))
        ));
        match repository.find_command("reports") {
            Err(CommandError::Ambiguous { candidates, .. }) => assert_eq!(candidates.len(), 4),
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_recursive() {
        let (_dir, repository) = repository();
        assert_eq!(repository.collect_commands(&[], false).len(), 1);
        assert_eq!(repository.collect_commands(&[], true).len(), 5);
        assert_eq!(repository.collect_commands(&["reports"], true).len(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "name: a\nrows: []\n");
        write(dir.path(), "shared/b.yaml", "name: b\nrows: []\n");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let repository = Repository::load_from_dir(dir.path()).unwrap();
        let mut paths: Vec<String> = repository
            .commands()
            .iter()
            .map(|c| c.description().full_path())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["a", "shared/b"]);
    }

    #[test]
    fn test_dangling_alias() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.yaml", "name: broken\nalias-for: missing\n");
        let err = Repository::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CommandError::DanglingAlias { .. }));
    }
}
