//! Backend facade, the public operation surface.
//!
//! Resolves a target file to its project's session, issues commands,
//! and routes raw replies through translation. Results are handed to a
//! caller-supplied completion callback, decoupling production from
//! consumption. Operations the tool cannot support are permanent
//! no-ops returning empty result sets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Mutex;

use hsmod_types::{Declaration, DeclarationKind, DiagnosticRecord, ModuleSymbols, ScopeModule};

use crate::config::BackendConfig;
use crate::launch::{LaunchError, Launcher};
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::translate;

/// Dotted module names are the only lookups `browse` accepts.
static MODULE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+(?:\.\w+)+$").expect("module name pattern is valid"));

/// How a lookup string matches candidate names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Exact,
    Prefix,
    Suffix,
    Infix,
    Regex,
}

fn lookup_match(element: &str, lookup: &str, search_type: SearchType) -> bool {
    match search_type {
        SearchType::Exact => element == lookup,
        SearchType::Prefix => element.starts_with(lookup),
        SearchType::Suffix => element.ends_with(lookup),
        SearchType::Infix => element.contains(lookup),
        SearchType::Regex => Regex::new(lookup).is_ok_and(|re| re.is_match(element)),
    }
}

/// One `browse -d -o` reply line: `name :: decl`.
fn parse_declaration(line: &str) -> Option<Declaration> {
    let (name, signature) = line.split_once(" :: ")?;
    let kind = if signature.starts_with("class") {
        DeclarationKind::Class
    } else if signature.starts_with("data") {
        DeclarationKind::Data
    } else if signature.starts_with("newtype") {
        DeclarationKind::Newtype
    } else {
        DeclarationKind::Function
    };
    Some(Declaration::new(
        name.to_string(),
        kind,
        signature.to_string(),
    ))
}

/// Sandbox package databases look like `packages-<ghc-version>.conf`.
fn package_databases(sandbox: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(sandbox) else {
        return Vec::new();
    };
    let mut dbs: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("packages-") && name.ends_with(".conf"))
        })
        .map(|entry| entry.path())
        .collect();
    dbs.sort();
    dbs
}

struct ProjectEntry {
    project: String,
    project_dir: PathBuf,
}

/// The ghc-mod backend: one interactive session per project, with
/// commands issued per file and raw output translated into records.
pub struct GhcModBackend {
    config: BackendConfig,
    launcher: Launcher,
    registry: SessionRegistry,
    /// File → (project, project dir), fed by the project tracker.
    file_projects: Mutex<HashMap<PathBuf, ProjectEntry>>,
}

impl GhcModBackend {
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let launcher = Launcher::new(&config);
        Self {
            config,
            launcher,
            registry: SessionRegistry::new(),
            file_projects: Mutex::new(HashMap::new()),
        }
    }

    /// Apply new settings; the search path is recomputed immediately.
    /// Running sessions keep the options they were started with.
    pub fn reconfigure(&mut self, config: BackendConfig) {
        self.launcher.reconfigure(&config);
        self.config = config;
    }

    /// Associate `file` with `project` and make sure the project has a
    /// session. ghc-mod has to execute in the project directory, so
    /// multiple projects mean multiple concurrent sessions.
    ///
    /// Startup misconfiguration is the one hard error surfaced to the
    /// caller; after a failure the project stays absent and a later
    /// call can retry.
    pub async fn add_project_file(
        &self,
        file: &Path,
        project: &str,
        project_dir: &Path,
    ) -> Result<(), LaunchError> {
        self.file_projects.lock().await.insert(
            file.to_path_buf(),
            ProjectEntry {
                project: project.to_string(),
                project_dir: project_dir.to_path_buf(),
            },
        );
        self.ensure_project(project, project_dir).await
    }

    /// Make sure `project` has a running session, starting one in
    /// `project_dir` if needed.
    pub async fn ensure_project(
        &self,
        project: &str,
        project_dir: &Path,
    ) -> Result<(), LaunchError> {
        let opt_args = self.opt_args(project_dir);
        self.registry
            .ensure(&self.launcher, project, project_dir, &opt_args)
            .await
            .map(|_| ())
    }

    /// Forget the file association. The project session stays up for
    /// other files.
    pub async fn remove_project_file(&self, file: &Path) {
        self.file_projects.lock().await.remove(file);
    }

    /// Type-check files. Unsaved buffer contents in `contents` are
    /// mapped into the session for the duration of the command.
    pub async fn check(
        &self,
        files: &[PathBuf],
        contents: &HashMap<PathBuf, String>,
        on_result: impl FnOnce(Vec<DiagnosticRecord>),
    ) {
        let records = self
            .run_per_file("check", files, contents, translate::translate_check)
            .await;
        on_result(records);
    }

    /// Lint files via hlint. Same mapping rules as [`check`](Self::check).
    pub async fn lint(
        &self,
        files: &[PathBuf],
        contents: &HashMap<PathBuf, String>,
        on_result: impl FnOnce(Vec<DiagnosticRecord>),
    ) {
        let records = self
            .run_per_file("lint --hlintOpt -u", files, contents, translate::translate_lint)
            .await;
        on_result(records);
    }

    /// Browse the declarations of one module by exact dotted name.
    pub async fn module(
        &self,
        project: &str,
        lookup: &str,
        on_result: impl FnOnce(Vec<ModuleSymbols>),
    ) {
        on_result(self.browse_module(project, lookup).await.into_iter().collect());
    }

    /// List the modules in scope for `project`, filtered by `lookup`.
    pub async fn scope_modules(
        &self,
        project: &str,
        lookup: &str,
        search_type: SearchType,
        on_result: impl FnOnce(Vec<ScopeModule>),
    ) {
        let mut modules = Vec::new();
        if let Some(session) = self.registry.get(project).await {
            let reply = session.command("list -d").await;
            for line in reply.out() {
                let mut parts = line.split_whitespace();
                if let (Some(package), Some(name)) = (parts.next(), parts.next())
                    && lookup_match(name, lookup, search_type)
                {
                    modules.push(ScopeModule::new(name.to_string(), package.to_string()));
                }
            }
        }
        on_result(modules);
    }

    /// Language extensions the tool knows about.
    pub async fn langs(&self, project: &str, on_result: impl FnOnce(Vec<String>)) {
        on_result(self.raw_command(project, "lang").await);
    }

    /// GHC flags the tool knows about.
    pub async fn flags(&self, project: &str, on_result: impl FnOnce(Vec<String>)) {
        on_result(self.raw_command(project, "flag").await);
    }

    // Capabilities ghc-mod does not provide. Permanent no-ops so the
    // dispatch layer can treat every backend uniformly.

    pub fn scan(&self, on_result: impl FnOnce(Vec<PathBuf>)) {
        on_result(Vec::new());
    }

    pub fn docs(&self, on_result: impl FnOnce(Vec<ModuleSymbols>)) {
        on_result(Vec::new());
    }

    pub fn infer(&self, on_result: impl FnOnce(Vec<ModuleSymbols>)) {
        on_result(Vec::new());
    }

    pub fn types(&self, on_result: impl FnOnce(Vec<DiagnosticRecord>)) {
        on_result(Vec::new());
    }

    pub fn complete(&self, on_result: impl FnOnce(Vec<String>)) {
        on_result(Vec::new());
    }

    pub fn symbol(&self, on_result: impl FnOnce(Vec<Declaration>)) {
        on_result(Vec::new());
    }

    /// Shut down and discard one project's session.
    pub async fn remove_project(&self, project: &str) {
        self.registry.remove(project).await;
    }

    /// Shut down every session.
    pub async fn shutdown(&self) {
        self.registry.remove_all().await;
    }

    async fn session_for(&self, file: &Path) -> Option<(Arc<Session>, PathBuf)> {
        let entry = {
            let files = self.file_projects.lock().await;
            files
                .get(file)
                .map(|entry| (entry.project.clone(), entry.project_dir.clone()))
        };
        let Some((project, project_dir)) = entry else {
            tracing::warn!(file = %file.display(), "file is not associated with a project");
            return None;
        };
        let Some(session) = self.registry.get(&project).await else {
            tracing::warn!(project = %project, "project has no active ghc-mod session");
            return None;
        };
        Some((session, project_dir))
    }

    async fn run_per_file(
        &self,
        command: &str,
        files: &[PathBuf],
        contents: &HashMap<PathBuf, String>,
        translate: fn(&Path, &str) -> Vec<DiagnosticRecord>,
    ) -> Vec<DiagnosticRecord> {
        let mut records = Vec::new();
        for file in files {
            let Some((session, project_dir)) = self.session_for(file).await else {
                continue;
            };
            let name = file.display().to_string();
            let mapped = match contents.get(file) {
                Some(text) => {
                    session.map_file(&name, text).await;
                    true
                }
                None => false,
            };
            let reply = session.command(&format!("{command} {name}")).await;
            // Unmap before anything else: the command cannot throw (it
            // degrades to an empty reply), so a mapped buffer is always
            // released and never leaks stale state into the subprocess.
            if mapped {
                session.unmap_file(&name).await;
            }
            records.extend(translate(&project_dir, &reply.into_out().join("\n")));
        }
        records
    }

    async fn browse_module(&self, project: &str, lookup: &str) -> Option<ModuleSymbols> {
        if !MODULE_NAME_RE.is_match(lookup) {
            return None;
        }
        let session = self.registry.get(project).await?;
        let reply = session.command(&format!("browse -d -o {lookup}")).await;
        if reply.err().iter().any(|line| line.contains("EXCEPTION")) {
            tracing::warn!(project = %project, module = %lookup, "browse failed: {}", reply.err().join("\n"));
            return None;
        }
        if reply.out().is_empty() {
            return None;
        }
        let declarations = reply
            .out()
            .iter()
            .filter_map(|line| parse_declaration(line))
            .collect();
        Some(ModuleSymbols::new(lookup.to_string(), declarations))
    }

    async fn raw_command(&self, project: &str, command: &str) -> Vec<String> {
        match self.registry.get(project).await {
            Some(session) => session.command(command).await.into_out(),
            None => Vec::new(),
        }
    }

    /// Build the per-project `-g` option pairs: configured GHC options,
    /// sandbox package databases, and the include path.
    fn opt_args(&self, project_dir: &Path) -> Vec<String> {
        let mut opts = self.config.ghc_opts.clone();
        if let Some(sandbox) = &self.config.sandbox {
            for db in package_databases(sandbox) {
                opts.push(format!("-package-db {}", db.display()));
            }
        }
        opts.push(format!("-i {}", project_dir.display()));

        let mut args = Vec::with_capacity(opts.len() * 2);
        for opt in opts {
            args.push("-g".to_string());
            args.push(opt);
        }
        args
    }
}
