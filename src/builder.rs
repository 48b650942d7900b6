//! Project build step behind `POST /api/build-project`
//!
//! A project directory holds `game.ts` and `default.scene.json`. Building
//! bundles the game code with esbuild into `.dist/game.js` and writes a copy of
//! the scene to `.dist/default.scene.json` with every referenced prefab
//! embedded under a top-level `prefabs` object.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::{Map, Value};

use crate::config::BuildSettings;
use crate::exec;
use crate::schema::BuildOutcome;
use crate::{FileServerError, Result};

pub const DEFAULT_SCENE_NAME: &str = "default.scene.json";
pub const DEFAULT_GAME_NAME: &str = "game.ts";
pub const DEFAULT_GAME_BUNDLE_NAME: &str = "game.js";
pub const BUILT_PROJECT_FOLDER: &str = ".dist";
pub const PROJECT_PREFIX: &str = "@project";

/// Builds a project directory. Runs on a blocking thread.
pub trait ProjectBuilder: Send + Sync {
    fn build(&self, project: &Path) -> BuildOutcome;
}

/// Default builder: esbuild bundle plus prefab-packed scene
#[derive(Debug, Clone)]
pub struct BundlerProjectBuilder {
    bundler: String,
}

impl BundlerProjectBuilder {
    pub fn new(settings: &BuildSettings) -> Self {
        Self {
            bundler: settings.bundler.clone(),
        }
    }

    /// The bundler program. Windows goes through `cmd /C` so `npx.cmd` resolves.
    fn bundler_command(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.bundler);
            cmd
        } else {
            Command::new(&self.bundler)
        }
    }

    fn bundle(&self, project: &Path, game: &Path, outfile: &Path) -> Result<()> {
        let mut cmd = self.bundler_command();
        cmd.arg("esbuild")
            .arg(game)
            .arg("--bundle")
            .arg("--platform=browser")
            .arg("--minify")
            .arg("--keep-names")
            .arg(format!("--outfile={}", outfile.display()))
            .arg("--external:genesys.js")
            .arg("--external:three")
            .arg("--format=cjs")
            .current_dir(project)
            .stdin(Stdio::null());

        let description = format!("{} esbuild {}", self.bundler, game.display());
        tracing::info!("Building game bundle from {}", game.display());
        let status = cmd.status().map_err(|e| FileServerError::Exec {
            command: description.clone(),
            message: e.to_string(),
        })?;
        exec::check_status(&description, status)
    }

    fn package(&self, project: &Path) -> Result<PathBuf> {
        let game = project.join(DEFAULT_GAME_NAME);
        let scene = project.join(DEFAULT_SCENE_NAME);
        let dist = project.join(BUILT_PROJECT_FOLDER);

        if dist.exists() {
            fs::remove_dir_all(&dist)?;
        }
        fs::create_dir_all(&dist)?;

        self.bundle(project, &game, &dist.join(DEFAULT_GAME_BUNDLE_NAME))?;

        let scene_data = read_json(&scene)?;
        let packed = inject_prefabs(scene_data, project)?;
        let encoded = serde_json::to_string(&packed).map_err(|e| {
            FileServerError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        fs::write(dist.join(DEFAULT_SCENE_NAME), encoded)?;

        Ok(dist)
    }
}

impl Default for BundlerProjectBuilder {
    fn default() -> Self {
        Self::new(&BuildSettings::default())
    }
}

impl ProjectBuilder for BundlerProjectBuilder {
    fn build(&self, project: &Path) -> BuildOutcome {
        tracing::info!("Building project at {}", project.display());

        if !project.exists() {
            return BuildOutcome::failed(format!("Project does not exist: {}", project.display()));
        }
        let game = project.join(DEFAULT_GAME_NAME);
        if !game.exists() {
            return BuildOutcome::failed(format!("Game file {} does not exist", game.display()));
        }
        let scene = project.join(DEFAULT_SCENE_NAME);
        if !scene.exists() {
            return BuildOutcome::failed(format!("Scene file {} does not exist", scene.display()));
        }

        match self.package(project) {
            Ok(dist) => {
                let message = format!("Project built successfully at {}", dist.display());
                tracing::info!("{}", message);
                BuildOutcome::ok(message)
            }
            Err(e) => {
                tracing::error!("Failed to build project: {}", e);
                BuildOutcome {
                    success: false,
                    message: format!("Failed to build project: {}", e),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Embed every prefab referenced by `actors[].ctor.prefabName` into `prefabs`.
///
/// Prefab names start with `@project`, which is replaced by the project path
/// to locate the prefab file. A referenced prefab that does not exist is an error.
pub fn inject_prefabs(mut scene: Value, project: &Path) -> Result<Value> {
    let prefab_names: Vec<String> = scene
        .get("actors")
        .and_then(Value::as_array)
        .map(|actors| {
            actors
                .iter()
                .filter_map(|actor| actor.pointer("/ctor/prefabName"))
                .filter_map(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut prefabs = Map::new();
    for name in prefab_names {
        let path = prefab_path(&name, project);
        if !path.exists() {
            return Err(FileServerError::NotFound {
                path: format!("prefab {}", path.display()),
            });
        }
        prefabs.insert(name, read_json(&path)?);
    }

    let object = scene.as_object_mut().ok_or_else(|| {
        FileServerError::bad_request("Scene file must contain a JSON object")
    })?;
    object.insert("prefabs".to_string(), Value::Object(prefabs));
    Ok(scene)
}

fn prefab_path(name: &str, project: &Path) -> PathBuf {
    match name.strip_prefix(PROJECT_PREFIX) {
        Some(rest) => project.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(name),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        FileServerError::bad_request(format!("Invalid JSON in {}: {}", path.display(), e))
    })
}
